//! Integration tests for the leader/follower fan-out of a `ShadowGroup`.
//!
//! These tests exercise:
//! - Exactly one opcode per Actor per round
//! - Round bookkeeping across tangent and residual rounds
//! - Protocol errors for repeated calls and membership changes mid-round
//! - Group barrier and termination

mod common;

use common::{count, spawn_pair, DiagonalEngine, Pair, RecordingChannel, SentLog};
use ddfem::model::Node;
use ddfem::{DomainError, DomainResult, ShadowGroup, Subdomain, SubdomainHandle};
use ddfem_core::Opcode;
use tokio::task::{JoinHandle, LocalSet};

struct Cluster {
    group: ShadowGroup<RecordingChannel>,
    actors: Vec<JoinHandle<DomainResult<Subdomain>>>,
    logs: Vec<SentLog>,
}

/// `n` partitions, each with one 2-DOF boundary node; `with_engine`
/// decides which of them get an analysis engine.
async fn cluster(n: i32, with_engine: impl Fn(i32) -> bool) -> Cluster {
    let mut group = ShadowGroup::new();
    let mut actors = Vec::new();
    let mut logs = Vec::new();
    for tag in 1..=n {
        let Pair {
            mut shadow,
            actor,
            sent,
        } = spawn_pair(tag).await;
        shadow
            .add_external_node(Node::new(100 + tag, 2, vec![0.0]))
            .await
            .expect("add");
        if with_engine(tag) {
            shadow
                .set_analysis(Box::new(DiagonalEngine::new(f64::from(tag))))
                .await
                .expect("analysis");
        }
        group.push(shadow).expect("push");
        actors.push(actor);
        logs.push(sent);
    }
    Cluster { group, actors, logs }
}

impl Cluster {
    async fn shutdown(self) {
        self.group.terminate().await.expect("terminate");
        for actor in self.actors {
            assert!(actor.await.expect("join").is_ok());
        }
    }
}

#[tokio::test]
async fn test_each_actor_gets_one_opcode_per_round() {
    LocalSet::new()
        .run_until(async {
            let mut cluster = cluster(3, |_| true).await;

            cluster.group.compute_tang(0).await.expect("leader");
            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::ComputeTang), 1);
            }
            assert_eq!(cluster.group.round_position(), 1);

            cluster.group.compute_tang(1).await.expect("follower");
            cluster.group.compute_tang(2).await.expect("follower");
            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::ComputeTang), 1);
            }
            assert_eq!(cluster.group.round_position(), 0);

            // Next round opens again, led by whoever calls first.
            cluster.group.compute_tang(2).await.expect("leader");
            cluster.group.compute_tang(0).await.expect("follower");
            cluster.group.compute_tang(1).await.expect("follower");
            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::ComputeTang), 2);
            }

            let tangent = cluster.group.get_mut(1).expect("shadow").tang().await.expect("tang");
            assert_eq!(tangent[(0, 0)], 2.0);
            assert_eq!(tangent[(1, 1)], 4.0);

            cluster.shutdown().await;
        })
        .await;
}

#[tokio::test]
async fn test_tangent_and_residual_rounds_interleave() {
    LocalSet::new()
        .run_until(async {
            let mut cluster = cluster(2, |_| true).await;

            cluster.group.compute_tang(0).await.expect("tang");
            cluster.group.compute_residual(0).await.expect("residual");
            assert_eq!(cluster.group.round_position(), 2);
            cluster.group.compute_tang(1).await.expect("tang");
            assert_eq!(cluster.group.round_position(), 1);
            cluster.group.compute_residual(1).await.expect("residual");
            assert_eq!(cluster.group.round_position(), 0);

            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::ComputeTang), 1);
                assert_eq!(count(log, Opcode::ComputeResidual), 1);
            }
            cluster.shutdown().await;
        })
        .await;
}

#[tokio::test]
async fn test_repeated_index_and_membership_change_are_rejected() {
    LocalSet::new()
        .run_until(async {
            let mut cluster = cluster(2, |_| true).await;

            cluster.group.compute_tang(0).await.expect("leader");
            let repeat = cluster.group.compute_tang(0).await;
            assert!(matches!(repeat, Err(DomainError::Protocol(_))));
            assert!(matches!(cluster.group.remove(1), Err(DomainError::Protocol(_))));
            assert!(matches!(
                cluster.group.compute_tang(5).await,
                Err(DomainError::Protocol(_))
            ));

            cluster.group.compute_tang(1).await.expect("follower");
            let removed = cluster.group.remove(1).expect("idle again");
            assert_eq!(removed.tag(), 2);
            assert_eq!(cluster.group.len(), 1);
            cluster.group.push(removed).expect("push back");

            cluster.shutdown().await;
        })
        .await;
}

#[tokio::test]
async fn test_failed_partition_does_not_stall_round() {
    LocalSet::new()
        .run_until(async {
            let mut cluster = cluster(3, |tag| tag != 2).await;

            let result = cluster.group.compute_tang_all().await;
            assert!(matches!(
                result,
                Err(DomainError::Rejected {
                    opcode: Opcode::ComputeTang
                })
            ));
            assert_eq!(cluster.group.round_position(), 0);
            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::ComputeTang), 1);
            }

            assert_eq!(cluster.group.barrier_check(0).await.expect("barrier"), -1);
            cluster.group.compute_residual_all().await.expect_err("partition 2 has no engine");
            cluster.shutdown().await;
        })
        .await;
}

#[tokio::test]
async fn test_group_barrier_combines_results() {
    LocalSet::new()
        .run_until(async {
            let mut cluster = cluster(3, |_| true).await;
            cluster.group.compute_tang_all().await.expect("round");

            assert_eq!(cluster.group.barrier_check(0).await.expect("barrier"), 0);
            assert_eq!(cluster.group.barrier_check(-1).await.expect("barrier"), -1);
            for log in &cluster.logs {
                assert_eq!(count(log, Opcode::BarrierCheck), 2);
            }
            cluster.shutdown().await;
        })
        .await;
}
