//! Integration tests for one Shadow driving one Actor over memory channels.
//!
//! These tests exercise:
//! - Object round trips through the broker (elements, nodes)
//! - Cached counts and lazily refreshed boundary data
//! - Condensed tangent/residual gathered in boundary order
//! - Termination by `terminate()` and by drop

mod common;

use common::{count, spawn_pair, DiagonalEngine, NodeListBuilder, Spring};
use ddfem::model::{Element, LoadPattern, NodalLoad, Node, SpConstraint, TimeSeries};
use ddfem::{AnalysisComponent, BoundaryData, ComponentKind, DomainError, SubdomainHandle};
use ddfem_core::{ClassTag, CodecError, JsonCodec, MessageCodec, MovableObject, Opcode, Vector};
use serde::{Deserialize, Serialize};
use tokio::task::LocalSet;

#[tokio::test]
async fn test_element_round_trip() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(1).await;
            let spring = Spring::new(10, 1, 2, 250.0);

            assert!(pair.shadow.add_element(Box::new(spring.clone())).await.expect("add"));
            assert_eq!(pair.shadow.num_elements(), 1);
            assert!(pair.shadow.has_element(10).await.expect("has"));

            let element = pair.shadow.get_element(10).await.expect("get").expect("present");
            assert_eq!(element.tag(), 10);
            assert_eq!(element.node_tags(), vec![1, 2]);
            assert_eq!(element.send_self().expect("encode"), spring.send_self().expect("encode"));

            assert!(pair.shadow.get_element(11).await.expect("get").is_none());
            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_tags_are_unique_across_nodes_and_elements() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(1).await;

            assert!(pair.shadow.add_node(Node::new(5, 2, vec![0.0, 0.0])).await.expect("add"));
            assert!(!pair.shadow.add_node(Node::new(5, 2, vec![1.0, 0.0])).await.expect("add"));
            assert!(!pair
                .shadow
                .add_element(Box::new(Spring::new(5, 5, 6, 1.0)))
                .await
                .expect("add"));

            assert_eq!(pair.shadow.num_nodes(), 1);
            assert_eq!(pair.shadow.num_elements(), 0);
            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_partition_seven_boundary() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(7).await;
            let shadow = &mut pair.shadow;
            assert_eq!(shadow.tag(), 7);

            assert!(shadow.add_node(Node::new(1, 3, vec![0.0, 0.0])).await.expect("add"));
            assert!(shadow.add_external_node(Node::new(2, 3, vec![1.0, 0.0])).await.expect("add"));
            assert_eq!(shadow.num_nodes(), 2);

            assert_eq!(shadow.num_dof().await.expect("num_dof"), 3);
            assert_eq!(shadow.external_nodes().await.expect("external"), vec![2]);
            assert_eq!(shadow.cached_num_external_nodes(), 1);
            assert_eq!(count(&pair.sent, Opcode::GetRemoteData), 1);

            assert!(shadow.remove_node(1).await.expect("remove"));
            assert!(shadow.remove_node(2).await.expect("remove"));
            assert!(!shadow.remove_node(2).await.expect("remove"));
            assert_eq!(shadow.num_nodes(), 0);
            assert_eq!(shadow.num_dof().await.expect("num_dof"), 0);
            assert_eq!(shadow.num_external_nodes().await.expect("external"), 0);

            pair.shadow.terminate().await.expect("terminate");
            let subdomain = pair.actor.await.expect("join").expect("actor");
            assert_eq!(subdomain.tag(), 7);
            assert_eq!(subdomain.partition().num_nodes(), 0);
        })
        .await;
}

#[tokio::test]
async fn test_boundary_fetched_once_per_change() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(2).await;
            let shadow = &mut pair.shadow;
            assert!(!shadow.boundary().is_fresh());

            shadow.add_external_node(Node::new(3, 2, vec![0.0])).await.expect("add");
            for _ in 0..4 {
                assert_eq!(shadow.remote_data().await.expect("remote"), (vec![3], 2));
            }
            assert_eq!(count(&pair.sent, Opcode::GetRemoteData), 1);

            // Adding to a fresh boundary keeps it fresh.
            shadow.add_external_node(Node::new(4, 1, vec![0.0])).await.expect("add");
            assert_eq!(
                shadow.boundary(),
                &BoundaryData::Fresh {
                    external_nodes: vec![3, 4],
                    num_dof: 3
                }
            );
            assert_eq!(count(&pair.sent, Opcode::GetRemoteData), 1);

            shadow.remove_node(3).await.expect("remove");
            assert_eq!(shadow.boundary(), &BoundaryData::Stale);
            assert_eq!(shadow.remote_data().await.expect("remote"), (vec![4], 1));
            assert_eq!(count(&pair.sent, Opcode::GetRemoteData), 2);

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_removing_internal_node_keeps_external_count() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(2).await;
            let shadow = &mut pair.shadow;

            shadow.add_node(Node::new(1, 2, vec![0.0])).await.expect("add");
            shadow
                .add_external_node(Node::new(2, 2, vec![1.0]))
                .await
                .expect("add");
            assert!(!shadow.boundary().is_fresh());

            assert!(shadow.remove_node(1).await.expect("remove"));
            assert_eq!(shadow.cached_num_external_nodes(), 1);
            assert_eq!(shadow.num_external_nodes().await.expect("external"), 1);
            assert_eq!(shadow.external_nodes().await.expect("external"), vec![2]);

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_remote_build_then_remote_data() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(3).await;
            let builder = NodeListBuilder {
                internal: vec![(1, 2)],
                external: vec![(2, 2), (3, 1)],
            };
            pair.shadow.build(4, Box::new(builder)).await.expect("build");

            // The build is not acknowledged; the barrier reports its result.
            assert_eq!(pair.shadow.barrier_check(0).await.expect("barrier"), 0);
            assert_eq!(pair.shadow.remote_data().await.expect("remote"), (vec![2, 3], 3));
            assert_eq!(pair.shadow.cached_num_external_nodes(), 2);

            pair.shadow.terminate().await.expect("terminate");
            let subdomain = pair.actor.await.expect("join").expect("actor");
            assert_eq!(subdomain.partition().num_nodes(), 3);
        })
        .await;
}

#[tokio::test]
async fn test_condensed_tangent_and_residual() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(4).await;
            let shadow = &mut pair.shadow;

            shadow.add_node(Node::new(1, 2, vec![0.0])).await.expect("add");
            shadow.add_external_node(Node::new(2, 2, vec![1.0])).await.expect("add");
            shadow.add_external_node(Node::new(3, 1, vec![2.0])).await.expect("add");
            shadow.set_analysis(Box::new(DiagonalEngine::new(10.0))).await.expect("analysis");

            shadow.compute_tang().await.expect("compute tang");
            let tangent = shadow.tang().await.expect("tang");
            assert_eq!(tangent.dim(), (3, 3));
            assert_eq!(tangent[(0, 0)], 10.0);
            assert_eq!(tangent[(1, 1)], 20.0);
            assert_eq!(tangent[(2, 2)], 30.0);
            assert_eq!(tangent[(0, 1)], 0.0);

            shadow.compute_residual().await.expect("compute residual");
            let residual = shadow.resisting_force().await.expect("residual");
            assert_eq!(residual, Vector::from(vec![1.0, 2.0, 3.0]));

            shadow
                .compute_nodal_response(&Vector::from(vec![0.1, 0.2, 0.3]))
                .await
                .expect("nodal response");
            let disp = shadow.node_disp(2).await.expect("disp").expect("node present");
            assert_eq!(disp, Vector::from(vec![0.1, 0.2]));
            assert!(shadow.node_disp(99).await.expect("disp").is_none());

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_constrained_boundary_dof_is_zero() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(5).await;
            let shadow = &mut pair.shadow;

            shadow.add_external_node(Node::new(1, 2, vec![0.0])).await.expect("add");
            assert!(shadow.add_sp_constraint(SpConstraint::new(50, 1, 0, 0.0)).await.expect("sp"));
            assert_eq!(shadow.num_sps(), 1);
            shadow.set_analysis(Box::new(DiagonalEngine::new(1.0))).await.expect("analysis");

            shadow.compute_tang().await.expect("compute");
            let tangent = shadow.tang().await.expect("tang");
            assert_eq!(tangent.dim(), (2, 2));
            assert_eq!(tangent[(0, 0)], 0.0);
            assert_eq!(tangent[(1, 1)], 1.0);

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_compute_without_engine_is_rejected() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(6).await;
            let shadow = &mut pair.shadow;
            shadow.add_external_node(Node::new(1, 3, vec![0.0])).await.expect("add");

            let result = shadow.compute_tang().await;
            assert!(matches!(
                result,
                Err(DomainError::Rejected {
                    opcode: Opcode::ComputeTang
                })
            ));
            assert_eq!(shadow.barrier_check(0).await.expect("barrier"), -1);

            // The tangent query still answers with a correctly sized zero.
            let tangent = shadow.tang().await.expect("tang");
            assert_eq!(tangent.dim(), (3, 3));
            assert!(tangent.iter().all(|v| *v == 0.0));

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NewtonRaphson;

impl MovableObject for NewtonRaphson {
    fn class_tag(&self) -> ClassTag {
        500
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

impl AnalysisComponent for NewtonRaphson {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Algorithm
    }
}

#[tokio::test]
async fn test_component_kind_checked_before_sending() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(8).await;
            let result = pair.shadow.set_integrator(Box::new(NewtonRaphson)).await;
            assert!(matches!(
                result,
                Err(DomainError::WrongComponent {
                    expected: ComponentKind::Integrator,
                    got: ComponentKind::Algorithm
                })
            ));
            assert_eq!(count(&pair.sent, Opcode::SetIntegrator), 0);

            // Right slot, but the worker has no constructor for it.
            let result = pair.shadow.set_algorithm(Box::new(NewtonRaphson)).await;
            assert!(matches!(
                result,
                Err(DomainError::Rejected {
                    opcode: Opcode::SetAlgorithm
                })
            ));

            pair.shadow.terminate().await.expect("terminate");
        })
        .await;
}

#[tokio::test]
async fn test_load_pattern_and_state() {
    LocalSet::new()
        .run_until(async {
            let mut pair = spawn_pair(9).await;
            let shadow = &mut pair.shadow;

            shadow.add_node(Node::new(1, 2, vec![0.0])).await.expect("add");
            assert!(shadow
                .add_load_pattern(LoadPattern::new(20, TimeSeries::Linear { factor: 2.0 }))
                .await
                .expect("pattern"));
            assert!(shadow
                .add_nodal_load(NodalLoad::new(21, 1, Vector::from(vec![1.0, 0.0])), 20)
                .await
                .expect("load"));
            assert!(!shadow
                .add_nodal_load(NodalLoad::new(22, 1, Vector::from(vec![1.0, 0.0])), 99)
                .await
                .expect("load"));
            assert_eq!(shadow.num_load_patterns(), 1);

            shadow.apply_load(0.5).await.expect("apply");
            assert_eq!(shadow.current_time().await.expect("time"), 0.5);
            shadow.commit().await.expect("commit");
            shadow.set_load_constant().await.expect("constant");
            shadow.revert_to_last_commit().await.expect("revert");

            assert!(shadow.remove_nodal_load(21, 20).await.expect("remove"));
            assert!(shadow.remove_load_pattern(20).await.expect("remove"));
            assert_eq!(shadow.num_load_patterns(), 0);

            pair.shadow.terminate().await.expect("terminate");
            let subdomain = pair.actor.await.expect("join").expect("actor");
            assert_eq!(subdomain.partition().commit_tag(), 1);
        })
        .await;
}

#[tokio::test]
async fn test_terminate_sends_exactly_once() {
    LocalSet::new()
        .run_until(async {
            let pair = spawn_pair(10).await;
            let sent = pair.sent.clone();

            pair.shadow.terminate().await.expect("terminate");
            assert_eq!(count(&sent, Opcode::Terminate), 1);
            assert!(pair.actor.await.expect("join").is_ok());
        })
        .await;
}

#[tokio::test]
async fn test_drop_terminates_actor() {
    LocalSet::new()
        .run_until(async {
            let pair = spawn_pair(11).await;
            let sent = pair.sent.clone();

            drop(pair.shadow);
            assert_eq!(count(&sent, Opcode::Terminate), 1);
            let subdomain = pair.actor.await.expect("join").expect("actor exits cleanly");
            assert_eq!(subdomain.tag(), 11);
        })
        .await;
}
