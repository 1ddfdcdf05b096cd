//! Shared fixtures for the actor/shadow integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use async_trait::async_trait;
use ddfem::model::{Element, ModelError, Node, PartitionBuilder};
use ddfem::{
    Actor, ActorConfig, AnalysisEngine, AnalysisError, DomainResult, Partition, Registry, Shadow,
    Subdomain,
};
use ddfem_core::{
    Channel, ChannelResult, ClassTag, CodecError, ElementTag, Frame, JsonCodec, Matrix,
    MessageCodec, MovableObject, NodeTag, Opcode, PartitionTag, Vector,
};
use ddfem_transport::MemoryChannel;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

pub const SPRING_CLASS: ClassTag = 100;
pub const DIAGONAL_ENGINE_CLASS: ClassTag = 200;
pub const NODE_LIST_BUILDER_CLASS: ClassTag = 300;

/// Two-node spring; only carries data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spring {
    pub tag: ElementTag,
    pub nodes: [NodeTag; 2],
    pub k: f64,
}

impl Spring {
    pub fn new(tag: ElementTag, i: NodeTag, j: NodeTag, k: f64) -> Self {
        Self { tag, nodes: [i, j], k }
    }
}

impl MovableObject for Spring {
    fn class_tag(&self) -> ClassTag {
        SPRING_CLASS
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

impl Element for Spring {
    fn tag(&self) -> ElementTag {
        self.tag
    }

    fn node_tags(&self) -> Vec<NodeTag> {
        self.nodes.to_vec()
    }

    fn clone_box(&self) -> Box<dyn Element> {
        Box::new(self.clone())
    }
}

/// Engine numbering internal DOFs first, then boundary DOFs in boundary
/// order. DOFs fixed by a single-point constraint get `-1`.
///
/// The condensed tangent is `diag(k, 2k, 3k, ...)` and the residual is
/// `[1, 2, 3, ...]`, so every gathered entry is recognisable.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DiagonalEngine {
    pub k: f64,
    #[serde(skip)]
    numbering: BTreeMap<NodeTag, Vec<i32>>,
    #[serde(skip)]
    num_internal: usize,
    #[serde(skip)]
    num_external: usize,
    #[serde(skip)]
    tangent: Matrix,
    #[serde(skip)]
    residual: Vector,
}

impl DiagonalEngine {
    pub fn new(k: f64) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }
}

impl MovableObject for DiagonalEngine {
    fn class_tag(&self) -> ClassTag {
        DIAGONAL_ENGINE_CLASS
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

impl AnalysisEngine for DiagonalEngine {
    fn domain_changed(&mut self, partition: &mut Partition) -> Result<(), AnalysisError> {
        let fixed: BTreeSet<(NodeTag, usize)> = partition
            .sp_constraints()
            .map(|sp| (sp.node_tag(), sp.dof()))
            .collect();

        let mut next = 0;
        let mut number = |tag: NodeTag, ndof: usize| -> Vec<i32> {
            (0..ndof)
                .map(|dof| {
                    if fixed.contains(&(tag, dof)) {
                        -1
                    } else {
                        next += 1;
                        next - 1
                    }
                })
                .collect()
        };

        self.numbering.clear();
        for node in partition.nodes().values() {
            if !partition.is_external(node.tag()) {
                self.numbering.insert(node.tag(), number(node.tag(), node.ndof()));
            }
        }
        let num_internal = next_count(&self.numbering);
        for tag in partition.external_nodes() {
            let ndof = partition.node(*tag).map_or(0, Node::ndof);
            self.numbering.insert(*tag, number(*tag, ndof));
        }
        let total = next_count(&self.numbering);

        self.num_internal = num_internal;
        self.num_external = total - num_internal;
        Ok(())
    }

    fn form_tangent(&mut self, _partition: &mut Partition) -> Result<(), AnalysisError> {
        let n = self.num_external;
        self.tangent = Matrix::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                self.k * (i + 1) as f64
            } else {
                0.0
            }
        });
        Ok(())
    }

    fn form_residual(&mut self, _partition: &mut Partition) -> Result<(), AnalysisError> {
        self.residual = Vector::from_iter((1..=self.num_external).map(|i| i as f64));
        Ok(())
    }

    fn tangent(&self) -> &Matrix {
        &self.tangent
    }

    fn residual(&self) -> &Vector {
        &self.residual
    }

    fn num_external_eqn(&self) -> usize {
        self.num_external
    }

    fn num_internal_eqn(&self) -> usize {
        self.num_internal
    }

    fn equation_numbers(&self, node: NodeTag) -> Option<&[i32]> {
        self.numbering.get(&node).map(Vec::as_slice)
    }

    fn compute_internal_response(
        &mut self,
        partition: &mut Partition,
        external: &Vector,
    ) -> Result<(), AnalysisError> {
        if external.len() != self.num_external {
            return Err(AnalysisError::SizeMismatch {
                expected: self.num_external,
                got: external.len(),
            });
        }
        let boundary: Vec<NodeTag> = partition.external_nodes().to_vec();
        for tag in boundary {
            let Some(equations) = self.numbering.get(&tag) else { continue };
            let disp = Vector::from_iter(equations.iter().map(|eq| {
                usize::try_from(*eq)
                    .ok()
                    .and_then(|eq| eq.checked_sub(self.num_internal))
                    .and_then(|pos| external.get(pos).copied())
                    .unwrap_or(0.0)
            }));
            if let Some(node) = partition.node_mut(tag) {
                node.set_trial_disp(&disp);
            }
        }
        Ok(())
    }
}

fn next_count(numbering: &BTreeMap<NodeTag, Vec<i32>>) -> usize {
    numbering.values().flatten().filter(|eq| **eq >= 0).count()
}

/// Builder that adds a fixed list of nodes; `external` ones go on the boundary.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeListBuilder {
    pub internal: Vec<(NodeTag, usize)>,
    pub external: Vec<(NodeTag, usize)>,
}

impl MovableObject for NodeListBuilder {
    fn class_tag(&self) -> ClassTag {
        NODE_LIST_BUILDER_CLASS
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

impl PartitionBuilder for NodeListBuilder {
    fn build_partition(
        &mut self,
        partition: &mut Partition,
        _num_partitions: i32,
    ) -> Result<(), ModelError> {
        for (tag, ndof) in &self.internal {
            if !partition.add_node(Node::new(*tag, *ndof, vec![0.0])) {
                return Err(ModelError::DuplicateTag(*tag));
            }
        }
        for (tag, ndof) in &self.external {
            if !partition.add_external_node(&Node::new(*tag, *ndof, vec![0.0])) {
                return Err(ModelError::DuplicateTag(*tag));
            }
        }
        Ok(())
    }
}

pub fn registry() -> Rc<Registry> {
    Rc::new(
        Registry::new()
            .with_element::<Spring>()
            .with_analysis::<DiagonalEngine>()
            .with_builder::<NodeListBuilder>(),
    )
}

/// Opcodes of every header sent through a [`RecordingChannel`].
pub type SentLog = Rc<RefCell<Vec<Opcode>>>;

pub fn count(log: &SentLog, opcode: Opcode) -> usize {
    log.borrow().iter().filter(|sent| **sent == opcode).count()
}

/// Memory channel that logs the opcode of every header it sends.
pub struct RecordingChannel {
    inner: MemoryChannel,
    sent: SentLog,
}

#[async_trait(?Send)]
impl Channel for RecordingChannel {
    fn send_frame(&self, frame: Frame) -> ChannelResult<()> {
        if let Frame::Header(header) = &frame {
            if let Ok(opcode) = header.opcode() {
                self.sent.borrow_mut().push(opcode);
            }
        }
        self.inner.send_frame(frame)
    }

    async fn recv_frame(&mut self) -> ChannelResult<Frame> {
        self.inner.recv_frame().await
    }
}

/// Shadow/Actor pair over memory channels.
pub struct Pair {
    pub shadow: Shadow<RecordingChannel>,
    pub actor: JoinHandle<DomainResult<Subdomain>>,
    pub sent: SentLog,
}

/// Spawn an Actor on the current `LocalSet` and pair a Shadow with it.
pub async fn spawn_pair(tag: PartitionTag) -> Pair {
    let (coordinator, worker) = MemoryChannel::pair();
    let broker = registry();
    let actor = tokio::task::spawn_local(
        Actor::new(worker, broker.clone(), ActorConfig::new(format!("partition-{tag}"))).run(),
    );

    let sent = SentLog::default();
    let channel = RecordingChannel {
        inner: coordinator,
        sent: sent.clone(),
    };
    let shadow = Shadow::new(channel, tag, broker).await.expect("pair with actor");
    Pair { shadow, actor, sent }
}
