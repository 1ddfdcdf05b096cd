//! Coordinator-side proxy of a remote subdomain.
//!
//! A [`Shadow`] holds no components. Every call becomes one request on its
//! channel and, when the opcode table says so, waits for the reply. Counts
//! and node/element tags are cached so cheap queries never leave the
//! process; the boundary (external nodes and DOF count) is fetched lazily
//! and at most once per change.

use std::collections::BTreeSet;
use std::rc::Rc;

use async_trait::async_trait;
use tracing::{debug, warn};

use ddfem_core::{
    Channel, ChannelExt, ElementTag, Frame, Header, Matrix, MovableObject, NodeTag, Opcode,
    PartitionTag, Tag, Vector, STATUS_SUCCESS,
};

use crate::analysis::{AnalysisComponent, AnalysisEngine, ComponentKind};
use crate::broker::ObjectBroker;
use crate::error::{DomainError, DomainResult};
use crate::handle::SubdomainHandle;
use crate::model::{
    Element, ElementalLoad, LoadPattern, MpConstraint, NodalLoad, Node, PartitionBuilder,
    RayleighFactors, Recorder, SpConstraint,
};

/// Counts mirrored from the remote partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadowCounts {
    /// Elements.
    pub num_elements: usize,
    /// Nodes, internal plus external.
    pub num_nodes: usize,
    /// External nodes.
    pub num_external_nodes: usize,
    /// Single-point constraints.
    pub num_sps: usize,
    /// Multi-point constraints.
    pub num_mps: usize,
    /// Load patterns.
    pub num_load_patterns: usize,
}

/// Cached boundary of the remote partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BoundaryData {
    /// Must be fetched with `GetRemoteData` before use.
    #[default]
    Stale,
    /// Matches the remote partition.
    Fresh {
        /// External node tags in boundary order.
        external_nodes: Vec<NodeTag>,
        /// Boundary DOF count.
        num_dof: usize,
    },
}

impl BoundaryData {
    /// Whether the cache is valid.
    pub fn is_fresh(&self) -> bool {
        matches!(self, BoundaryData::Fresh { .. })
    }
}

fn component_opcode(kind: ComponentKind) -> Opcode {
    match kind {
        ComponentKind::Algorithm => Opcode::SetAlgorithm,
        ComponentKind::Integrator => Opcode::SetIntegrator,
        ComponentKind::LinearSolver => Opcode::SetLinearSolver,
        ComponentKind::ConvergenceTest => Opcode::SetConvergenceTest,
    }
}

/// Remote handle to one Actor.
pub struct Shadow<C: Channel> {
    channel: C,
    tag: PartitionTag,
    broker: Rc<dyn ObjectBroker>,
    counts: ShadowCounts,
    node_tags: BTreeSet<NodeTag>,
    element_tags: BTreeSet<ElementTag>,
    boundary: BoundaryData,
    tangent: Matrix,
    residual: Vector,
    terminated: bool,
}

impl<C: Channel> Shadow<C> {
    /// Pair with the Actor on `channel` and name its partition `tag`.
    ///
    /// `broker` rebuilds objects the Actor sends back (`get_element`).
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` if the Actor is unreachable,
    /// `DomainError::Rejected` if it refused the tag.
    pub async fn new(
        channel: C,
        tag: PartitionTag,
        broker: Rc<dyn ObjectBroker>,
    ) -> DomainResult<Self> {
        let mut shadow = Self {
            channel,
            tag,
            broker,
            counts: ShadowCounts::default(),
            node_tags: BTreeSet::new(),
            element_tags: BTreeSet::new(),
            boundary: BoundaryData::Stale,
            tangent: Matrix::zeros((0, 0)),
            residual: Vector::zeros(0),
            terminated: false,
        };
        shadow
            .expect_ok(Opcode::SetTag, Header::with_args(Opcode::SetTag, tag, 0, 0))
            .await?;
        debug!(partition = tag, "shadow paired");
        Ok(shadow)
    }

    /// The channel to the Actor.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Cached counts.
    pub fn counts(&self) -> ShadowCounts {
        self.counts
    }

    /// Cached boundary.
    pub fn boundary(&self) -> &BoundaryData {
        &self.boundary
    }

    /// External node count from the cache, without a round trip.
    ///
    /// While the boundary is stale the value may be out of date; a warning
    /// is logged.
    pub fn cached_num_external_nodes(&self) -> usize {
        match &self.boundary {
            BoundaryData::Fresh { external_nodes, .. } => external_nodes.len(),
            BoundaryData::Stale => {
                warn!(partition = self.tag, "boundary data is stale, call remote_data() first");
                self.counts.num_external_nodes
            }
        }
    }

    /// Send `Terminate`, wait for the acknowledgement and release the pair.
    ///
    /// # Errors
    ///
    /// `DomainError::Channel` if the Actor went away first.
    pub async fn terminate(mut self) -> DomainResult<()> {
        self.terminated = true;
        self.channel.send_header(Header::new(Opcode::Terminate))?;
        let status = self.channel.recv_status().await?;
        debug!(partition = self.tag, status, "actor acknowledged terminate");
        Ok(())
    }

    pub(crate) fn send_opcode(&self, opcode: Opcode) -> DomainResult<()> {
        self.channel.send_header(Header::new(opcode))?;
        Ok(())
    }

    pub(crate) async fn recv_ok(&mut self, opcode: Opcode) -> DomainResult<()> {
        let status = self.channel.recv_status().await?;
        if status == STATUS_SUCCESS {
            Ok(())
        } else {
            Err(DomainError::Rejected { opcode })
        }
    }

    pub(crate) async fn recv_peer_status(&mut self) -> DomainResult<i32> {
        Ok(self.channel.recv_status().await?)
    }

    pub(crate) fn send_header(&self, header: Header) -> DomainResult<()> {
        self.channel.send_header(header)?;
        Ok(())
    }

    async fn round_trip(&mut self, header: Header) -> DomainResult<bool> {
        self.channel.send_header(header)?;
        Ok(self.channel.recv_status().await? == STATUS_SUCCESS)
    }

    async fn expect_ok(&mut self, opcode: Opcode, header: Header) -> DomainResult<()> {
        self.channel.send_header(header)?;
        self.recv_ok(opcode).await
    }

    async fn send_with_object<T: MovableObject + ?Sized>(
        &mut self,
        opcode: Opcode,
        object: &T,
        extra: i32,
    ) -> DomainResult<bool> {
        // Encode first so a codec failure leaves nothing half-sent.
        let bytes = object.send_self()?;
        self.channel
            .send_header(Header::object(opcode, object.class_tag(), object.db_tag(), extra))?;
        self.channel.send_frame(Frame::Object {
            class_tag: object.class_tag(),
            db_tag: object.db_tag(),
            bytes,
        })?;
        Ok(self.channel.recv_status().await? == STATUS_SUCCESS)
    }

    async fn refresh_boundary(&mut self) -> DomainResult<(Vec<NodeTag>, usize)> {
        if let BoundaryData::Fresh {
            external_nodes,
            num_dof,
        } = &self.boundary
        {
            return Ok((external_nodes.clone(), *num_dof));
        }

        let opcode = Opcode::GetRemoteData;
        self.channel.send_header(Header::new(opcode))?;
        let sizes = self.channel.recv_ints().await?;
        let (num_external, num_dof) = match sizes.as_slice() {
            [num_external, num_dof] if *num_external >= 0 && *num_dof >= 0 => {
                (*num_external as usize, *num_dof as usize)
            }
            _ => {
                return Err(DomainError::UnexpectedShape {
                    opcode,
                    detail: format!("expected [num_external, num_dof], got {sizes:?}"),
                })
            }
        };
        let external_nodes = if num_external > 0 {
            self.channel.recv_ints().await?
        } else {
            Vec::new()
        };
        if external_nodes.len() != num_external {
            return Err(DomainError::UnexpectedShape {
                opcode,
                detail: format!(
                    "announced {num_external} external nodes,
                    got {}",
                    external_nodes.len()
                ),
            });
        }

        debug!(partition = self.tag, num_external, num_dof, "boundary data refreshed");
        self.counts.num_external_nodes = num_external;
        self.boundary = BoundaryData::Fresh {
            external_nodes: external_nodes.clone(),
            num_dof,
        };
        Ok((external_nodes, num_dof))
    }

    async fn boundary_size(&mut self) -> DomainResult<usize> {
        Ok(self.refresh_boundary().await?.1)
    }
}

impl<C: Channel> Drop for Shadow<C> {
    fn drop(&mut self) {
        if !self.terminated {
            self.terminated = true;
            if let Err(err) = self.channel.send_header(Header::new(Opcode::Terminate)) {
                debug!(partition = self.tag, error = %err, "actor already gone at shadow drop");
            }
        }
    }
}

impl<C: Channel> std::fmt::Debug for Shadow<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shadow")
            .field("tag", &self.tag)
            .field("counts", &self.counts)
            .field("boundary", &self.boundary)
            .field("terminated", &self.terminated)
            .finish()
    }
}

#[async_trait(?Send)]
impl<C: Channel> SubdomainHandle for Shadow<C> {
    fn tag(&self) -> PartitionTag {
        self.tag
    }

    fn num_nodes(&self) -> usize {
        self.counts.num_nodes
    }

    fn num_elements(&self) -> usize {
        self.counts.num_elements
    }

    fn num_sps(&self) -> usize {
        self.counts.num_sps
    }

    fn num_mps(&self) -> usize {
        self.counts.num_mps
    }

    fn num_load_patterns(&self) -> usize {
        self.counts.num_load_patterns
    }

    /// Ship a builder; does not wait for the build to finish.
    ///
    /// The cached counts do not see what the builder adds.
    async fn build(
        &mut self,
        num_partitions: i32,
        builder: Box<dyn PartitionBuilder>,
    ) -> DomainResult<()> {
        let bytes = builder.send_self()?;
        let class_tag = builder.class_tag();
        self.channel
            .send_header(Header::with_args(Opcode::BuildPartition, class_tag, num_partitions, 0))?;
        self.channel.send_frame(Frame::Object {
            class_tag,
            db_tag: builder.db_tag(),
            bytes,
        })?;
        self.boundary = BoundaryData::Stale;
        Ok(())
    }

    async fn remote_data(&mut self) -> DomainResult<(Vec<NodeTag>, usize)> {
        self.refresh_boundary().await
    }

    async fn add_element(&mut self, element: Box<dyn Element>) -> DomainResult<bool> {
        let tag = element.tag();
        let accepted = self.send_with_object(Opcode::AddElement, &*element, 0).await?;
        if accepted {
            self.counts.num_elements += 1;
            self.element_tags.insert(tag);
        }
        Ok(accepted)
    }

    async fn add_node(&mut self, node: Node) -> DomainResult<bool> {
        let accepted = self.send_with_object(Opcode::AddNode, &node, 0).await?;
        if accepted {
            self.counts.num_nodes += 1;
            self.node_tags.insert(node.tag());
        }
        Ok(accepted)
    }

    async fn add_external_node(&mut self, node: Node) -> DomainResult<bool> {
        let accepted = self.send_with_object(Opcode::AddExternalNode, &node, 0).await?;
        if accepted {
            self.counts.num_nodes += 1;
            self.counts.num_external_nodes += 1;
            self.node_tags.insert(node.tag());
            if let BoundaryData::Fresh {
                external_nodes,
                num_dof,
            } = &mut self.boundary
            {
                external_nodes.push(node.tag());
                *num_dof += node.ndof();
            }
        }
        Ok(accepted)
    }

    async fn add_sp_constraint(&mut self, sp: SpConstraint) -> DomainResult<bool> {
        let accepted = self.send_with_object(Opcode::AddSpConstraint, &sp, 0).await?;
        if accepted {
            self.counts.num_sps += 1;
        }
        Ok(accepted)
    }

    async fn add_mp_constraint(&mut self, mp: MpConstraint) -> DomainResult<bool> {
        let accepted = self.send_with_object(Opcode::AddMpConstraint, &mp, 0).await?;
        if accepted {
            self.counts.num_mps += 1;
        }
        Ok(accepted)
    }

    async fn add_load_pattern(&mut self, pattern: LoadPattern) -> DomainResult<bool> {
        let accepted = self.send_with_object(Opcode::AddLoadPattern, &pattern, 0).await?;
        if accepted {
            self.counts.num_load_patterns += 1;
        }
        Ok(accepted)
    }

    async fn add_nodal_load(&mut self, load: NodalLoad, pattern: Tag) -> DomainResult<bool> {
        self.send_with_object(Opcode::AddNodalLoad, &load, pattern).await
    }

    async fn add_elemental_load(
        &mut self,
        load: ElementalLoad,
        pattern: Tag,
    ) -> DomainResult<bool> {
        self.send_with_object(Opcode::AddElementalLoad, &load, pattern).await
    }

    async fn add_sp_constraint_to_pattern(
        &mut self,
        sp: SpConstraint,
        pattern: Tag,
    ) -> DomainResult<bool> {
        self.send_with_object(Opcode::AddSpConstraintToPattern, &sp, pattern)
            .await
    }

    async fn remove_element(&mut self, tag: ElementTag) -> DomainResult<bool> {
        let removed = self
            .round_trip(Header::with_args(Opcode::RemoveElement, tag, 0, 0))
            .await?;
        if removed {
            self.counts.num_elements = self.counts.num_elements.saturating_sub(1);
            self.element_tags.remove(&tag);
        }
        Ok(removed)
    }

    async fn remove_node(&mut self, tag: NodeTag) -> DomainResult<bool> {
        let removed = self
            .round_trip(Header::with_args(Opcode::RemoveNode, tag, 0, 0))
            .await?;
        if removed {
            self.counts.num_nodes = self.counts.num_nodes.saturating_sub(1);
            self.node_tags.remove(&tag);
            // A stale boundary cannot tell whether the node was external;
            // the count is corrected by the next refresh.
            if let BoundaryData::Fresh { external_nodes, .. } = &self.boundary {
                if external_nodes.contains(&tag) {
                    self.counts.num_external_nodes =
                        self.counts.num_external_nodes.saturating_sub(1);
                    self.boundary = BoundaryData::Stale;
                }
            }
        }
        Ok(removed)
    }

    async fn remove_sp_constraint(&mut self, tag: Tag) -> DomainResult<bool> {
        let removed = self
            .round_trip(Header::with_args(Opcode::RemoveSpConstraint, tag, 0, 0))
            .await?;
        if removed {
            self.counts.num_sps = self.counts.num_sps.saturating_sub(1);
        }
        Ok(removed)
    }

    async fn remove_mp_constraint(&mut self, tag: Tag) -> DomainResult<bool> {
        let removed = self
            .round_trip(Header::with_args(Opcode::RemoveMpConstraint, tag, 0, 0))
            .await?;
        if removed {
            self.counts.num_mps = self.counts.num_mps.saturating_sub(1);
        }
        Ok(removed)
    }

    async fn remove_load_pattern(&mut self, tag: Tag) -> DomainResult<bool> {
        let removed = self
            .round_trip(Header::with_args(Opcode::RemoveLoadPattern, tag, 0, 0))
            .await?;
        if removed {
            self.counts.num_load_patterns = self.counts.num_load_patterns.saturating_sub(1);
        }
        Ok(removed)
    }

    async fn remove_nodal_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool> {
        self.round_trip(Header::with_args(Opcode::RemoveNodalLoad, tag, pattern, 0))
            .await
    }

    async fn remove_elemental_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool> {
        self.round_trip(Header::with_args(Opcode::RemoveElementalLoad, tag, pattern, 0))
            .await
    }

    async fn remove_sp_constraint_from_pattern(
        &mut self,
        tag: Tag,
        pattern: Tag,
    ) -> DomainResult<bool> {
        self.round_trip(Header::with_args(Opcode::RemoveSpConstraintFromPattern, tag, pattern, 0))
            .await
    }

    /// Answered from the cache.
    async fn has_node(&mut self, tag: NodeTag) -> DomainResult<bool> {
        Ok(self.node_tags.contains(&tag))
    }

    /// Answered from the cache.
    async fn has_element(&mut self, tag: ElementTag) -> DomainResult<bool> {
        Ok(self.element_tags.contains(&tag))
    }

    async fn get_element(&mut self, tag: ElementTag) -> DomainResult<Option<Box<dyn Element>>> {
        if !self
            .round_trip(Header::with_args(Opcode::GetElement, tag, 0, 0))
            .await?
        {
            return Ok(None);
        }
        let (class_tag, db_tag, bytes) = self.channel.recv_object().await?;
        let mut element = self
            .broker
            .new_element(class_tag)
            .ok_or(DomainError::NoInstance { class_tag })?;
        element.recv_self(&bytes)?;
        element.set_db_tag(db_tag);
        Ok(Some(element))
    }

    async fn get_node(&mut self, tag: NodeTag) -> DomainResult<Option<Node>> {
        if !self
            .round_trip(Header::with_args(Opcode::GetNode, tag, 0, 0))
            .await?
        {
            return Ok(None);
        }
        let (class_tag, db_tag, bytes) = self.channel.recv_object().await?;
        let mut node = self
            .broker
            .new_node(class_tag)
            .ok_or(DomainError::NoInstance { class_tag })?;
        node.recv_self(&bytes)?;
        node.set_db_tag(db_tag);
        Ok(Some(node))
    }

    async fn node_disp(&mut self, tag: NodeTag) -> DomainResult<Option<Vector>> {
        if !self
            .round_trip(Header::with_args(Opcode::GetNodeDisp, tag, 0, 0))
            .await?
        {
            return Ok(None);
        }
        Ok(Some(self.channel.recv_vector().await?))
    }

    async fn apply_load(&mut self, time: f64) -> DomainResult<()> {
        self.channel.send_header(Header::new(Opcode::ApplyLoad))?;
        self.channel.send_float(time)?;
        self.recv_ok(Opcode::ApplyLoad).await
    }

    async fn set_committed_time(&mut self, time: f64) -> DomainResult<()> {
        self.channel.send_header(Header::new(Opcode::SetCommittedTime))?;
        self.channel.send_float(time)?;
        self.recv_ok(Opcode::SetCommittedTime).await
    }

    async fn current_time(&mut self) -> DomainResult<f64> {
        self.channel.send_header(Header::new(Opcode::GetCurrentTime))?;
        Ok(self.channel.recv_float().await?)
    }

    async fn set_load_constant(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::SetLoadConstant, Header::new(Opcode::SetLoadConstant))
            .await
    }

    async fn update(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::Update, Header::new(Opcode::Update)).await
    }

    async fn commit(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::Commit, Header::new(Opcode::Commit)).await
    }

    async fn revert_to_last_commit(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::RevertToLastCommit, Header::new(Opcode::RevertToLastCommit))
            .await
    }

    async fn revert_to_start(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::RevertToStart, Header::new(Opcode::RevertToStart))
            .await
    }

    async fn set_mass(&mut self, node: NodeTag, mass: Matrix) -> DomainResult<()> {
        self.channel
            .send_header(Header::with_args(Opcode::SetMass, node, 0, 0))?;
        self.channel.send_matrix(mass)?;
        self.recv_ok(Opcode::SetMass).await
    }

    async fn set_rayleigh_factors(&mut self, factors: RayleighFactors) -> DomainResult<()> {
        self.channel.send_header(Header::new(Opcode::SetRayleighFactors))?;
        self.channel.send_vector(factors.to_vector())?;
        self.recv_ok(Opcode::SetRayleighFactors).await
    }

    /// One round trip to this Actor only; use a
    /// [`ShadowGroup`](crate::ShadowGroup) to drive every partition.
    async fn compute_tang(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::ComputeTang, Header::new(Opcode::ComputeTang))
            .await
    }

    /// One round trip to this Actor only.
    async fn compute_residual(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::ComputeResidual, Header::new(Opcode::ComputeResidual))
            .await
    }

    async fn tang(&mut self) -> DomainResult<Matrix> {
        let n = self.boundary_size().await?;
        if self.tangent.dim() != (n, n) {
            self.tangent = Matrix::zeros((n, n));
        }
        self.channel.send_header(Header::new(Opcode::GetTang))?;
        let tangent = self.channel.recv_matrix().await?;
        if tangent.dim() != (n, n) {
            return Err(DomainError::UnexpectedShape {
                opcode: Opcode::GetTang,
                detail: format!("expected {n}x{n}, got {:?}", tangent.dim()),
            });
        }
        self.tangent.assign(&tangent);
        Ok(tangent)
    }

    async fn resisting_force(&mut self) -> DomainResult<Vector> {
        let n = self.boundary_size().await?;
        if self.residual.len() != n {
            self.residual = Vector::zeros(n);
        }
        self.channel.send_header(Header::new(Opcode::GetResistingForce))?;
        let residual = self.channel.recv_vector().await?;
        if residual.len() != n {
            return Err(DomainError::UnexpectedShape {
                opcode: Opcode::GetResistingForce,
                detail: format!("expected {n} entries, got {}", residual.len()),
            });
        }
        self.residual.assign(&residual);
        Ok(residual)
    }

    async fn compute_nodal_response(&mut self, boundary: &Vector) -> DomainResult<()> {
        self.channel.send_header(Header::new(Opcode::ComputeNodalResponse))?;
        self.channel.send_vector(boundary.clone())?;
        self.recv_ok(Opcode::ComputeNodalResponse).await
    }

    /// The Actor logs its partition; nothing comes back.
    async fn print(&mut self, flag: i32) -> DomainResult<()> {
        self.channel
            .send_header(Header::with_args(Opcode::Print, flag, 0, 0))?;
        Ok(())
    }

    async fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> DomainResult<bool> {
        self.send_with_object(Opcode::AddRecorder, &*recorder, 0).await
    }

    async fn remove_recorder(&mut self, tag: Tag) -> DomainResult<bool> {
        self.round_trip(Header::with_args(Opcode::RemoveRecorder, tag, 0, 0))
            .await
    }

    async fn remove_recorders(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::RemoveRecorders, Header::new(Opcode::RemoveRecorders))
            .await
    }

    async fn set_analysis(&mut self, engine: Box<dyn AnalysisEngine>) -> DomainResult<()> {
        if self.send_with_object(Opcode::SetAnalysis, &*engine, 0).await? {
            Ok(())
        } else {
            Err(DomainError::Rejected {
                opcode: Opcode::SetAnalysis,
            })
        }
    }

    async fn set_component(
        &mut self,
        kind: ComponentKind,
        component: Box<dyn AnalysisComponent>,
    ) -> DomainResult<()> {
        if component.kind() != kind {
            return Err(DomainError::WrongComponent {
                expected: kind,
                got: component.kind(),
            });
        }
        let opcode = component_opcode(kind);
        if self.send_with_object(opcode, &*component, 0).await? {
            Ok(())
        } else {
            Err(DomainError::Rejected { opcode })
        }
    }

    async fn domain_changed(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::DomainChanged, Header::new(Opcode::DomainChanged))
            .await
    }

    async fn clear_analysis(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::ClearAnalysis, Header::new(Opcode::ClearAnalysis))
            .await
    }

    async fn wipe_analysis(&mut self) -> DomainResult<()> {
        self.expect_ok(Opcode::WipeAnalysis, Header::new(Opcode::WipeAnalysis))
            .await
    }

    async fn new_step(&mut self, dt: f64) -> DomainResult<()> {
        self.channel.send_header(Header::new(Opcode::NewStep))?;
        self.channel.send_float(dt)?;
        self.recv_ok(Opcode::NewStep).await
    }

    async fn barrier_check(&mut self, my_result: i32) -> DomainResult<i32> {
        Shadow::barrier_check(self, my_result).await
    }
}
