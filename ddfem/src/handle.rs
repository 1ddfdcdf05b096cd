//! The contract shared by a local [`Subdomain`] and a remote [`Shadow`].
//!
//! A coordinator always knows which kind of handle it holds; code that
//! should work with both is generic over `H: SubdomainHandle`.
//!
//! Add and remove operations answer `Ok(true)` when accepted, `Ok(false)`
//! when the partition rejected them (tag collision, missing target,
//! undecodable object) and `Err` when the operation could not be carried
//! out at all. State and compute operations map a rejection to
//! `Err(DomainError::Rejected)` on a Shadow and to the underlying error on
//! a local subdomain.
//!
//! [`Shadow`]: crate::Shadow

use async_trait::async_trait;

use ddfem_core::{ElementTag, Matrix, NodeTag, PartitionTag, Tag, Vector};

use crate::analysis::{AnalysisComponent, AnalysisEngine, ComponentKind};
use crate::error::DomainResult;
use crate::model::{
    Element, ElementalLoad, LoadPattern, MpConstraint, NodalLoad, Node, PartitionBuilder,
    RayleighFactors, Recorder, SpConstraint,
};
use crate::Subdomain;

/// Operations on one subdomain, wherever it lives.
#[async_trait(?Send)]
pub trait SubdomainHandle {
    /// Partition tag.
    fn tag(&self) -> PartitionTag;

    /// Number of nodes, internal plus external.
    fn num_nodes(&self) -> usize;

    /// Number of elements.
    fn num_elements(&self) -> usize;

    /// Number of single-point constraints.
    fn num_sps(&self) -> usize;

    /// Number of multi-point constraints.
    fn num_mps(&self) -> usize;

    /// Number of load patterns.
    fn num_load_patterns(&self) -> usize;

    /// Populate the partition with a builder.
    async fn build(
        &mut self,
        num_partitions: i32,
        builder: Box<dyn PartitionBuilder>,
    ) -> DomainResult<()>;

    /// External node tags and boundary DOF count.
    async fn remote_data(&mut self) -> DomainResult<(Vec<NodeTag>, usize)>;

    /// External node tags in boundary order.
    async fn external_nodes(&mut self) -> DomainResult<Vec<NodeTag>> {
        Ok(self.remote_data().await?.0)
    }

    /// Number of external nodes.
    async fn num_external_nodes(&mut self) -> DomainResult<usize> {
        Ok(self.remote_data().await?.0.len())
    }

    /// Number of boundary DOFs.
    async fn num_dof(&mut self) -> DomainResult<usize> {
        Ok(self.remote_data().await?.1)
    }

    /// Add an element.
    async fn add_element(&mut self, element: Box<dyn Element>) -> DomainResult<bool>;

    /// Add an internal node.
    async fn add_node(&mut self, node: Node) -> DomainResult<bool>;

    /// Add a boundary node.
    async fn add_external_node(&mut self, node: Node) -> DomainResult<bool>;

    /// Add a single-point constraint.
    async fn add_sp_constraint(&mut self, sp: SpConstraint) -> DomainResult<bool>;

    /// Add a multi-point constraint.
    async fn add_mp_constraint(&mut self, mp: MpConstraint) -> DomainResult<bool>;

    /// Add a load pattern.
    async fn add_load_pattern(&mut self, pattern: LoadPattern) -> DomainResult<bool>;

    /// Add a nodal load to `pattern`.
    async fn add_nodal_load(&mut self, load: NodalLoad, pattern: Tag) -> DomainResult<bool>;

    /// Add an elemental load to `pattern`.
    async fn add_elemental_load(&mut self, load: ElementalLoad, pattern: Tag) -> DomainResult<bool>;

    /// Add a prescribed value to `pattern`.
    async fn add_sp_constraint_to_pattern(
        &mut self,
        sp: SpConstraint,
        pattern: Tag,
    ) -> DomainResult<bool>;

    /// Remove an element.
    async fn remove_element(&mut self, tag: ElementTag) -> DomainResult<bool>;

    /// Remove a node.
    async fn remove_node(&mut self, tag: NodeTag) -> DomainResult<bool>;

    /// Remove a single-point constraint.
    async fn remove_sp_constraint(&mut self, tag: Tag) -> DomainResult<bool>;

    /// Remove a multi-point constraint.
    async fn remove_mp_constraint(&mut self, tag: Tag) -> DomainResult<bool>;

    /// Remove a load pattern.
    async fn remove_load_pattern(&mut self, tag: Tag) -> DomainResult<bool>;

    /// Remove a nodal load from `pattern`.
    async fn remove_nodal_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool>;

    /// Remove an elemental load from `pattern`.
    async fn remove_elemental_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool>;

    /// Remove a prescribed value from `pattern`.
    async fn remove_sp_constraint_from_pattern(
        &mut self,
        tag: Tag,
        pattern: Tag,
    ) -> DomainResult<bool>;

    /// Whether a node carries `tag`.
    async fn has_node(&mut self, tag: NodeTag) -> DomainResult<bool>;

    /// Whether an element carries `tag`.
    async fn has_element(&mut self, tag: ElementTag) -> DomainResult<bool>;

    /// Copy of an element.
    async fn get_element(&mut self, tag: ElementTag) -> DomainResult<Option<Box<dyn Element>>>;

    /// Copy of a node.
    async fn get_node(&mut self, tag: NodeTag) -> DomainResult<Option<Node>>;

    /// Trial displacement of a node.
    async fn node_disp(&mut self, tag: NodeTag) -> DomainResult<Option<Vector>>;

    /// Apply the load patterns at `time`.
    async fn apply_load(&mut self, time: f64) -> DomainResult<()>;

    /// Set committed and current time.
    async fn set_committed_time(&mut self, time: f64) -> DomainResult<()>;

    /// Current pseudo-time.
    async fn current_time(&mut self) -> DomainResult<f64>;

    /// Freeze the load patterns.
    async fn set_load_constant(&mut self) -> DomainResult<()>;

    /// Update elements from nodal trial response.
    async fn update(&mut self) -> DomainResult<()>;

    /// Commit and record.
    async fn commit(&mut self) -> DomainResult<()>;

    /// Discard trial state.
    async fn revert_to_last_commit(&mut self) -> DomainResult<()>;

    /// Return to the initial state.
    async fn revert_to_start(&mut self) -> DomainResult<()>;

    /// Assign a nodal mass.
    async fn set_mass(&mut self, node: NodeTag, mass: Matrix) -> DomainResult<()>;

    /// Store and distribute Rayleigh factors.
    async fn set_rayleigh_factors(&mut self, factors: RayleighFactors) -> DomainResult<()>;

    /// Form the boundary-ordered tangent.
    async fn compute_tang(&mut self) -> DomainResult<()>;

    /// Form the boundary-ordered residual.
    async fn compute_residual(&mut self) -> DomainResult<()>;

    /// Boundary-ordered tangent, `num_dof × num_dof`.
    async fn tang(&mut self) -> DomainResult<Matrix>;

    /// Boundary-ordered resisting force, `num_dof` long.
    async fn resisting_force(&mut self) -> DomainResult<Vector>;

    /// Push the boundary response and recover the internal one.
    async fn compute_nodal_response(&mut self, boundary: &Vector) -> DomainResult<()>;

    /// Log a summary of the partition.
    async fn print(&mut self, flag: i32) -> DomainResult<()>;

    /// Add a recorder.
    async fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> DomainResult<bool>;

    /// Remove a recorder.
    async fn remove_recorder(&mut self, tag: Tag) -> DomainResult<bool>;

    /// Remove every recorder.
    async fn remove_recorders(&mut self) -> DomainResult<()>;

    /// Attach an analysis engine.
    async fn set_analysis(&mut self, engine: Box<dyn AnalysisEngine>) -> DomainResult<()>;

    /// Install an analysis component into the `kind` slot.
    async fn set_component(
        &mut self,
        kind: ComponentKind,
        component: Box<dyn AnalysisComponent>,
    ) -> DomainResult<()>;

    /// Install a solution algorithm.
    async fn set_algorithm(&mut self, component: Box<dyn AnalysisComponent>) -> DomainResult<()> {
        self.set_component(ComponentKind::Algorithm, component).await
    }

    /// Install an integrator.
    async fn set_integrator(&mut self, component: Box<dyn AnalysisComponent>) -> DomainResult<()> {
        self.set_component(ComponentKind::Integrator, component).await
    }

    /// Install a linear solver.
    async fn set_linear_solver(
        &mut self,
        component: Box<dyn AnalysisComponent>,
    ) -> DomainResult<()> {
        self.set_component(ComponentKind::LinearSolver, component).await
    }

    /// Install a convergence test.
    async fn set_convergence_test(
        &mut self,
        component: Box<dyn AnalysisComponent>,
    ) -> DomainResult<()> {
        self.set_component(ComponentKind::ConvergenceTest, component).await
    }

    /// Renumber after structural changes.
    async fn domain_changed(&mut self) -> DomainResult<()>;

    /// Drop the engine's derived state.
    async fn clear_analysis(&mut self) -> DomainResult<()>;

    /// Detach the engine.
    async fn wipe_analysis(&mut self) -> DomainResult<()>;

    /// Start a step of size `dt`.
    async fn new_step(&mut self, dt: f64) -> DomainResult<()>;

    /// Exchange `my_result` with the peer and return the peer's status.
    async fn barrier_check(&mut self, my_result: i32) -> DomainResult<i32>;
}

#[async_trait(?Send)]
impl SubdomainHandle for Subdomain {
    fn tag(&self) -> PartitionTag {
        Subdomain::tag(self)
    }

    fn num_nodes(&self) -> usize {
        self.partition().num_nodes()
    }

    fn num_elements(&self) -> usize {
        self.partition().num_elements()
    }

    fn num_sps(&self) -> usize {
        self.partition().num_sps()
    }

    fn num_mps(&self) -> usize {
        self.partition().num_mps()
    }

    fn num_load_patterns(&self) -> usize {
        self.partition().num_load_patterns()
    }

    async fn build(
        &mut self,
        num_partitions: i32,
        builder: Box<dyn PartitionBuilder>,
    ) -> DomainResult<()> {
        Subdomain::build(self, num_partitions, builder)
    }

    async fn remote_data(&mut self) -> DomainResult<(Vec<NodeTag>, usize)> {
        Ok(Subdomain::remote_data(self))
    }

    async fn add_element(&mut self, element: Box<dyn Element>) -> DomainResult<bool> {
        Ok(Subdomain::add_element(self, element))
    }

    async fn add_node(&mut self, node: Node) -> DomainResult<bool> {
        Ok(Subdomain::add_node(self, node))
    }

    async fn add_external_node(&mut self, node: Node) -> DomainResult<bool> {
        Ok(Subdomain::add_external_node(self, &node))
    }

    async fn add_sp_constraint(&mut self, sp: SpConstraint) -> DomainResult<bool> {
        Ok(Subdomain::add_sp_constraint(self, sp))
    }

    async fn add_mp_constraint(&mut self, mp: MpConstraint) -> DomainResult<bool> {
        Ok(Subdomain::add_mp_constraint(self, mp))
    }

    async fn add_load_pattern(&mut self, pattern: LoadPattern) -> DomainResult<bool> {
        Ok(Subdomain::add_load_pattern(self, pattern))
    }

    async fn add_nodal_load(&mut self, load: NodalLoad, pattern: Tag) -> DomainResult<bool> {
        Ok(Subdomain::add_nodal_load(self, load, pattern))
    }

    async fn add_elemental_load(
        &mut self,
        load: ElementalLoad,
        pattern: Tag,
    ) -> DomainResult<bool> {
        Ok(Subdomain::add_elemental_load(self, load, pattern))
    }

    async fn add_sp_constraint_to_pattern(
        &mut self,
        sp: SpConstraint,
        pattern: Tag,
    ) -> DomainResult<bool> {
        Ok(Subdomain::add_sp_constraint_to_pattern(self, sp, pattern))
    }

    async fn remove_element(&mut self, tag: ElementTag) -> DomainResult<bool> {
        Ok(Subdomain::remove_element(self, tag))
    }

    async fn remove_node(&mut self, tag: NodeTag) -> DomainResult<bool> {
        Ok(Subdomain::remove_node(self, tag))
    }

    async fn remove_sp_constraint(&mut self, tag: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_sp_constraint(self, tag))
    }

    async fn remove_mp_constraint(&mut self, tag: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_mp_constraint(self, tag))
    }

    async fn remove_load_pattern(&mut self, tag: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_load_pattern(self, tag))
    }

    async fn remove_nodal_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_nodal_load(self, tag, pattern))
    }

    async fn remove_elemental_load(&mut self, tag: Tag, pattern: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_elemental_load(self, tag, pattern))
    }

    async fn remove_sp_constraint_from_pattern(
        &mut self,
        tag: Tag,
        pattern: Tag,
    ) -> DomainResult<bool> {
        Ok(Subdomain::remove_sp_constraint_from_pattern(self, tag, pattern))
    }

    async fn has_node(&mut self, tag: NodeTag) -> DomainResult<bool> {
        Ok(Subdomain::has_node(self, tag))
    }

    async fn has_element(&mut self, tag: ElementTag) -> DomainResult<bool> {
        Ok(Subdomain::has_element(self, tag))
    }

    async fn get_element(&mut self, tag: ElementTag) -> DomainResult<Option<Box<dyn Element>>> {
        Ok(self.element(tag).map(|e| e.clone_box()))
    }

    async fn get_node(&mut self, tag: NodeTag) -> DomainResult<Option<Node>> {
        Ok(self.node(tag).cloned())
    }

    async fn node_disp(&mut self, tag: NodeTag) -> DomainResult<Option<Vector>> {
        Ok(Subdomain::node_disp(self, tag).cloned())
    }

    async fn apply_load(&mut self, time: f64) -> DomainResult<()> {
        Subdomain::apply_load(self, time)
    }

    async fn set_committed_time(&mut self, time: f64) -> DomainResult<()> {
        Subdomain::set_committed_time(self, time);
        Ok(())
    }

    async fn current_time(&mut self) -> DomainResult<f64> {
        Ok(Subdomain::current_time(self))
    }

    async fn set_load_constant(&mut self) -> DomainResult<()> {
        Subdomain::set_load_constant(self);
        Ok(())
    }

    async fn update(&mut self) -> DomainResult<()> {
        Subdomain::update(self)
    }

    async fn commit(&mut self) -> DomainResult<()> {
        Subdomain::commit(self)
    }

    async fn revert_to_last_commit(&mut self) -> DomainResult<()> {
        Subdomain::revert_to_last_commit(self)
    }

    async fn revert_to_start(&mut self) -> DomainResult<()> {
        Subdomain::revert_to_start(self)
    }

    async fn set_mass(&mut self, node: NodeTag, mass: Matrix) -> DomainResult<()> {
        Subdomain::set_mass(self, node, mass)
    }

    async fn set_rayleigh_factors(&mut self, factors: RayleighFactors) -> DomainResult<()> {
        Subdomain::set_rayleigh_factors(self, factors);
        Ok(())
    }

    async fn compute_tang(&mut self) -> DomainResult<()> {
        Subdomain::compute_tang(self)
    }

    async fn compute_residual(&mut self) -> DomainResult<()> {
        Subdomain::compute_residual(self)
    }

    async fn tang(&mut self) -> DomainResult<Matrix> {
        Subdomain::tang(self)
    }

    async fn resisting_force(&mut self) -> DomainResult<Vector> {
        Subdomain::resisting_force(self)
    }

    async fn compute_nodal_response(&mut self, boundary: &Vector) -> DomainResult<()> {
        Subdomain::compute_nodal_response(self, boundary)
    }

    async fn print(&mut self, flag: i32) -> DomainResult<()> {
        tracing::info!(partition = Subdomain::tag(self), flag, "{}", self);
        Ok(())
    }

    async fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> DomainResult<bool> {
        Ok(Subdomain::add_recorder(self, recorder))
    }

    async fn remove_recorder(&mut self, tag: Tag) -> DomainResult<bool> {
        Ok(Subdomain::remove_recorder(self, tag))
    }

    async fn remove_recorders(&mut self) -> DomainResult<()> {
        Subdomain::remove_recorders(self);
        Ok(())
    }

    async fn set_analysis(&mut self, engine: Box<dyn AnalysisEngine>) -> DomainResult<()> {
        Subdomain::set_analysis(self, engine);
        Ok(())
    }

    async fn set_component(
        &mut self,
        kind: ComponentKind,
        component: Box<dyn AnalysisComponent>,
    ) -> DomainResult<()> {
        Subdomain::set_component(self, kind, component)
    }

    async fn domain_changed(&mut self) -> DomainResult<()> {
        Subdomain::domain_changed(self)
    }

    async fn clear_analysis(&mut self) -> DomainResult<()> {
        Subdomain::clear_analysis(self);
        Ok(())
    }

    async fn wipe_analysis(&mut self) -> DomainResult<()> {
        Subdomain::wipe_analysis(self);
        Ok(())
    }

    async fn new_step(&mut self, dt: f64) -> DomainResult<()> {
        Subdomain::new_step(self, dt)
    }

    async fn barrier_check(&mut self, my_result: i32) -> DomainResult<i32> {
        Ok(Subdomain::barrier_check(self, my_result))
    }
}
