//! Local, authoritative subdomain: a partition, its analysis engine and the
//! condensation bookkeeping between them.

use std::fmt;

use tracing::{debug, warn};

use ddfem_core::{ElementTag, Matrix, NodeTag, PartitionTag, Tag, Vector};

use crate::analysis::{AnalysisComponent, AnalysisEngine, ComponentKind};
use crate::dof_map::DofMap;
use crate::error::{DomainError, DomainResult};
use crate::model::{
    Element, ElementalLoad, LoadPattern, ModelError, MpConstraint, NodalLoad, Node,
    PartitionBuilder, RayleighFactors, Recorder, SpConstraint,
};
use crate::Partition;

/// A partition plus the engine that condenses it.
///
/// Every structural change marks the DOF map stale and tells the engine to
/// renumber before the next map build.
#[derive(Debug, Default)]
pub struct Subdomain {
    partition: Partition,
    engine: Option<Box<dyn AnalysisEngine>>,
    engine_synced: bool,
    dof_map: DofMap,
    mapped_tangent: Matrix,
    mapped_residual: Vector,
}

impl Subdomain {
    /// Empty subdomain without an engine.
    pub fn new(tag: PartitionTag) -> Self {
        Self {
            partition: Partition::new(tag),
            ..Self::default()
        }
    }

    /// Partition tag.
    pub fn tag(&self) -> PartitionTag {
        self.partition.tag()
    }

    /// Retag the subdomain.
    pub fn set_tag(&mut self, tag: PartitionTag) {
        self.partition.set_tag(tag);
    }

    /// The underlying partition.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Attached analysis engine.
    pub fn engine(&self) -> Option<&dyn AnalysisEngine> {
        self.engine.as_deref()
    }

    /// Current state of the DOF map.
    pub fn dof_map(&self) -> &DofMap {
        &self.dof_map
    }

    fn structure_changed(&mut self) {
        self.dof_map.invalidate();
        self.engine_synced = false;
    }

    fn changed_if(&mut self, accepted: bool) -> bool {
        if accepted {
            self.structure_changed();
        }
        accepted
    }

    fn no_analysis(&self, what: &str) -> DomainError {
        warn!(partition = self.tag(), operation = what, "no analysis engine attached");
        DomainError::NoAnalysis
    }

    // -- structure --------------------------------------------------------

    /// Add an element.
    pub fn add_element(&mut self, element: Box<dyn Element>) -> bool {
        let accepted = self.partition.add_element(element);
        self.changed_if(accepted)
    }

    /// Add an internal node.
    pub fn add_node(&mut self, node: Node) -> bool {
        let accepted = self.partition.add_node(node);
        self.changed_if(accepted)
    }

    /// Add a boundary node as a ghost copy.
    pub fn add_external_node(&mut self, node: &Node) -> bool {
        let accepted = self.partition.add_external_node(node);
        self.changed_if(accepted)
    }

    /// Add a single-point constraint.
    pub fn add_sp_constraint(&mut self, sp: SpConstraint) -> bool {
        let accepted = self.partition.add_sp_constraint(sp);
        self.changed_if(accepted)
    }

    /// Add a multi-point constraint.
    pub fn add_mp_constraint(&mut self, mp: MpConstraint) -> bool {
        let accepted = self.partition.add_mp_constraint(mp);
        self.changed_if(accepted)
    }

    /// Add a load pattern.
    pub fn add_load_pattern(&mut self, pattern: LoadPattern) -> bool {
        let accepted = self.partition.add_load_pattern(pattern);
        self.changed_if(accepted)
    }

    /// Add a nodal load to a pattern.
    pub fn add_nodal_load(&mut self, load: NodalLoad, pattern: Tag) -> bool {
        let accepted = self.partition.add_nodal_load(load, pattern);
        self.changed_if(accepted)
    }

    /// Add an elemental load to a pattern.
    pub fn add_elemental_load(&mut self, load: ElementalLoad, pattern: Tag) -> bool {
        let accepted = self.partition.add_elemental_load(load, pattern);
        self.changed_if(accepted)
    }

    /// Add a prescribed value to a pattern.
    pub fn add_sp_constraint_to_pattern(&mut self, sp: SpConstraint, pattern: Tag) -> bool {
        let accepted = self.partition.add_sp_constraint_to_pattern(sp, pattern);
        self.changed_if(accepted)
    }

    /// Remove an element.
    pub fn remove_element(&mut self, tag: ElementTag) -> bool {
        let removed = self.partition.remove_element(tag).is_some();
        self.changed_if(removed)
    }

    /// Remove a node; an external node also leaves the boundary.
    pub fn remove_node(&mut self, tag: NodeTag) -> bool {
        let removed = self.partition.remove_node(tag).is_some();
        self.changed_if(removed)
    }

    /// Remove a single-point constraint.
    pub fn remove_sp_constraint(&mut self, tag: Tag) -> bool {
        let removed = self.partition.remove_sp_constraint(tag).is_some();
        self.changed_if(removed)
    }

    /// Remove a multi-point constraint.
    pub fn remove_mp_constraint(&mut self, tag: Tag) -> bool {
        let removed = self.partition.remove_mp_constraint(tag).is_some();
        self.changed_if(removed)
    }

    /// Remove a load pattern.
    pub fn remove_load_pattern(&mut self, tag: Tag) -> bool {
        let removed = self.partition.remove_load_pattern(tag).is_some();
        self.changed_if(removed)
    }

    /// Remove a nodal load from a pattern.
    pub fn remove_nodal_load(&mut self, tag: Tag, pattern: Tag) -> bool {
        let removed = self.partition.remove_nodal_load(tag, pattern).is_some();
        self.changed_if(removed)
    }

    /// Remove an elemental load from a pattern.
    pub fn remove_elemental_load(&mut self, tag: Tag, pattern: Tag) -> bool {
        let removed = self.partition.remove_elemental_load(tag, pattern).is_some();
        self.changed_if(removed)
    }

    /// Remove a prescribed value from a pattern.
    pub fn remove_sp_constraint_from_pattern(&mut self, tag: Tag, pattern: Tag) -> bool {
        let removed = self.partition.remove_sp_constraint_from_pattern(tag, pattern).is_some();
        self.changed_if(removed)
    }

    /// Whether a node carries `tag`.
    pub fn has_node(&self, tag: NodeTag) -> bool {
        self.partition.has_node(tag)
    }

    /// Whether an element carries `tag`.
    pub fn has_element(&self, tag: ElementTag) -> bool {
        self.partition.has_element(tag)
    }

    /// Element by tag.
    pub fn element(&self, tag: ElementTag) -> Option<&dyn Element> {
        self.partition.element(tag)
    }

    /// Node by tag.
    pub fn node(&self, tag: NodeTag) -> Option<&Node> {
        self.partition.node(tag)
    }

    /// Trial displacement of a node.
    pub fn node_disp(&self, tag: NodeTag) -> Option<&Vector> {
        self.partition.node(tag).map(Node::trial_disp)
    }

    /// External node tags and boundary DOF count.
    pub fn remote_data(&self) -> (Vec<NodeTag>, usize) {
        (self.partition.external_nodes().to_vec(), self.partition.num_dof())
    }

    /// Run a partition builder against this subdomain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` if the builder fails. Components it
    /// added before failing stay in place.
    pub fn build(
        &mut self,
        num_partitions: i32,
        mut builder: Box<dyn PartitionBuilder>,
    ) -> DomainResult<()> {
        let result = builder.build_partition(&mut self.partition, num_partitions);
        self.structure_changed();
        debug!(
            partition = self.tag(),
            nodes = self.partition.num_nodes(),
            elements = self.partition.num_elements(),
            "partition built"
        );
        result.map_err(DomainError::from)
    }

    // -- condensation -----------------------------------------------------

    /// Build the DOF map if stale. Idempotent between structural changes.
    ///
    /// The engine, when present, is renumbered first if the structure
    /// changed since it last looked.
    ///
    /// # Errors
    ///
    /// `DomainError::Analysis` if renumbering fails. The engine stays
    /// unsynced and the next call retries.
    pub fn build_map(&mut self) -> DomainResult<&[Option<usize>]> {
        self.sync_engine()?;
        Ok(self.dof_map.ensure(&self.partition, self.engine.as_deref()))
    }

    fn sync_engine(&mut self) -> DomainResult<()> {
        let Some(engine) = self.engine.as_deref_mut() else {
            return Ok(());
        };
        if self.engine_synced {
            return Ok(());
        }
        if let Err(err) = engine.domain_changed(&mut self.partition) {
            warn!(partition = self.partition.tag(), error = %err, "renumbering failed");
            return Err(err.into());
        }
        self.engine_synced = true;
        self.dof_map.invalidate();
        Ok(())
    }

    /// Form the condensed tangent and gather it in boundary order.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine, `DomainError::Analysis`
    /// if formation fails.
    pub fn compute_tang(&mut self) -> DomainResult<()> {
        if self.engine.is_none() {
            return Err(self.no_analysis("compute_tang"));
        }
        self.sync_engine()?;
        let Self {
            partition,
            engine,
            dof_map,
            mapped_tangent,
            ..
        } = self;
        let engine = engine.as_deref_mut().ok_or(DomainError::NoAnalysis)?;
        engine.form_tangent(partition)?;
        let map = dof_map.ensure(partition, Some(&*engine));
        *mapped_tangent = DofMap::gather_matrix(map, engine.tangent());
        Ok(())
    }

    /// Form the condensed residual and gather it in boundary order.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine, `DomainError::Analysis`
    /// if formation fails.
    pub fn compute_residual(&mut self) -> DomainResult<()> {
        if self.engine.is_none() {
            return Err(self.no_analysis("compute_residual"));
        }
        self.sync_engine()?;
        let Self {
            partition,
            engine,
            dof_map,
            mapped_residual,
            ..
        } = self;
        let engine = engine.as_deref_mut().ok_or(DomainError::NoAnalysis)?;
        engine.form_residual(partition)?;
        let map = dof_map.ensure(partition, Some(&*engine));
        *mapped_residual = DofMap::gather_vector(map, engine.residual());
        Ok(())
    }

    /// Boundary-ordered tangent from the last `compute_tang`.
    ///
    /// Zero if nothing was formed since the boundary last changed size.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine.
    pub fn tang(&self) -> DomainResult<Matrix> {
        if self.engine.is_none() {
            return Err(self.no_analysis("tang"));
        }
        let n = self.partition.num_dof();
        if self.mapped_tangent.dim() != (n, n) {
            return Ok(Matrix::zeros((n, n)));
        }
        Ok(self.mapped_tangent.clone())
    }

    /// Boundary-ordered residual from the last `compute_residual`.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine.
    pub fn resisting_force(&self) -> DomainResult<Vector> {
        if self.engine.is_none() {
            return Err(self.no_analysis("resisting_force"));
        }
        let n = self.partition.num_dof();
        if self.mapped_residual.len() != n {
            return Ok(Vector::zeros(n));
        }
        Ok(self.mapped_residual.clone())
    }

    /// Push a boundary-ordered response into the engine and recover the
    /// internal response.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine, `DomainError::Model` if
    /// `boundary` is not `num_dof` long, `DomainError::Analysis` if the
    /// engine fails.
    pub fn compute_nodal_response(&mut self, boundary: &Vector) -> DomainResult<()> {
        if self.engine.is_none() {
            return Err(self.no_analysis("compute_nodal_response"));
        }
        let expected = self.partition.num_dof();
        if boundary.len() != expected {
            return Err(ModelError::SizeMismatch {
                expected,
                got: boundary.len(),
            }
            .into());
        }
        self.sync_engine()?;
        let Self {
            partition,
            engine,
            dof_map,
            ..
        } = self;
        let engine = engine.as_deref_mut().ok_or(DomainError::NoAnalysis)?;
        let map = dof_map.ensure(partition, Some(&*engine));
        let external = DofMap::scatter_vector(map, boundary, engine.num_external_eqn());
        engine.compute_internal_response(partition, &external)?;
        Ok(())
    }

    // -- state ------------------------------------------------------------

    /// Apply every load pattern at `time`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` if a load cannot be applied.
    pub fn apply_load(&mut self, time: f64) -> DomainResult<()> {
        Ok(self.partition.apply_load(time)?)
    }

    /// Set committed and current time.
    pub fn set_committed_time(&mut self, time: f64) {
        self.partition.set_committed_time(time);
    }

    /// Current pseudo-time.
    pub fn current_time(&self) -> f64 {
        self.partition.current_time()
    }

    /// Freeze every load pattern.
    pub fn set_load_constant(&mut self) {
        self.partition.set_load_constant();
    }

    /// Update elements from nodal trial response.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` on element failure.
    pub fn update(&mut self) -> DomainResult<()> {
        Ok(self.partition.update()?)
    }

    /// Commit and run recorders.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` on element or recorder failure.
    pub fn commit(&mut self) -> DomainResult<()> {
        Ok(self.partition.commit()?)
    }

    /// Discard trial state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` on element failure.
    pub fn revert_to_last_commit(&mut self) -> DomainResult<()> {
        Ok(self.partition.revert_to_last_commit()?)
    }

    /// Return to the initial state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` on element failure.
    pub fn revert_to_start(&mut self) -> DomainResult<()> {
        Ok(self.partition.revert_to_start()?)
    }

    /// Assign a nodal mass.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Model` if the node is missing or the size is
    /// wrong.
    pub fn set_mass(&mut self, node: NodeTag, mass: Matrix) -> DomainResult<()> {
        Ok(self.partition.set_mass(node, mass)?)
    }

    /// Store and distribute Rayleigh factors.
    pub fn set_rayleigh_factors(&mut self, factors: RayleighFactors) {
        self.partition.set_rayleigh_factors(factors);
    }

    /// Add a recorder.
    pub fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> bool {
        self.partition.add_recorder(recorder)
    }

    /// Remove a recorder.
    pub fn remove_recorder(&mut self, tag: Tag) -> bool {
        self.partition.remove_recorder(tag)
    }

    /// Remove every recorder.
    pub fn remove_recorders(&mut self) {
        self.partition.remove_recorders();
    }

    // -- analysis ---------------------------------------------------------

    /// Attach an engine, replacing any previous one.
    pub fn set_analysis(&mut self, engine: Box<dyn AnalysisEngine>) {
        self.engine = Some(engine);
        self.structure_changed();
    }

    /// Install a component into the engine's `kind` slot.
    ///
    /// # Errors
    ///
    /// `DomainError::WrongComponent` if the component is of another kind,
    /// `DomainError::NoAnalysis` without an engine, `DomainError::Analysis`
    /// if the engine refuses it.
    pub fn set_component(
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
        let tag = self.tag();
        let engine = self.engine.as_deref_mut().ok_or_else(|| {
            warn!(partition = tag, component = %kind, "no analysis engine attached");
            DomainError::NoAnalysis
        })?;
        Ok(engine.set_component(component)?)
    }

    /// Renumber now.
    ///
    /// # Errors
    ///
    /// `DomainError::Analysis` if the engine fails to renumber.
    pub fn domain_changed(&mut self) -> DomainResult<()> {
        self.dof_map.invalidate();
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.domain_changed(&mut self.partition)?;
            self.engine_synced = true;
        }
        Ok(())
    }

    /// Drop the engine's derived state.
    pub fn clear_analysis(&mut self) {
        if let Some(engine) = self.engine.as_deref_mut() {
            engine.clear();
        }
        self.structure_changed();
    }

    /// Detach the engine.
    pub fn wipe_analysis(&mut self) {
        self.engine = None;
        self.mapped_tangent = Matrix::zeros((0, 0));
        self.mapped_residual = Vector::zeros(0);
        self.structure_changed();
    }

    /// Start a step of size `dt`.
    ///
    /// # Errors
    ///
    /// `DomainError::NoAnalysis` without an engine, `DomainError::Analysis`
    /// if the integrator rejects the step.
    pub fn new_step(&mut self, dt: f64) -> DomainResult<()> {
        self.partition.set_dt(dt);
        if self.engine.is_none() {
            return Err(self.no_analysis("new_step"));
        }
        let engine = self.engine.as_deref_mut().ok_or(DomainError::NoAnalysis)?;
        Ok(engine.new_step(dt)?)
    }

    /// Local half of the barrier: nothing to wait for.
    pub fn barrier_check(&self, my_result: i32) -> i32 {
        my_result
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.partition)?;
        match &self.engine {
            Some(engine) => write!(f, "\n  engine: {engine:?}"),
            None => write!(f, "\n  engine: none"),
        }
    }
}
