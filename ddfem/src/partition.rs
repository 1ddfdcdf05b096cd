//! The slice of the model owned by one subdomain.

use std::collections::BTreeMap;
use std::fmt;

use ddfem_core::{ElementTag, Matrix, NodeTag, PartitionTag, Tag};

use crate::model::{
    Element, ElementalLoad, LoadPattern, ModelError, MpConstraint, NodalLoad, Node, NodeMap,
    RayleighFactors, Recorder, SpConstraint,
};

/// Nodes, elements, constraints, load patterns and recorders of one
/// subdomain.
///
/// Internal nodes, external nodes and elements share one tag namespace:
/// a tag names at most one of them. External nodes are geometry-only ghost
/// copies; their order of insertion is the order of the boundary DOFs.
#[derive(Debug, Default)]
pub struct Partition {
    tag: PartitionTag,
    nodes: NodeMap,
    external_nodes: Vec<NodeTag>,
    elements: BTreeMap<ElementTag, Box<dyn Element>>,
    sp_constraints: BTreeMap<Tag, SpConstraint>,
    mp_constraints: BTreeMap<Tag, MpConstraint>,
    load_patterns: BTreeMap<Tag, LoadPattern>,
    recorders: Vec<Box<dyn Recorder>>,
    num_dof: usize,
    current_time: f64,
    committed_time: f64,
    dt: f64,
    commit_tag: i32,
    rayleigh: RayleighFactors,
}

impl Partition {
    /// Empty partition.
    pub fn new(tag: PartitionTag) -> Self {
        Self {
            tag,
            ..Self::default()
        }
    }

    /// Partition tag.
    pub fn tag(&self) -> PartitionTag {
        self.tag
    }

    /// Retag the partition.
    pub fn set_tag(&mut self, tag: PartitionTag) {
        self.tag = tag;
    }

    /// Whether `tag` names a node (internal or external) or an element.
    pub fn tag_in_use(&self, tag: Tag) -> bool {
        self.nodes.contains_key(&tag) || self.elements.contains_key(&tag)
    }

    // -- nodes ------------------------------------------------------------

    /// Add an internal node.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.tag_in_use(node.tag()) {
            tracing::warn!(partition = self.tag, node = node.tag(), "tag already in use");
            return false;
        }
        self.nodes.insert(node.tag(), node);
        true
    }

    /// Add a boundary node shared with a neighbour. Only its geometry is kept.
    pub fn add_external_node(&mut self, node: &Node) -> bool {
        if self.tag_in_use(node.tag()) {
            tracing::warn!(partition = self.tag, node = node.tag(), "tag already in use");
            return false;
        }
        self.nodes.insert(node.tag(), node.ghost());
        self.external_nodes.push(node.tag());
        self.num_dof += node.ndof();
        true
    }

    /// Remove a node, internal or external.
    pub fn remove_node(&mut self, tag: NodeTag) -> Option<Node> {
        let node = self.nodes.remove(&tag)?;
        if let Some(pos) = self.external_nodes.iter().position(|t| *t == tag) {
            self.external_nodes.remove(pos);
            self.num_dof -= node.ndof();
        }
        Some(node)
    }

    /// Whether a node (internal or external) carries `tag`.
    pub fn has_node(&self, tag: NodeTag) -> bool {
        self.nodes.contains_key(&tag)
    }

    /// Whether `tag` is an external node.
    pub fn is_external(&self, tag: NodeTag) -> bool {
        self.external_nodes.contains(&tag)
    }

    /// Node by tag.
    pub fn node(&self, tag: NodeTag) -> Option<&Node> {
        self.nodes.get(&tag)
    }

    /// Mutable node by tag.
    pub fn node_mut(&mut self, tag: NodeTag) -> Option<&mut Node> {
        self.nodes.get_mut(&tag)
    }

    /// Every node, internal and external.
    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// External node tags in insertion order.
    pub fn external_nodes(&self) -> &[NodeTag] {
        &self.external_nodes
    }

    /// Number of nodes, internal plus external.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of external nodes.
    pub fn num_external_nodes(&self) -> usize {
        self.external_nodes.len()
    }

    /// Boundary DOFs: sum of the DOF counts of the external nodes.
    pub fn num_dof(&self) -> usize {
        self.num_dof
    }

    // -- elements ---------------------------------------------------------

    /// Add an element.
    pub fn add_element(&mut self, mut element: Box<dyn Element>) -> bool {
        let tag = element.tag();
        if self.tag_in_use(tag) {
            tracing::warn!(partition = self.tag, element = tag, "tag already in use");
            return false;
        }
        element.set_rayleigh_factors(&self.rayleigh);
        self.elements.insert(tag, element);
        true
    }

    /// Remove an element.
    pub fn remove_element(&mut self, tag: ElementTag) -> Option<Box<dyn Element>> {
        self.elements.remove(&tag)
    }

    /// Whether an element carries `tag`.
    pub fn has_element(&self, tag: ElementTag) -> bool {
        self.elements.contains_key(&tag)
    }

    /// Element by tag.
    pub fn element(&self, tag: ElementTag) -> Option<&dyn Element> {
        self.elements.get(&tag).map(|e| e.as_ref())
    }

    /// Elements in tag order.
    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> {
        self.elements.values().map(|e| e.as_ref())
    }

    /// Number of elements.
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    // -- constraints ------------------------------------------------------

    /// Add a single-point constraint.
    pub fn add_sp_constraint(&mut self, sp: SpConstraint) -> bool {
        insert_unique(&mut self.sp_constraints, sp.tag(), sp)
    }

    /// Add a multi-point constraint.
    pub fn add_mp_constraint(&mut self, mp: MpConstraint) -> bool {
        if !mp.is_consistent() {
            tracing::warn!(
                partition = self.tag,
                constraint = mp.tag(),
                "constraint matrix does not match its DOFs"
            );
            return false;
        }
        insert_unique(&mut self.mp_constraints, mp.tag(), mp)
    }

    /// Remove a single-point constraint.
    pub fn remove_sp_constraint(&mut self, tag: Tag) -> Option<SpConstraint> {
        self.sp_constraints.remove(&tag)
    }

    /// Remove a multi-point constraint.
    pub fn remove_mp_constraint(&mut self, tag: Tag) -> Option<MpConstraint> {
        self.mp_constraints.remove(&tag)
    }

    /// Single-point constraints in tag order.
    pub fn sp_constraints(&self) -> impl Iterator<Item = &SpConstraint> {
        self.sp_constraints.values()
    }

    /// Multi-point constraints in tag order.
    pub fn mp_constraints(&self) -> impl Iterator<Item = &MpConstraint> {
        self.mp_constraints.values()
    }

    /// Number of single-point constraints, pattern ones excluded.
    pub fn num_sps(&self) -> usize {
        self.sp_constraints.len()
    }

    /// Number of multi-point constraints.
    pub fn num_mps(&self) -> usize {
        self.mp_constraints.len()
    }

    // -- load patterns ----------------------------------------------------

    /// Add a load pattern.
    pub fn add_load_pattern(&mut self, pattern: LoadPattern) -> bool {
        insert_unique(&mut self.load_patterns, pattern.tag(), pattern)
    }

    /// Remove a load pattern.
    pub fn remove_load_pattern(&mut self, tag: Tag) -> Option<LoadPattern> {
        self.load_patterns.remove(&tag)
    }

    /// Load pattern by tag.
    pub fn load_pattern(&self, tag: Tag) -> Option<&LoadPattern> {
        self.load_patterns.get(&tag)
    }

    /// Number of load patterns.
    pub fn num_load_patterns(&self) -> usize {
        self.load_patterns.len()
    }

    /// Add a nodal load to pattern `pattern`. The node must exist.
    pub fn add_nodal_load(&mut self, load: NodalLoad, pattern: Tag) -> bool {
        if !self.nodes.contains_key(&load.node_tag()) {
            tracing::warn!(
                partition = self.tag,
                node = load.node_tag(),
                "nodal load on unknown node"
            );
            return false;
        }
        self.load_patterns
            .get_mut(&pattern)
            .is_some_and(|p| p.add_nodal_load(load))
    }

    /// Add an elemental load to pattern `pattern`. Every element must exist.
    pub fn add_elemental_load(&mut self, load: ElementalLoad, pattern: Tag) -> bool {
        if let Some(missing) = load
            .element_tags()
            .iter()
            .find(|t| !self.elements.contains_key(*t))
        {
            tracing::warn!(
                partition = self.tag,
                element = *missing,
                "elemental load on unknown element"
            );
            return false;
        }
        self.load_patterns
            .get_mut(&pattern)
            .is_some_and(|p| p.add_elemental_load(load))
    }

    /// Add a prescribed-value constraint to pattern `pattern`.
    pub fn add_sp_constraint_to_pattern(&mut self, sp: SpConstraint, pattern: Tag) -> bool {
        self.load_patterns
            .get_mut(&pattern)
            .is_some_and(|p| p.add_sp_constraint(sp))
    }

    /// Remove a nodal load from pattern `pattern`.
    pub fn remove_nodal_load(&mut self, tag: Tag, pattern: Tag) -> Option<NodalLoad> {
        self.load_patterns.get_mut(&pattern)?.remove_nodal_load(tag)
    }

    /// Remove an elemental load from pattern `pattern`.
    pub fn remove_elemental_load(&mut self, tag: Tag, pattern: Tag) -> Option<ElementalLoad> {
        self.load_patterns.get_mut(&pattern)?.remove_elemental_load(tag)
    }

    /// Remove a prescribed-value constraint from pattern `pattern`.
    pub fn remove_sp_constraint_from_pattern(
        &mut self,
        tag: Tag,
        pattern: Tag,
    ) -> Option<SpConstraint> {
        self.load_patterns.get_mut(&pattern)?.remove_sp_constraint(tag)
    }

    // -- recorders --------------------------------------------------------

    /// Add a recorder.
    pub fn add_recorder(&mut self, recorder: Box<dyn Recorder>) -> bool {
        if self.recorders.iter().any(|r| r.tag() == recorder.tag()) {
            return false;
        }
        self.recorders.push(recorder);
        true
    }

    /// Remove a recorder.
    pub fn remove_recorder(&mut self, tag: Tag) -> bool {
        let before = self.recorders.len();
        self.recorders.retain(|r| r.tag() != tag);
        self.recorders.len() != before
    }

    /// Remove every recorder.
    pub fn remove_recorders(&mut self) {
        self.recorders.clear();
    }

    /// Number of recorders.
    pub fn num_recorders(&self) -> usize {
        self.recorders.len()
    }

    // -- time and state ---------------------------------------------------

    /// Current pseudo-time.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Pseudo-time of the last commit.
    pub fn committed_time(&self) -> f64 {
        self.committed_time
    }

    /// Current step size.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Record a new step size.
    pub fn set_dt(&mut self, dt: f64) {
        self.dt = dt;
    }

    /// Number of commits since the start.
    pub fn commit_tag(&self) -> i32 {
        self.commit_tag
    }

    /// Set both committed and current time.
    pub fn set_committed_time(&mut self, time: f64) {
        self.committed_time = time;
        self.current_time = time;
    }

    /// Zero all loads, then apply every pattern at `time`.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if a load targets a missing component or an
    /// element rejects its load.
    pub fn apply_load(&mut self, time: f64) -> Result<(), ModelError> {
        self.current_time = time;
        for node in self.nodes.values_mut() {
            node.zero_unbalanced_load();
        }
        for element in self.elements.values_mut() {
            element.zero_load();
        }

        for pattern in self.load_patterns.values_mut() {
            let factor = pattern.update_factor(time);
            for load in pattern.nodal_loads() {
                let node = self
                    .nodes
                    .get_mut(&load.node_tag())
                    .ok_or(ModelError::UnknownNode(load.node_tag()))?;
                if !node.add_unbalanced_load(load.load(), factor) {
                    return Err(ModelError::SizeMismatch {
                        expected: node.ndof(),
                        got: load.load().len(),
                    });
                }
            }
            for load in pattern.elemental_loads() {
                for tag in load.element_tags() {
                    let element = self
                        .elements
                        .get_mut(tag)
                        .ok_or(ModelError::UnknownElement(*tag))?;
                    element.add_load(load, factor)?;
                }
            }
        }
        Ok(())
    }

    /// Freeze the factor of every load pattern.
    pub fn set_load_constant(&mut self) {
        for pattern in self.load_patterns.values_mut() {
            pattern.set_load_constant();
        }
    }

    /// Update every element from the nodes' trial response.
    ///
    /// # Errors
    ///
    /// Returns the first element failure.
    pub fn update(&mut self) -> Result<(), ModelError> {
        for element in self.elements.values_mut() {
            element.update(&self.nodes)?;
        }
        Ok(())
    }

    /// Commit nodes and elements, then run the recorders.
    ///
    /// # Errors
    ///
    /// Returns the first element or recorder failure.
    pub fn commit(&mut self) -> Result<(), ModelError> {
        for node in self.nodes.values_mut() {
            node.commit_state();
        }
        for element in self.elements.values_mut() {
            element.commit_state()?;
        }
        self.committed_time = self.current_time;
        self.commit_tag += 1;

        let mut recorders = std::mem::take(&mut self.recorders);
        let result = {
            let this: &Partition = self;
            recorders
                .iter_mut()
                .try_for_each(|r| r.record(this, this.commit_tag, this.committed_time))
        };
        self.recorders = recorders;
        result
    }

    /// Discard trial state everywhere.
    ///
    /// # Errors
    ///
    /// Returns the first element failure.
    pub fn revert_to_last_commit(&mut self) -> Result<(), ModelError> {
        for node in self.nodes.values_mut() {
            node.revert_to_last_commit();
        }
        for element in self.elements.values_mut() {
            element.revert_to_last_commit()?;
        }
        self.current_time = self.committed_time;
        Ok(())
    }

    /// Return every component to its initial state.
    ///
    /// # Errors
    ///
    /// Returns the first element failure.
    pub fn revert_to_start(&mut self) -> Result<(), ModelError> {
        for node in self.nodes.values_mut() {
            node.revert_to_start();
        }
        for element in self.elements.values_mut() {
            element.revert_to_start()?;
        }
        for recorder in &mut self.recorders {
            recorder.restart();
        }
        self.current_time = 0.0;
        self.committed_time = 0.0;
        self.commit_tag = 0;
        Ok(())
    }

    /// Assign a nodal mass matrix.
    ///
    /// # Errors
    ///
    /// Returns `ModelError` if the node is missing or the matrix has the
    /// wrong size.
    pub fn set_mass(&mut self, tag: NodeTag, mass: Matrix) -> Result<(), ModelError> {
        let node = self.nodes.get_mut(&tag).ok_or(ModelError::UnknownNode(tag))?;
        let got = mass.nrows();
        if node.set_mass(mass) {
            Ok(())
        } else {
            Err(ModelError::SizeMismatch {
                expected: node.ndof(),
                got,
            })
        }
    }

    /// Current Rayleigh factors.
    pub fn rayleigh_factors(&self) -> RayleighFactors {
        self.rayleigh
    }

    /// Store new Rayleigh factors and push them to every element.
    pub fn set_rayleigh_factors(&mut self, factors: RayleighFactors) {
        self.rayleigh = factors;
        for element in self.elements.values_mut() {
            element.set_rayleigh_factors(&factors);
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "partition {}: {} nodes ({} external, {} boundary dofs), {} elements",
            self.tag,
            self.num_nodes(),
            self.num_external_nodes(),
            self.num_dof,
            self.num_elements()
        )?;
        write!(
            f,
            "  {} sp, {} mp, {} load patterns, {} recorders, time {} (committed {}, commit {})",
            self.num_sps(),
            self.num_mps(),
            self.num_load_patterns(),
            self.num_recorders(),
            self.current_time,
            self.committed_time,
            self.commit_tag
        )
    }
}

fn insert_unique<V>(map: &mut BTreeMap<Tag, V>, tag: Tag, value: V) -> bool {
    if map.contains_key(&tag) {
        return false;
    }
    map.insert(tag, value);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeSeries;
    use ddfem_core::Vector;

    fn node(tag: NodeTag, ndof: usize) -> Node {
        Node::new(tag, ndof, vec![tag as f64, 0.0])
    }

    #[test]
    fn test_external_nodes_drive_num_dof() {
        let mut p = Partition::new(7);
        assert!(p.add_node(node(1, 3)));
        assert!(p.add_external_node(&node(2, 3)));
        assert!(p.add_external_node(&node(5, 2)));

        assert_eq!(p.num_nodes(), 3);
        assert_eq!(p.num_dof(), 5);
        assert_eq!(p.external_nodes(), &[2, 5]);

        assert!(p.remove_node(2).is_some());
        assert_eq!(p.num_dof(), 2);
        assert_eq!(p.external_nodes(), &[5]);
        assert!(p.remove_node(2).is_none());
    }

    #[test]
    fn test_shared_tag_namespace() {
        let mut p = Partition::new(1);
        assert!(p.add_node(node(1, 2)));
        assert!(!p.add_external_node(&node(1, 2)));
        assert!(p.add_external_node(&node(2, 2)));
        assert!(!p.add_node(node(2, 2)));
        assert_eq!(p.num_dof(), 2);
    }

    #[test]
    fn test_apply_load_scales_nodal_loads() {
        let mut p = Partition::new(1);
        p.add_node(node(1, 2));
        assert!(!p.add_nodal_load(NodalLoad::new(1, 1, Vector::from(vec![1.0, 0.0])), 3));

        assert!(p.add_load_pattern(LoadPattern::new(3, TimeSeries::Linear { factor: 2.0 })));
        assert!(p.add_nodal_load(NodalLoad::new(1, 1, Vector::from(vec![1.0, 0.0])), 3));
        assert!(!p.add_nodal_load(NodalLoad::new(2, 9, Vector::zeros(2)), 3));

        p.apply_load(0.5).expect("apply");
        assert_eq!(p.current_time(), 0.5);
        assert_eq!(p.node(1).expect("node").unbalanced_load(), &Vector::from(vec![1.0, 0.0]));

        p.apply_load(1.0).expect("apply");
        assert_eq!(p.node(1).expect("node").unbalanced_load(), &Vector::from(vec![2.0, 0.0]));
    }

    #[test]
    fn test_commit_and_revert_time() {
        let mut p = Partition::new(1);
        p.add_node(node(1, 1));
        p.apply_load(1.0).expect("apply");
        p.commit().expect("commit");
        assert_eq!(p.commit_tag(), 1);
        assert_eq!(p.committed_time(), 1.0);

        p.apply_load(2.0).expect("apply");
        p.revert_to_last_commit().expect("revert");
        assert_eq!(p.current_time(), 1.0);

        p.revert_to_start().expect("revert");
        assert_eq!(p.commit_tag(), 0);
        assert_eq!(p.current_time(), 0.0);
    }

    #[test]
    fn test_set_mass_checks_node_and_size() {
        let mut p = Partition::new(1);
        p.add_node(node(1, 2));
        assert!(matches!(p.set_mass(3, Matrix::eye(2)), Err(ModelError::UnknownNode(3))));
        assert!(p.set_mass(1, Matrix::eye(3)).is_err());
        assert!(p.set_mass(1, Matrix::eye(2)).is_ok());
    }
}
