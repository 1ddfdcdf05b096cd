//! Object brokers: blank instances by class tag.
//!
//! The receiving end of an object frame only knows the class tag. A broker
//! turns that tag into a default instance the payload is then decoded into.

use std::collections::HashMap;

use ddfem_core::{ClassTag, MovableObject};

use crate::analysis::{AnalysisComponent, AnalysisEngine};
use crate::model::{
    class_tags, Element, ElementalLoad, LoadPattern, MpConstraint, NodalLoad, Node,
    PartitionBuilder, Recorder, SpConstraint,
};

/// Factory of blank instances keyed by class tag.
///
/// The built-in components have default constructors; user classes
/// (elements, recorders, builders, engines, components) return `None`
/// unless the implementation knows them.
pub trait ObjectBroker {
    /// Blank element of `class_tag`.
    fn new_element(&self, class_tag: ClassTag) -> Option<Box<dyn Element>>;

    /// Blank node.
    fn new_node(&self, class_tag: ClassTag) -> Option<Node> {
        (class_tag == class_tags::NODE).then(Node::default)
    }

    /// Blank single-point constraint.
    fn new_sp_constraint(&self, class_tag: ClassTag) -> Option<SpConstraint> {
        (class_tag == class_tags::SP_CONSTRAINT).then(SpConstraint::default)
    }

    /// Blank multi-point constraint.
    fn new_mp_constraint(&self, class_tag: ClassTag) -> Option<MpConstraint> {
        (class_tag == class_tags::MP_CONSTRAINT).then(MpConstraint::default)
    }

    /// Blank load pattern.
    fn new_load_pattern(&self, class_tag: ClassTag) -> Option<LoadPattern> {
        (class_tag == class_tags::LOAD_PATTERN).then(LoadPattern::default)
    }

    /// Blank nodal load.
    fn new_nodal_load(&self, class_tag: ClassTag) -> Option<NodalLoad> {
        (class_tag == class_tags::NODAL_LOAD).then(NodalLoad::default)
    }

    /// Blank elemental load.
    fn new_elemental_load(&self, class_tag: ClassTag) -> Option<ElementalLoad> {
        (class_tag == class_tags::ELEMENTAL_LOAD).then(ElementalLoad::default)
    }

    /// Blank recorder of `class_tag`.
    fn new_recorder(&self, class_tag: ClassTag) -> Option<Box<dyn Recorder>>;

    /// Blank partition builder of `class_tag`.
    fn new_partition_builder(&self, class_tag: ClassTag) -> Option<Box<dyn PartitionBuilder>>;

    /// Blank analysis engine of `class_tag`.
    fn new_analysis(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisEngine>>;

    /// Blank analysis component of `class_tag`.
    fn new_analysis_component(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisComponent>>;
}

type Constructor<T> = Box<dyn Fn() -> Box<T>>;

/// Broker built from registered constructors.
///
/// ```rust,ignore
/// let registry = Registry::new()
///     .with_element::<Spring>()
///     .with_analysis::<CondensingEngine>();
/// ```
#[derive(Default)]
pub struct Registry {
    elements: HashMap<ClassTag, Constructor<dyn Element>>,
    recorders: HashMap<ClassTag, Constructor<dyn Recorder>>,
    builders: HashMap<ClassTag, Constructor<dyn PartitionBuilder>>,
    engines: HashMap<ClassTag, Constructor<dyn AnalysisEngine>>,
    components: HashMap<ClassTag, Constructor<dyn AnalysisComponent>>,
}

impl Registry {
    /// Registry that knows only the built-in components.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element class under the tag its default instance reports.
    pub fn with_element<E: Element + Default + 'static>(mut self) -> Self {
        let class_tag = E::default().class_tag();
        warn_on_builtin(class_tag);
        self.elements.insert(class_tag, Box::new(|| Box::new(E::default()) as Box<dyn Element>));
        self
    }

    /// Register a recorder class.
    pub fn with_recorder<R: Recorder + Default + 'static>(mut self) -> Self {
        let class_tag = R::default().class_tag();
        self.recorders.insert(class_tag, Box::new(|| Box::new(R::default()) as Box<dyn Recorder>));
        self
    }

    /// Register a partition builder class.
    pub fn with_builder<B: PartitionBuilder + Default + 'static>(mut self) -> Self {
        let class_tag = B::default().class_tag();
        self.builders.insert(
            class_tag,
            Box::new(|| Box::new(B::default()) as Box<dyn PartitionBuilder>),
        );
        self
    }

    /// Register an analysis engine class.
    pub fn with_analysis<A: AnalysisEngine + Default + 'static>(mut self) -> Self {
        let class_tag = A::default().class_tag();
        self.engines.insert(
            class_tag,
            Box::new(|| Box::new(A::default()) as Box<dyn AnalysisEngine>),
        );
        self
    }

    /// Register an analysis component class.
    pub fn with_component<C: AnalysisComponent + Default + 'static>(mut self) -> Self {
        let class_tag = C::default().class_tag();
        self.components.insert(
            class_tag,
            Box::new(|| Box::new(C::default()) as Box<dyn AnalysisComponent>),
        );
        self
    }
}

fn warn_on_builtin(class_tag: ClassTag) {
    if (class_tags::NODE..=class_tags::LOAD_PATTERN).contains(&class_tag) {
        tracing::warn!(class_tag, "element class tag collides with a built-in component");
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut elements: Vec<_> = self.elements.keys().copied().collect();
        elements.sort_unstable();
        f.debug_struct("Registry")
            .field("elements", &elements)
            .field("recorders", &self.recorders.len())
            .field("builders", &self.builders.len())
            .field("engines", &self.engines.len())
            .field("components", &self.components.len())
            .finish()
    }
}

impl ObjectBroker for Registry {
    fn new_element(&self, class_tag: ClassTag) -> Option<Box<dyn Element>> {
        self.elements.get(&class_tag).map(|make| make())
    }

    fn new_recorder(&self, class_tag: ClassTag) -> Option<Box<dyn Recorder>> {
        self.recorders.get(&class_tag).map(|make| make())
    }

    fn new_partition_builder(&self, class_tag: ClassTag) -> Option<Box<dyn PartitionBuilder>> {
        self.builders.get(&class_tag).map(|make| make())
    }

    fn new_analysis(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisEngine>> {
        self.engines.get(&class_tag).map(|make| make())
    }

    fn new_analysis_component(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisComponent>> {
        self.components.get(&class_tag).map(|make| make())
    }
}

impl<B: ObjectBroker + ?Sized> ObjectBroker for std::rc::Rc<B> {
    fn new_element(&self, class_tag: ClassTag) -> Option<Box<dyn Element>> {
        (**self).new_element(class_tag)
    }

    fn new_node(&self, class_tag: ClassTag) -> Option<Node> {
        (**self).new_node(class_tag)
    }

    fn new_sp_constraint(&self, class_tag: ClassTag) -> Option<SpConstraint> {
        (**self).new_sp_constraint(class_tag)
    }

    fn new_mp_constraint(&self, class_tag: ClassTag) -> Option<MpConstraint> {
        (**self).new_mp_constraint(class_tag)
    }

    fn new_load_pattern(&self, class_tag: ClassTag) -> Option<LoadPattern> {
        (**self).new_load_pattern(class_tag)
    }

    fn new_nodal_load(&self, class_tag: ClassTag) -> Option<NodalLoad> {
        (**self).new_nodal_load(class_tag)
    }

    fn new_elemental_load(&self, class_tag: ClassTag) -> Option<ElementalLoad> {
        (**self).new_elemental_load(class_tag)
    }

    fn new_recorder(&self, class_tag: ClassTag) -> Option<Box<dyn Recorder>> {
        (**self).new_recorder(class_tag)
    }

    fn new_partition_builder(&self, class_tag: ClassTag) -> Option<Box<dyn PartitionBuilder>> {
        (**self).new_partition_builder(class_tag)
    }

    fn new_analysis(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisEngine>> {
        (**self).new_analysis(class_tag)
    }

    fn new_analysis_component(&self, class_tag: ClassTag) -> Option<Box<dyn AnalysisComponent>> {
        (**self).new_analysis_component(class_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_without_registration() {
        let registry = Registry::new();
        assert!(registry.new_node(class_tags::NODE).is_some());
        assert!(registry.new_node(class_tags::LOAD_PATTERN).is_none());
        assert!(registry.new_load_pattern(class_tags::LOAD_PATTERN).is_some());
        assert!(registry.new_element(42).is_none());
        assert!(registry.new_analysis(42).is_none());
    }
}
