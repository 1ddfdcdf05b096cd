//! Loads, time series and load patterns.

use std::collections::BTreeMap;
use std::fmt;

use ddfem_core::{ClassTag, CodecError, JsonCodec, MessageCodec, MovableObject};
use ddfem_core::{ElementTag, NodeTag, Tag, Vector};
use serde::{Deserialize, Serialize};

use super::{class_tags, SpConstraint};

/// Reference load applied to one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodalLoad {
    tag: Tag,
    node_tag: NodeTag,
    load: Vector,
}

impl NodalLoad {
    /// Reference load `load` on `node_tag`.
    pub fn new(tag: Tag, node_tag: NodeTag, load: Vector) -> Self {
        Self { tag, node_tag, load }
    }

    /// Load tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Loaded node.
    pub fn node_tag(&self) -> NodeTag {
        self.node_tag
    }

    /// Reference load vector.
    pub fn load(&self) -> &Vector {
        &self.load
    }
}

impl MovableObject for NodalLoad {
    fn class_tag(&self) -> ClassTag {
        class_tags::NODAL_LOAD
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

/// Kind of distributed element load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElementalLoadKind {
    /// Uniform load along the element.
    #[default]
    Uniform,
    /// Concentrated load at a relative position.
    Point,
    /// Self weight scaled by the data factors.
    SelfWeight,
    /// Temperature change.
    Thermal,
}

impl fmt::Display for ElementalLoadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementalLoadKind::Uniform => "uniform",
            ElementalLoadKind::Point => "point",
            ElementalLoadKind::SelfWeight => "self-weight",
            ElementalLoadKind::Thermal => "thermal",
        };
        f.write_str(name)
    }
}

/// Reference load applied to a set of elements.
///
/// `data` is interpreted by the element according to `kind`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementalLoad {
    tag: Tag,
    element_tags: Vec<ElementTag>,
    kind: ElementalLoadKind,
    data: Vec<f64>,
}

impl ElementalLoad {
    /// Create an elemental load.
    pub fn new(
        tag: Tag,
        element_tags: Vec<ElementTag>,
        kind: ElementalLoadKind,
        data: Vec<f64>,
    ) -> Self {
        Self {
            tag,
            element_tags,
            kind,
            data,
        }
    }

    /// Load tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Loaded elements.
    pub fn element_tags(&self) -> &[ElementTag] {
        &self.element_tags
    }

    /// Load kind.
    pub fn kind(&self) -> ElementalLoadKind {
        self.kind
    }

    /// Kind-specific data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl MovableObject for ElementalLoad {
    fn class_tag(&self) -> ClassTag {
        class_tags::ELEMENTAL_LOAD
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

/// Load factor as a function of pseudo-time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeSeries {
    /// Constant factor.
    Constant {
        /// Factor.
        factor: f64,
    },
    /// `factor * time`.
    Linear {
        /// Slope.
        factor: f64,
    },
    /// Piecewise linear through `(times[i], values[i])`, constant outside.
    Path {
        /// Strictly increasing abscissae.
        times: Vec<f64>,
        /// Ordinates, same length as `times`.
        values: Vec<f64>,
    },
}

impl Default for TimeSeries {
    fn default() -> Self {
        TimeSeries::Linear { factor: 1.0 }
    }
}

impl TimeSeries {
    /// Factor at `time`.
    pub fn factor(&self, time: f64) -> f64 {
        match self {
            TimeSeries::Constant { factor } => *factor,
            TimeSeries::Linear { factor } => factor * time,
            TimeSeries::Path { times, values } => path_factor(times, values, time),
        }
    }
}

fn path_factor(times: &[f64], values: &[f64], time: f64) -> f64 {
    let n = times.len().min(values.len());
    if n == 0 {
        return 0.0;
    }
    if time <= times[0] {
        return values[0];
    }
    for i in 1..n {
        if time <= times[i] {
            let span = times[i] - times[i - 1];
            if span <= 0.0 {
                return values[i];
            }
            let t = (time - times[i - 1]) / span;
            return values[i - 1] + t * (values[i] - values[i - 1]);
        }
    }
    values[n - 1]
}

/// A set of reference loads and prescribed values driven by one time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoadPattern {
    tag: Tag,
    series: TimeSeries,
    nodal_loads: BTreeMap<Tag, NodalLoad>,
    elemental_loads: BTreeMap<Tag, ElementalLoad>,
    sp_constraints: BTreeMap<Tag, SpConstraint>,
    constant_factor: Option<f64>,
    current_factor: f64,
}

impl LoadPattern {
    /// Empty pattern driven by `series`.
    pub fn new(tag: Tag, series: TimeSeries) -> Self {
        Self {
            tag,
            series,
            ..Self::default()
        }
    }

    /// Pattern tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Driving time series.
    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Add a nodal load. `false` if the tag is taken.
    pub fn add_nodal_load(&mut self, load: NodalLoad) -> bool {
        insert_unique(&mut self.nodal_loads, load.tag(), load)
    }

    /// Add an elemental load. `false` if the tag is taken.
    pub fn add_elemental_load(&mut self, load: ElementalLoad) -> bool {
        insert_unique(&mut self.elemental_loads, load.tag(), load)
    }

    /// Add a prescribed-value constraint. `false` if the tag is taken.
    pub fn add_sp_constraint(&mut self, sp: SpConstraint) -> bool {
        insert_unique(&mut self.sp_constraints, sp.tag(), sp)
    }

    /// Remove a nodal load.
    pub fn remove_nodal_load(&mut self, tag: Tag) -> Option<NodalLoad> {
        self.nodal_loads.remove(&tag)
    }

    /// Remove an elemental load.
    pub fn remove_elemental_load(&mut self, tag: Tag) -> Option<ElementalLoad> {
        self.elemental_loads.remove(&tag)
    }

    /// Remove a prescribed-value constraint.
    pub fn remove_sp_constraint(&mut self, tag: Tag) -> Option<SpConstraint> {
        self.sp_constraints.remove(&tag)
    }

    /// Nodal loads in tag order.
    pub fn nodal_loads(&self) -> impl Iterator<Item = &NodalLoad> {
        self.nodal_loads.values()
    }

    /// Elemental loads in tag order.
    pub fn elemental_loads(&self) -> impl Iterator<Item = &ElementalLoad> {
        self.elemental_loads.values()
    }

    /// Prescribed values in tag order.
    pub fn sp_constraints(&self) -> impl Iterator<Item = &SpConstraint> {
        self.sp_constraints.values()
    }

    /// Evaluate the factor at `time` and push it to the prescribed values.
    ///
    /// A pattern frozen by [`set_load_constant`](Self::set_load_constant)
    /// keeps its frozen factor.
    pub fn update_factor(&mut self, time: f64) -> f64 {
        let factor = self.constant_factor.unwrap_or_else(|| self.series.factor(time));
        self.current_factor = factor;
        for sp in self.sp_constraints.values_mut() {
            sp.apply_factor(factor);
        }
        factor
    }

    /// Factor from the last [`update_factor`](Self::update_factor).
    pub fn current_factor(&self) -> f64 {
        self.current_factor
    }

    /// Freeze the current factor.
    pub fn set_load_constant(&mut self) {
        self.constant_factor = Some(self.current_factor);
    }

    /// Whether the factor is frozen.
    pub fn is_constant(&self) -> bool {
        self.constant_factor.is_some()
    }
}

impl MovableObject for LoadPattern {
    fn class_tag(&self) -> ClassTag {
        class_tags::LOAD_PATTERN
    }

    fn send_self(&self) -> Result<Vec<u8>, CodecError> {
        JsonCodec.encode(self)
    }

    fn recv_self(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        *self = JsonCodec.decode(bytes)?;
        Ok(())
    }
}

fn insert_unique<V>(map: &mut BTreeMap<Tag, V>, tag: Tag, value: V) -> bool {
    if map.contains_key(&tag) {
        return false;
    }
    map.insert(tag, value);
    true
}
