//! Boundary DOF map.
//!
//! Position `i` of a partition's boundary vector is DOF `d` of the `k`-th
//! external node (in insertion order). The map sends it to the engine's
//! condensed equation `equation_number - num_internal_eqn`, or to `None`
//! when the DOF is constrained, unnumbered, or no engine is attached.

use ddfem_core::{Matrix, Vector};

use crate::analysis::AnalysisEngine;
use crate::Partition;

/// Lazily built boundary-to-engine map.
///
/// Any structural change of the partition moves the map back to `Stale`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DofMap {
    /// Must be rebuilt before use.
    #[default]
    Stale,
    /// Valid for the current structure, one entry per boundary DOF.
    Fresh(Vec<Option<usize>>),
}

impl DofMap {
    /// Mark the map out of date.
    pub fn invalidate(&mut self) {
        *self = DofMap::Stale;
    }

    /// Whether the map is valid.
    pub fn is_fresh(&self) -> bool {
        matches!(self, DofMap::Fresh(_))
    }

    /// Entries of a fresh map.
    pub fn entries(&self) -> Option<&[Option<usize>]> {
        match self {
            DofMap::Fresh(map) => Some(map),
            DofMap::Stale => None,
        }
    }

    /// Rebuild if stale, then return the entries.
    pub fn ensure(
        &mut self,
        partition: &Partition,
        engine: Option<&dyn AnalysisEngine>,
    ) -> &[Option<usize>] {
        if let DofMap::Stale = self {
            *self = DofMap::Fresh(Self::compute(partition, engine));
        }
        match self {
            DofMap::Fresh(map) => map,
            DofMap::Stale => &[],
        }
    }

    /// Compute the map from scratch.
    pub fn compute(
        partition: &Partition,
        engine: Option<&dyn AnalysisEngine>,
    ) -> Vec<Option<usize>> {
        let mut map = Vec::with_capacity(partition.num_dof());
        let num_internal = engine.map_or(0, |e| e.num_internal_eqn()) as i64;

        for tag in partition.external_nodes() {
            let ndof = partition.node(*tag).map_or(0, |n| n.ndof());
            let equations = engine.and_then(|e| e.equation_numbers(*tag)).unwrap_or(&[]);
            for dof in 0..ndof {
                let entry = equations
                    .get(dof)
                    .filter(|eq| **eq >= 0)
                    .map(|eq| i64::from(*eq) - num_internal)
                    .and_then(|pos| usize::try_from(pos).ok());
                map.push(entry);
            }
        }
        map
    }

    /// Boundary-ordered square matrix gathered from the engine's condensed
    /// matrix. Unmapped rows and columns are zero.
    pub fn gather_matrix(map: &[Option<usize>], full: &Matrix) -> Matrix {
        let n = map.len();
        let mut out = Matrix::zeros((n, n));
        for (i, row) in map.iter().enumerate() {
            let Some(row) = row else { continue };
            for (j, col) in map.iter().enumerate() {
                if let Some(value) = col.and_then(|col| full.get((*row, col))) {
                    out[(i, j)] = *value;
                }
            }
        }
        out
    }

    /// Boundary-ordered vector gathered from the engine's condensed vector.
    pub fn gather_vector(map: &[Option<usize>], full: &Vector) -> Vector {
        Vector::from_iter(
            map.iter()
                .map(|pos| pos.and_then(|p| full.get(p).copied()).unwrap_or(0.0)),
        )
    }

    /// Scatter a boundary-ordered vector into a condensed vector of `len`
    /// entries. Unmapped boundary entries are dropped.
    pub fn scatter_vector(map: &[Option<usize>], boundary: &Vector, len: usize) -> Vector {
        let mut out = Vector::zeros(len);
        for (value, pos) in boundary.iter().zip(map) {
            if let Some(slot) = pos.and_then(|p| out.get_mut(p)) {
                *slot = *value;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_skips_unmapped() {
        let full = Matrix::from_shape_fn((3, 3), |(i, j)| (10 * i + j) as f64);
        let map = [Some(2), None, Some(0)];

        let m = DofMap::gather_matrix(&map, &full);
        assert_eq!(m.dim(), (3, 3));
        assert_eq!(m[(0, 0)], 22.0);
        assert_eq!(m[(0, 2)], 20.0);
        assert_eq!(m[(2, 0)], 2.0);
        assert_eq!(m[(1, 1)], 0.0);
        assert_eq!(m[(0, 1)], 0.0);

        let v = DofMap::gather_vector(&map, &Vector::from(vec![1.0, 2.0, 3.0]));
        assert_eq!(v, Vector::from(vec![3.0, 0.0, 1.0]));
    }

    #[test]
    fn test_scatter_is_inverse_on_mapped_entries() {
        let map = [Some(1), None, Some(0)];
        let boundary = Vector::from(vec![5.0, 6.0, 7.0]);
        let condensed = DofMap::scatter_vector(&map, &boundary, 2);
        assert_eq!(condensed, Vector::from(vec![7.0, 5.0]));
    }

    #[test]
    fn test_without_engine_every_entry_is_unmapped() {
        let mut p = Partition::new(7);
        p.add_node(crate::model::Node::new(1, 3, vec![0.0]));
        p.add_external_node(&crate::model::Node::new(2, 3, vec![1.0]));

        let mut map = DofMap::Stale;
        assert_eq!(map.ensure(&p, None), &[None, None, None]);
        assert!(map.is_fresh());
    }
}
