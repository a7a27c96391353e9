//! Consolidated sparse weight matrix and its application.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{RegridError, Result};
use crate::options::ZeroRegion;

/// Destination rows handled per parallel task in [`SparseWeightMatrix::apply`]
const ROW_BLOCK: usize = 1024;

/// One `(src, dst, weight)` triple
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub src: usize,
    pub dst: usize,
    pub weight: f64,
}

impl WeightEntry {
    pub fn new(src: usize, dst: usize, weight: f64) -> Self {
        Self { src, dst, weight }
    }
}

#[derive(Serialize, Deserialize)]
pub(crate) struct MatrixRepr {
    pub(crate) n_src: usize,
    pub(crate) n_dst: usize,
    pub(crate) entries: Vec<WeightEntry>,
}

/// Sparse interpolation matrix in compressed-row form over destinations.
///
/// Entries are sorted by `(dst, src)`, pairs are unique and no stored weight
/// is exactly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixRepr", into = "MatrixRepr")]
pub struct SparseWeightMatrix {
    n_src: usize,
    n_dst: usize,
    entries: Vec<WeightEntry>,
    row_offsets: Vec<usize>,
}

impl TryFrom<MatrixRepr> for SparseWeightMatrix {
    type Error = RegridError;

    fn try_from(repr: MatrixRepr) -> Result<Self> {
        Self::from_entries(repr.n_src, repr.n_dst, repr.entries)
    }
}

impl From<SparseWeightMatrix> for MatrixRepr {
    fn from(matrix: SparseWeightMatrix) -> Self {
        MatrixRepr {
            n_src: matrix.n_src,
            n_dst: matrix.n_dst,
            entries: matrix.entries,
        }
    }
}

impl SparseWeightMatrix {
    /// A matrix without entries
    pub fn empty(n_src: usize, n_dst: usize) -> Self {
        Self {
            n_src,
            n_dst,
            entries: Vec::new(),
            row_offsets: vec![0; n_dst + 1],
        }
    }

    /// Consolidate raw triples: sort by `(dst, src)`, sum duplicate pairs and
    /// drop exact zeros
    pub fn from_entries(n_src: usize, n_dst: usize, mut entries: Vec<WeightEntry>) -> Result<Self> {
        if n_dst == usize::MAX {
            return Err(RegridError::WeightFile {
                message: format!("Destination count {} is out of range", n_dst),
            });
        }
        if let Some(bad) = entries.iter().find(|e| e.src >= n_src || e.dst >= n_dst) {
            return Err(RegridError::WeightFile {
                message: format!(
                    "Entry ({}, {}) is outside a {} x {} matrix",
                    bad.src, bad.dst, n_src, n_dst
                ),
            });
        }
        if let Some(bad) = entries.iter().find(|e| !e.weight.is_finite()) {
            return Err(RegridError::WeightFile {
                message: format!("Entry ({}, {}) has weight {}", bad.src, bad.dst, bad.weight),
            });
        }

        entries.par_sort_by(|a, b| (a.dst, a.src).cmp(&(b.dst, b.src)));

        let mut merged: Vec<WeightEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            match merged.last_mut() {
                Some(last) if last.dst == entry.dst && last.src == entry.src => {
                    last.weight += entry.weight;
                }
                _ => merged.push(entry),
            }
        }
        merged.retain(|e| e.weight != 0.0);

        Ok(Self::from_sorted(n_src, n_dst, merged))
    }

    fn from_sorted(n_src: usize, n_dst: usize, entries: Vec<WeightEntry>) -> Self {
        let mut row_offsets = vec![0usize; n_dst + 1];
        for entry in &entries {
            row_offsets[entry.dst + 1] += 1;
        }
        for d in 0..n_dst {
            row_offsets[d + 1] += row_offsets[d];
        }
        Self {
            n_src,
            n_dst,
            entries,
            row_offsets,
        }
    }

    pub fn n_src(&self) -> usize {
        self.n_src
    }

    pub fn n_dst(&self) -> usize {
        self.n_dst
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in `(dst, src)` order
    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    /// Entries of one destination row, in source order
    pub fn row(&self, dst: usize) -> &[WeightEntry] {
        &self.entries[self.row_offsets[dst]..self.row_offsets[dst + 1]]
    }

    /// Whether the destination has at least one entry
    pub fn has_row(&self, dst: usize) -> bool {
        self.row_offsets[dst + 1] > self.row_offsets[dst]
    }

    /// Sum of weights per destination
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_dst)
            .map(|d| self.row(d).iter().map(|e| e.weight).sum())
            .collect()
    }

    /// Sum of weights per source
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_src];
        for entry in &self.entries {
            sums[entry.src] += entry.weight;
        }
        sums
    }

    /// Keep only entries satisfying `keep`
    pub fn retain(self, keep: impl Fn(&WeightEntry) -> bool) -> Self {
        let entries = self.entries.into_iter().filter(|e| keep(e)).collect();
        Self::from_sorted(self.n_src, self.n_dst, entries)
    }

    /// Drop whole destination rows for which `drop_row` returns true
    pub fn drop_rows(self, drop_row: impl Fn(usize, &[WeightEntry]) -> bool) -> Self {
        let mut entries = Vec::with_capacity(self.entries.len());
        for d in 0..self.n_dst {
            let row = self.row(d);
            if !row.is_empty() && !drop_row(d, row) {
                entries.extend_from_slice(row);
            }
        }
        Self::from_sorted(self.n_src, self.n_dst, entries)
    }

    /// Rescale every weight; entries that become exactly zero are dropped
    pub fn map_weights(self, f: impl Fn(&WeightEntry) -> f64) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|e| WeightEntry::new(e.src, e.dst, f(e)))
            .filter(|e| e.weight != 0.0)
            .collect();
        Self::from_sorted(self.n_src, self.n_dst, entries)
    }

    /// Apply the matrix: zero `dst` according to `zero_region`, then
    /// `dst[j] += Σ w(i, j) · src[i]`.
    ///
    /// Rows are summed in source order on disjoint destination blocks, so the
    /// result does not depend on the thread count.
    pub fn apply(&self, src: &[f64], dst: &mut [f64], zero_region: ZeroRegion) -> Result<()> {
        if src.len() != self.n_src || dst.len() != self.n_dst {
            return Err(RegridError::incompatible(format!(
                "Weight matrix is {} x {} but buffers have {} source and {} destination values",
                self.n_src,
                self.n_dst,
                src.len(),
                dst.len()
            )));
        }

        dst.par_chunks_mut(ROW_BLOCK)
            .enumerate()
            .for_each(|(block, chunk)| {
                let base = block * ROW_BLOCK;
                for (k, value) in chunk.iter_mut().enumerate() {
                    let row = self.row(base + k);
                    match zero_region {
                        ZeroRegion::Total => *value = 0.0,
                        ZeroRegion::Select if !row.is_empty() => *value = 0.0,
                        _ => {}
                    }
                    if row.is_empty() {
                        continue;
                    }
                    let mut acc = 0.0;
                    for entry in row {
                        acc += entry.weight * src[entry.src];
                    }
                    *value += acc;
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseWeightMatrix {
        SparseWeightMatrix::from_entries(
            3,
            3,
            vec![
                WeightEntry::new(2, 1, 0.25),
                WeightEntry::new(0, 0, 1.0),
                WeightEntry::new(1, 1, 0.5),
                WeightEntry::new(2, 1, 0.25),
                WeightEntry::new(1, 0, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_consolidation() {
        let m = sample();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(1), &[WeightEntry::new(1, 1, 0.5), WeightEntry::new(2, 1, 0.5)]);
        assert!(!m.has_row(2));
        assert_eq!(m.row_sums(), vec![1.0, 1.0, 0.0]);
        assert_eq!(m.column_sums(), vec![1.0, 0.5, 0.5]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = SparseWeightMatrix::from_entries(2, 2, vec![WeightEntry::new(2, 0, 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_zero_regions() {
        let m = sample();
        let src = [2.0, 4.0, 8.0];

        let mut dst = [9.0, 9.0, 9.0];
        m.apply(&src, &mut dst, ZeroRegion::Total).unwrap();
        assert_eq!(dst, [2.0, 6.0, 0.0]);

        let mut dst = [9.0, 9.0, 9.0];
        m.apply(&src, &mut dst, ZeroRegion::Select).unwrap();
        assert_eq!(dst, [2.0, 6.0, 9.0]);

        let mut dst = [9.0, 9.0, 9.0];
        m.apply(&src, &mut dst, ZeroRegion::Empty).unwrap();
        assert_eq!(dst, [11.0, 15.0, 9.0]);
    }

    #[test]
    fn test_apply_checks_lengths() {
        let m = sample();
        let mut dst = [0.0; 2];
        assert!(m.apply(&[0.0; 3], &mut dst, ZeroRegion::Total).is_err());
    }

    #[test]
    fn test_drop_rows_and_retain() {
        let m = sample().drop_rows(|d, _| d == 0);
        assert!(!m.has_row(0));
        assert_eq!(m.nnz(), 2);
        let m = m.retain(|e| e.src != 2);
        assert_eq!(m.entries(), &[WeightEntry::new(1, 1, 0.5)]);
    }

    #[test]
    fn test_serde_rebuilds_offsets() {
        let m = sample();
        let json = serde_json::to_string(&m).unwrap();
        let back: SparseWeightMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
        assert_eq!(back.row(1).len(), 2);
    }
}
