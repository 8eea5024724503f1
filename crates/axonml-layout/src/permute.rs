//! Permute Vectors
//!
//! A permute vector records how the logical axes of a tensor are laid out
//! physically: logical axis `i` is stored at physical axis `perm[i]`. The
//! identity vector means the tensor is already in the accelerator's native
//! layout.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::normalize_axis;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Inline capacity; accelerator tensors rarely exceed rank 6.
const INLINE_RANK: usize = 6;

/// Immutable permutation of `0..rank`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<usize>", into = "Vec<usize>")]
pub struct PermuteVector {
    perm: SmallVec<[usize; INLINE_RANK]>,
}

impl PermuteVector {
    /// Creates the identity permutation of the given rank.
    pub fn identity(rank: usize) -> Self {
        Self {
            perm: (0..rank).collect(),
        }
    }

    /// Creates a permutation, rejecting repeated or out-of-range entries.
    pub fn new(perm: Vec<usize>) -> LayoutResult<Self> {
        Self::from_slice(&perm)
    }

    /// Creates a permutation from a slice.
    pub fn from_slice(perm: &[usize]) -> LayoutResult<Self> {
        let mut seen: SmallVec<[bool; INLINE_RANK]> = SmallVec::from_elem(false, perm.len());
        for &axis in perm {
            if axis >= perm.len() || seen[axis] {
                return Err(LayoutInferError::InvalidPermutation(perm.to_vec()));
            }
            seen[axis] = true;
        }
        Ok(Self {
            perm: SmallVec::from_slice(perm),
        })
    }

    /// Returns the number of axes.
    pub fn rank(&self) -> usize {
        self.perm.len()
    }

    /// Returns the raw axis sequence.
    pub fn as_slice(&self) -> &[usize] {
        &self.perm
    }

    /// Returns the axis sequence as `u32`, the width used by operator params.
    pub fn to_u32_vec(&self) -> Vec<u32> {
        self.perm.iter().map(|&a| a as u32).collect()
    }

    /// Returns whether this is the identity permutation.
    pub fn is_aligned(&self) -> bool {
        self.perm.iter().copied().eq(0..self.perm.len())
    }

    /// Returns the permutation equal to applying `self` after `other`:
    /// `result[i] = self[other[i]]`.
    pub fn compose(&self, other: &Self) -> LayoutResult<Self> {
        self.check_rank(other.rank())?;
        Ok(Self {
            perm: other.perm.iter().map(|&axis| self.perm[axis]).collect(),
        })
    }

    /// Returns the permutation undoing `self`.
    pub fn inverse(&self) -> Self {
        let mut inv: SmallVec<[usize; INLINE_RANK]> = SmallVec::from_elem(0, self.rank());
        for (logical, &physical) in self.perm.iter().enumerate() {
            inv[physical] = logical;
        }
        Self { perm: inv }
    }

    /// Physical position of one logical axis. Negative axes count from the back.
    pub fn map_axis(&self, axis: i32) -> LayoutResult<usize> {
        normalize_axis(axis, self.rank())
            .map(|a| self.perm[a])
            .ok_or(LayoutInferError::AxisOutOfRange {
                axis: i64::from(axis),
                rank: self.rank(),
            })
    }

    /// Physical positions of several logical axes, in the given order.
    pub fn map_axes(&self, axes: &[i32]) -> LayoutResult<Vec<usize>> {
        axes.iter().map(|&a| self.map_axis(a)).collect()
    }

    /// Reindexes per-logical-axis values into physical axis order:
    /// `out[self[i]] = values[i]`.
    pub fn map_axis_list<T: Clone>(&self, values: &[T]) -> LayoutResult<Vec<T>> {
        self.check_rank(values.len())?;
        let mut out = values.to_vec();
        for (logical, value) in values.iter().enumerate() {
            out[self.perm[logical]] = value.clone();
        }
        Ok(out)
    }

    /// Selects values by this permutation: `out[k] = values[self[k]]`. This is
    /// how a transpose with this perm reorders its input's dimensions.
    pub fn gather<T: Clone>(&self, values: &[T]) -> LayoutResult<Vec<T>> {
        self.check_rank(values.len())?;
        Ok(self.perm.iter().map(|&a| values[a].clone()).collect())
    }

    /// Perm of the transpose that turns a tensor stored with `self` into the
    /// same logical tensor stored with `to`.
    pub fn transpose_to(&self, to: &Self) -> LayoutResult<Self> {
        self.compose(&to.inverse())
    }

    /// Permute vector left after removing the given logical axes from both the
    /// logical and the physical tensor.
    pub fn drop_axes(&self, axes: &[usize]) -> LayoutResult<Self> {
        if let Some(&axis) = axes.iter().find(|&&a| a >= self.rank()) {
            return Err(LayoutInferError::AxisOutOfRange {
                axis: axis as i64,
                rank: self.rank(),
            });
        }
        let kept: SmallVec<[usize; INLINE_RANK]> = (0..self.rank())
            .filter(|a| !axes.contains(a))
            .map(|a| self.perm[a])
            .collect();
        // Rank the surviving physical positions to close the gaps.
        let perm = kept
            .iter()
            .map(|&p| kept.iter().filter(|&&q| q < p).count())
            .collect();
        Ok(Self { perm })
    }

    fn check_rank(&self, found: usize) -> LayoutResult<()> {
        if found == self.rank() {
            Ok(())
        } else {
            Err(LayoutInferError::DimensionMismatch {
                expected: self.rank(),
                found,
            })
        }
    }
}

impl TryFrom<Vec<usize>> for PermuteVector {
    type Error = LayoutInferError;

    fn try_from(perm: Vec<usize>) -> LayoutResult<Self> {
        Self::new(perm)
    }
}

impl From<PermuteVector> for Vec<usize> {
    fn from(pv: PermuteVector) -> Self {
        pv.perm.into_vec()
    }
}

impl fmt::Display for PermuteVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.perm.as_slice())
    }
}
