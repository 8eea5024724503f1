//! Layout Inference Context
//!
//! Per-run state shared by the driver and the operator handlers: the graph
//! under construction, the source-to-new tensor map, the permute vector of
//! every resolved source tensor and the queue of tensors still to propagate.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::config::LayoutInferConfig;
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{Graph, OpId, OpKind, Operation, TensorAttr, TensorId};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::trace;

// =============================================================================
// Statistics
// =============================================================================

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInferStats {
    /// Source operations dispatched to a handler.
    pub ops_visited: usize,
    /// Operations created in the new graph, transposes included.
    pub ops_emitted: usize,
    /// Transposes inserted in front of operations.
    pub transposes_inserted: usize,
    /// Transposes appended to restore graph outputs.
    pub output_transposes: usize,
    /// Source transposes absorbed into a permute vector.
    pub transposes_folded: usize,
}

// =============================================================================
// Context
// =============================================================================

/// State of one layout inference run.
#[derive(Debug)]
pub struct LayoutInferContext<'a> {
    source: &'a Graph,
    config: LayoutInferConfig,
    graph: Graph,
    tensor_map: FxHashMap<TensorId, TensorId>,
    permutes: FxHashMap<TensorId, PermuteVector>,
    // (source tensor, target layout) -> new-graph tensor already stored that way
    relayouts: FxHashMap<(TensorId, PermuteVector), TensorId>,
    pending: VecDeque<TensorId>,
    visited: FxHashSet<OpId>,
    stats: LayoutInferStats,
}

impl<'a> LayoutInferContext<'a> {
    /// Creates a context that rewrites `source` into an empty graph.
    pub fn new(source: &'a Graph) -> Self {
        Self::with_config(source, LayoutInferConfig::default())
    }

    /// Creates a context with explicit options.
    pub fn with_config(source: &'a Graph, config: LayoutInferConfig) -> Self {
        Self {
            source,
            config,
            graph: Graph::new(),
            tensor_map: FxHashMap::default(),
            permutes: FxHashMap::default(),
            relayouts: FxHashMap::default(),
            pending: VecDeque::new(),
            visited: FxHashSet::default(),
            stats: LayoutInferStats::default(),
        }
    }

    /// Returns the graph being rewritten.
    pub fn source(&self) -> &'a Graph {
        self.source
    }

    /// Returns the options of this run.
    pub fn config(&self) -> &LayoutInferConfig {
        &self.config
    }

    /// Returns the graph under construction.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Returns the graph under construction for mutation.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// Returns the run statistics.
    pub fn stats(&self) -> &LayoutInferStats {
        &self.stats
    }

    // -------------------------------------------------------------------------
    // Permute vectors and tensor mapping
    // -------------------------------------------------------------------------

    /// Returns the permute vector bound to a source tensor.
    pub fn permute_vector(&self, tensor: TensorId) -> LayoutResult<PermuteVector> {
        self.permutes
            .get(&tensor)
            .cloned()
            .ok_or(LayoutInferError::UnresolvedTensor { tensor })
    }

    /// Binds the permute vector of a source tensor. Each tensor is bound once.
    pub fn set_permute_vector(&mut self, tensor: TensorId, pv: PermuteVector) -> LayoutResult<()> {
        if self.permutes.contains_key(&tensor) {
            return Err(LayoutInferError::AlreadyBound { tensor });
        }
        self.permutes.insert(tensor, pv);
        Ok(())
    }

    /// Returns whether a source tensor has a permute vector.
    pub fn is_resolved(&self, tensor: TensorId) -> bool {
        self.permutes.contains_key(&tensor)
    }

    /// Returns the new-graph tensor standing for a source tensor.
    pub fn mapped_tensor(&self, tensor: TensorId) -> LayoutResult<TensorId> {
        self.tensor_map
            .get(&tensor)
            .copied()
            .ok_or(LayoutInferError::UnresolvedTensor { tensor })
    }

    /// Records the new-graph tensor standing for a source tensor.
    pub fn map_tensor(&mut self, tensor: TensorId, mapped: TensorId) -> LayoutResult<()> {
        if self.tensor_map.contains_key(&tensor) {
            return Err(LayoutInferError::AlreadyBound { tensor });
        }
        self.tensor_map.insert(tensor, mapped);
        Ok(())
    }

    /// Records both the mapped tensor and the permute vector.
    pub fn bind_tensor(
        &mut self,
        tensor: TensorId,
        mapped: TensorId,
        pv: PermuteVector,
    ) -> LayoutResult<()> {
        self.map_tensor(tensor, mapped)?;
        self.set_permute_vector(tensor, pv)
    }

    /// Allocates new-graph tensors for every output of a source operation,
    /// each laid out by `pv`. Graph outputs are created transient; the driver
    /// publishes them once their final layout is known.
    pub fn create_outputs_tensor(
        &mut self,
        op: &Operation,
        pv: &PermuteVector,
    ) -> LayoutResult<Vec<TensorId>> {
        let mut created = Vec::with_capacity(op.outputs().len());
        for &out in op.outputs() {
            let new_tensor = self
                .create_output_tensor(out, pv)
                .map_err(|e| output_shape_conflict(op, out, e))?;
            created.push(new_tensor);
        }
        Ok(created)
    }

    /// Allocates the new-graph tensor for one source output laid out by `pv`.
    pub fn create_output_tensor(
        &mut self,
        tensor: TensorId,
        pv: &PermuteVector,
    ) -> LayoutResult<TensorId> {
        let source = self.source;
        let spec = source.spec(tensor)?;
        let dims = pv.map_axis_list(spec.shape.dims())?;
        let attr = match spec.attr {
            TensorAttr::Output => TensorAttr::Transient,
            other => other,
        };
        let new_tensor = self
            .graph
            .create_tensor(spec.clone().with_shape(dims).with_attr(attr));
        self.map_tensor(tensor, new_tensor)?;
        Ok(new_tensor)
    }

    // -------------------------------------------------------------------------
    // Transposes
    // -------------------------------------------------------------------------

    /// Returns a new-graph tensor holding source tensor `tensor` stored with
    /// layout `to`, inserting a transpose when its current layout differs.
    /// Conversions are shared between consumers.
    pub fn insert_transpose(&mut self, tensor: TensorId, to: &PermuteVector) -> LayoutResult<TensorId> {
        let from = self.permute_vector(tensor)?;
        let mapped = self.mapped_tensor(tensor)?;
        if &from == to {
            return Ok(mapped);
        }
        let key = (tensor, to.clone());
        if let Some(&existing) = self.relayouts.get(&key) {
            return Ok(existing);
        }

        let perm = from.transpose_to(to)?;
        trace!(tensor = %tensor, from = %from, to = %to, perm = %perm, "inserting transpose");
        let converted = self.transpose_new_tensor(mapped, &perm, TensorAttr::Transient)?;
        self.stats.transposes_inserted += 1;
        self.relayouts.insert(key, converted);
        Ok(converted)
    }

    /// Returns a new-graph tensor holding `tensor` in its declared layout.
    pub fn align_input(&mut self, tensor: TensorId) -> LayoutResult<TensorId> {
        let rank = self.source.spec(tensor)?.rank();
        self.insert_transpose(tensor, &PermuteVector::identity(rank))
    }

    /// Emits `transpose(tensor, perm)` into the new graph.
    fn transpose_new_tensor(
        &mut self,
        tensor: TensorId,
        perm: &PermuteVector,
        attr: TensorAttr,
    ) -> LayoutResult<TensorId> {
        let spec = self.graph.spec(tensor)?.clone();
        let dims = perm.gather(spec.shape.dims())?;
        let out = self.graph.create_tensor(spec.with_shape(dims).with_attr(attr));
        let op = self.graph.create_operation(OpKind::Transpose {
            perm: perm.to_u32_vec(),
        });
        self.graph.bind_input(op, tensor)?;
        self.graph.bind_output(op, out)?;
        self.stats.ops_emitted += 1;
        Ok(out)
    }

    /// Publishes a source graph output in the new graph. A non-aligned output
    /// gets a trailing transpose into a fresh output tensor, after which the
    /// tensor is recorded as aligned. An aligned output whose tensor is
    /// already a new-graph input, constant or output is copied through an
    /// identity transpose so every source output is published on its own
    /// tensor. Returns the published tensor.
    pub fn restore_output(&mut self, tensor: TensorId) -> LayoutResult<TensorId> {
        let pv = self.permute_vector(tensor)?;
        let mapped = self.mapped_tensor(tensor)?;
        let shared = self.is_boundary(mapped)?;
        if pv.is_aligned() && !shared {
            self.graph.register_output(mapped)?;
            return Ok(mapped);
        }

        let identity = PermuteVector::identity(pv.rank());
        let perm = pv.transpose_to(&identity)?;
        trace!(tensor = %tensor, perm = %perm, shared, "restoring output layout");
        let restored = self.transpose_new_tensor(mapped, &perm, TensorAttr::Output)?;
        self.graph.register_output(restored)?;
        self.stats.output_transposes += 1;

        self.tensor_map.insert(tensor, restored);
        self.permutes.insert(tensor, identity);
        Ok(restored)
    }

    /// Returns whether a new-graph tensor is already a graph input, constant
    /// or published output.
    fn is_boundary(&self, mapped: TensorId) -> LayoutResult<bool> {
        Ok(self.graph.spec(mapped)?.attr == TensorAttr::Constant
            || self.graph.inputs().contains(&mapped)
            || self.graph.outputs().contains(&mapped))
    }

    // -------------------------------------------------------------------------
    // Traversal bookkeeping
    // -------------------------------------------------------------------------

    /// Queues a resolved source tensor for propagation.
    pub fn push_pending(&mut self, tensor: TensorId) {
        self.pending.push_back(tensor);
    }

    /// Takes the oldest queued tensor.
    pub fn pop_pending(&mut self) -> Option<TensorId> {
        self.pending.pop_front()
    }

    /// Returns the number of queued tensors.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Marks a source operation as emitted. Returns `false` if it already was.
    pub fn mark_visited(&mut self, op: OpId) -> bool {
        let inserted = self.visited.insert(op);
        if inserted {
            self.stats.ops_visited += 1;
        }
        inserted
    }

    /// Returns whether a source operation was emitted.
    pub fn is_visited(&self, op: OpId) -> bool {
        self.visited.contains(&op)
    }

    /// Returns whether every input of `op` is resolved.
    pub fn is_ready(&self, op: &Operation) -> bool {
        op.inputs().iter().all(|&t| self.is_resolved(t))
    }

    /// Counts an operation created by a handler.
    pub(crate) fn record_emitted(&mut self) {
        self.stats.ops_emitted += 1;
    }

    /// Counts a source transpose absorbed without emitting anything.
    pub(crate) fn record_folded(&mut self) {
        self.stats.transposes_folded += 1;
    }

    /// Consumes the context, returning the new graph, the tensor map, the
    /// permute vectors and the statistics.
    pub fn into_parts(
        self,
    ) -> (
        Graph,
        FxHashMap<TensorId, TensorId>,
        FxHashMap<TensorId, PermuteVector>,
        LayoutInferStats,
    ) {
        (self.graph, self.tensor_map, self.permutes, self.stats)
    }
}

/// Rank mismatches while shaping an output become conflicts of `op`.
pub(crate) fn output_shape_conflict(
    op: &Operation,
    output: TensorId,
    err: LayoutInferError,
) -> LayoutInferError {
    match err {
        LayoutInferError::DimensionMismatch { .. } => {
            LayoutInferError::conflict(op.id, format!("output {output}: {err}"))
        }
        other => other,
    }
}
