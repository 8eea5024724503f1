//! Operator Layout Handlers
//!
//! One handler per operator family. A handler reads the permute vectors of
//! its operation's inputs, decides whether the layout can be absorbed by
//! remapping axis parameters or must be materialised with a transpose, emits
//! the equivalent operation into the new graph and records the permute
//! vectors of the outputs.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

mod axis;
mod concat;
mod conv2d;
mod default;
mod elementwise;
mod pad;
mod pool2d;
mod reduce;
mod slice;
mod transpose;

pub use axis::AxisLayoutInfer;
pub use concat::{ConcatLayoutInfer, SplitLayoutInfer};
pub use conv2d::Conv2dLayoutInfer;
pub use default::DefaultLayoutInfer;
pub use elementwise::{BinaryLayoutInfer, ElementwiseLayoutInfer};
pub use pad::PadLayoutInfer;
pub use pool2d::Pool2dLayoutInfer;
pub use reduce::ReduceLayoutInfer;
pub use slice::{SliceLayoutInfer, TileLayoutInfer};
pub use transpose::TransposeLayoutInfer;

#[cfg(test)]
pub(crate) mod test_util;

use crate::context::{output_shape_conflict, LayoutInferContext};
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{OpId, OpKind, Operation, TensorId};
use std::fmt::Debug;

// =============================================================================
// Handler Trait
// =============================================================================

/// Layout rule for one family of operator kinds.
pub trait OpLayoutInfer: Debug + Send + Sync {
    /// Emits the layout-adjusted equivalent of `op` into the context's graph.
    ///
    /// Every input of `op` is resolved when this is called. Implementations
    /// bind a permute vector to every output of `op` and push those outputs
    /// onto `next_tensors`.
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()>;

    /// Returns the handler name.
    fn name(&self) -> &str;
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Creates `kind` in the new graph over already-mapped `inputs`, allocates
/// outputs laid out by `pv`, binds `pv` to every source output and queues them.
pub(crate) fn emit_with_layout(
    op: &Operation,
    kind: OpKind,
    inputs: &[TensorId],
    pv: &PermuteVector,
    ctx: &mut LayoutInferContext<'_>,
    next_tensors: &mut Vec<TensorId>,
) -> LayoutResult<OpId> {
    let outputs = ctx.create_outputs_tensor(op, pv)?;
    let new_op = emit(kind, inputs, &outputs, ctx)?;
    for &out in op.outputs() {
        ctx.set_permute_vector(out, pv.clone())?;
        next_tensors.push(out);
    }
    Ok(new_op)
}

/// Like [`emit_with_layout`] with one permute vector per output.
pub(crate) fn emit_with_layouts(
    op: &Operation,
    kind: OpKind,
    inputs: &[TensorId],
    pvs: &[PermuteVector],
    ctx: &mut LayoutInferContext<'_>,
    next_tensors: &mut Vec<TensorId>,
) -> LayoutResult<OpId> {
    if pvs.len() != op.outputs().len() {
        return Err(LayoutInferError::conflict(
            op.id,
            format!("{} layouts for {} outputs", pvs.len(), op.outputs().len()),
        ));
    }
    let mut outputs = Vec::with_capacity(pvs.len());
    for (&out, pv) in op.outputs().iter().zip(pvs) {
        let created = ctx
            .create_output_tensor(out, pv)
            .map_err(|e| output_shape_conflict(op, out, e))?;
        outputs.push(created);
    }
    let new_op = emit(kind, inputs, &outputs, ctx)?;
    for (&out, pv) in op.outputs().iter().zip(pvs) {
        ctx.set_permute_vector(out, pv.clone())?;
        next_tensors.push(out);
    }
    Ok(new_op)
}

fn emit(
    kind: OpKind,
    inputs: &[TensorId],
    outputs: &[TensorId],
    ctx: &mut LayoutInferContext<'_>,
) -> LayoutResult<OpId> {
    let graph = ctx.graph_mut();
    let new_op = graph.create_operation(kind);
    graph.bind_inputs(new_op, inputs)?;
    graph.bind_outputs(new_op, outputs)?;
    ctx.record_emitted();
    Ok(new_op)
}

/// Returns the only input of `op`.
pub(crate) fn single_input(op: &Operation) -> LayoutResult<TensorId> {
    match op.inputs() {
        [input] => Ok(*input),
        inputs => Err(LayoutInferError::conflict(
            op.id,
            format!("{} expects 1 input, found {}", op.kind.name(), inputs.len()),
        )),
    }
}

/// Returns the first input of `op`.
pub(crate) fn first_input(op: &Operation) -> LayoutResult<TensorId> {
    op.inputs().first().copied().ok_or_else(|| {
        LayoutInferError::conflict(op.id, format!("{} has no inputs", op.kind.name()))
    })
}

/// Remaps an axis-indexed list, reporting rank problems against `op`.
pub(crate) fn remap_list<T: Clone>(
    op: &Operation,
    pv: &PermuteVector,
    values: &[T],
    what: &str,
) -> LayoutResult<Vec<T>> {
    pv.map_axis_list(values)
        .map_err(|e| LayoutInferError::conflict(op.id, format!("{what}: {e}")))
}

/// Remaps a single axis parameter, reporting range problems against `op`.
pub(crate) fn remap_axis(op: &Operation, pv: &PermuteVector, axis: i32) -> LayoutResult<i32> {
    let physical = pv
        .map_axis(axis)
        .map_err(|e| LayoutInferError::conflict(op.id, e.to_string()))?;
    i32::try_from(physical).map_err(|_| {
        LayoutInferError::conflict(op.id, format!("axis {physical} does not fit in i32"))
    })
}

/// Remaps several axis parameters.
pub(crate) fn remap_axes(op: &Operation, pv: &PermuteVector, axes: &[i32]) -> LayoutResult<Vec<i32>> {
    axes.iter().map(|&a| remap_axis(op, pv, a)).collect()
}
