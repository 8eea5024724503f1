//! Fallback Handler
//!
//! Used for operators whose semantics depend on the full element order
//! (reshape, matmul, fully connected, gather, ...). Every input is restored
//! to its declared layout and the operator is emitted unchanged.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layouts, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::LayoutResult;
use crate::permute::PermuteVector;
use axonml_graph::{Operation, TensorId};

/// Layout-opaque handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLayoutInfer;

impl OpLayoutInfer for DefaultLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let mut inputs = Vec::with_capacity(op.inputs().len());
        for &input in op.inputs() {
            inputs.push(ctx.align_input(input)?);
        }

        let source = ctx.source();
        let mut layouts = Vec::with_capacity(op.outputs().len());
        for &out in op.outputs() {
            layouts.push(PermuteVector::identity(source.spec(out)?.rank()));
        }
        emit_with_layouts(op, op.kind.clone(), &inputs, &layouts, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "default"
    }
}
