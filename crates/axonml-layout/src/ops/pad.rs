//! Pad Handler
//!
//! Padding amounts are given per logical axis; under a non-aligned layout
//! they are moved to the physical axis each logical axis is stored at. The
//! output keeps the input's layout and no transpose is inserted.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, remap_list, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::{OpKind, Operation, PadParams, TensorId};

/// Layout handler for [`OpKind::Pad`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PadLayoutInfer;

impl OpLayoutInfer for PadLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Pad(params) = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Pad"));
        };
        let input = single_input(op)?;
        let input_pv = ctx.permute_vector(input)?;

        let mut params: PadParams = params.clone();
        if !input_pv.is_aligned() {
            params.front_size = remap_list(op, &input_pv, &params.front_size, "front_size")?;
            params.back_size = remap_list(op, &input_pv, &params.back_size, "back_size")?;
        }

        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, OpKind::Pad(params), &[mapped], &input_pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "pad"
    }
}
