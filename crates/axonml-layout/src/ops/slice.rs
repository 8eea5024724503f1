//! Slice and Tile Handlers
//!
//! Both take one value per axis, so a non-aligned layout only reorders their
//! parameter lists.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, remap_list, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::{OpKind, Operation, SliceParams, TensorId};

/// Layout handler for [`OpKind::Slice`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SliceLayoutInfer;

impl OpLayoutInfer for SliceLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Slice(params) = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Slice"));
        };
        let input = single_input(op)?;
        let pv = ctx.permute_vector(input)?;

        let params = SliceParams {
            start: remap_list(op, &pv, &params.start, "start")?,
            length: remap_list(op, &pv, &params.length, "length")?,
        };

        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, OpKind::Slice(params), &[mapped], &pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "slice"
    }
}

/// Layout handler for [`OpKind::Tile`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TileLayoutInfer;

impl OpLayoutInfer for TileLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Tile { multiples } = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Tile"));
        };
        let input = single_input(op)?;
        let pv = ctx.permute_vector(input)?;
        let multiples = remap_list(op, &pv, multiples, "multiples")?;

        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, OpKind::Tile { multiples }, &[mapped], &pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "tile"
    }
}
