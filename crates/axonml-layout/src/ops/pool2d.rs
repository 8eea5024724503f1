//! Pooling Handler
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::conv2d::{check_rank4, native_layout};
use super::{emit_with_layout, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::{DataLayout, OpKind, Operation, Pool2dParams, TensorId};

/// Layout handler for [`OpKind::Pool2d`]. Same treatment as convolution
/// feature maps: emitted as `Nchw`, output recorded in the declared layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pool2dLayoutInfer;

impl OpLayoutInfer for Pool2dLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Pool2d(params) = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Pool2d"));
        };
        let input = single_input(op)?;
        check_rank4(op, ctx, input, "input")?;

        let feature_pv = native_layout(params.layout)?;
        let mapped = ctx.insert_transpose(input, &feature_pv)?;
        let kind = OpKind::Pool2d(Pool2dParams {
            layout: DataLayout::Nchw,
            ..params.clone()
        });
        emit_with_layout(op, kind, &[mapped], &feature_pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "pool2d"
    }
}
