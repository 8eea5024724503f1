//! Convolution Handler
//!
//! Convolutions are emitted in the native `Nchw`/`Oihw` form. Feature maps
//! and weights are brought to that form, and the output is recorded as a
//! native buffer seen through the declared layout. A chain of operators
//! declared `Nhwc` therefore runs natively with no transposes between them.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{Conv2dParams, DataLayout, KernelLayout, OpKind, Operation, TensorId};

/// Permute vector of a native buffer viewed in `layout`.
pub(crate) fn native_layout(layout: DataLayout) -> LayoutResult<PermuteVector> {
    PermuteVector::from_slice(&layout.native_axes())
}

fn native_kernel_layout(layout: KernelLayout) -> LayoutResult<PermuteVector> {
    PermuteVector::from_slice(&layout.native_axes())
}

/// Fails unless `tensor` is a rank-4 tensor.
pub(crate) fn check_rank4(
    op: &Operation,
    ctx: &LayoutInferContext<'_>,
    tensor: TensorId,
    what: &str,
) -> LayoutResult<()> {
    let rank = ctx.source().spec(tensor)?.rank();
    if rank != 4 {
        return Err(LayoutInferError::conflict(
            op.id,
            format!("{what} {tensor} has rank {rank}, expected 4"),
        ));
    }
    Ok(())
}

/// Layout handler for [`OpKind::Conv2d`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Conv2dLayoutInfer;

impl OpLayoutInfer for Conv2dLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Conv2d(params) = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Conv2d"));
        };
        let (data, weight, bias) = match op.inputs() {
            [data, weight] => (*data, *weight, None),
            [data, weight, bias] => (*data, *weight, Some(*bias)),
            inputs => {
                return Err(LayoutInferError::conflict(
                    op.id,
                    format!("conv2d expects 2 or 3 inputs, found {}", inputs.len()),
                ))
            }
        };
        check_rank4(op, ctx, data, "input")?;
        check_rank4(op, ctx, weight, "weight")?;

        let feature_pv = native_layout(params.layout)?;
        let mut inputs = vec![
            ctx.insert_transpose(data, &feature_pv)?,
            ctx.insert_transpose(weight, &native_kernel_layout(params.kernel_layout)?)?,
        ];
        if let Some(bias) = bias {
            inputs.push(ctx.align_input(bias)?);
        }

        let kind = OpKind::Conv2d(Conv2dParams {
            layout: DataLayout::Nchw,
            kernel_layout: KernelLayout::Oihw,
            ..params.clone()
        });
        emit_with_layout(op, kind, &inputs, &feature_pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "conv2d"
    }
}
