//! Single-Axis Operator Handlers
//!
//! Operators whose only layout dependence is an axis parameter: the axis is
//! moved to its physical position and the output keeps the input layout.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, first_input, remap_axes, remap_axis, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::{OpKind, Operation, TensorId};

/// Layout handler for softmax, log-softmax, layer norm, channel shuffle and
/// reverse.
#[derive(Debug, Default, Clone, Copy)]
pub struct AxisLayoutInfer;

impl OpLayoutInfer for AxisLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let data = first_input(op)?;
        let pv = ctx.permute_vector(data)?;

        let kind = match &op.kind {
            OpKind::Softmax { axis, beta } => OpKind::Softmax {
                axis: remap_axis(op, &pv, *axis)?,
                beta: *beta,
            },
            OpKind::LogSoftmax { axis, beta } => OpKind::LogSoftmax {
                axis: remap_axis(op, &pv, *axis)?,
                beta: *beta,
            },
            OpKind::LayerNorm { axis, eps } => OpKind::LayerNorm {
                axis: remap_axis(op, &pv, *axis)?,
                eps: *eps,
            },
            OpKind::ShuffleChannel { groups, axis } => OpKind::ShuffleChannel {
                groups: *groups,
                axis: remap_axis(op, &pv, *axis)?,
            },
            OpKind::Reverse { axes } => OpKind::Reverse {
                axes: remap_axes(op, &pv, axes)?,
            },
            other => {
                return Err(LayoutInferError::conflict(
                    op.id,
                    format!("axis handler cannot take {}", other.name()),
                ))
            }
        };

        let mut inputs = Vec::with_capacity(op.inputs().len());
        inputs.push(ctx.mapped_tensor(data)?);
        // Scale and bias of a layer norm are indexed along the normalised axis only.
        for &extra in &op.inputs()[1..] {
            inputs.push(ctx.align_input(extra)?);
        }

        emit_with_layout(op, kind, &inputs, &pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "axis"
    }
}
