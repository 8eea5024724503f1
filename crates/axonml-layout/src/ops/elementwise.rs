//! Elementwise Handlers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{Operation, TensorAttr, TensorId};

/// Unary elementwise operators: the output keeps the input's layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElementwiseLayoutInfer;

impl OpLayoutInfer for ElementwiseLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let input = single_input(op)?;
        let pv = ctx.permute_vector(input)?;
        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, op.kind.clone(), &[mapped], &pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "elementwise"
    }
}

/// Binary elementwise operators.
///
/// Inputs of equal rank are brought to the layout of the first non-constant
/// input, which the output inherits. Broadcasting between different ranks
/// aligns the axes from the back, so every input is restored to its declared
/// layout instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryLayoutInfer;

impl OpLayoutInfer for BinaryLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let source = ctx.source();
        let inputs = op.inputs();
        let Some(&first) = inputs.first() else {
            return Err(LayoutInferError::conflict(op.id, "binary operator without inputs"));
        };
        let out_rank = match op.outputs().first() {
            Some(&out) => source.spec(out)?.rank(),
            None => return Err(LayoutInferError::conflict(op.id, "binary operator without outputs")),
        };

        let mut ranks = Vec::with_capacity(inputs.len());
        for &input in inputs {
            ranks.push(source.spec(input)?.rank());
        }
        let same_rank = ranks.iter().all(|&r| r == out_rank);

        let required = if same_rank {
            let mut anchor = first;
            for &input in inputs {
                if source.spec(input)?.attr != TensorAttr::Constant {
                    anchor = input;
                    break;
                }
            }
            ctx.permute_vector(anchor)?
        } else {
            PermuteVector::identity(out_rank)
        };

        let mut mapped = Vec::with_capacity(inputs.len());
        for (&input, &rank) in inputs.iter().zip(&ranks) {
            let target = if same_rank {
                required.clone()
            } else {
                PermuteVector::identity(rank)
            };
            mapped.push(ctx.insert_transpose(input, &target)?);
        }

        emit_with_layout(op, op.kind.clone(), &mapped, &required, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "binary"
    }
}
