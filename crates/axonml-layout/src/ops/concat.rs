//! Concat and Split Handlers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, first_input, remap_axis, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use axonml_graph::{OpKind, Operation, TensorId};

/// Layout handler for [`OpKind::Concat`].
///
/// Every input is brought to the first input's layout and the concatenation
/// axis follows that layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConcatLayoutInfer;

impl OpLayoutInfer for ConcatLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Concat { axis } = op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Concat"));
        };
        let required = ctx.permute_vector(first_input(op)?)?;

        let mut mapped = Vec::with_capacity(op.inputs().len());
        for &input in op.inputs() {
            let rank = ctx.source().spec(input)?.rank();
            if rank != required.rank() {
                return Err(LayoutInferError::conflict(
                    op.id,
                    format!("concat input {input} has rank {rank}, expected {}", required.rank()),
                ));
            }
            mapped.push(ctx.insert_transpose(input, &required)?);
        }

        let axis = remap_axis(op, &required, axis)?;
        emit_with_layout(op, OpKind::Concat { axis }, &mapped, &required, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "concat"
    }
}

/// Layout handler for [`OpKind::Split`]. Every piece keeps the input's layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SplitLayoutInfer;

impl OpLayoutInfer for SplitLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Split { axis, slices } = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Split"));
        };
        let input = single_input(op)?;
        let pv = ctx.permute_vector(input)?;
        let kind = OpKind::Split {
            axis: remap_axis(op, &pv, *axis)?,
            slices: slices.clone(),
        };

        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, kind, &[mapped], &pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "split"
    }
}

#[cfg(test)]
mod tests {
    use crate::ops::test_util::{nhwc, SingleOp};
    use crate::LayoutInferError;
    use axonml_graph::OpKind;

    #[test]
    fn test_concat_follows_first_input() {
        let case = SingleOp::new(OpKind::Concat { axis: 3 })
            .input(&[1, 4, 4, 3], Some(nhwc()))
            .input(&[1, 4, 4, 5], None)
            .output(&[1, 4, 4, 8]);
        let result = case.run();

        assert_eq!(result.emitted().kind, OpKind::Concat { axis: 1 });
        assert_eq!(result.transposes_before(), 1);
        assert_eq!(result.output_pv(), nhwc());
    }

    #[test]
    fn test_concat_negative_axis() {
        let case = SingleOp::new(OpKind::Concat { axis: -1 })
            .input(&[1, 4, 4, 3], Some(nhwc()))
            .input(&[1, 4, 4, 3], Some(nhwc()))
            .output(&[1, 4, 4, 6]);
        let result = case.run();
        assert_eq!(result.emitted().kind, OpKind::Concat { axis: 1 });
        assert_eq!(result.transposes_before(), 0);
    }

    #[test]
    fn test_concat_rank_mismatch() {
        let case = SingleOp::new(OpKind::Concat { axis: 0 })
            .input(&[2, 3], None)
            .input(&[2, 3, 1], None)
            .output(&[4, 3]);
        assert!(matches!(
            case.try_run(),
            Err(LayoutInferError::LayoutConflict { .. })
        ));
    }

    #[test]
    fn test_split_outputs_share_layout() {
        let case = SingleOp::new(OpKind::Split {
            axis: 1,
            slices: vec![2, 2],
        })
        .input(&[1, 4, 4, 3], Some(nhwc()))
        .output(&[1, 2, 4, 3])
        .output(&[1, 2, 4, 3]);
        let result = case.run();

        assert_eq!(
            result.emitted().kind,
            OpKind::Split {
                axis: 2,
                slices: vec![2, 2]
            }
        );
        assert_eq!(result.output_pv_of(0), nhwc());
        assert_eq!(result.output_pv_of(1), nhwc());
        assert_eq!(result.inner.stats.output_transposes, 2);
    }
}
