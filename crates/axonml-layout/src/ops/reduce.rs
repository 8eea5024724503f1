//! Reduction Handlers
//!
//! Reduced axes are remapped to their physical positions. When the reduced
//! axes are kept as size 1 the layout passes through unchanged; otherwise the
//! output layout is what remains of the input layout once those axes are gone.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, remap_axes, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{normalize_axis, OpKind, Operation, ReduceParams, TensorId};

/// Layout handler for [`OpKind::Reduce`] and [`OpKind::ArgReduce`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ReduceLayoutInfer;

impl ReduceLayoutInfer {
    fn output_layout(
        op: &Operation,
        pv: &PermuteVector,
        axes: &[i32],
        keep_dims: bool,
    ) -> LayoutResult<PermuteVector> {
        if keep_dims {
            return Ok(pv.clone());
        }
        let mut logical = Vec::with_capacity(axes.len());
        for &axis in axes {
            let resolved = normalize_axis(axis, pv.rank()).ok_or_else(|| {
                LayoutInferError::conflict(op.id, format!("axis {axis} out of range"))
            })?;
            logical.push(resolved);
        }
        pv.drop_axes(&logical)
    }
}

impl OpLayoutInfer for ReduceLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let input = single_input(op)?;
        let pv = ctx.permute_vector(input)?;

        let (kind, out_pv) = match &op.kind {
            OpKind::Reduce(params) => {
                let out_pv = Self::output_layout(op, &pv, &params.axes, params.keep_dims)?;
                let kind = OpKind::Reduce(ReduceParams {
                    op: params.op,
                    axes: remap_axes(op, &pv, &params.axes)?,
                    keep_dims: params.keep_dims,
                });
                (kind, out_pv)
            }
            OpKind::ArgReduce { op: arg, axis } => {
                let out_pv = Self::output_layout(op, &pv, &[*axis], false)?;
                let axis = remap_axes(op, &pv, &[*axis])?[0];
                (OpKind::ArgReduce { op: *arg, axis }, out_pv)
            }
            other => {
                return Err(LayoutInferError::conflict(
                    op.id,
                    format!("reduce handler cannot take {}", other.name()),
                ))
            }
        };

        let mapped = ctx.mapped_tensor(input)?;
        emit_with_layout(op, kind, &[mapped], &out_pv, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "reduce"
    }
}

#[cfg(test)]
mod tests {
    use crate::ops::test_util::{nhwc, SingleOp};
    use crate::PermuteVector;
    use axonml_graph::{ArgReduceOp, OpKind, ReduceOp, ReduceParams};

    fn reduce(axes: Vec<i32>, keep_dims: bool) -> OpKind {
        OpKind::Reduce(ReduceParams {
            op: ReduceOp::Mean,
            axes,
            keep_dims,
        })
    }

    #[test]
    fn test_keep_dims_keeps_layout() {
        let case = SingleOp::new(reduce(vec![1, 2], true))
            .input(&[1, 7, 7, 16], Some(nhwc()))
            .output(&[1, 1, 1, 16]);
        let result = case.run();
        assert_eq!(result.emitted().kind, reduce(vec![2, 3], true));
        assert_eq!(result.output_pv(), nhwc());
        assert_eq!(result.transposes_before(), 0);
    }

    #[test]
    fn test_global_pool_style_reduce_becomes_aligned() {
        let case = SingleOp::new(reduce(vec![1, 2], false))
            .input(&[1, 7, 7, 16], Some(nhwc()))
            .output(&[1, 16]);
        let result = case.run();
        assert_eq!(result.emitted().kind, reduce(vec![2, 3], false));
        assert!(result.output_pv().is_aligned());
        assert_eq!(result.inner.stats.output_transposes, 0);
    }

    #[test]
    fn test_reduce_partial_layout() {
        let pv = PermuteVector::new(vec![2, 0, 1]).unwrap();
        let case = SingleOp::new(reduce(vec![1], false))
            .input(&[4, 5, 6], Some(pv))
            .output(&[4, 6]);
        let result = case.run();
        assert_eq!(result.emitted().kind, reduce(vec![0], false));
        assert_eq!(result.output_pv(), PermuteVector::new(vec![1, 0]).unwrap());
    }

    #[test]
    fn test_arg_reduce_drops_axis() {
        let case = SingleOp::new(OpKind::ArgReduce {
            op: ArgReduceOp::ArgMax,
            axis: -1,
        })
        .input(&[1, 4, 4, 10], Some(nhwc()))
        .output(&[1, 4, 4]);
        let result = case.run();
        assert_eq!(
            result.emitted().kind,
            OpKind::ArgReduce {
                op: ArgReduceOp::ArgMax,
                axis: 1
            }
        );
        assert!(result.output_pv().is_aligned());
    }
}
