//! Transpose Handler
//!
//! A transpose only changes which logical axis sits where, which is exactly
//! what a permute vector records. With folding enabled the source transpose
//! emits nothing: its output is the input's buffer under the composed layout.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use super::{emit_with_layout, single_input, OpLayoutInfer};
use crate::context::LayoutInferContext;
use crate::error::{LayoutInferError, LayoutResult};
use crate::permute::PermuteVector;
use axonml_graph::{OpKind, Operation, TensorId};
use tracing::trace;

/// Layout handler for [`OpKind::Transpose`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TransposeLayoutInfer;

impl TransposeLayoutInfer {
    fn permutation(op: &Operation, perm: &[u32]) -> LayoutResult<PermuteVector> {
        let axes: Vec<usize> = perm.iter().map(|&p| p as usize).collect();
        PermuteVector::new(axes)
            .map_err(|e| LayoutInferError::conflict(op.id, format!("transpose perm: {e}")))
    }
}

impl OpLayoutInfer for TransposeLayoutInfer {
    fn on_inputs(
        &self,
        op: &Operation,
        ctx: &mut LayoutInferContext<'_>,
        next_tensors: &mut Vec<TensorId>,
    ) -> LayoutResult<()> {
        let OpKind::Transpose { perm } = &op.kind else {
            return Err(LayoutInferError::conflict(op.id, "expected Transpose"));
        };
        let input = single_input(op)?;
        let perm = Self::permutation(op, perm)?;
        let input_pv = ctx.permute_vector(input)?;
        if perm.rank() != input_pv.rank() {
            return Err(LayoutInferError::conflict(
                op.id,
                format!("perm {perm} does not match input rank {}", input_pv.rank()),
            ));
        }

        if ctx.config().fold_transposes {
            let [output] = op.outputs() else {
                return Err(LayoutInferError::conflict(op.id, "transpose expects 1 output"));
            };
            let folded = input_pv.compose(&perm)?;
            trace!(op = %op.id, perm = %perm, layout = %folded, "folding transpose");
            let mapped = ctx.mapped_tensor(input)?;
            ctx.bind_tensor(*output, mapped, folded)?;
            ctx.record_folded();
            next_tensors.push(*output);
            return Ok(());
        }

        let aligned = ctx.align_input(input)?;
        let identity = PermuteVector::identity(perm.rank());
        emit_with_layout(op, op.kind.clone(), &[aligned], &identity, ctx, next_tensors)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "transpose"
    }
}

#[cfg(test)]
mod tests {
    use crate::ops::test_util::{nhwc, SingleOp};
    use crate::{LayoutInferConfig, LayoutInferError, PermuteVector};
    use axonml_graph::{OpKind, OpType};

    #[test]
    fn test_transpose_folds_into_layout() {
        let case = SingleOp::new(OpKind::Transpose {
            perm: vec![0, 3, 1, 2],
        })
        .input(&[1, 8, 8, 3], Some(nhwc()))
        .output(&[1, 3, 8, 8]);
        let result = case.run();

        // nhwc composed with its inverse leaves the buffer in declared order.
        assert!(result.output_pv().is_aligned());
        assert_eq!(result.inner.stats.transposes_folded, 1);
        assert_eq!(result.inner.stats.transposes_inserted, 0);

        // The folded output shares the input buffer, so it is published
        // through an identity copy.
        let graph = &result.inner.graph;
        assert_eq!(graph.count_ops(OpType::Transpose), 1);
        assert_eq!(result.inner.restore_ops.len(), 1);
        let copy = graph.operation(result.inner.restore_ops[0]).unwrap();
        assert_eq!(copy.kind, OpKind::Transpose { perm: vec![0, 1, 2, 3] });
        assert_ne!(graph.outputs(), graph.inputs());
        assert_eq!(graph.spec(graph.outputs()[0]).unwrap().shape.dims(), &[1, 3, 8, 8]);
    }

    #[test]
    fn test_folded_transpose_restored_at_output() {
        let case = SingleOp::new(OpKind::Transpose {
            perm: vec![1, 0],
        })
        .input(&[2, 3], None)
        .output(&[3, 2]);
        let result = case.run();

        assert_eq!(result.output_pv(), PermuteVector::new(vec![1, 0]).unwrap());
        assert_eq!(result.inner.stats.output_transposes, 1);
        assert_eq!(result.inner.graph.count_ops(OpType::Transpose), 1);
    }

    #[test]
    fn test_transpose_kept_without_folding() {
        let case = SingleOp::new(OpKind::Transpose {
            perm: vec![0, 3, 1, 2],
        })
        .input(&[1, 8, 8, 3], Some(nhwc()))
        .output(&[1, 3, 8, 8])
        .config(LayoutInferConfig::new().fold_transposes(false));
        let result = case.run();

        assert_eq!(
            result.emitted().kind,
            OpKind::Transpose {
                perm: vec![0, 3, 1, 2]
            }
        );
        assert_eq!(result.transposes_before(), 1);
        assert!(result.output_pv().is_aligned());
    }

    #[test]
    fn test_invalid_perm() {
        let case = SingleOp::new(OpKind::Transpose { perm: vec![0, 0] })
            .input(&[2, 3], None)
            .output(&[2, 3]);
        assert!(matches!(
            case.try_run(),
            Err(LayoutInferError::LayoutConflict { .. })
        ));
    }
}
