//! Axonml Graph - Accelerator Operator Graphs
//!
//! Index-based computation graphs handed to accelerator backends. Tensors and
//! operations live in arenas and refer to each other through [`TensorId`] and
//! [`OpId`], so graph passes can read one graph while building another
//! without shared ownership.
//!
//! # Example
//!
//! ```
//! use axonml_graph::{Activation, DataType, Graph, OpKind, TensorSpec};
//!
//! let mut graph = Graph::new();
//! let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 8, 8, 3]).as_input());
//! let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 8, 8, 3]).as_output());
//! let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
//! graph.bind_input(relu, x).unwrap();
//! graph.bind_output(relu, y).unwrap();
//! assert!(graph.validate().is_ok());
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod ir;
pub mod ops;

pub use error::{GraphError, GraphResult};
pub use ir::{
    DataType, Graph, OpId, Operation, Shape, Tensor, TensorAttr, TensorId, TensorSpec,
};
pub use ops::{
    normalize_axis, Activation, ArgReduceOp, BinaryOp, Conv2dParams, DataLayout, KernelLayout,
    OpKind, OpType, PadMode, PadParams, PadType, Pool2dParams, PoolType, PoolWindow, ReduceOp,
    ReduceParams, RoundType, SliceParams,
};
