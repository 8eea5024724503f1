//! Axonml Layout - Layout Inference for Accelerator Graphs
//!
//! Rewrites an operator graph so that every operator consumes tensors in the
//! axis order its kernel wants, while the graph keeps its declared layouts at
//! the inputs and outputs. Each tensor carries a [`PermuteVector`] recording
//! where its logical axes are physically stored. Operators that can work in
//! any order absorb the permutation by remapping their axis parameters;
//! operators that cannot get a transpose in front of them.
//!
//! # Example
//!
//! ```
//! use axonml_graph::{Activation, DataType, Graph, OpKind, OpType, TensorSpec};
//! use axonml_layout::{layout_inference_with, LayoutInferConfig, PermuteVector};
//!
//! let mut graph = Graph::new();
//! let x = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 8, 8, 3]).as_input());
//! let y = graph.create_tensor(TensorSpec::new(DataType::F32, &[1, 8, 8, 3]).as_output());
//! let relu = graph.create_operation(OpKind::Activation(Activation::Relu));
//! graph.bind_input(relu, x).unwrap();
//! graph.bind_output(relu, y).unwrap();
//!
//! // The input buffer is stored channels-first.
//! let nhwc = PermuteVector::new(vec![0, 2, 3, 1]).unwrap();
//! let config = LayoutInferConfig::new().input_permute(x, nhwc);
//! let result = layout_inference_with(&graph, &config).unwrap();
//!
//! // The relu runs on the stored layout; one transpose restores the output.
//! assert_eq!(result.graph.count_ops(OpType::Transpose), 1);
//! assert!(result.permute_vector(y).unwrap().is_aligned());
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod context;
pub mod error;
pub mod inference;
pub mod ops;
pub mod permute;
pub mod registry;

pub use config::LayoutInferConfig;
pub use context::{LayoutInferContext, LayoutInferStats};
pub use error::{LayoutInferError, LayoutResult};
pub use inference::{layout_inference, layout_inference_with, LayoutInferResult, LayoutInference};
pub use ops::OpLayoutInfer;
pub use permute::PermuteVector;
pub use registry::HandlerRegistry;
