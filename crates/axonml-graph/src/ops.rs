//! Operator Catalogue
//!
//! Operator kinds understood by the accelerator graph, together with their
//! parameter blocks. Axis-indexed parameters are always expressed in the
//! axis order of the operation's own input tensor.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Layout Declarations
// =============================================================================

/// Axis order of a 4-D feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataLayout {
    /// Batch, channel, height, width. Native for the accelerator kernels.
    #[default]
    Nchw,
    /// Batch, height, width, channel.
    Nhwc,
}

impl DataLayout {
    /// Position of each declared axis inside the native `Nchw` order.
    pub fn native_axes(self) -> [usize; 4] {
        match self {
            Self::Nchw => [0, 1, 2, 3],
            Self::Nhwc => [0, 2, 3, 1],
        }
    }

    /// Returns whether this is the native layout.
    pub fn is_native(self) -> bool {
        self == Self::Nchw
    }
}

/// Axis order of a 4-D convolution kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KernelLayout {
    /// Output channels, input channels, height, width. Native.
    #[default]
    Oihw,
    /// Output channels, height, width, input channels.
    Ohwi,
}

impl KernelLayout {
    /// Position of each declared axis inside the native `Oihw` order.
    pub fn native_axes(self) -> [usize; 4] {
        match self {
            Self::Oihw => [0, 1, 2, 3],
            Self::Ohwi => [0, 2, 3, 1],
        }
    }

    /// Returns whether this is the native layout.
    pub fn is_native(self) -> bool {
        self == Self::Oihw
    }
}

// =============================================================================
// Parameter Blocks
// =============================================================================

/// Elementwise unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Activation {
    Relu,
    Relu6,
    Sigmoid,
    Tanh,
    Gelu,
    Swish,
    Abs,
    Neg,
    Sqrt,
    Exp,
    Log,
    LeakyRelu { alpha: f32 },
    Clip { min: f32, max: f32 },
}

/// Elementwise binary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Maximum,
    Minimum,
    Pow,
}

/// How padded elements are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PadMode {
    /// Fill with `const_val`.
    #[default]
    Constant,
    /// Mirror without repeating the edge.
    Reflect,
    /// Mirror including the edge.
    Symmetric,
    /// Repeat the edge element.
    Edge,
}

/// Parameters of [`OpKind::Pad`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PadParams {
    /// Elements added before each axis.
    pub front_size: Vec<u32>,
    /// Elements added after each axis.
    pub back_size: Vec<u32>,
    /// Fill value for [`PadMode::Constant`].
    pub const_val: i32,
    /// Fill mode.
    pub mode: PadMode,
}

impl PadParams {
    /// Constant-mode padding.
    pub fn constant(front_size: Vec<u32>, back_size: Vec<u32>, const_val: i32) -> Self {
        Self {
            front_size,
            back_size,
            const_val,
            mode: PadMode::Constant,
        }
    }
}

/// Parameters of [`OpKind::Slice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceParams {
    /// First element kept along each axis.
    pub start: Vec<u32>,
    /// Number of elements kept along each axis.
    pub length: Vec<u32>,
}

/// Reduction functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ReduceOp {
    Sum,
    Mean,
    Max,
    Min,
    Prod,
}

/// Parameters of [`OpKind::Reduce`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReduceParams {
    /// Reduction function.
    pub op: ReduceOp,
    /// Reduced axes (negative values count from the back).
    pub axes: Vec<i32>,
    /// Keep reduced axes as size 1.
    pub keep_dims: bool,
}

/// Index-returning reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ArgReduceOp {
    ArgMax,
    ArgMin,
}

/// Pooling function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PoolType {
    #[default]
    Max,
    Avg,
    L2,
}

/// Output size rounding for windowed operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum RoundType {
    #[default]
    Floor,
    Ceiling,
}

/// Automatic padding for windowed operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PadType {
    /// Use the explicit `pad` values.
    #[default]
    Explicit,
    /// No padding; windows stay inside the input.
    Valid,
    /// Pad so the output spatial size is `ceil(input / stride)`.
    Same,
}

/// Window selection of [`OpKind::Pool2d`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PoolWindow {
    /// Window slides by `ksize` and `stride`.
    #[default]
    Sliding,
    /// One window covering the whole `[height, width]` input.
    Global {
        /// Spatial input size.
        input_size: [u32; 2],
    },
    /// Windows chosen so the output has `output_size`.
    Adaptive {
        /// Spatial input size.
        input_size: [u32; 2],
        /// Spatial output size.
        output_size: [u32; 2],
    },
}

/// Parameters of [`OpKind::Conv2d`]. Spatial values are `[height, width]`,
/// padding is `[top, bottom, left, right]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conv2dParams {
    /// Kernel size.
    pub kernel: [u32; 2],
    /// Stride.
    pub stride: [u32; 2],
    /// Dilation.
    pub dilation: [u32; 2],
    /// Explicit padding.
    pub pad: [u32; 4],
    /// Automatic padding; overrides `pad` unless explicit.
    #[serde(default)]
    pub pad_type: PadType,
    /// Group count (1 = dense convolution).
    pub groups: u32,
    /// Declared layout of input and output feature maps.
    pub layout: DataLayout,
    /// Declared layout of the weight tensor.
    pub kernel_layout: KernelLayout,
}

impl Default for Conv2dParams {
    fn default() -> Self {
        Self {
            kernel: [1, 1],
            stride: [1, 1],
            dilation: [1, 1],
            pad: [0; 4],
            pad_type: PadType::Explicit,
            groups: 1,
            layout: DataLayout::Nchw,
            kernel_layout: KernelLayout::Oihw,
        }
    }
}

/// Parameters of [`OpKind::Pool2d`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool2dParams {
    /// Pooling function.
    pub pool_type: PoolType,
    /// Window size `[height, width]`.
    pub ksize: [u32; 2],
    /// Stride `[height, width]`.
    pub stride: [u32; 2],
    /// Padding `[top, bottom, left, right]`.
    pub pad: [u32; 4],
    /// Automatic padding; overrides `pad` unless explicit.
    #[serde(default)]
    pub pad_type: PadType,
    /// Sliding, global or adaptive windows.
    #[serde(default)]
    pub window: PoolWindow,
    /// Output size rounding.
    pub round_type: RoundType,
    /// Declared layout of input and output feature maps.
    pub layout: DataLayout,
}

impl Default for Pool2dParams {
    fn default() -> Self {
        Self {
            pool_type: PoolType::Max,
            ksize: [2, 2],
            stride: [2, 2],
            pad: [0; 4],
            pad_type: PadType::Explicit,
            window: PoolWindow::Sliding,
            round_type: RoundType::Floor,
            layout: DataLayout::Nchw,
        }
    }
}

impl Pool2dParams {
    /// Pooling over the whole `input_size` spatial extent.
    pub fn global(pool_type: PoolType, input_size: [u32; 2], layout: DataLayout) -> Self {
        Self {
            pool_type,
            ksize: input_size,
            stride: input_size,
            window: PoolWindow::Global { input_size },
            layout,
            ..Self::default()
        }
    }

    /// Pooling that maps `input_size` onto `output_size`. Window and stride
    /// are derived per axis as `stride = in / out` and
    /// `ksize = in - (out - 1) * stride`.
    pub fn adaptive(
        pool_type: PoolType,
        input_size: [u32; 2],
        output_size: [u32; 2],
        layout: DataLayout,
    ) -> Self {
        let out = output_size.map(|o| o.max(1));
        let stride: [u32; 2] = std::array::from_fn(|i| (input_size[i] / out[i]).max(1));
        let ksize: [u32; 2] = std::array::from_fn(|i| {
            input_size[i]
                .saturating_sub((out[i] - 1).saturating_mul(stride[i]))
                .max(1)
        });
        Self {
            pool_type,
            ksize,
            stride,
            window: PoolWindow::Adaptive {
                input_size,
                output_size,
            },
            layout,
            ..Self::default()
        }
    }
}

// =============================================================================
// Operator Kinds
// =============================================================================

/// An operator together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OpKind {
    /// Elementwise unary function.
    Activation(Activation),
    /// Element type conversion.
    DataConvert,
    /// Elementwise binary function with broadcasting.
    Binary(BinaryOp),
    /// Padding.
    Pad(PadParams),
    /// Static slice.
    Slice(SliceParams),
    /// Repeat along each axis.
    Tile { multiples: Vec<u32> },
    /// Concatenation of every input along `axis`.
    Concat { axis: i32 },
    /// Split along `axis` into pieces of the given sizes.
    Split { axis: i32, slices: Vec<u32> },
    /// Reduction over `axes`.
    Reduce(ReduceParams),
    /// Index of the extreme value along `axis`; drops the axis.
    ArgReduce { op: ArgReduceOp, axis: i32 },
    /// Softmax along `axis`.
    Softmax { axis: i32, beta: f32 },
    /// Log-softmax along `axis`.
    LogSoftmax { axis: i32, beta: f32 },
    /// Layer normalisation along `axis`; optional scale and bias inputs.
    LayerNorm { axis: i32, eps: f32 },
    /// Reverse element order along `axes`.
    Reverse { axes: Vec<i32> },
    /// Channel shuffle along `axis`.
    ShuffleChannel { groups: u32, axis: i32 },
    /// Axis permutation: output axis `k` is input axis `perm[k]`.
    Transpose { perm: Vec<u32> },
    /// Reinterpret the element sequence with a new shape.
    Reshape { shape: Vec<u32> },
    /// 2-D convolution: input, weight and optional bias.
    Conv2d(Conv2dParams),
    /// 2-D pooling.
    Pool2d(Pool2dParams),
    /// Batched matrix multiplication.
    MatMul { transpose_a: bool, transpose_b: bool },
    /// Dense layer flattening every axis from `axis` onward.
    FullyConnected { axis: i32, weights: u32 },
    /// Gather slices of input 0 along `axis` using indices from input 1.
    Gather { axis: i32 },
}

/// Parameter-less tag of an [`OpKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OpType {
    Activation,
    DataConvert,
    Binary,
    Pad,
    Slice,
    Tile,
    Concat,
    Split,
    Reduce,
    ArgReduce,
    Softmax,
    LogSoftmax,
    LayerNorm,
    Reverse,
    ShuffleChannel,
    Transpose,
    Reshape,
    Conv2d,
    Pool2d,
    MatMul,
    FullyConnected,
    Gather,
}

impl OpType {
    /// Returns the operator name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Activation => "Activation",
            Self::DataConvert => "DataConvert",
            Self::Binary => "Binary",
            Self::Pad => "Pad",
            Self::Slice => "Slice",
            Self::Tile => "Tile",
            Self::Concat => "Concat",
            Self::Split => "Split",
            Self::Reduce => "Reduce",
            Self::ArgReduce => "ArgReduce",
            Self::Softmax => "Softmax",
            Self::LogSoftmax => "LogSoftmax",
            Self::LayerNorm => "LayerNorm",
            Self::Reverse => "Reverse",
            Self::ShuffleChannel => "ShuffleChannel",
            Self::Transpose => "Transpose",
            Self::Reshape => "Reshape",
            Self::Conv2d => "Conv2d",
            Self::Pool2d => "Pool2d",
            Self::MatMul => "MatMul",
            Self::FullyConnected => "FullyConnected",
            Self::Gather => "Gather",
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl OpKind {
    /// Returns the parameter-less tag.
    pub fn op_type(&self) -> OpType {
        match self {
            Self::Activation(_) => OpType::Activation,
            Self::DataConvert => OpType::DataConvert,
            Self::Binary(_) => OpType::Binary,
            Self::Pad(_) => OpType::Pad,
            Self::Slice(_) => OpType::Slice,
            Self::Tile { .. } => OpType::Tile,
            Self::Concat { .. } => OpType::Concat,
            Self::Split { .. } => OpType::Split,
            Self::Reduce(_) => OpType::Reduce,
            Self::ArgReduce { .. } => OpType::ArgReduce,
            Self::Softmax { .. } => OpType::Softmax,
            Self::LogSoftmax { .. } => OpType::LogSoftmax,
            Self::LayerNorm { .. } => OpType::LayerNorm,
            Self::Reverse { .. } => OpType::Reverse,
            Self::ShuffleChannel { .. } => OpType::ShuffleChannel,
            Self::Transpose { .. } => OpType::Transpose,
            Self::Reshape { .. } => OpType::Reshape,
            Self::Conv2d(_) => OpType::Conv2d,
            Self::Pool2d(_) => OpType::Pool2d,
            Self::MatMul { .. } => OpType::MatMul,
            Self::FullyConnected { .. } => OpType::FullyConnected,
            Self::Gather { .. } => OpType::Gather,
        }
    }

    /// Returns the operator name.
    pub fn name(&self) -> &'static str {
        self.op_type().name()
    }

    /// Returns whether this operation computes each output element from the
    /// input elements at the same index.
    pub fn is_elementwise(&self) -> bool {
        matches!(
            self,
            Self::Activation(_) | Self::DataConvert | Self::Binary(_)
        )
    }
}

/// Resolves a possibly negative axis against `rank`.
pub fn normalize_axis(axis: i32, rank: usize) -> Option<usize> {
    let rank = i64::try_from(rank).ok()?;
    let axis = i64::from(axis);
    let resolved = if axis < 0 { axis + rank } else { axis };
    if (0..rank).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}
