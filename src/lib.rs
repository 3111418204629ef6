//! `weft` schedules multi-dimensional discrete Fourier transforms over strided,
//! typed arrays. Planning happens synchronously on the calling thread; the
//! numeric work itself is packaged into a task and deferred onto a command
//! queue that runs it later, in dependency order.
//!
//! The crate splits into two layers:
//! 1. [`loom`]: the array substrate, with element types, layouts, lazily
//!    allocated buffers, and the command queue the transforms are deferred onto.
//! 2. [`fft`]: the transform planner, the kernel entry points, and the
//!    user-facing transform constructors ([`fft::fftn`], [`fft::rfftn`], ...).

pub mod fft;
pub mod loom;

pub use fft::{FftError, FftPlan, TransformKind};
pub use loom::{array::Array, queue::CommandQueue};
