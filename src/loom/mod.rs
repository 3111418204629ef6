//! The `loom` module provides the array substrate the transform engine runs on.
//!
//! ## Key Components
//! 1. **Numerical System**:
//!    - Scalar types (`f32`, `Complex32`) and their [`num::DataType`] metadata.
//! 2. **Array Abstraction**:
//!    - Shape/strides bookkeeping via [`layout::Layout`].
//!    - Typed and untyped array handles with lazily allocated buffers.
//! 3. **Execution Model**:
//!    - A per-stream [`queue::CommandQueue`] onto which tasks are deferred.
//!    - Read/write dependency registration so the queue keeps buffers alive
//!      and ordered for the lifetime of each scheduled task.

pub mod alloc;
pub mod array;
pub mod layout;
pub mod num;
pub mod ops;
pub mod queue;
