use std::{
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use derive_more::{Deref, DerefMut, Display};
use thiserror::Error;

use super::{
    alloc::Buffer,
    layout::{IntoLayout, Layout},
    num::{DataType, Scalar},
};

#[derive(Debug, Error)]
pub enum ArrayError {
    #[error("array type error: data type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("array creation error: layout {0}'s size not match data len {1}")]
    Create(Layout, usize),
    #[error("array data error: array {0} has no allocated buffer")]
    Unallocated(ArrayId),
    #[error("array bounds error: layout {0} reaches outside a buffer of {1} bytes")]
    Bounds(Layout, usize),
}

#[derive(Debug, Default, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(uid::Id<ArrayId>);

impl ArrayId {
    #[inline]
    pub fn new() -> Self {
        Self(uid::Id::new())
    }
}

/// A type-erased handle to a strided array.
///
/// The handle is cheap to clone; clones share the identity and the lazily
/// allocated data buffer. The buffer stays alive as long as any clone does,
/// which is how the command queue keeps scheduled tasks valid after the
/// caller's handles go away.
#[derive(Debug, Clone)]
pub struct ArrayUntyped {
    layout: Layout,
    r#type: DataType,
    id: ArrayId,
    data: Arc<OnceLock<Buffer>>,
}

impl ArrayUntyped {
    pub fn new(layout: impl IntoLayout, r#type: DataType) -> Self {
        let layout = layout.into_layout();
        let id = ArrayId::new();
        let data = Arc::new(OnceLock::new());
        Self {
            layout,
            r#type,
            id,
            data,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    /// Bytes per element.
    #[inline]
    pub fn itemsize(&self) -> usize {
        self.r#type.size()
    }

    /// Size of the dense data buffer in bytes.
    #[inline]
    pub fn data_size(&self) -> usize {
        self.layout.size() * self.itemsize()
    }

    #[inline]
    pub fn id(&self) -> ArrayId {
        self.id
    }

    /// Allocates the data buffer if it has not been materialized yet.
    /// Idempotent; a fresh buffer is zero-filled.
    pub fn allocate(&self) -> &Buffer {
        self.data.get_or_init(|| Buffer::zeroed(self.data_size()))
    }

    /// Retrieves the data buffer, failing if it was never materialized.
    pub fn data(&self) -> Result<&Buffer, ArrayError> {
        self.data.get().ok_or(ArrayError::Unallocated(self.id))
    }

    /// Verifies that every element the layout addresses lands inside the
    /// allocated buffer. Kernels index the buffer by the layout's strides, so
    /// this check must pass before a raw pointer is handed to one.
    pub fn check_bounds(&self) -> Result<(), ArrayError> {
        let buffer = self.data()?;
        let (low, high) = self.layout.offset_span();
        let bytes = high as usize * self.itemsize();
        match low >= 0 && bytes <= buffer.len() {
            true => Ok(()),
            false => Err(ArrayError::Bounds(self.layout.clone(), buffer.len())),
        }
    }

    /// Converts the untyped handle to a typed one. Returns error if type mismatches.
    #[inline]
    pub fn try_into_typed<T: Scalar>(self) -> Result<Array<T>, ArrayError> {
        if self.r#type != T::DATA_TYPE {
            return Err(ArrayError::Type(self.r#type, T::DATA_TYPE));
        }
        Ok(Array {
            array: self,
            phantom: PhantomData,
        })
    }

    fn set_data(&self, buffer: Buffer) {
        _ = self.data.set(buffer);
    }
}

/// A statically typed array. Good to fit into typed APIs.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct Array<T> {
    #[deref]
    #[deref_mut]
    array: ArrayUntyped,
    phantom: PhantomData<T>,
}

impl<T: Scalar> Array<T> {
    /// Creates an array whose zero-filled buffer materializes lazily.
    pub fn zeros(layout: impl IntoLayout) -> Self {
        let array = ArrayUntyped::new(layout, T::DATA_TYPE);
        let phantom = PhantomData;
        Self { array, phantom }
    }

    /// Creates an array holding a copy of `data`, stored in physical order
    /// under the given layout.
    pub fn from_slice(data: &[T], layout: impl IntoLayout) -> Result<Self, ArrayError> {
        let layout = layout.into_layout();
        if layout.size() != data.len() {
            return Err(ArrayError::Create(layout, data.len()));
        }
        let (low, high) = layout.offset_span();
        if low < 0 || high as usize > data.len() {
            return Err(ArrayError::Bounds(layout, size_of_val(data)));
        }
        let array = ArrayUntyped::new(layout, T::DATA_TYPE);
        array.set_data(Buffer::from_bytes(bytemuck::cast_slice(data)));
        let phantom = PhantomData;
        Ok(Self { array, phantom })
    }

    /// Transforms the array into an untyped one.
    #[inline]
    pub fn into_untyped(self) -> ArrayUntyped {
        self.array
    }

    /// Copies the buffer contents out, in physical order.
    ///
    /// Callers must first synchronize the queue any pending writer task was
    /// submitted to; reading concurrently with that task is a race.
    pub fn to_vec(&self) -> Result<Vec<T>, ArrayError> {
        let buffer = self.data()?;
        let bytes = unsafe { std::slice::from_raw_parts(buffer.as_ptr(), buffer.len()) };
        Ok(bytemuck::cast_slice(&bytes[..self.data_size()]).to_vec())
    }
}
