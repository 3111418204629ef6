use std::cell::UnsafeCell;

/// An exclusively owned, fixed-size byte buffer backing one array.
///
/// The buffer hands out raw pointers instead of references: the tasks that
/// read and write it run at a scheduler-chosen later time, and exclusivity
/// cannot be expressed through borrows. Safety instead rests on the command
/// queue's ordering discipline: at most one scheduled task writes a buffer,
/// and every task reading it is ordered before or after that writer.
pub struct Buffer {
    /// Stored as 64-bit words so the data is aligned for every [`DataType`].
    ///
    /// [`DataType`]: super::num::DataType
    data: UnsafeCell<Box<[u64]>>,
    size: usize,
}

unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Allocates a zero-filled buffer of `size` bytes.
    pub fn zeroed(size: usize) -> Self {
        let data = UnsafeCell::new(vec![0; size.div_ceil(8)].into_boxed_slice());
        Self { data, size }
    }

    /// Allocates a buffer holding a copy of `contents`.
    pub fn from_bytes(contents: &[u8]) -> Self {
        let buffer = Self::zeroed(contents.len());
        unsafe {
            std::ptr::copy_nonoverlapping(contents.as_ptr(), buffer.as_mut_ptr(), contents.len())
        };
        buffer
    }

    /// Size of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        unsafe { (*self.data.get()).as_ptr().cast() }
    }

    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        unsafe { (*self.data.get()).as_mut_ptr().cast() }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer").field("size", &self.size).finish()
    }
}
