use bytemuck::Pod;
use derive_more::Display;
use num_complex::Complex32;

/// Element type of an array's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DataType {
    /// 32-bit real float.
    F32,
    /// 64-bit complex float, stored as interleaved re/im pairs of `f32`.
    C64,
}

impl DataType {
    /// Returns the size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::C64 => 8,
        }
    }

    pub const fn is_real(self) -> bool {
        matches!(self, DataType::F32)
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, DataType::C64)
    }
}

pub trait Scalar: Sized + Pod + Send + Sync + 'static {
    const DATA_TYPE: DataType;
}

impl Scalar for f32 {
    const DATA_TYPE: DataType = DataType::F32;
}

impl Scalar for Complex32 {
    const DATA_TYPE: DataType = DataType::C64;
}
