use derive_more::Display;
use itertools::Itertools;

/// Shape and element strides of a (possibly non-contiguous) array.
///
/// Strides are in elements, not bytes; negative strides describe reversed
/// views. Invariant: `shape.len() == strides.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("[{}] by [{}]", shape.iter().format(", "), strides.iter().format(", "))]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<isize>,
}

impl Layout {
    /// Creates a layout from explicit shape and strides.
    ///
    /// # Panics
    /// This method will panic if the shape and strides lengths differ.
    pub fn new(shape: Vec<usize>, strides: Vec<isize>) -> Self {
        assert_eq!(
            shape.len(),
            strides.len(),
            "shape and strides must have equal lengths"
        );
        Self { shape, strides }
    }

    /// Creates a contiguous row-major layout of the given shape.
    pub fn from_shape(shape: impl AsRef<[usize]>) -> Self {
        let shape = shape.as_ref().to_vec();
        let mut strides = vec![0; shape.len()];
        let mut stride = 1;
        for index in (0..shape.len()).rev() {
            strides[index] = stride;
            stride *= shape[index] as isize;
        }
        Self { shape, strides }
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Number of dimensions.
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Number of elements addressed by the layout.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Scales each element stride by `itemsize`, preserving order.
    #[inline]
    pub fn byte_strides(&self, itemsize: usize) -> Vec<isize> {
        self.strides.iter().map(|&s| s * itemsize as isize).collect()
    }

    /// Returns `true` if the layout is contiguous row-major.
    pub fn is_contiguous(&self) -> bool {
        self.strides == Self::from_shape(&self.shape).strides
    }

    /// Range of element offsets the layout addresses, relative to a base
    /// pointer at offset zero: `(lowest, one past highest)`. A layout with a
    /// zero-length dimension addresses nothing and spans `(0, 0)`.
    pub fn offset_span(&self) -> (isize, isize) {
        if self.shape.contains(&0) {
            return (0, 0);
        }
        let (mut low, mut high) = (0, 0);
        for (&dim, &stride) in self.shape.iter().zip(&self.strides) {
            let reach = (dim as isize - 1) * stride;
            match reach < 0 {
                true => low += reach,
                false => high += reach,
            }
        }
        (low, high + 1)
    }
}

pub trait IntoLayout {
    fn into_layout(self) -> Layout;
}

impl IntoLayout for Layout {
    #[inline]
    fn into_layout(self) -> Layout {
        self
    }
}

impl<const N: usize> IntoLayout for [usize; N] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

impl IntoLayout for &[usize] {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

impl IntoLayout for Vec<usize> {
    #[inline]
    fn into_layout(self) -> Layout {
        Layout::from_shape(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Layout;

    #[test]
    fn test_contiguous_strides() {
        let layout = Layout::from_shape([2, 3, 4]);
        assert_eq!(layout.strides(), [12, 4, 1]);
        assert_eq!(layout.size(), 24);
        assert!(layout.is_contiguous());
    }

    #[test]
    fn test_byte_strides_preserve_order() {
        let layout = Layout::new(vec![5, 8], vec![1, 5]);
        assert_eq!(layout.byte_strides(8), [8, 40]);
        assert!(!layout.is_contiguous());
    }

    #[test]
    fn test_offset_span() {
        assert_eq!(Layout::from_shape([2, 3, 4]).offset_span(), (0, 24));
        assert_eq!(Layout::new(vec![2, 3], vec![1, 2]).offset_span(), (0, 6));
        assert_eq!(Layout::new(vec![4], vec![-1]).offset_span(), (-3, 1));
        assert_eq!(Layout::new(vec![4, 0], vec![1, 1]).offset_span(), (0, 0));
        assert_eq!(Layout::new(vec![4], vec![4096]).offset_span(), (0, 12289));
    }
}
