//! Transform planning and deferred dispatch.
//!
//! [`FftPlan::new`] is the pure planning step: it derives the transform kind
//! from the dtype pairing, converts element strides to byte strides, picks
//! the iteration shape, and computes the inverse normalization. [`eval`]
//! packages a plan into a task on a [`CommandQueue`]; the kernel call itself
//! runs whenever the queue gets to it. The `fftn`/`rfftn`/... constructors on
//! top validate axes and shape the output arrays, including the `n/2 + 1`
//! half-spectrum convention for the real transforms.

use derive_more::Display;
use num_complex::Complex32;
use thiserror::Error;

use crate::loom::{
    array::{Array, ArrayError, ArrayUntyped},
    num::DataType,
    queue::{CommandQueue, QueueError},
};

pub mod kernel;

#[derive(Debug, Error)]
pub enum FftError {
    #[error("fft type error: unsupported input and output type combination ({0}, {1})")]
    UnsupportedTypes(DataType, DataType),
    #[error("fft axis error: axis {axis} out of range for rank {rank}")]
    Axis { axis: usize, rank: usize },
    #[error("fft axis error: axis {0} repeats")]
    DuplicateAxis(usize),
    #[error("fft axis error: no axes to transform over")]
    EmptyAxes,
    #[error("fft length error: length {n} needs {want} spectrum bins, array has {have}")]
    Length { n: usize, want: usize, have: usize },
    #[error(transparent)]
    Array(#[from] ArrayError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Which kernel entry point a planned transform dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransformKind {
    ComplexToComplex,
    RealToComplex,
    ComplexToReal,
}

/// The derived description of one transform, ready for kernel dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct FftPlan {
    pub kind: TransformKind,
    /// Iteration shape: the full logical length of every dimension. Taken
    /// from whichever array carries the real dtype, since the complex side
    /// of a real transform stores only the `n/2 + 1` half spectrum.
    pub shape: Vec<usize>,
    /// Byte strides of the input, one per input dimension.
    pub strides_in: Vec<isize>,
    /// Byte strides of the output, one per output dimension.
    pub strides_out: Vec<isize>,
    /// `1` for forward transforms, `1 / prod(shape[a] for a in axes)` for
    /// inverse ones.
    pub scale: f32,
}

impl FftPlan {
    /// Plans a transform between `input` and `output` over `axes`.
    ///
    /// Pure and side-effect free. Axes must already be validated against the
    /// iteration shape; this function does not re-validate them. The only
    /// rejected input is a dtype pairing outside the three supported ones.
    pub fn new(
        input: &ArrayUntyped,
        output: &ArrayUntyped,
        axes: &[usize],
        inverse: bool,
    ) -> Result<Self, FftError> {
        let strides_in = input.layout().byte_strides(input.itemsize());
        let strides_out = output.layout().byte_strides(output.itemsize());

        let kind = match (input.data_type(), output.data_type()) {
            (DataType::C64, DataType::C64) => TransformKind::ComplexToComplex,
            (DataType::F32, DataType::C64) => TransformKind::RealToComplex,
            (DataType::C64, DataType::F32) => TransformKind::ComplexToReal,
            (r#in, out) => return Err(FftError::UnsupportedTypes(r#in, out)),
        };

        let shape = match output.data_type().is_real() {
            true => output.layout().shape().to_vec(),
            false => input.layout().shape().to_vec(),
        };

        let scale = match inverse {
            false => 1.0,
            true => {
                let nelem: usize = axes.iter().map(|&axis| shape[axis]).product();
                1.0 / nelem as f32
            }
        };

        Ok(Self {
            kind,
            shape,
            strides_in,
            strides_out,
            scale,
        })
    }
}

/// Plans the transform and defers the kernel call onto `queue`.
///
/// Runs synchronously up to submission: the plan is computed, the output
/// buffer is lazily allocated, and the arrays are registered as read/write
/// dependencies of the task. The task captures the plan and the array handles
/// by value, so it stays valid regardless of what the caller does with its
/// own handles afterwards.
pub fn eval(
    queue: &CommandQueue,
    input: &ArrayUntyped,
    output: &ArrayUntyped,
    axes: &[usize],
    inverse: bool,
) -> Result<(), FftError> {
    let plan = FftPlan::new(input, output, axes, inverse)?;
    input.allocate();
    output.allocate();

    // the kernel trusts the byte strides it is given; both buffers must
    // cover every offset their layouts can address
    input.check_bounds()?;
    output.check_bounds()?;

    let mut encoder = queue.encoder();
    encoder.set_input_array(input);
    encoder.set_output_array(output)?;

    let axes = axes.to_vec();
    let input = input.clone();
    let output = output.clone();
    encoder.dispatch(move || {
        let (Ok(src), Ok(dst)) = (input.data(), output.data()) else {
            log::error!("fft task dropped: array buffer not allocated");
            return;
        };
        // the kernel's direction convention is the mirror of ours: its
        // `forward` flag must be the negation of our `inverse` flag
        let forward = !inverse;
        match plan.kind {
            TransformKind::ComplexToComplex => unsafe {
                kernel::c2c(
                    &plan.shape,
                    &plan.strides_in,
                    &plan.strides_out,
                    &axes,
                    forward,
                    src.as_ptr().cast(),
                    dst.as_mut_ptr().cast(),
                    plan.scale,
                )
            },
            TransformKind::RealToComplex => unsafe {
                kernel::r2c(
                    &plan.shape,
                    &plan.strides_in,
                    &plan.strides_out,
                    &axes,
                    forward,
                    src.as_ptr().cast(),
                    dst.as_mut_ptr().cast(),
                    plan.scale,
                )
            },
            TransformKind::ComplexToReal => unsafe {
                kernel::c2r(
                    &plan.shape,
                    &plan.strides_in,
                    &plan.strides_out,
                    &axes,
                    forward,
                    src.as_ptr().cast(),
                    dst.as_mut_ptr().cast(),
                    plan.scale,
                )
            },
        }
    })?;
    Ok(())
}

fn validate_axes(axes: &[usize], rank: usize) -> Result<(), FftError> {
    if axes.is_empty() {
        return Err(FftError::EmptyAxes);
    }
    for (index, &axis) in axes.iter().enumerate() {
        if axis >= rank {
            return Err(FftError::Axis { axis, rank });
        }
        if axes[..index].contains(&axis) {
            return Err(FftError::DuplicateAxis(axis));
        }
    }
    Ok(())
}

fn transform_c2c(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axes: &[usize],
    inverse: bool,
) -> Result<Array<Complex32>, FftError> {
    validate_axes(axes, input.layout().len())?;
    let output = Array::<Complex32>::zeros(input.layout().shape());
    eval(queue, input, &output, axes, inverse)?;
    Ok(output)
}

/// Multi-axis forward complex transform.
pub fn fftn(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axes: &[usize],
) -> Result<Array<Complex32>, FftError> {
    transform_c2c(queue, input, axes, false)
}

/// Multi-axis inverse complex transform, normalized by `1 / N`.
pub fn ifftn(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axes: &[usize],
) -> Result<Array<Complex32>, FftError> {
    transform_c2c(queue, input, axes, true)
}

/// Multi-axis forward real transform.
///
/// The output keeps the `n/2 + 1` unique bins along the last axis of `axes`.
pub fn rfftn(
    queue: &CommandQueue,
    input: &Array<f32>,
    axes: &[usize],
) -> Result<Array<Complex32>, FftError> {
    validate_axes(axes, input.layout().len())?;
    let axis = axes[axes.len() - 1];
    let mut shape = input.layout().shape().to_vec();
    shape[axis] = shape[axis] / 2 + 1;
    let output = Array::<Complex32>::zeros(shape);
    eval(queue, input, &output, axes, false)?;
    Ok(output)
}

/// Multi-axis inverse real transform, normalized by `1 / N`.
///
/// `n` is the real output length along the last axis of `axes`; when omitted
/// it defaults to `2 * (bins - 1)`, the even length matching the input's
/// half spectrum. An explicit `n` must still match the input's bin count.
pub fn irfftn(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axes: &[usize],
    n: Option<usize>,
) -> Result<Array<f32>, FftError> {
    validate_axes(axes, input.layout().len())?;
    let axis = axes[axes.len() - 1];
    let mut shape = input.layout().shape().to_vec();
    let have = shape[axis];
    let n = n.unwrap_or(2 * have.saturating_sub(1));
    let want = n / 2 + 1;
    if want != have {
        return Err(FftError::Length { n, want, have });
    }
    shape[axis] = n;
    let output = Array::<f32>::zeros(shape);
    eval(queue, input, &output, axes, true)?;
    Ok(output)
}

/// Forward complex transform along one axis.
pub fn fft(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axis: usize,
) -> Result<Array<Complex32>, FftError> {
    fftn(queue, input, &[axis])
}

/// Inverse complex transform along one axis.
pub fn ifft(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axis: usize,
) -> Result<Array<Complex32>, FftError> {
    ifftn(queue, input, &[axis])
}

/// Forward real transform along one axis.
pub fn rfft(
    queue: &CommandQueue,
    input: &Array<f32>,
    axis: usize,
) -> Result<Array<Complex32>, FftError> {
    rfftn(queue, input, &[axis])
}

/// Inverse real transform along one axis.
pub fn irfft(
    queue: &CommandQueue,
    input: &Array<Complex32>,
    axis: usize,
    n: Option<usize>,
) -> Result<Array<f32>, FftError> {
    irfftn(queue, input, &[axis], n)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use num_complex::Complex32;

    use super::{FftError, FftPlan, TransformKind, fft, fftn, ifftn, irfft, rfft, rfftn};
    use crate::loom::{
        array::{Array, ArrayError},
        layout::Layout,
        num::DataType,
        queue::CommandQueue,
    };

    fn assert_close(actual: &[Complex32], expected: &[Complex32], tolerance: f32) {
        assert_eq!(actual.len(), expected.len());
        for (&a, &e) in actual.iter().zip(expected) {
            assert!(
                (a - e).norm() < tolerance,
                "expected {e}, got {a} (tolerance {tolerance})"
            );
        }
    }

    #[test]
    fn test_plan_kind_dispatch() {
        let real = Array::<f32>::zeros([8]).into_untyped();
        let complex = Array::<Complex32>::zeros([8]).into_untyped();

        let plan = FftPlan::new(&complex, &complex, &[0], false).unwrap();
        assert_eq!(plan.kind, TransformKind::ComplexToComplex);
        let plan = FftPlan::new(&real, &complex, &[0], false).unwrap();
        assert_eq!(plan.kind, TransformKind::RealToComplex);
        let plan = FftPlan::new(&complex, &real, &[0], false).unwrap();
        assert_eq!(plan.kind, TransformKind::ComplexToReal);

        assert!(matches!(
            FftPlan::new(&real, &real, &[0], false),
            Err(FftError::UnsupportedTypes(DataType::F32, DataType::F32))
        ));
    }

    #[test]
    fn test_plan_byte_strides() {
        let layout = Layout::new(vec![4, 6], vec![1, 4]);
        let input = Array::<f32>::zeros(layout).into_untyped();
        let output = Array::<Complex32>::zeros([4, 4]).into_untyped();

        let plan = FftPlan::new(&input, &output, &[1], false).unwrap();
        assert_eq!(plan.strides_in, [4, 16]);
        assert_eq!(plan.strides_out, [32, 8]);
        assert_eq!(plan.scale, 1.0);
    }

    #[test]
    fn test_plan_inverse_scale() {
        let input = Array::<Complex32>::zeros([4, 5, 2]).into_untyped();
        let output = Array::<Complex32>::zeros([4, 5, 2]).into_untyped();
        let plan = FftPlan::new(&input, &output, &[0, 2], true).unwrap();
        assert_eq!(plan.scale, 1.0 / 8.0);
    }

    #[test]
    fn test_plan_shape_from_real_side() {
        // the complex side of a real transform is the shorter array; the
        // iteration shape must carry the full real length
        let spectrum = Array::<Complex32>::zeros([5]).into_untyped();
        let real = Array::<f32>::zeros([8]).into_untyped();

        let plan = FftPlan::new(&spectrum, &real, &[0], true).unwrap();
        assert_eq!(plan.shape, [8]);
        assert_eq!(plan.scale, 1.0 / 8.0);

        let plan = FftPlan::new(&real, &spectrum, &[0], false).unwrap();
        assert_eq!(plan.shape, [8]);
    }

    #[test]
    fn test_axis_validation() {
        fn check(axes: &[usize]) -> Result<(), FftError> {
            super::validate_axes(axes, 2)
        }
        assert!(matches!(check(&[]), Err(FftError::EmptyAxes)));
        assert!(matches!(
            check(&[2]),
            Err(FftError::Axis { axis: 2, rank: 2 })
        ));
        assert!(matches!(check(&[1, 1]), Err(FftError::DuplicateAxis(1))));
        assert!(check(&[1, 0]).is_ok());
    }

    #[tokio::test]
    async fn test_forward_dc_bin() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let ones = vec![Complex32::new(1.0, 0.0); 4];
        let input = Array::from_slice(&ones, [4])?;

        let output = fft(&queue, &input, 0)?;
        queue.synchronize().await?;

        let mut expected = vec![Complex32::new(0.0, 0.0); 4];
        expected[0] = Complex32::new(4.0, 0.0);
        assert_close(&output.to_vec()?, &expected, 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn test_real_roundtrip_length_8() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let data: Vec<f32> = (0..8).map(|k| (k as f32 * 0.9).sin() + 0.2).collect();
        let input = Array::from_slice(&data, [8])?;

        let spectrum = rfft(&queue, &input, 0)?;
        assert_eq!(spectrum.layout().shape(), [5]);

        let restored = irfft(&queue, &spectrum, 0, None)?;
        assert_eq!(restored.layout().shape(), [8]);

        let plan = FftPlan::new(&spectrum, &restored, &[0], true)?;
        assert_eq!(plan.scale, 1.0 / 8.0);

        queue.synchronize().await?;
        for (&a, &e) in restored.to_vec()?.iter().zip(&data) {
            assert!((a - e).abs() < 1e-5, "expected {e}, got {a}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_axis_roundtrip_4x4() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let data: Vec<Complex32> = (0..16)
            .map(|k| Complex32::new(0.25 * k as f32 - 2.0, (k as f32 * 1.3).cos()))
            .collect();
        let input = Array::from_slice(&data, [4, 4])?;

        let spectrum = fftn(&queue, &input, &[0, 1])?;
        let restored = ifftn(&queue, &spectrum, &[0, 1])?;

        let plan = FftPlan::new(&spectrum, &restored, &[0, 1], true)?;
        assert_eq!(plan.scale, 1.0 / 16.0);

        queue.synchronize().await?;
        assert_close(&restored.to_vec()?, &data, 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn test_linearity() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        fastrand::seed(42);
        let sample = |_| Complex32::new(fastrand::f32() - 0.5, fastrand::f32() - 0.5);
        let x: Vec<Complex32> = (0..16).map(sample).collect();
        let y: Vec<Complex32> = (0..16).map(sample).collect();
        let (a, b) = (2.5, -1.25);
        let mixed: Vec<Complex32> = x.iter().zip(&y).map(|(&x, &y)| x * a + y * b).collect();

        let fx = fftn(&queue, &Array::from_slice(&x, [16])?, &[0])?;
        let fy = fftn(&queue, &Array::from_slice(&y, [16])?, &[0])?;
        let fm = fftn(&queue, &Array::from_slice(&mixed, [16])?, &[0])?;
        queue.synchronize().await?;

        let expected: Vec<Complex32> = fx
            .to_vec()?
            .iter()
            .zip(&fy.to_vec()?)
            .map(|(&x, &y)| x * a + y * b)
            .collect();
        assert_close(&fm.to_vec()?, &expected, 1e-4);
        Ok(())
    }

    #[tokio::test]
    async fn test_strided_input_matches_contiguous() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let logical: Vec<Complex32> = (0..6)
            .map(|k| Complex32::new(k as f32, -0.5 * k as f32))
            .collect();
        // the same logical 2x3 array, stored column-major
        let physical: Vec<Complex32> = [0, 3, 1, 4, 2, 5].iter().map(|&k| logical[k]).collect();

        let contiguous = Array::from_slice(&logical, [2, 3])?;
        let strided = Array::from_slice(&physical, Layout::new(vec![2, 3], vec![1, 2]))?;

        let expected = fftn(&queue, &contiguous, &[0, 1])?;
        let output = fftn(&queue, &strided, &[0, 1])?;
        queue.synchronize().await?;

        assert_close(&output.to_vec()?, &expected.to_vec()?, 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn test_rfftn_two_axes() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let data: Vec<f32> = (0..8).map(|k| 0.5 * k as f32 - 1.0).collect();
        let input = Array::from_slice(&data, [2, 4])?;

        let spectrum = rfftn(&queue, &input, &[0, 1])?;
        assert_eq!(spectrum.layout().shape(), [2, 3]);

        let complex: Vec<Complex32> = data.iter().map(|&x| Complex32::new(x, 0.0)).collect();
        let full = fftn(&queue, &Array::from_slice(&complex, [2, 4])?, &[0, 1])?;
        queue.synchronize().await?;

        let expected = full.to_vec()?;
        let actual = spectrum.to_vec()?;
        for row in 0..2 {
            assert_close(&actual[row * 3..][..3], &expected[row * 4..][..3], 1e-4);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_eval_rejects_out_of_bounds_strides() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        // the buffer behind a zeros array holds exactly 4 elements; strides
        // like these would send the kernel far past its end
        for stride in [4096, 1 << 28] {
            let input = Array::<Complex32>::zeros(Layout::new(vec![4], vec![stride]));
            let output = Array::<Complex32>::zeros([4]);
            assert!(matches!(
                super::eval(&queue, &input, &output, &[0], false),
                Err(FftError::Array(ArrayError::Bounds(..)))
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_irfft_length_mismatch() -> Result<(), Box<dyn Error>> {
        let queue = CommandQueue::new();
        let spectrum = Array::<Complex32>::zeros([5]);
        assert!(matches!(
            irfft(&queue, &spectrum, 0, Some(12)),
            Err(FftError::Length {
                n: 12,
                want: 7,
                have: 5
            })
        ));
        Ok(())
    }
}
