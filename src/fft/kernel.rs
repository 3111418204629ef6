//! Strided multi-axis transform entry points.
//!
//! Each entry point performs a separable multi-dimensional DFT over the given
//! `axes`, one full-length 1-D transform per axis in the given order, with the
//! 1-D stages delegated to `rustfft`. All addressing is done with byte strides
//! against raw base pointers, so arbitrary (including negative-stride) views
//! work without copying. `scale * result` is written to the output.
//!
//! `shape` is the iteration shape: the full logical lengths of every
//! dimension. For the real transforms this is the length of the *real* side;
//! the complex side stores `n/2 + 1` bins along the trailing transform axis.

use itertools::izip;
use num_complex::Complex32;
use rustfft::{FftDirection, FftPlanner};

use crate::loom::layout::Layout;

#[inline]
fn byte_offset(index: &[usize], strides: &[isize]) -> isize {
    izip!(index, strides).map(|(&i, &s)| i as isize * s).sum()
}

#[inline]
fn direction(forward: bool) -> FftDirection {
    match forward {
        true => FftDirection::Forward,
        false => FftDirection::Inverse,
    }
}

/// Visits every index tuple of `shape` with `axis` pinned at zero.
///
/// An out-of-range `axis` pins nothing, visiting every element. Shapes with a
/// zero-length dimension yield no tuples at all.
fn for_each_lane(shape: &[usize], axis: usize, mut f: impl FnMut(&[usize])) {
    if shape.contains(&0) {
        return;
    }
    let mut index = vec![0; shape.len()];
    loop {
        f(&index);
        let mut carry = true;
        for dim in (0..shape.len()).rev() {
            if dim == axis {
                continue;
            }
            index[dim] += 1;
            if index[dim] < shape[dim] {
                carry = false;
                break;
            }
            index[dim] = 0;
        }
        if carry {
            break;
        }
    }
}

fn for_each_index(shape: &[usize], f: impl FnMut(&[usize])) {
    for_each_lane(shape, usize::MAX, f);
}

/// One 1-D transform pass over every lane along `axis`, `src` to `dst`.
/// In-place when `src` and `dst` coincide: lanes are staged through a
/// contiguous scratch buffer either way.
unsafe fn dft_lanes(
    shape: &[usize],
    strides_in: &[isize],
    strides_out: &[isize],
    axis: usize,
    direction: FftDirection,
    src: *const Complex32,
    dst: *mut Complex32,
) {
    if shape.contains(&0) {
        return;
    }
    let n = shape[axis];
    let fft = FftPlanner::new().plan_fft(n, direction);
    let mut lane = vec![Complex32::new(0.0, 0.0); n];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for_each_lane(shape, axis, |index| {
        let base_in = byte_offset(index, strides_in);
        let base_out = byte_offset(index, strides_out);
        for (k, value) in lane.iter_mut().enumerate() {
            let offset = base_in + k as isize * strides_in[axis];
            *value = unsafe { src.byte_offset(offset).read() };
        }
        fft.process_with_scratch(&mut lane, &mut scratch);
        for (k, value) in lane.iter().enumerate() {
            let offset = base_out + k as isize * strides_out[axis];
            unsafe { dst.byte_offset(offset).write(*value) };
        }
    });
}

unsafe fn apply_scale<T>(shape: &[usize], strides: &[isize], data: *mut T, scale: f32)
where
    T: Copy + std::ops::MulAssign<f32>,
{
    if scale == 1.0 {
        return;
    }
    for_each_index(shape, |index| {
        let pointer = unsafe { data.byte_offset(byte_offset(index, strides)) };
        let mut value = unsafe { pointer.read() };
        value *= scale;
        unsafe { pointer.write(value) };
    });
}

/// Complex-to-complex transform over `axes`.
///
/// # Safety
/// `input` must be valid for reads and `output` for writes over the full
/// extent addressed by `shape` with the respective byte strides, properly
/// aligned, and the two extents must not overlap. No other thread may write
/// `input` or touch `output` during the call.
pub unsafe fn c2c(
    shape: &[usize],
    strides_in: &[isize],
    strides_out: &[isize],
    axes: &[usize],
    forward: bool,
    input: *const Complex32,
    output: *mut Complex32,
    scale: f32,
) {
    let Some((&first, rest)) = axes.split_first() else {
        return;
    };
    let direction = direction(forward);
    unsafe {
        dft_lanes(shape, strides_in, strides_out, first, direction, input, output);
        for &axis in rest {
            dft_lanes(shape, strides_out, strides_out, axis, direction, output, output);
        }
        apply_scale(shape, strides_out, output, scale);
    }
}

/// Real-to-complex transform over `axes`.
///
/// The real transform runs along the last axis of `axes`, retaining the
/// `n/2 + 1` unique bins of the half spectrum (conjugated when `forward` is
/// false); the remaining axes get complex transforms. `shape` carries the full
/// real lengths; `output` stores `n/2 + 1` elements along that last axis.
///
/// # Safety
/// Same contract as [`c2c`], with `input` addressed as `f32` over `shape` and
/// `output` as `Complex32` over `shape` shortened along the last transform
/// axis.
pub unsafe fn r2c(
    shape: &[usize],
    strides_in: &[isize],
    strides_out: &[isize],
    axes: &[usize],
    forward: bool,
    input: *const f32,
    output: *mut Complex32,
    scale: f32,
) {
    let Some((&last, rest)) = axes.split_last() else {
        return;
    };
    if shape.contains(&0) {
        return;
    }
    let n = shape[last];
    let bins = n / 2 + 1;

    let fft = FftPlanner::new().plan_fft(n, FftDirection::Forward);
    let mut lane = vec![Complex32::new(0.0, 0.0); n];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for_each_lane(shape, last, |index| {
        let base_in = byte_offset(index, strides_in);
        let base_out = byte_offset(index, strides_out);
        for (k, value) in lane.iter_mut().enumerate() {
            let offset = base_in + k as isize * strides_in[last];
            *value = Complex32::new(unsafe { input.byte_offset(offset).read() }, 0.0);
        }
        fft.process_with_scratch(&mut lane, &mut scratch);
        for (k, &value) in lane.iter().take(bins).enumerate() {
            let offset = base_out + k as isize * strides_out[last];
            let value = if forward { value } else { value.conj() };
            unsafe { output.byte_offset(offset).write(value) };
        }
    });

    let mut cshape = shape.to_vec();
    cshape[last] = bins;
    let direction = direction(forward);
    unsafe {
        for &axis in rest {
            dft_lanes(&cshape, strides_out, strides_out, axis, direction, output, output);
        }
        apply_scale(&cshape, strides_out, output, scale);
    }
}

/// Complex-to-real transform over `axes`.
///
/// Complex transforms run along the leading axes on a working copy of the
/// half spectrum; the last axis of `axes` is then expanded by conjugate
/// symmetry and transformed at full length, keeping the real part. `shape`
/// carries the full real lengths; `input` stores `n/2 + 1` elements along the
/// last transform axis.
///
/// # Safety
/// Same contract as [`c2c`], with `input` addressed as `Complex32` over
/// `shape` shortened along the last transform axis and `output` as `f32` over
/// `shape`.
pub unsafe fn c2r(
    shape: &[usize],
    strides_in: &[isize],
    strides_out: &[isize],
    axes: &[usize],
    forward: bool,
    input: *const Complex32,
    output: *mut f32,
    scale: f32,
) {
    let Some((&last, rest)) = axes.split_last() else {
        return;
    };
    if shape.contains(&0) {
        return;
    }
    let n = shape[last];
    let bins = n / 2 + 1;
    let mut cshape = shape.to_vec();
    cshape[last] = bins;

    // the input buffer is read-only; stage the half spectrum contiguously
    let wlayout = Layout::from_shape(&cshape);
    let wstrides = wlayout.byte_strides(size_of::<Complex32>());
    let mut work = vec![Complex32::new(0.0, 0.0); wlayout.size()];
    for_each_index(&cshape, |index| {
        let offset = byte_offset(index, strides_in);
        let staged = byte_offset(index, &wstrides) as usize / size_of::<Complex32>();
        work[staged] = unsafe { input.byte_offset(offset).read() };
    });

    let direction = direction(forward);
    unsafe {
        for &axis in rest {
            let data = work.as_mut_ptr();
            dft_lanes(&cshape, &wstrides, &wstrides, axis, direction, data, data);
        }
    }

    let fft = FftPlanner::new().plan_fft(n, direction);
    let mut lane = vec![Complex32::new(0.0, 0.0); n];
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    for_each_lane(&cshape, last, |index| {
        let base = byte_offset(index, &wstrides);
        for (k, value) in lane.iter_mut().take(bins).enumerate() {
            let offset = base + k as isize * wstrides[last];
            *value = work[offset as usize / size_of::<Complex32>()];
        }
        // the redundant bins follow from conjugate symmetry
        for k in bins..n {
            lane[k] = lane[n - k].conj();
        }
        fft.process_with_scratch(&mut lane, &mut scratch);
        let base_out = byte_offset(index, strides_out);
        for (j, value) in lane.iter().enumerate() {
            let offset = base_out + j as isize * strides_out[last];
            unsafe { output.byte_offset(offset).write(value.re) };
        }
    });

    unsafe { apply_scale(shape, strides_out, output, scale) };
}
