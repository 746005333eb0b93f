extern crate nalgebra as na;

use na::DMatrix;

use crate::image::{Image, image_encoding::ImageEncoding};
use crate::Float;
use self::{kernel::Kernel, gauss_kernel::GaussKernel1D, sobel_kernel::{SobelDerivativeKernel, SobelSmoothingKernel}};

pub mod kernel;
pub mod gauss_kernel;
pub mod sobel_kernel;

#[derive(Debug,Copy,Clone,PartialEq)]
pub enum FilterDirection {
    Horizontal,
    Vertical
}

/// Separable 1D convolution, replicating the border pixels.
pub fn filter_1d_convolution(source: &Image, filter_direction: FilterDirection, filter_kernel: &dyn Kernel) -> Image {
    let taps = filter_kernel.taps();
    let radius = filter_kernel.radius() as isize;
    let normalizing_constant = filter_kernel.normalizing_constant();

    let buffer = &source.buffer;
    let width = buffer.ncols();
    let height = buffer.nrows();
    let clamp = |idx: isize, len: usize| idx.clamp(0, len as isize - 1) as usize;

    let target = DMatrix::<Float>::from_fn(height, width, |y, x| {
        let acc = taps.iter().enumerate().fold(0.0, |acc, (i, tap)| {
            let offset = i as isize - radius;
            let sample = match filter_direction {
                FilterDirection::Horizontal => buffer[(y, clamp(x as isize + offset, width))],
                FilterDirection::Vertical => buffer[(clamp(y as isize + offset, height), x)]
            };
            acc + tap*sample
        });
        acc/normalizing_constant
    });

    Image { buffer: target, original_encoding: source.original_encoding }
}

pub fn gaussian_blur(image: &Image, sigma: Float) -> Image {
    let kernel = GaussKernel1D::new(sigma);
    let horizontal = filter_1d_convolution(image, FilterDirection::Horizontal, &kernel);
    filter_1d_convolution(&horizontal, FilterDirection::Vertical, &kernel)
}

/// 3x3 Sobel derivatives in intensity units per pixel. Returns (d/du, d/dv), signed and F64 encoded.
pub fn sobel_gradients(image: &Image) -> (Image, Image) {
    let derivative = SobelDerivativeKernel;
    let smoothing = SobelSmoothingKernel;

    let gx = filter_1d_convolution(
        &filter_1d_convolution(image, FilterDirection::Horizontal, &derivative),
        FilterDirection::Vertical, &smoothing);
    let gy = filter_1d_convolution(
        &filter_1d_convolution(image, FilterDirection::Vertical, &derivative),
        FilterDirection::Horizontal, &smoothing);
    let signed = |gradient: Image| Image { original_encoding: ImageEncoding::F64, ..gradient };
    (signed(gx), signed(gy))
}
