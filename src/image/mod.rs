extern crate image as image_rs;
extern crate nalgebra as na;

use image_rs::{GrayImage, DynamicImage, Pixel, Luma};
use image_rs::flat::NormalForm;
use na::DMatrix;

use crate::Float;
use self::image_encoding::ImageEncoding;

pub mod image_encoding;
pub mod filter;
pub mod pyramid;
pub mod mask;

/// Single band raster. Row index is v (down), column index is u (right).
/// Pixel (u,v) samples the continuous image at integer coordinates.
#[derive(Debug,Clone)]
pub struct Image {
    pub buffer: DMatrix<Float>,
    pub original_encoding: ImageEncoding
}

impl Image {

    pub fn width(&self) -> usize {
        self.buffer.ncols()
    }

    pub fn height(&self) -> usize {
        self.buffer.nrows()
    }

    pub fn size(&self) -> usize {
        self.buffer.ncols()*self.buffer.nrows()
    }

    pub fn empty(width: usize, height: usize, image_encoding: ImageEncoding) -> Image {
        let buffer = DMatrix::<Float>::zeros(height,width);
        Image{ buffer, original_encoding: image_encoding}
    }

    pub fn from_matrix(matrix: &DMatrix<Float>, original_encoding: ImageEncoding, normalize: bool) -> Image {
        let mut buffer = matrix.clone();

        if normalize {
            let max = buffer.amax();
            if max > 0.0 {
                buffer /= max;
            }
        }

        Image{ buffer, original_encoding}
    }

    pub fn from_gray_image(image: &GrayImage) -> Image {
        Image{ buffer: Image::image8_to_matrix(image), original_encoding: ImageEncoding::U8}
    }

    pub fn to_image(&self) -> GrayImage {
        Image::matrix_to_image(&self.buffer, self.original_encoding)
    }

    /// Bilinear sample at continuous coordinates. `None` outside [0,w-1]x[0,h-1].
    pub fn sample(&self, x: Float, y: Float) -> Option<Float> {
        let max_x = (self.width() as Float) - 1.0;
        let max_y = (self.height() as Float) - 1.0;
        match (x, y) {
            (x, y) if !x.is_finite() || !y.is_finite() => None,
            (x, y) if x < 0.0 || y < 0.0 || x > max_x || y > max_y => None,
            (x, y) => Some(self.bilinear(x, y))
        }
    }

    /// Bilinear sample with coordinates clamped to the image border.
    pub fn sample_clamped(&self, x: Float, y: Float) -> Float {
        if self.size() == 0 || !x.is_finite() || !y.is_finite() {
            return 0.0;
        }
        let max_x = ((self.width() as Float) - 1.0).max(0.0);
        let max_y = ((self.height() as Float) - 1.0).max(0.0);
        self.bilinear(x.clamp(0.0, max_x), y.clamp(0.0, max_y))
    }

    fn bilinear(&self, x: Float, y: Float) -> Float {
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width() - 1);
        let y1 = (y0 + 1).min(self.height() - 1);
        let fx = x - x0 as Float;
        let fy = y - y0 as Float;

        let top = (1.0 - fx)*self.buffer[(y0,x0)] + fx*self.buffer[(y0,x1)];
        let bottom = (1.0 - fx)*self.buffer[(y1,x0)] + fx*self.buffer[(y1,x1)];
        (1.0 - fy)*top + fy*bottom
    }

    /// Blurs with sigma 1 and drops every second row and column.
    pub fn downsample_half(image: &Image) -> Image {
        let blurred = filter::gaussian_blur(image, 1.0);
        let new_width = (image.width() + 1)/2;
        let new_height = (image.height() + 1)/2;
        let buffer = DMatrix::<Float>::from_fn(new_height, new_width, |r,c| blurred.buffer[(2*r,2*c)]);
        Image{ buffer, original_encoding: image.original_encoding }
    }

    fn image8_to_matrix(gray_image: &GrayImage) -> DMatrix<Float> {
        debug_assert!(gray_image.sample_layout().is_normal(NormalForm::RowMajorPacked));

        let (width, height) = gray_image.dimensions();
        let size = (width * height) as usize;
        let mut vec_column_major: Vec<Float> = Vec::with_capacity(size);
        for x in 0..width {
            for y in 0..height {
                let pixel_value = gray_image.get_pixel(x, y).channels()[0];
                vec_column_major.push(pixel_value as Float);
            }
        }
        DMatrix::<Float>::from_vec(height as usize, width as usize, vec_column_major)
    }

    fn matrix_to_image(matrix: &DMatrix<Float>, encoding: ImageEncoding) -> GrayImage {
        let (rows, cols) = matrix.shape();

        let mut gray_image = DynamicImage::new_luma8(cols as u32, rows as u32).to_luma8();
        if rows == 0 || cols == 0 {
            return gray_image;
        }
        let max = matrix.max();
        let min = matrix.min();
        for c in 0..cols {
            for r in 0..rows {
                let val = *matrix.index((r, c));
                let pixel_value = encoding.to_gray(max,min,val);
                gray_image.put_pixel(c as u32, r as u32, Luma([pixel_value]));
            }
        }
        gray_image
    }
}

/**
 * Global histogram equalisation of an 8 bit band (Gonzalez & Woods).
 * output = round((cdf(v) - cdf_min)/(n - cdf_min) * 255)
 * A constant image is returned unchanged.
 */
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let n = (image.width() as usize)*(image.height() as usize);
    if n == 0 {
        return image.clone();
    }

    let mut histogram = [0usize; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let mut cdf = [0usize; 256];
    let mut acc = 0;
    for (i, count) in histogram.iter().enumerate() {
        acc += count;
        cdf[i] = acc;
    }

    let cdf_min = match cdf.iter().find(|&&v| v > 0) {
        Some(&v) => v,
        None => return image.clone()
    };
    if cdf_min == n {
        return image.clone();
    }

    let range = (n - cdf_min) as Float;
    let mut lut = [0u8; 256];
    for i in 0..256 {
        lut[i] = match cdf[i] {
            c if c <= cdf_min => 0,
            c => ((((c - cdf_min) as Float)/range)*255.0).round() as u8
        };
    }

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    output
}
