use crate::image::{Image, filter::sobel_gradients};

/// One level of a Gaussian pyramid with its Sobel gradients.
#[derive(Debug,Clone)]
pub struct PyramidLevel {
    pub image: Image,
    pub gradient_x: Image,
    pub gradient_y: Image
}

#[derive(Debug,Clone)]
pub struct ImagePyramid {
    pub levels: Vec<PyramidLevel>
}

impl ImagePyramid {
    /// Level 0 is the input. Stops early once a level would be smaller than `min_dimension`.
    pub fn build(base: &Image, level_count: usize, min_dimension: usize) -> ImagePyramid {
        let mut levels = Vec::<PyramidLevel>::with_capacity(level_count.max(1));
        let mut level_image = base.clone();

        for i in 0..level_count.max(1) {
            if i > 0 {
                let next = Image::downsample_half(&level_image);
                if next.width() < min_dimension || next.height() < min_dimension {
                    break;
                }
                level_image = next;
            }
            let (gradient_x, gradient_y) = sobel_gradients(&level_image);
            levels.push(PyramidLevel { image: level_image.clone(), gradient_x, gradient_y });
        }

        ImagePyramid { levels }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }
}
