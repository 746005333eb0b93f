use crate::Float;

#[repr(u8)]
#[derive(Debug,Copy,Clone,PartialEq)]
pub enum ImageEncoding {
    U8,
    F64
}

impl ImageEncoding {
    // https://en.wikipedia.org/wiki/Normalization_(image_processing)
    pub fn normalize_to_gray(&self, max: Float, min : Float, value: Float) -> u8 {
        let range = 255 as Float;
        match max - min {
            d if d > 0.0 => ((value - min) * (range / d)).round().clamp(0.0, range) as u8,
            _ => 0
        }
    }

    /// U8 buffers keep their grey values, F64 buffers are stretched to the full range.
    pub fn to_gray(&self, max: Float, min: Float, value: Float) -> u8 {
        match self {
            ImageEncoding::U8 => value.round().clamp(0.0, 255.0) as u8,
            ImageEncoding::F64 => self.normalize_to_gray(max, min, value)
        }
    }
}
