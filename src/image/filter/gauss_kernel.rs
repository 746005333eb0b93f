use crate::Float;
use super::kernel::Kernel;

/// Zero mean Gaussian sampled at integer offsets out to three sigma.
pub struct GaussKernel1D {
    taps: Vec<Float>,
    sum: Float
}

impl GaussKernel1D {
    pub fn new(sigma: Float) -> GaussKernel1D {
        let radius = (3.0*sigma).ceil().max(1.0) as isize;
        let taps = (-radius..=radius)
            .map(|x| (-0.5*(x as Float/sigma).powi(2)).exp())
            .collect::<Vec<Float>>();
        let sum = taps.iter().sum();
        GaussKernel1D { taps, sum }
    }
}

impl Kernel for GaussKernel1D {
    fn taps(&self) -> &[Float] {
        &self.taps
    }

    fn normalizing_constant(&self) -> Float {
        self.sum
    }
}
