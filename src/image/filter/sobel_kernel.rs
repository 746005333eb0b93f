use crate::Float;
use super::kernel::Kernel;

const DERIVATIVE: [Float; 3] = [-1.0, 0.0, 1.0];
const SMOOTHING: [Float; 3] = [1.0, 2.0, 1.0];

/// Central difference half of the separable Sobel operator.
pub struct SobelDerivativeKernel;

impl Kernel for SobelDerivativeKernel {
    fn taps(&self) -> &[Float] {
        &DERIVATIVE
    }

    fn normalizing_constant(&self) -> Float {
        2.0
    }
}

/// Smoothing half of the separable Sobel operator.
pub struct SobelSmoothingKernel;

impl Kernel for SobelSmoothingKernel {
    fn taps(&self) -> &[Float] {
        &SMOOTHING
    }

    fn normalizing_constant(&self) -> Float {
        4.0
    }
}
