/// Odd length separable 1D filter.
pub trait Kernel {
    fn taps(&self) -> &[crate::Float];

    fn radius(&self) -> usize {
        self.taps().len()/2
    }

    /// Divisor applied to every filtered sample.
    fn normalizing_constant(&self) -> crate::Float;
}
