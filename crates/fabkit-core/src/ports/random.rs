//! RandomSource port - randomness used by argument templates.
//!
//! Injected instead of calling a global RNG so tests can pin `$rand(n)` values.

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, upper)`. `upper` is always greater than zero.
    fn below(&self, upper: u64) -> u64;
}
