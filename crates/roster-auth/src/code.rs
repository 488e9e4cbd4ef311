//! Verification-code generation.

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use std::num::NonZeroI32;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Six-digit codes. Zero is reserved for "no code pending".
const CODE_RANGE: RangeInclusive<i32> = 100_000..=999_999;

#[derive(Debug, Error)]
pub enum CodeError {
    #[error("entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),

    #[error("generated a zero code")]
    Zero,
}

pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> Result<NonZeroI32, CodeError>;
}

/// Draws six-digit codes from a generator seeded by the OS for each call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> Result<NonZeroI32, CodeError> {
        let mut rng = StdRng::from_rng(OsRng)?;
        let value = rng.gen_range(CODE_RANGE);
        NonZeroI32::new(value).ok_or(CodeError::Zero)
    }
}
