use thiserror::Error;

/// Failures raised by the pure math layer (tick math, bitmap scans, swap
/// step formulas). These never carry ledger context; the operation layer
/// wraps them into a [`DexError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("Math error - division by zero")]
    DivisionByZero,

    #[error("Math error - tick out of bounds")]
    TickOutOfBounds,

    #[error("Math error - sqrtPrice out of bounds")]
    SqrtPriceOutOfBounds,

    #[error("Math error - tick not aligned to spacing")]
    UnalignedTick,

    #[error("Math error - liquidity below zero")]
    NegativeLiquidity,

    #[error("BitMath error - zero input value")]
    ZeroValue,
}

/// Error roles surfaced by the callable operations. Every failure aborts
/// the surrounding ledger transaction; there is no partial-commit path.
#[derive(Debug, Error)]
pub enum DexError {
    #[error("Validation failed - {0}")]
    Validation(String),

    #[error("Not found - {0}")]
    NotFound(String),

    #[error("Unauthorized - {0}")]
    Unauthorized(String),

    #[error("Conflict - {0}")]
    Conflict(String),

    #[error("Inconsistent state - {0}")]
    Inconsistent(String),
}

impl DexError {
    pub fn validation(message: impl Into<String>) -> Self {
        DexError::Validation(message.into())
    }

    /// The swap engine's out-of-range next tick: the pool cannot supply
    /// the requested amount in the direction of travel.
    pub fn insufficient_liquidity() -> Self {
        DexError::Conflict("Not enough liquidity available in pool".to_string())
    }
}

impl From<MathError> for DexError {
    fn from(err: MathError) -> Self {
        DexError::Conflict(err.to_string())
    }
}

impl From<serde_json::Error> for DexError {
    fn from(err: serde_json::Error) -> Self {
        DexError::Inconsistent(format!("chain object serialization failed: {err}"))
    }
}

pub type DexResult<T> = Result<T, DexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_error_maps_to_conflict() {
        let err: DexError = MathError::TickOutOfBounds.into();
        assert!(matches!(err, DexError::Conflict(_)));
    }

    #[test]
    fn insufficient_liquidity_carries_expected_message() {
        let err = DexError::insufficient_liquidity();
        assert_eq!(
            err.to_string(),
            "Conflict - Not enough liquidity available in pool"
        );
    }
}
