use thiserror::Error;

/// Errors returned by tree building, rewriting and interpretation.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart: invalid input: {0}")]
    InvalidInput(String),

    #[error("cart: invalid config: {0}")]
    InvalidConfig(String),

    #[error("cart: invalid distance {distance} between clusters {left} and {right}")]
    InvalidMeasure {
        left: usize,
        right: usize,
        distance: f64,
    },

    #[error("cart: malformed tree: {0}")]
    MalformedTree(String),

    #[error("cart: unknown unit index {0}")]
    UnknownUnit(usize),

    #[error("cart: serialization error: {0}")]
    Serialization(String),
}
