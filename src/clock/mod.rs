// This module contains the definition of `TimestampVector`.
mod vector;

// This module contains the definition of `TimestampMatrix`.
mod matrix;

// Re-exports.
pub use matrix::TimestampMatrix;
pub use vector::TimestampVector;
