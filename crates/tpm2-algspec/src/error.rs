// SPDX-License-Identifier: MIT OR Apache-2.0

//! Algorithm specification errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlgSpecError {
    #[error("Empty algorithm specification")]
    Empty,

    #[error("Unknown algorithm or parameter: \"{0}\"")]
    UnknownAlgorithm(String),

    #[error("Too many fields for {object} specification at \"{field}\"")]
    TooManyFields { object: &'static str, field: String },

    #[error("Scheme \"{scheme}\" cannot be used with {object} keys")]
    IncompatibleScheme { object: &'static str, scheme: String },
}

pub(crate) fn unknown(token: &str) -> AlgSpecError {
    AlgSpecError::UnknownAlgorithm(token.to_string())
}
