// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// descent error type
#[derive(Debug, Error)]
pub enum DescentError {
    /// A configuration document failed validation
    #[error("Invalid configuration: {text:?}")]
    InvalidConfig {
        /// Text
        text: String,
    },

    /// The objective value or gradient became NaN or infinite
    #[error("NaN or inf encountered: {text:?}")]
    NanEncountered {
        /// Text
        text: String,
    },

    /// The line search could not find an acceptable step size
    #[error("Line search failed: {text:?}")]
    LineSearchFailed {
        /// Text
        text: String,
    },

    /// No descent direction could be produced, even by the terminal fallback
    #[error("Not a descent direction: {text:?}")]
    NotDescentDirection {
        /// Text
        text: String,
    },

    /// The iteration cap was reached before convergence
    #[error("Out of iterations: {text:?}")]
    OutOfIterations {
        /// Text
        text: String,
    },

    /// Indicates that a capability is not implemented by the objective
    #[error("Not implemented: {text:?}")]
    NotImplemented {
        /// Text
        text: String,
    },

    /// For errors which are likely bugs.
    #[error("Potential bug: {text:?}. This is potentially a bug. Please file a report on https://github.com/descent-rs/descent/issues")]
    PotentialBug {
        /// Text
        text: String,
    },
}

/// Outcome classification of a `minimize` call, recorded in the solver-info document.
///
/// Unlike [`DescentError`], which is the error currency of fallible calls, the error
/// code is plain data: it stays `Success` on every non-fatal path, including the
/// cooperative stops requested by the objective.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No fatal error occurred
    Success,
    /// The objective value or gradient became NaN or infinite
    NanEncountered,
    /// The line search failed while already on the terminal fallback strategy
    LineSearchFailed,
    /// The fallback ladder was exhausted without finding a descent direction
    NotDescentDirection,
}

impl ErrorCode {
    /// Returns a textual representation of the error code.
    ///
    /// # Example
    ///
    /// ```
    /// use descent::core::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::Success.text(), "success");
    /// assert_eq!(ErrorCode::NanEncountered.text(), "NaN encountered");
    /// assert_eq!(ErrorCode::LineSearchFailed.text(), "line search failed");
    /// assert_eq!(ErrorCode::NotDescentDirection.text(), "not a descent direction");
    /// ```
    pub fn text(&self) -> &str {
        match *self {
            ErrorCode::Success => "success",
            ErrorCode::NanEncountered => "NaN encountered",
            ErrorCode::LineSearchFailed => "line search failed",
            ErrorCode::NotDescentDirection => "not a descent direction",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::Success
    }
}
