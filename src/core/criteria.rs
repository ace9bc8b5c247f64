// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Stopping criteria
//!
//! A single flat record serves both as the accumulating per-iteration measurements
//! and as the stop thresholds the driver compares them against. Measurements that
//! have not been taken in the current iteration are encoded as NaN and never
//! satisfy a comparison; stop thresholds of zero disable their criterion.

use serde::{Deserialize, Serialize};

/// Stopping-criterion record.
///
/// Two instances exist per solve: the `stop` thresholds (fixed at construction,
/// scaled once by the characteristic length) and the `current` measurements
/// (reset and refilled every iteration).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Criteria {
    /// Iteration counter (current) or iteration cap (stop)
    pub iterations: u64,
    /// Norm of the update direction (current) or its threshold (stop)
    pub x_delta: f64,
    /// Absolute energy change between iterations (current) or its threshold (stop)
    pub f_delta: f64,
    /// Gradient norm (current) or its threshold (stop)
    pub grad_norm: f64,
    /// Conditioning measure; reported in the solver info but never enforced
    pub condition: f64,
}

impl Default for Criteria {
    fn default() -> Self {
        Criteria {
            iterations: 0,
            x_delta: f64::NAN,
            f_delta: f64::NAN,
            grad_norm: f64::NAN,
            condition: f64::NAN,
        }
    }
}

impl Criteria {
    /// A record with zeroed iteration count and all measurements unset (NaN).
    pub fn new() -> Self {
        Criteria::default()
    }

    /// Clears the per-iteration measurements, keeping the iteration counter.
    pub fn reset_measurements(&mut self) {
        self.x_delta = f64::NAN;
        self.f_delta = f64::NAN;
        self.grad_norm = f64::NAN;
    }

    /// Evaluates the stopping criteria.
    ///
    /// The comparisons run in a fixed order: iteration cap, energy change, step
    /// norm, gradient norm. A `current` measurement of NaN never satisfies its
    /// comparison; a `stop` threshold of zero disables the criterion entirely.
    pub fn check(stop: &Criteria, current: &Criteria) -> Status {
        if current.iterations >= stop.iterations {
            Status::IterationLimit
        } else if stop.f_delta > 0.0 && current.f_delta <= stop.f_delta {
            Status::FDeltaTolerance
        } else if stop.x_delta > 0.0 && current.x_delta <= stop.x_delta {
            Status::XDeltaTolerance
        } else if stop.grad_norm > 0.0 && current.grad_norm <= stop.grad_norm {
            Status::GradNormTolerance
        } else {
            Status::Continue
        }
    }
}

impl std::fmt::Display for Criteria {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "iterations={} xDelta={:e} fDelta={:e} gradNorm={:e} condition={:e}",
            self.iterations, self.x_delta, self.f_delta, self.grad_norm, self.condition
        )
    }
}

/// Reasons for the solve driver to stop, or to keep going.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// No stopping criterion is satisfied
    Continue,
    /// Reached the iteration cap
    IterationLimit,
    /// The gradient norm dropped below its threshold
    GradNormTolerance,
    /// The update-direction norm dropped below its threshold
    XDeltaTolerance,
    /// The energy change dropped below its threshold
    FDeltaTolerance,
    /// Stop requested outside the criteria record (objective hook or fatal error)
    UserDefined,
}

impl Status {
    /// Returns `true` if the driver stops and `false` otherwise.
    ///
    /// # Example
    ///
    /// ```
    /// use descent::core::Status;
    ///
    /// assert!(Status::IterationLimit.terminated());
    /// assert!(Status::GradNormTolerance.terminated());
    /// assert!(Status::XDeltaTolerance.terminated());
    /// assert!(Status::FDeltaTolerance.terminated());
    /// assert!(Status::UserDefined.terminated());
    /// assert!(!Status::Continue.terminated());
    /// ```
    pub fn terminated(self) -> bool {
        !matches!(self, Status::Continue)
    }

    /// Returns a textual representation of the status.
    ///
    /// # Example
    ///
    /// ```
    /// use descent::core::Status;
    ///
    /// assert_eq!(Status::Continue.text(), "Continue");
    /// assert_eq!(Status::IterationLimit.text(), "Iteration limit reached");
    /// assert_eq!(Status::GradNormTolerance.text(), "Gradient norm tolerance reached");
    /// assert_eq!(Status::XDeltaTolerance.text(), "Change in x tolerance reached");
    /// assert_eq!(Status::FDeltaTolerance.text(), "Change in f tolerance reached");
    /// assert_eq!(Status::UserDefined.text(), "User-defined stop");
    /// ```
    pub fn text(&self) -> &str {
        match *self {
            Status::Continue => "Continue",
            Status::IterationLimit => "Iteration limit reached",
            Status::GradNormTolerance => "Gradient norm tolerance reached",
            Status::XDeltaTolerance => "Change in x tolerance reached",
            Status::FDeltaTolerance => "Change in f tolerance reached",
            Status::UserDefined => "User-defined stop",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.text())
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Continue
    }
}
