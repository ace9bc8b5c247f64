// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::core::{Error, Objective};
use crate::solver::linesearch::{LineSearch, LineSearchTimings};
use nalgebra::DVector;

/// The "None" line search: returns the configured starting step without
/// evaluating the objective. Useful when the descent strategy's step is
/// trusted as-is, e.g. full Newton steps near a minimum.
#[derive(Clone, Debug)]
pub struct FixedStep {
    step_size: f64,
    timings: LineSearchTimings,
}

impl FixedStep {
    /// Constructor
    pub fn new(step_size: f64) -> Result<Self, Error> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "FixedStep: step size must be positive."
            ));
        }
        Ok(FixedStep {
            step_size,
            timings: LineSearchTimings::default(),
        })
    }
}

impl LineSearch for FixedStep {
    fn name(&self) -> &'static str {
        "None"
    }

    fn set_use_grad_norm_tol(&mut self, _tol: f64) {}

    fn line_search(
        &mut self,
        _x: &DVector<f64>,
        _delta_x: &DVector<f64>,
        _objective: &mut dyn Objective,
    ) -> f64 {
        self.step_size
    }

    fn timings(&self) -> &LineSearchTimings {
        &self.timings
    }

    fn reset_timings(&mut self) {
        self.timings.reset();
    }
}
