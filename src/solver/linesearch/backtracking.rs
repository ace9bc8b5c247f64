// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # References:
//!
//! \[0\] Jorge Nocedal and Stephen J. Wright (2006). Numerical Optimization.
//! Springer. ISBN 0-387-30303-0.
//!
//! \[1\] Wikipedia: <https://en.wikipedia.org/wiki/Backtracking_line_search>

use crate::core::{Error, Objective};
use crate::solver::linesearch::{LineSearch, LineSearchTimings};
use instant::Instant;
use nalgebra::DVector;

/// Backtracking line search enforcing the Armijo (sufficient decrease)
/// condition f(x + αΔx) ≤ f(x) + c·α·∇f(x)ᵀΔx.
///
/// Starting from the configured step, α is shrunk while the trial energy is
/// non-finite or the Armijo condition fails; the search gives up (returns NaN)
/// once the shrink budget is spent. When a gradient-norm acceptance tolerance
/// is set, a trial point whose gradient norm falls below it is accepted
/// regardless of the Armijo test.
#[derive(Clone, Debug)]
pub struct Backtracking {
    /// Sufficient-decrease constant c
    c: f64,
    /// Step contraction factor
    shrink: f64,
    /// Shrink budget per search
    max_step_halvings: u32,
    /// Step size tried first
    init_step_size: f64,
    /// Gradient-norm acceptance tolerance (0 disables)
    use_grad_norm_tol: f64,
    timings: LineSearchTimings,
}

impl Backtracking {
    /// Constructor
    pub fn new(
        c: f64,
        shrink: f64,
        max_step_halvings: u32,
        init_step_size: f64,
    ) -> Result<Self, Error> {
        if c <= 0.0 || c >= 1.0 {
            return Err(descent_error!(
                InvalidConfig,
                "Backtracking: Parameter c must be in (0, 1)."
            ));
        }
        if shrink <= 0.0 || shrink >= 1.0 {
            return Err(descent_error!(
                InvalidConfig,
                "Backtracking: Contraction factor must be in (0, 1)."
            ));
        }
        if max_step_halvings == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "Backtracking: max_step_halvings must be positive."
            ));
        }
        if !init_step_size.is_finite() || init_step_size <= 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "Backtracking: Initial step size must be positive."
            ));
        }
        Ok(Backtracking {
            c,
            shrink,
            max_step_halvings,
            init_step_size,
            use_grad_norm_tol: 0.0,
            timings: LineSearchTimings::default(),
        })
    }
}

impl LineSearch for Backtracking {
    fn name(&self) -> &'static str {
        "Backtracking"
    }

    fn set_use_grad_norm_tol(&mut self, tol: f64) {
        self.use_grad_norm_tol = tol;
    }

    fn line_search(
        &mut self,
        x: &DVector<f64>,
        delta_x: &DVector<f64>,
        objective: &mut dyn Objective,
    ) -> f64 {
        let n = x.len();
        let initial_energy = objective.value(x);
        let mut grad = DVector::zeros(n);
        objective.gradient(x, &mut grad);
        let slope = grad.dot(delta_x);

        let mut trial = DVector::zeros(n);
        let mut alpha = self.init_step_size;

        for _ in 0..=self.max_step_halvings {
            let trial_timer = Instant::now();
            trial.copy_from(x);
            trial.axpy(alpha, delta_x, 1.0);

            let constraint_timer = Instant::now();
            objective.solution_changed(&trial);
            let constraint_elapsed = constraint_timer.elapsed();
            self.timings.constraint_set_update += constraint_elapsed;

            let trial_energy = objective.value(&trial);
            self.timings.iterations += 1;

            if !trial_energy.is_finite() {
                self.timings.checking_for_nan_inf +=
                    trial_timer.elapsed().saturating_sub(constraint_elapsed);
                alpha *= self.shrink;
                continue;
            }

            let mut accept = trial_energy <= initial_energy + self.c * alpha * slope;
            if !accept && self.use_grad_norm_tol > 0.0 {
                objective.gradient(&trial, &mut grad);
                accept = grad.norm() <= self.use_grad_norm_tol;
            }
            self.timings.classical_line_search += trial_timer.elapsed();

            if accept {
                return alpha;
            }
            alpha *= self.shrink;
        }

        // Give up; resynchronize the objective with the unchanged x.
        let constraint_timer = Instant::now();
        objective.solution_changed(x);
        self.timings.constraint_set_update += constraint_timer.elapsed();
        f64::NAN
    }

    fn timings(&self) -> &LineSearchTimings {
        &self.timings
    }

    fn reset_timings(&mut self) {
        self.timings.reset();
    }
}
