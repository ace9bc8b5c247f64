// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Gradient descent
//!
//! # References:
//!
//! \[0\] Jorge Nocedal and Stephen J. Wright (2006). Numerical Optimization.
//! Springer. ISBN 0-387-30303-0.

use crate::core::Objective;
use crate::solver::{DescentStrategy, MAX_STRATEGY_LEVEL};
use nalgebra::DVector;

/// Steepest descent: Δx = −∇f(x).
///
/// This is the terminal rung of every fallback ladder, so it is pinned at
/// [`MAX_STRATEGY_LEVEL`] and
/// [`increase_descent_strategy`](DescentStrategy::increase_descent_strategy)
/// is a no-op; a failure on this strategy is fatal to the solve.
#[derive(Clone, Debug, Default)]
pub struct GradientDescent {}

impl GradientDescent {
    /// Constructor
    pub fn new() -> Self {
        GradientDescent {}
    }
}

impl DescentStrategy for GradientDescent {
    fn name(&self) -> &'static str {
        "GradientDescent"
    }

    fn descent_strategy_name(&self) -> &'static str {
        "gradient descent"
    }

    fn reset(&mut self, _ndof: usize) {}

    fn compute_update_direction(
        &mut self,
        _objective: &mut dyn Objective,
        _x: &DVector<f64>,
        grad: &DVector<f64>,
        direction: &mut DVector<f64>,
    ) {
        direction.copy_from(&(-grad));
    }

    fn strategy_level(&self) -> u32 {
        MAX_STRATEGY_LEVEL
    }

    fn increase_descent_strategy(&mut self) {}

    fn set_default_descent_strategy(&mut self) {}
}
