// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Descent strategies and line searches
//!
//! A descent strategy proposes an update direction Δx from the current point and
//! gradient; the solve driver validates, line-searches and commits it. Every
//! strategy carries a fallback ladder expressed as an integer level: level 0 is
//! the strategy's native behavior, level 2 is plain gradient descent (the
//! terminal fallback), and level 1 is strategy-specific middle ground. The
//! driver climbs the ladder on failure and resets it on every committed step.

/// Gradient descent (terminal fallback)
pub mod gradientdescent;
/// Line searches
pub mod linesearch;
/// Newton strategies (dense and sparse)
pub mod newton;
/// Quasi-Newton strategies (BFGS, L-BFGS)
pub mod quasinewton;

use crate::core::{Error, LinearSolverConfig, Objective, SolverConfig, SolverKind};
use nalgebra::DVector;
use std::time::Duration;

/// The terminal fallback level (gradient descent).
pub const MAX_STRATEGY_LEVEL: u32 = 2;

/// Time spent by a strategy assembling and solving its linear systems.
///
/// Zero for strategies without a linear solve; the Newton variants fill both
/// buckets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectionTimings {
    /// Time spent assembling the system matrix
    pub assembly: Duration,
    /// Time spent factorizing and solving
    pub inverting: Duration,
}

/// An update-direction producer with a fallback ladder.
///
/// Implementors fill `direction` in
/// [`compute_update_direction`](DescentStrategy::compute_update_direction); an unusable proposal is
/// signaled by NaN entries, upon which the driver climbs the ladder via
/// [`increase_descent_strategy`](DescentStrategy::increase_descent_strategy)
/// and retries the iteration without committing.
pub trait DescentStrategy {
    /// Name of the strategy, e.g. `"BFGS"`.
    fn name(&self) -> &'static str;

    /// Name of the behavior at the current ladder level, e.g. `"reset BFGS"`.
    fn descent_strategy_name(&self) -> &'static str;

    /// Clears all curvature/workspace state for a problem of size `ndof`.
    ///
    /// Called once at the start of `minimize` and whenever the strategy's state
    /// must be discarded.
    fn reset(&mut self, ndof: usize);

    /// Fills `direction` with the proposed update Δx for the point `x` with
    /// gradient `grad`. NaN entries mark the proposal as unusable.
    fn compute_update_direction(
        &mut self,
        objective: &mut dyn Objective,
        x: &DVector<f64>,
        grad: &DVector<f64>,
        direction: &mut DVector<f64>,
    );

    /// Whether the proposal is nominally a descent direction and must be
    /// validated against the gradient by the driver.
    fn is_direction_descent(&self) -> bool {
        true
    }

    /// Current ladder level in `0..=MAX_STRATEGY_LEVEL`.
    fn strategy_level(&self) -> u32;

    /// Climbs one ladder level toward gradient descent; saturates at
    /// [`MAX_STRATEGY_LEVEL`].
    fn increase_descent_strategy(&mut self);

    /// Resets the ladder to the strategy's native level.
    fn set_default_descent_strategy(&mut self);

    /// Linear-system timing buckets accumulated since the last
    /// [`reset`](DescentStrategy::reset).
    fn timings(&self) -> DirectionTimings {
        DirectionTimings::default()
    }
}

/// Builds the descent strategy named by the configuration document.
pub fn strategy_from_config(
    config: &SolverConfig,
    linear: &LinearSolverConfig,
) -> Result<Box<dyn DescentStrategy>, Error> {
    Ok(match config.solver {
        SolverKind::Bfgs => Box::new(quasinewton::Bfgs::new()),
        SolverKind::Lbfgs => Box::new(quasinewton::Lbfgs::new(config.lbfgs.history_size)?),
        SolverKind::DenseNewton => {
            Box::new(newton::DenseNewton::new(&config.newton, linear.solver)?)
        }
        SolverKind::SparseNewton => {
            Box::new(newton::SparseNewton::new(&config.newton, linear.solver)?)
        }
        SolverKind::GradientDescent => Box::new(gradientdescent::GradientDescent::new()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_factory_dispatch() {
        for (name, expected) in [
            ("BFGS", "BFGS"),
            ("LBFGS", "L-BFGS"),
            ("DenseNewton", "DenseNewton"),
            ("SparseNewton", "SparseNewton"),
            ("GradientDescent", "GradientDescent"),
        ] {
            let config = SolverConfig::from_json(&json!({ "solver": name })).unwrap();
            let strategy =
                strategy_from_config(&config, &LinearSolverConfig::default()).unwrap();
            assert_eq!(strategy.name(), expected);
        }
    }

    #[test]
    fn test_sparse_newton_rejects_lu() {
        let config = SolverConfig::from_json(&json!({ "solver": "SparseNewton" })).unwrap();
        let linear =
            LinearSolverConfig::from_json(&json!({ "solver": "LU" })).unwrap();
        assert!(strategy_from_config(&config, &linear).is_err());
    }
}
