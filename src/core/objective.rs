// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The contract between the solve driver and the function being minimized.

use crate::core::{Criteria, DescentError, Error};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;

/// An objective function f(x) together with the cooperative hooks the solve
/// driver calls during a minimization.
///
/// Only [`value`](Objective::value) and [`gradient`](Objective::gradient) are
/// required. The Hessian methods default to [`DescentError::NotImplemented`];
/// the Newton strategies require the one matching their backend and fall back
/// along the strategy ladder when it is missing. All receivers are `&mut self`
/// because objectives commonly cache state that depends on the evaluation point
/// (refreshed through [`solution_changed`](Objective::solution_changed)).
pub trait Objective {
    /// Objective value at `x`. A non-finite value is fatal to the driver.
    fn value(&mut self, x: &DVector<f64>) -> f64;

    /// Writes ∇f(x) into `grad`. Non-finite entries are fatal to the driver.
    fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>);

    /// Writes ∇²f(x) into `hessian` (dense). Required by the dense Newton strategy.
    fn hessian(&mut self, _x: &DVector<f64>, _hessian: &mut DMatrix<f64>) -> Result<(), Error> {
        Err(DescentError::NotImplemented {
            text: "Method `hessian` of Objective trait not implemented!".to_string(),
        }
        .into())
    }

    /// Writes ∇²f(x) into `hessian` (triplet form). Required by the sparse Newton
    /// strategy.
    fn hessian_sparse(
        &mut self,
        _x: &DVector<f64>,
        _hessian: &mut CooMatrix<f64>,
    ) -> Result<(), Error> {
        Err(DescentError::NotImplemented {
            text: "Method `hessian_sparse` of Objective trait not implemented!".to_string(),
        }
        .into())
    }

    /// Notification that the evaluation point changed: once before the solve loop
    /// starts, after every committed step, and before every line-search trial
    /// evaluation. Objectives refresh x-dependent auxiliary state here. Must be
    /// idempotent in `x`.
    fn solution_changed(&mut self, _x: &DVector<f64>) {}

    /// Objective-driven early termination. Returning `true` stops the solve
    /// successfully after the current commit.
    fn stop(&mut self, _x: &DVector<f64>) -> bool {
        false
    }

    /// Notification after a committed step, with the iteration counter as it was
    /// during that iteration.
    fn post_step(&mut self, _iteration: u64, _x: &DVector<f64>) {}

    /// Side-effecting checkpoint hook invoked after every committed step.
    fn save_to_file(&mut self, _x: &DVector<f64>) {}

    /// Advisory per-iteration callback. Returning `false` ends the solve loop
    /// without an error (the status stays [`Continue`](crate::core::Status::Continue)).
    fn callback(&mut self, _criteria: &Criteria, _x: &DVector<f64>) -> bool {
        true
    }
}
