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

use crate::core::Objective;
use crate::solver::{DescentStrategy, MAX_STRATEGY_LEVEL};
use nalgebra::{DMatrix, DVector};

/// BFGS with a dense inverse-Hessian approximation H.
///
/// The proposed direction is Δx = −H·g; H is updated with the standard BFGS
/// inverse update from the step and gradient change since the previous call.
///
/// Ladder: level 0 keeps the accumulated H, level 1 resets H to the identity
/// (discarding curvature that produced a bad direction), level 2 is gradient
/// descent.
#[derive(Clone, Debug)]
pub struct Bfgs {
    /// Inverse Hessian approximation
    inv_hessian: DMatrix<f64>,
    /// Point of the previous direction request
    prev_x: Option<DVector<f64>>,
    /// Gradient of the previous direction request
    prev_grad: Option<DVector<f64>>,
    level: u32,
}

impl Bfgs {
    /// Constructor
    pub fn new() -> Self {
        Bfgs {
            inv_hessian: DMatrix::identity(0, 0),
            prev_x: None,
            prev_grad: None,
            level: 0,
        }
    }

    fn update_inverse_hessian(&mut self, x: &DVector<f64>, grad: &DVector<f64>) {
        if let (Some(prev_x), Some(prev_grad)) = (&self.prev_x, &self.prev_grad) {
            let s = x - prev_x;
            let y = grad - prev_grad;
            let sy = s.dot(&y);
            // Skip degenerate and non-positive-curvature pairs; a retry at an
            // unchanged x produces s = 0 and must leave H untouched.
            if sy > f64::EPSILON {
                let n = x.len();
                let rho = 1.0 / sy;
                let a = DMatrix::identity(n, n) - rho * (&s * y.transpose());
                self.inv_hessian =
                    &a * &self.inv_hessian * a.transpose() + rho * (&s * s.transpose());
            }
        }
        self.prev_x = Some(x.clone());
        self.prev_grad = Some(grad.clone());
    }
}

impl Default for Bfgs {
    fn default() -> Self {
        Bfgs::new()
    }
}

impl DescentStrategy for Bfgs {
    fn name(&self) -> &'static str {
        "BFGS"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "BFGS",
            1 => "reset BFGS",
            _ => "gradient descent",
        }
    }

    fn reset(&mut self, ndof: usize) {
        self.inv_hessian = DMatrix::identity(ndof, ndof);
        self.prev_x = None;
        self.prev_grad = None;
        self.level = 0;
    }

    fn compute_update_direction(
        &mut self,
        _objective: &mut dyn Objective,
        x: &DVector<f64>,
        grad: &DVector<f64>,
        direction: &mut DVector<f64>,
    ) {
        self.update_inverse_hessian(x, grad);
        if self.level >= MAX_STRATEGY_LEVEL {
            direction.copy_from(&(-grad));
        } else {
            direction.copy_from(&(-(&self.inv_hessian * grad)));
        }
    }

    fn strategy_level(&self) -> u32 {
        self.level
    }

    fn increase_descent_strategy(&mut self) {
        if self.level < MAX_STRATEGY_LEVEL {
            self.level += 1;
        }
        if self.level == 1 {
            let n = self.inv_hessian.nrows();
            self.inv_hessian = DMatrix::identity(n, n);
            self.prev_x = None;
            self.prev_grad = None;
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }
}
