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

use crate::core::{Error, Objective};
use crate::solver::{DescentStrategy, MAX_STRATEGY_LEVEL};
use nalgebra::DVector;
use std::collections::VecDeque;

/// L-BFGS: limited-memory BFGS over a bounded history of curvature pairs.
///
/// The direction is computed with the two-loop recursion over up to `m`
/// (s, y) pairs, scaled initially by γ = sᵀy/yᵀy of the most recent pair.
///
/// Ladder: level 0 keeps the history, level 1 clears it (the next direction is
/// the γ-scaled negative gradient), level 2 is gradient descent.
#[derive(Clone, Debug)]
pub struct Lbfgs {
    /// Maximum number of curvature pairs kept
    m: usize,
    /// s_k ring buffer
    s: VecDeque<DVector<f64>>,
    /// y_k ring buffer
    y: VecDeque<DVector<f64>>,
    /// Point of the previous direction request
    prev_x: Option<DVector<f64>>,
    /// Gradient of the previous direction request
    prev_grad: Option<DVector<f64>>,
    level: u32,
}

impl Lbfgs {
    /// Constructor
    pub fn new(m: usize) -> Result<Self, Error> {
        if m == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "Lbfgs: history size must be positive."
            ));
        }
        Ok(Lbfgs {
            m,
            s: VecDeque::with_capacity(m),
            y: VecDeque::with_capacity(m),
            prev_x: None,
            prev_grad: None,
            level: 0,
        })
    }

    fn update_history(&mut self, x: &DVector<f64>, grad: &DVector<f64>) {
        if let (Some(prev_x), Some(prev_grad)) = (&self.prev_x, &self.prev_grad) {
            let sk = x - prev_x;
            let yk = grad - prev_grad;
            // Skip degenerate and non-positive-curvature pairs (s = 0 on a retry).
            if sk.dot(&yk) > f64::EPSILON {
                if self.s.len() == self.m {
                    self.s.pop_front();
                    self.y.pop_front();
                }
                self.s.push_back(sk);
                self.y.push_back(yk);
            }
        }
        self.prev_x = Some(x.clone());
        self.prev_grad = Some(grad.clone());
    }

    /// L-BFGS two-loop recursion: r ≈ H·g for the implicit inverse Hessian H.
    fn two_loop_recursion(&self, grad: &DVector<f64>) -> DVector<f64> {
        let gamma = if let (Some(sk), Some(yk)) = (self.s.back(), self.y.back()) {
            sk.dot(yk) / yk.dot(yk)
        } else {
            1.0
        };

        let mut q = grad.clone();
        let cur_m = self.s.len();
        let mut alpha = vec![0.0; cur_m];
        let mut rho = vec![0.0; cur_m];
        for (i, (sk, yk)) in self.s.iter().rev().zip(self.y.iter().rev()).enumerate() {
            let rho_t = 1.0 / yk.dot(sk);
            let alpha_t = rho_t * sk.dot(&q);
            q.axpy(-alpha_t, yk, 1.0);
            rho[cur_m - i - 1] = rho_t;
            alpha[cur_m - i - 1] = alpha_t;
        }
        let mut r = gamma * q;
        for (i, (sk, yk)) in self.s.iter().zip(self.y.iter()).enumerate() {
            let beta = rho[i] * yk.dot(&r);
            r.axpy(alpha[i] - beta, sk, 1.0);
        }
        r
    }
}

impl DescentStrategy for Lbfgs {
    fn name(&self) -> &'static str {
        "L-BFGS"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "L-BFGS",
            1 => "cleared L-BFGS",
            _ => "gradient descent",
        }
    }

    fn reset(&mut self, _ndof: usize) {
        self.s.clear();
        self.y.clear();
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
        self.update_history(x, grad);
        if self.level >= MAX_STRATEGY_LEVEL {
            direction.copy_from(&(-grad));
        } else {
            direction.copy_from(&(-self.two_loop_recursion(grad)));
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
            self.s.clear();
            self.y.clear();
            self.prev_x = None;
            self.prev_grad = None;
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }
}
