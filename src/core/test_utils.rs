// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Objectives shared by the unit tests.

use crate::core::{Error, Objective};
use argmin_testfunctions::{rosenbrock_2d, rosenbrock_2d_derivative, rosenbrock_2d_hessian};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;

/// Separable quadratic bowl f(x) = Σ (x_i − c_i)², minimized at the center c.
/// Provides dense and sparse Hessians (2·I).
pub struct Quadratic {
    center: DVector<f64>,
}

impl Quadratic {
    /// Bowl centered at `center`.
    pub fn new(center: Vec<f64>) -> Self {
        Quadratic {
            center: DVector::from_vec(center),
        }
    }
}

impl Objective for Quadratic {
    fn value(&mut self, x: &DVector<f64>) -> f64 {
        (x - &self.center).norm_squared()
    }

    fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
        grad.copy_from(&(2.0 * (x - &self.center)));
    }

    fn hessian(&mut self, x: &DVector<f64>, hessian: &mut DMatrix<f64>) -> Result<(), Error> {
        hessian.fill(0.0);
        for i in 0..x.len() {
            hessian[(i, i)] = 2.0;
        }
        Ok(())
    }

    fn hessian_sparse(
        &mut self,
        x: &DVector<f64>,
        hessian: &mut CooMatrix<f64>,
    ) -> Result<(), Error> {
        for i in 0..x.len() {
            hessian.push(i, i, 2.0);
        }
        Ok(())
    }
}

/// The saddle f(x) = x₀² − x₁² with the indefinite Hessian diag(2, −2).
pub struct Saddle;

impl Objective for Saddle {
    fn value(&mut self, x: &DVector<f64>) -> f64 {
        x[0] * x[0] - x[1] * x[1]
    }

    fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
        grad[0] = 2.0 * x[0];
        grad[1] = -2.0 * x[1];
    }

    fn hessian(&mut self, _x: &DVector<f64>, hessian: &mut DMatrix<f64>) -> Result<(), Error> {
        hessian.fill(0.0);
        hessian[(0, 0)] = 2.0;
        hessian[(1, 1)] = -2.0;
        Ok(())
    }

    fn hessian_sparse(
        &mut self,
        _x: &DVector<f64>,
        hessian: &mut CooMatrix<f64>,
    ) -> Result<(), Error> {
        hessian.push(0, 0, 2.0);
        hessian.push(1, 1, -2.0);
        Ok(())
    }
}

/// The 2D Rosenbrock function with a = 1, b = 100, minimized at (1, 1).
pub struct Rosenbrock;

impl Objective for Rosenbrock {
    fn value(&mut self, x: &DVector<f64>) -> f64 {
        rosenbrock_2d(&[x[0], x[1]], 1.0, 100.0)
    }

    fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
        let g = rosenbrock_2d_derivative(&[x[0], x[1]], 1.0, 100.0);
        grad.copy_from_slice(&g);
    }

    fn hessian(&mut self, x: &DVector<f64>, hessian: &mut DMatrix<f64>) -> Result<(), Error> {
        let h = rosenbrock_2d_hessian(&[x[0], x[1]], 1.0, 100.0);
        hessian[(0, 0)] = h[0];
        hessian[(0, 1)] = h[1];
        hessian[(1, 0)] = h[2];
        hessian[(1, 1)] = h[3];
        Ok(())
    }
}
