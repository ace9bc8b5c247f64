// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::RegularizationSchedule;
use crate::core::{Error, LinearBackend, NewtonConfig, Objective};
use crate::solver::{DescentStrategy, DirectionTimings, MAX_STRATEGY_LEVEL};
use instant::Instant;
use nalgebra::{DMatrix, DVector};

/// Newton's method with a dense Hessian.
///
/// Requires [`Objective::hessian`]; an objective without it sends the driver
/// down the fallback ladder on the first direction request.
///
/// Ladder: level 0 solves ∇²f·Δx = −g directly, level 1 runs the λ-regularized
/// doubling schedule, level 2 is gradient descent.
#[derive(Clone, Debug)]
pub struct DenseNewton {
    schedule: RegularizationSchedule,
    backend: LinearBackend,
    /// Hessian workspace, sized at `reset`
    hessian: DMatrix<f64>,
    level: u32,
    assembly_time: std::time::Duration,
    inverting_time: std::time::Duration,
}

impl DenseNewton {
    /// Constructor
    pub fn new(config: &NewtonConfig, backend: LinearBackend) -> Result<Self, Error> {
        Ok(DenseNewton {
            schedule: RegularizationSchedule::new(config),
            backend,
            hessian: DMatrix::zeros(0, 0),
            level: 0,
            assembly_time: std::time::Duration::ZERO,
            inverting_time: std::time::Duration::ZERO,
        })
    }

    fn solve(&self, matrix: DMatrix<f64>, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        match self.backend {
            LinearBackend::Cholesky => matrix.cholesky().map(|chol| chol.solve(rhs)),
            LinearBackend::Lu => matrix.full_piv_lu().solve(rhs),
        }
    }

    /// Direct solve at level 0; λ doubling schedule at level 1.
    fn solve_with_ladder(&self, rhs: &DVector<f64>) -> Option<DVector<f64>> {
        if self.level == 0 {
            return self.solve(self.hessian.clone(), rhs);
        }

        let norm_inf = self
            .hessian
            .row_iter()
            .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
            .fold(0.0, f64::max);
        let mut weight = self.schedule.initial_weight(norm_inf);
        for _ in 0..self.schedule.max_attempts() {
            let mut regularized = self.hessian.clone();
            for i in 0..regularized.nrows() {
                regularized[(i, i)] += weight;
            }
            if let Some(solution) = self.solve(regularized, rhs) {
                return Some(solution);
            }
            weight *= 2.0;
        }
        None
    }
}

impl DescentStrategy for DenseNewton {
    fn name(&self) -> &'static str {
        "DenseNewton"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "Newton",
            1 => "regularized Newton",
            _ => "gradient descent",
        }
    }

    fn reset(&mut self, ndof: usize) {
        self.hessian = DMatrix::zeros(ndof, ndof);
        self.level = 0;
        self.assembly_time = std::time::Duration::ZERO;
        self.inverting_time = std::time::Duration::ZERO;
    }

    fn compute_update_direction(
        &mut self,
        objective: &mut dyn Objective,
        x: &DVector<f64>,
        grad: &DVector<f64>,
        direction: &mut DVector<f64>,
    ) {
        if self.level >= MAX_STRATEGY_LEVEL {
            direction.copy_from(&(-grad));
            return;
        }

        let assembly = Instant::now();
        let assembled = objective.hessian(x, &mut self.hessian);
        self.assembly_time += assembly.elapsed();
        if assembled.is_err() {
            direction.fill(f64::NAN);
            return;
        }

        let inverting = Instant::now();
        let solution = self.solve_with_ladder(&(-grad));
        self.inverting_time += inverting.elapsed();

        match solution {
            Some(solution) if solution.iter().all(|v| v.is_finite()) => {
                direction.copy_from(&solution);
            }
            _ => direction.fill(f64::NAN),
        }
    }

    fn strategy_level(&self) -> u32 {
        self.level
    }

    fn increase_descent_strategy(&mut self) {
        if self.level < MAX_STRATEGY_LEVEL {
            self.level += 1;
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }

    fn timings(&self) -> DirectionTimings {
        DirectionTimings {
            assembly: self.assembly_time,
            inverting: self.inverting_time,
        }
    }
}
