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
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Newton's method with a sparse Hessian.
///
/// Requires [`Objective::hessian_sparse`]; the system is assembled in triplet
/// form and solved with a sparse Cholesky factorization.
///
/// Ladder: level 0 solves ∇²f·Δx = −g directly, level 1 runs the λ-regularized
/// doubling schedule, level 2 is gradient descent.
#[derive(Clone, Debug)]
pub struct SparseNewton {
    schedule: RegularizationSchedule,
    level: u32,
    ndof: usize,
    assembly_time: std::time::Duration,
    inverting_time: std::time::Duration,
}

impl SparseNewton {
    /// Constructor
    pub fn new(config: &NewtonConfig, backend: LinearBackend) -> Result<Self, Error> {
        if backend != LinearBackend::Cholesky {
            return Err(descent_error!(
                InvalidConfig,
                "SparseNewton: the sparse backend supports only the Cholesky factorization."
            ));
        }
        Ok(SparseNewton {
            schedule: RegularizationSchedule::new(config),
            level: 0,
            ndof: 0,
            assembly_time: std::time::Duration::ZERO,
            inverting_time: std::time::Duration::ZERO,
        })
    }

    fn solve(matrix: &CscMatrix<f64>, rhs: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        CscCholesky::factor(matrix)
            .ok()
            .map(|factor| factor.solve(rhs))
    }

    /// Direct solve at level 0; λ doubling schedule at level 1. Duplicate
    /// triplets sum on conversion, so the regularization is added as extra
    /// diagonal entries.
    fn solve_with_ladder(
        &self,
        triplets: &CooMatrix<f64>,
        rhs: &DMatrix<f64>,
    ) -> Option<DMatrix<f64>> {
        if self.level == 0 {
            return Self::solve(&CscMatrix::from(triplets), rhs);
        }

        let mut row_sums = vec![0.0; self.ndof];
        for (i, _, value) in triplets.triplet_iter() {
            row_sums[i] += value.abs();
        }
        let norm_inf = row_sums.iter().fold(0.0, |acc: f64, &v| acc.max(v));

        let mut weight = self.schedule.initial_weight(norm_inf);
        for _ in 0..self.schedule.max_attempts() {
            let mut regularized = triplets.clone();
            for i in 0..self.ndof {
                regularized.push(i, i, weight);
            }
            if let Some(solution) = Self::solve(&CscMatrix::from(&regularized), rhs) {
                return Some(solution);
            }
            weight *= 2.0;
        }
        None
    }
}

impl DescentStrategy for SparseNewton {
    fn name(&self) -> &'static str {
        "SparseNewton"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "Newton",
            1 => "regularized Newton",
            _ => "gradient descent",
        }
    }

    fn reset(&mut self, ndof: usize) {
        self.ndof = ndof;
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
        let mut triplets = CooMatrix::new(self.ndof, self.ndof);
        let assembled = objective.hessian_sparse(x, &mut triplets);
        self.assembly_time += assembly.elapsed();
        if assembled.is_err() {
            direction.fill(f64::NAN);
            return;
        }

        let rhs = DMatrix::from_column_slice(self.ndof, 1, (-grad).as_slice());
        let inverting = Instant::now();
        let solution = self.solve_with_ladder(&triplets, &rhs);
        self.inverting_time += inverting.elapsed();

        match solution {
            Some(solution) if solution.iter().all(|v| v.is_finite()) => {
                direction.copy_from(&solution.column(0));
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
