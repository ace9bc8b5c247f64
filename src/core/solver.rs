// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::core::{
    Criteria, Error, ErrorCode, LineSearch, LinearSolverConfig, Objective, SolverConfig, Status,
};
use crate::solver::linesearch::linesearch_from_config;
use crate::solver::{strategy_from_config, DescentStrategy, MAX_STRATEGY_LEVEL};
use instant::Instant;
use nalgebra::DVector;
use serde_json::{json, Value};
use slog::{debug, error, info};
use std::time::Duration;

/// Scalar solve parameters, as consumed by [`Solver::from_parts`].
///
/// The values are the raw configured ones; the constructor scales the
/// tolerances by the characteristic length exactly once.
#[derive(Debug, Clone)]
pub struct SolverParams {
    /// Threshold on the update-direction norm (0 disables)
    pub x_delta: f64,
    /// Threshold on the absolute energy change (0 disables)
    pub f_delta: f64,
    /// Threshold on the gradient norm
    pub grad_norm: f64,
    /// Iteration cap
    pub max_iterations: u64,
    /// Gradient-norm threshold used during iteration 0 only
    pub first_grad_norm_tol: f64,
    /// Whether hitting the iteration cap counts as a successful exit
    pub allow_out_of_iterations: bool,
    /// Gradient-norm acceptance tolerance handed to the line search (0 disables)
    pub use_grad_norm_tol: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            x_delta: 0.0,
            f_delta: 0.0,
            grad_norm: 1e-8,
            max_iterations: 1000,
            first_grad_norm_tol: 1e-10,
            allow_out_of_iterations: false,
            use_grad_norm_tol: 0.0,
        }
    }
}

impl From<&SolverConfig> for SolverParams {
    fn from(config: &SolverConfig) -> Self {
        SolverParams {
            x_delta: config.x_delta,
            f_delta: config.f_delta,
            grad_norm: config.grad_norm,
            max_iterations: config.max_iterations,
            first_grad_norm_tol: config.first_grad_norm_tol,
            allow_out_of_iterations: config.allow_out_of_iterations,
            use_grad_norm_tol: config.line_search.use_grad_norm_tol,
        }
    }
}

/// The solve driver.
///
/// One iteration asks the descent strategy for an update direction, validates
/// that it points downhill, scales it with the line search and commits
/// x ← x + αΔx. Failures climb the strategy's fallback ladder and retry the
/// iteration without committing; the iteration counter advances only on
/// commit. Stopping is multi-criterion ([`Criteria::check`]) with hooks for
/// objective-driven and advisory termination.
///
/// An instance is created from configuration documents (or parts), used via
/// [`minimize`](Solver::minimize), which resets all per-solve state, and
/// queried afterwards through [`solver_info`](Solver::solver_info) and the
/// accessors. `minimize` must not be invoked concurrently on the same
/// instance.
pub struct Solver {
    strategy: Box<dyn DescentStrategy>,
    line_search: Box<dyn LineSearch>,
    stop: Criteria,
    current: Criteria,
    status: Status,
    error_code: ErrorCode,
    /// Scaled gradient tolerance active from iteration 1 on
    grad_norm_tol: f64,
    /// Scaled gradient tolerance active during iteration 0
    first_grad_norm_tol: f64,
    allow_out_of_iterations: bool,
    logger: slog::Logger,
    solver_info: Value,
    total_time: Duration,
    grad_time: Duration,
    obj_fun_time: Duration,
    line_search_time: Duration,
    constraint_set_update_time: Duration,
}

impl Solver {
    /// Builds a solver from a configuration document, a linear-solver document
    /// (consumed by the Newton strategies only), the problem's characteristic
    /// length and a logging sink.
    ///
    /// All stopping tolerances (including `first_grad_norm_tol` and the line
    /// search's `use_grad_norm_tol`) are multiplied by `characteristic_length`
    /// here, once.
    pub fn new(
        config: &Value,
        linear_solver_config: &Value,
        characteristic_length: f64,
        logger: slog::Logger,
    ) -> Result<Self, Error> {
        let config = SolverConfig::from_json(config)?;
        let linear = LinearSolverConfig::from_json(linear_solver_config)?;
        let strategy = strategy_from_config(&config, &linear)?;
        let line_search = linesearch_from_config(&config.line_search)?;
        Solver::from_parts(
            strategy,
            line_search,
            SolverParams::from(&config),
            characteristic_length,
            logger,
        )
    }

    /// Builds a solver from already-constructed parts, bypassing the JSON
    /// layer. The tolerances in `params` are scaled by
    /// `characteristic_length` exactly as in [`Solver::new`].
    pub fn from_parts(
        strategy: Box<dyn DescentStrategy>,
        mut line_search: Box<dyn LineSearch>,
        params: SolverParams,
        characteristic_length: f64,
        logger: slog::Logger,
    ) -> Result<Self, Error> {
        if !characteristic_length.is_finite() || characteristic_length <= 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "Solver: characteristic_length must be positive."
            ));
        }
        if params.max_iterations == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "Solver: max_iterations must be positive."
            ));
        }

        let stop = Criteria {
            iterations: params.max_iterations,
            x_delta: params.x_delta * characteristic_length,
            f_delta: params.f_delta * characteristic_length,
            grad_norm: params.grad_norm * characteristic_length,
            condition: f64::NAN,
        };
        line_search.set_use_grad_norm_tol(params.use_grad_norm_tol * characteristic_length);

        Ok(Solver {
            strategy,
            line_search,
            grad_norm_tol: stop.grad_norm,
            first_grad_norm_tol: params.first_grad_norm_tol * characteristic_length,
            stop,
            current: Criteria::new(),
            status: Status::Continue,
            error_code: ErrorCode::Success,
            allow_out_of_iterations: params.allow_out_of_iterations,
            logger,
            solver_info: Value::Null,
            total_time: Duration::ZERO,
            grad_time: Duration::ZERO,
            obj_fun_time: Duration::ZERO,
            line_search_time: Duration::ZERO,
            constraint_set_update_time: Duration::ZERO,
        })
    }

    /// Minimizes `objective` starting from `x`, which is updated in place.
    ///
    /// On success `x` holds the final iterate and [`status`](Solver::status)
    /// the satisfied criterion. Fatal conditions (non-finite energy or
    /// gradient, an exhausted fallback ladder, the iteration cap unless
    /// allowed) are logged once and returned as an error.
    pub fn minimize(
        &mut self,
        objective: &mut dyn Objective,
        x: &mut DVector<f64>,
    ) -> Result<(), Error> {
        self.reset(x.len());

        let total = Instant::now();

        // Iteration 0 runs against its own gradient tolerance.
        self.stop.grad_norm = self.first_grad_norm_tol;

        let ndof = x.len();
        let mut grad = DVector::zeros(ndof);
        let mut delta_x = DVector::zeros(ndof);
        let mut f_prev = f64::NAN;
        let mut energy = f64::NAN;

        let timer = Instant::now();
        objective.solution_changed(x);
        self.constraint_set_update_time += timer.elapsed();

        self.update_solver_info(energy, total.elapsed());

        let result = loop {
            self.current.reset_measurements();

            let timer = Instant::now();
            energy = objective.value(x);
            self.obj_fun_time += timer.elapsed();
            if !energy.is_finite() {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::NanEncountered;
                error!(self.logger, "f(x) is nan or inf; stopping");
                break Err(descent_error!(NanEncountered, "f(x) is nan or inf"));
            }

            // NaN until a second energy is available
            self.current.f_delta = (f_prev - energy).abs();
            f_prev = energy;

            self.status = Criteria::check(&self.stop, &self.current);
            if self.status.terminated() {
                break Ok(());
            }

            let timer = Instant::now();
            objective.gradient(x, &mut grad);
            self.grad_time += timer.elapsed();
            let grad_norm = grad.norm();
            if grad_norm.is_nan() {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::NanEncountered;
                error!(self.logger, "gradient is nan; stopping");
                break Err(descent_error!(NanEncountered, "gradient is nan"));
            }

            self.current.grad_norm = grad_norm;
            self.status = Criteria::check(&self.stop, &self.current);
            if self.status.terminated() {
                break Ok(());
            }

            self.strategy
                .compute_update_direction(objective, x, &grad, &mut delta_x);

            if self.strategy.is_direction_descent()
                && grad_norm > 0.0
                && delta_x.dot(&grad) >= 0.0
            {
                if self.strategy.strategy_level() >= MAX_STRATEGY_LEVEL {
                    self.status = Status::UserDefined;
                    self.error_code = ErrorCode::NotDescentDirection;
                    error!(
                        self.logger,
                        "direction is not a descent direction on the terminal strategy; stopping"
                    );
                    break Err(descent_error!(
                        NotDescentDirection,
                        "the fallback ladder was exhausted without a descent direction"
                    ));
                }
                let from = self.strategy.descent_strategy_name();
                self.strategy.increase_descent_strategy();
                debug!(
                    self.logger,
                    "direction is not a descent direction; reverting to {}",
                    self.strategy.descent_strategy_name();
                    "from" => from
                );
                continue;
            }

            let x_delta = delta_x.norm();
            if x_delta.is_nan() {
                if self.strategy.strategy_level() >= MAX_STRATEGY_LEVEL {
                    self.status = Status::UserDefined;
                    self.error_code = ErrorCode::NanEncountered;
                    error!(
                        self.logger,
                        "update direction is nan on the terminal strategy; stopping"
                    );
                    break Err(descent_error!(NanEncountered, "update direction is nan"));
                }
                let from = self.strategy.descent_strategy_name();
                self.strategy.increase_descent_strategy();
                debug!(
                    self.logger,
                    "update direction is nan; reverting to {}",
                    self.strategy.descent_strategy_name();
                    "from" => from
                );
                continue;
            }

            // On the terminal strategy the step norm says nothing about
            // closeness to a stationary point, so it is not a stop signal.
            self.current.x_delta = if self.strategy.strategy_level() >= MAX_STRATEGY_LEVEL {
                f64::NAN
            } else {
                x_delta
            };
            self.status = Criteria::check(&self.stop, &self.current);
            if self.status.terminated() {
                break Ok(());
            }

            let timer = Instant::now();
            let rate = self.line_search.line_search(x, &delta_x, objective);
            self.line_search_time += timer.elapsed();
            if rate.is_nan() {
                if self.strategy.strategy_level() < MAX_STRATEGY_LEVEL {
                    let from = self.strategy.descent_strategy_name();
                    self.strategy.increase_descent_strategy();
                    debug!(
                        self.logger,
                        "line search failed; reverting to {}",
                        self.strategy.descent_strategy_name();
                        "from" => from
                    );
                    continue;
                }
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::LineSearchFailed;
                error!(self.logger, "line search failed on gradient descent; stopping");
                break Err(descent_error!(
                    LineSearchFailed,
                    "line search failed on the terminal fallback strategy"
                ));
            }

            x.axpy(rate, &delta_x, 1.0);
            let timer = Instant::now();
            objective.solution_changed(x);
            self.constraint_set_update_time += timer.elapsed();

            self.strategy.set_default_descent_strategy();

            if objective.stop(x) {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::Success;
                debug!(self.logger, "objective requested stop");
                break Ok(());
            }

            objective.post_step(self.current.iterations, x);
            objective.save_to_file(x);

            self.current.iterations += 1;
            if self.current.iterations >= self.stop.iterations {
                self.status = Status::IterationLimit;
            }

            // Iteration 0 is over; the configured tolerance applies from here on.
            if self.current.iterations == 1 {
                self.stop.grad_norm = self.grad_norm_tol;
            }

            self.update_solver_info(energy, total.elapsed());

            if !objective.callback(&self.current, x) {
                debug!(self.logger, "callback requested stop");
                break Ok(());
            }

            if self.status.terminated() {
                break Ok(());
            }
        };

        self.total_time = total.elapsed();
        self.update_solver_info(energy, self.total_time);

        match result {
            Err(e) => Err(e),
            Ok(()) => {
                if self.status == Status::IterationLimit && !self.allow_out_of_iterations {
                    error!(
                        self.logger,
                        "reached the iteration limit before convergence; stopping";
                        "iterations" => self.current.iterations
                    );
                    return Err(descent_error!(
                        OutOfIterations,
                        "reached the iteration limit before convergence"
                    ));
                }
                info!(
                    self.logger,
                    "finished";
                    "status" => %self.status,
                    "iterations" => self.current.iterations,
                    "energy" => energy
                );
                Ok(())
            }
        }
    }

    fn reset(&mut self, ndof: usize) {
        self.current = Criteria::new();
        self.status = Status::Continue;
        self.error_code = ErrorCode::Success;
        self.stop.grad_norm = self.grad_norm_tol;
        self.strategy.reset(ndof);
        self.line_search.reset_timings();
        self.solver_info = Value::Null;
        self.total_time = Duration::ZERO;
        self.grad_time = Duration::ZERO;
        self.obj_fun_time = Duration::ZERO;
        self.line_search_time = Duration::ZERO;
        self.constraint_set_update_time = Duration::ZERO;
    }

    fn update_solver_info(&mut self, energy: f64, total_time: Duration) {
        let iterations = self.current.iterations.max(1) as f64;
        let per_iteration = move |time: Duration| time.as_secs_f64() / iterations;
        let search = self.line_search.timings();
        let direction = self.strategy.timings();
        self.solver_info = json!({
            "solver": self.strategy.name(),
            "line_search": self.line_search.name(),
            "status": self.status.text(),
            "error_code": self.error_code.text(),
            "energy": energy,
            "iterations": self.current.iterations,
            "xDelta": self.current.x_delta,
            "fDelta": self.current.f_delta,
            "gradNorm": self.current.grad_norm,
            "condition": self.current.condition,
            "total_time": total_time.as_secs_f64(),
            "time_grad": per_iteration(self.grad_time),
            "time_assembly": per_iteration(direction.assembly),
            "time_inverting": per_iteration(direction.inverting),
            "time_line_search": per_iteration(self.line_search_time),
            "time_constraint_set_update": per_iteration(
                self.constraint_set_update_time + search.constraint_set_update
            ),
            "time_obj_fun": per_iteration(self.obj_fun_time),
            "time_checking_for_nan_inf": per_iteration(search.checking_for_nan_inf),
            "time_broad_phase_ccd": per_iteration(search.broad_phase_ccd),
            "time_ccd": per_iteration(search.ccd),
            "time_classical_line_search": per_iteration(
                search.classical_line_search.saturating_sub(search.constraint_set_update)
            ),
            "time_line_search_constraint_set_update": per_iteration(search.constraint_set_update),
            "line_search_iterations": search.iterations,
        });
    }

    /// The status of the last `minimize` call.
    pub fn status(&self) -> Status {
        self.status
    }

    /// The error code of the last `minimize` call.
    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// The per-iteration measurements as of the last update.
    pub fn criteria(&self) -> &Criteria {
        &self.current
    }

    /// The effective stop thresholds (already scaled by the characteristic
    /// length).
    pub fn stop_criteria(&self) -> &Criteria {
        &self.stop
    }

    /// The structured statistics record of the last `minimize` call.
    ///
    /// Unset measurements (NaN) appear as JSON `null`.
    pub fn solver_info(&self) -> &Value {
        &self.solver_info
    }

    /// Name of the configured descent strategy.
    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Name of the behavior at the strategy's current ladder level.
    pub fn descent_strategy_name(&self) -> &'static str {
        self.strategy.descent_strategy_name()
    }

    /// The strategy's current ladder level.
    pub fn strategy_level(&self) -> u32 {
        self.strategy.strategy_level()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log;
    use crate::core::test_utils::{Quadratic, Rosenbrock};
    use crate::core::DescentError;
    use crate::solver::gradientdescent::GradientDescent;
    use crate::solver::linesearch::Backtracking;
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    fn solver(config: Value) -> Solver {
        Solver::new(&config, &json!({}), 1.0, log::discard()).unwrap()
    }

    /// Wraps an objective and records the driver's hook traffic.
    struct Instrumented<O> {
        inner: O,
        post_steps: u64,
        saves: u64,
        callbacks: u64,
        stop_after: Option<u64>,
        callback_false_after: Option<u64>,
        energies: Vec<f64>,
    }

    impl<O> Instrumented<O> {
        fn new(inner: O) -> Self {
            Instrumented {
                inner,
                post_steps: 0,
                saves: 0,
                callbacks: 0,
                stop_after: None,
                callback_false_after: None,
                energies: Vec::new(),
            }
        }
    }

    impl<O: Objective> Objective for Instrumented<O> {
        fn value(&mut self, x: &DVector<f64>) -> f64 {
            self.inner.value(x)
        }

        fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
            self.inner.gradient(x, grad)
        }

        fn hessian(
            &mut self,
            x: &DVector<f64>,
            hessian: &mut nalgebra::DMatrix<f64>,
        ) -> Result<(), Error> {
            self.inner.hessian(x, hessian)
        }

        fn stop(&mut self, _x: &DVector<f64>) -> bool {
            matches!(self.stop_after, Some(n) if self.post_steps >= n)
        }

        fn post_step(&mut self, _iteration: u64, x: &DVector<f64>) {
            self.post_steps += 1;
            let energy = self.inner.value(x);
            self.energies.push(energy);
        }

        fn save_to_file(&mut self, _x: &DVector<f64>) {
            self.saves += 1;
        }

        fn callback(&mut self, _criteria: &Criteria, _x: &DVector<f64>) -> bool {
            self.callbacks += 1;
            match self.callback_false_after {
                Some(n) => self.callbacks < n,
                None => true,
            }
        }
    }

    // --- End-to-end scenarios -------------------------------------------------

    #[test]
    fn test_newton_one_step_on_1d_quadratic() {
        // f(x) = (x - 3)^2 from x = 0 with a full Newton step and no line
        // search converges in a single iteration.
        let mut solver = solver(json!({
            "solver": "DenseNewton",
            "line_search": { "method": "None" },
            "max_iterations": 10,
            "grad_norm": 1e-10,
        }));
        let mut objective = Quadratic::new(vec![3.0]);
        let mut x = DVector::from_vec(vec![0.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_eq!(solver.error_code(), ErrorCode::Success);
        assert_eq!(solver.criteria().iterations, 1);
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-10);
    }

    #[test]
    fn test_lbfgs_armijo_on_rosenbrock() {
        let mut solver = solver(json!({
            "solver": "LBFGS",
            "LBFGS": { "history_size": 7 },
            "line_search": { "method": "Armijo" },
            "max_iterations": 500,
            "grad_norm": 1e-6,
        }));
        let mut objective = Rosenbrock;
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert!(solver.criteria().iterations < 500);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_dense_newton_on_rosenbrock() {
        let mut solver = solver(json!({
            "solver": "DenseNewton",
            "line_search": { "method": "Armijo" },
            "max_iterations": 100,
            "grad_norm": 1e-8,
        }));
        let mut objective = Rosenbrock;
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-6);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-6);
    }

    /// Claims descent but proposes +g on its native level; −g after one
    /// fallback. Used to drive the non-descent rescue path.
    struct FlipStrategy {
        level: u32,
        increases: Rc<Cell<u32>>,
        defaults: Rc<Cell<u32>>,
    }

    impl DescentStrategy for FlipStrategy {
        fn name(&self) -> &'static str {
            "Flip"
        }

        fn descent_strategy_name(&self) -> &'static str {
            if self.level == 0 {
                "flip"
            } else {
                "gradient descent"
            }
        }

        fn reset(&mut self, _ndof: usize) {
            self.level = 0;
        }

        fn compute_update_direction(
            &mut self,
            _objective: &mut dyn Objective,
            _x: &DVector<f64>,
            grad: &DVector<f64>,
            direction: &mut DVector<f64>,
        ) {
            if self.level == 0 {
                direction.copy_from(grad);
            } else {
                direction.copy_from(&(-grad));
            }
        }

        fn strategy_level(&self) -> u32 {
            self.level
        }

        fn increase_descent_strategy(&mut self) {
            if self.level < MAX_STRATEGY_LEVEL {
                self.level = MAX_STRATEGY_LEVEL;
                self.increases.set(self.increases.get() + 1);
            }
        }

        fn set_default_descent_strategy(&mut self) {
            self.defaults.set(self.defaults.get() + 1);
            self.level = 0;
        }
    }

    #[test]
    fn test_non_descent_direction_is_rescued() {
        let increases = Rc::new(Cell::new(0));
        let defaults = Rc::new(Cell::new(0));
        let strategy = FlipStrategy {
            level: 0,
            increases: Rc::clone(&increases),
            defaults: Rc::clone(&defaults),
        };
        let mut solver = Solver::from_parts(
            Box::new(strategy),
            Box::new(Backtracking::new(1e-4, 0.5, 30, 1.0).unwrap()),
            SolverParams {
                max_iterations: 10,
                grad_norm: 1e-10,
                ..SolverParams::default()
            },
            1.0,
            log::discard(),
        )
        .unwrap();

        let mut objective = Instrumented::new(Quadratic::new(vec![0.0]));
        let mut x = DVector::from_vec(vec![4.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        // The +g proposal was rejected without a commit, the fallback −g
        // attempt of the same iteration succeeded, and the ladder was reset at
        // the commit: one increase, one commit, counter advanced by one.
        assert_eq!(increases.get(), 1);
        assert_eq!(defaults.get(), 1);
        assert_eq!(solver.strategy_level(), 0);
        assert_eq!(solver.criteria().iterations, 1);
        assert_eq!(objective.post_steps, 1);
        assert_relative_eq!(x[0], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_line_search_failure_on_gradient_descent_is_fatal() {
        // The energy is finite only at the starting point, so every trial step
        // fails and gradient descent has nowhere to fall back to.
        struct Wall;
        impl Objective for Wall {
            fn value(&mut self, x: &DVector<f64>) -> f64 {
                if x[0].abs() < 1e-12 {
                    1.0
                } else {
                    f64::INFINITY
                }
            }
            fn gradient(&mut self, _x: &DVector<f64>, grad: &mut DVector<f64>) {
                grad[0] = 1.0;
            }
        }

        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "line_search": { "method": "Armijo" },
            "max_iterations": 10,
        }));
        let mut objective = Wall;
        let mut x = DVector::from_vec(vec![0.0]);

        let err = solver.minimize(&mut objective, &mut x).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescentError>(),
            Some(DescentError::LineSearchFailed { .. })
        ));
        assert_eq!(solver.status(), Status::UserDefined);
        assert_eq!(solver.error_code(), ErrorCode::LineSearchFailed);
        assert_eq!(solver.criteria().iterations, 0);
    }

    #[test]
    fn test_nan_gradient_is_fatal() {
        struct NanGrad;
        impl Objective for NanGrad {
            fn value(&mut self, _x: &DVector<f64>) -> f64 {
                1.0
            }
            fn gradient(&mut self, _x: &DVector<f64>, grad: &mut DVector<f64>) {
                grad.fill(f64::NAN);
            }
        }

        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "max_iterations": 10,
        }));
        let mut objective = NanGrad;
        let mut x = DVector::from_vec(vec![0.0]);

        let err = solver.minimize(&mut objective, &mut x).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescentError>(),
            Some(DescentError::NanEncountered { .. })
        ));
        assert_eq!(solver.status(), Status::UserDefined);
        assert_eq!(solver.error_code(), ErrorCode::NanEncountered);
        assert_eq!(solver.criteria().iterations, 0);
    }

    #[test]
    fn test_nan_energy_is_fatal() {
        struct NanValue;
        impl Objective for NanValue {
            fn value(&mut self, _x: &DVector<f64>) -> f64 {
                f64::NAN
            }
            fn gradient(&mut self, _x: &DVector<f64>, grad: &mut DVector<f64>) {
                grad.fill(0.0);
            }
        }

        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "max_iterations": 10,
        }));
        let mut objective = NanValue;
        let mut x = DVector::from_vec(vec![0.0]);

        let err = solver.minimize(&mut objective, &mut x).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescentError>(),
            Some(DescentError::NanEncountered { .. })
        ));
        assert_eq!(solver.criteria().iterations, 0);
    }

    #[test]
    fn test_callback_stop_is_a_clean_exit() {
        let mut solver = solver(json!({
            "solver": "LBFGS",
            "line_search": { "method": "Armijo" },
            "max_iterations": 500,
            "grad_norm": 1e-14,
            "first_grad_norm_tol": 1e-14,
        }));
        let mut objective = Instrumented::new(Rosenbrock);
        objective.callback_false_after = Some(5);
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::Continue);
        assert_eq!(solver.error_code(), ErrorCode::Success);
        assert_eq!(solver.criteria().iterations, 5);
        assert_eq!(objective.callbacks, 5);
    }

    #[test]
    fn test_objective_stop_is_a_successful_user_exit() {
        let mut solver = solver(json!({
            "solver": "LBFGS",
            "line_search": { "method": "Armijo" },
            "max_iterations": 500,
            "grad_norm": 1e-14,
            "first_grad_norm_tol": 1e-14,
        }));
        let mut objective = Instrumented::new(Rosenbrock);
        objective.stop_after = Some(3);
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::UserDefined);
        assert_eq!(solver.error_code(), ErrorCode::Success);
    }

    // --- Properties -----------------------------------------------------------

    #[test]
    fn test_already_converged_input_stays_put() {
        let mut solver = solver(json!({
            "solver": "LBFGS",
            "max_iterations": 100,
            "grad_norm": 1e-8,
        }));
        let mut objective = Quadratic::new(vec![1.0, 2.0]);
        let mut x = DVector::from_vec(vec![1.0, 2.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_eq!(solver.criteria().iterations, 0);
        assert_relative_eq!(x[0], 1.0, epsilon = f64::EPSILON);
        assert_relative_eq!(x[1], 2.0, epsilon = f64::EPSILON);
    }

    #[test]
    fn test_monotone_descent_and_finite_iterates() {
        let mut solver = solver(json!({
            "solver": "LBFGS",
            "line_search": { "method": "Armijo" },
            "max_iterations": 500,
            "grad_norm": 1e-6,
        }));
        let mut objective = Instrumented::new(Rosenbrock);
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert!(objective.energies.iter().all(|e| e.is_finite()));
        for pair in objective.energies.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-12);
        }
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_thresholds_scale_with_characteristic_length() {
        let config = json!({
            "solver": "BFGS",
            "x_delta": 1e-5,
            "f_delta": 1e-7,
            "grad_norm": 1e-6,
        });
        let solver = Solver::new(&config, &json!({}), 2.5, log::discard()).unwrap();

        let stop = solver.stop_criteria();
        assert_relative_eq!(stop.x_delta, 2.5e-5, epsilon = 1e-18);
        assert_relative_eq!(stop.f_delta, 2.5e-7, epsilon = 1e-20);
        assert_relative_eq!(stop.grad_norm, 2.5e-6, epsilon = 1e-19);
    }

    #[test]
    fn test_first_iteration_uses_first_grad_norm_tol() {
        // The gradient norm at the start (10) is above grad_norm but below
        // first_grad_norm_tol, so the solve exits during iteration 0.
        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "max_iterations": 100,
            "grad_norm": 1e-8,
            "first_grad_norm_tol": 100.0,
        }));
        let mut objective = Quadratic::new(vec![0.0]);
        let mut x = DVector::from_vec(vec![5.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_eq!(solver.criteria().iterations, 0);
        assert_relative_eq!(x[0], 5.0, epsilon = f64::EPSILON);
    }

    #[test]
    fn test_original_tolerance_restored_after_iteration_0() {
        // A very tight first tolerance prevents an iteration-0 exit; the
        // configured tolerance is active from iteration 1 on.
        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "line_search": { "method": "Armijo" },
            "max_iterations": 100,
            "grad_norm": 100.0,
            "first_grad_norm_tol": 1e-300,
        }));
        let mut objective = Quadratic::new(vec![0.0]);
        let mut x = DVector::from_vec(vec![5.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_eq!(solver.criteria().iterations, 1);
    }

    #[test]
    fn test_iteration_limit_is_an_error_by_default() {
        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "line_search": { "method": "Armijo" },
            "max_iterations": 2,
            "grad_norm": 1e-14,
            "first_grad_norm_tol": 1e-14,
        }));
        let mut objective = Rosenbrock;
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        let err = solver.minimize(&mut objective, &mut x).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DescentError>(),
            Some(DescentError::OutOfIterations { .. })
        ));
        assert_eq!(solver.status(), Status::IterationLimit);
        assert_eq!(solver.criteria().iterations, 2);
    }

    #[test]
    fn test_iteration_limit_can_be_allowed() {
        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "line_search": { "method": "Armijo" },
            "max_iterations": 2,
            "grad_norm": 1e-14,
            "first_grad_norm_tol": 1e-14,
            "allow_out_of_iterations": true,
        }));
        let mut objective = Rosenbrock;
        let mut x = DVector::from_vec(vec![-1.2, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();
        assert_eq!(solver.status(), Status::IterationLimit);
    }

    #[test]
    fn test_newton_without_hessian_falls_back_and_converges() {
        // A first-order-only objective: the Newton direction is unusable, the
        // ladder ends on gradient descent and the solve still converges.
        let mut solver = solver(json!({
            "solver": "DenseNewton",
            "line_search": { "method": "Armijo" },
            "max_iterations": 200,
            "grad_norm": 1e-6,
        }));

        struct FirstOrderOnly;
        impl Objective for FirstOrderOnly {
            fn value(&mut self, x: &DVector<f64>) -> f64 {
                x.norm_squared()
            }
            fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
                grad.copy_from(&(2.0 * x));
            }
        }

        let mut objective = FirstOrderOnly;
        let mut x = DVector::from_vec(vec![2.0, -3.0]);

        solver.minimize(&mut objective, &mut x).unwrap();
        assert_relative_eq!(x[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sparse_newton_end_to_end() {
        let mut solver = solver(json!({
            "solver": "SparseNewton",
            "line_search": { "method": "None" },
            "max_iterations": 10,
            "grad_norm": 1e-10,
        }));
        let mut objective = Quadratic::new(vec![1.0, -2.0, 0.5]);
        let mut x = DVector::from_vec(vec![0.0, 0.0, 0.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_eq!(solver.criteria().iterations, 1);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], -2.0, epsilon = 1e-10);
        assert_relative_eq!(x[2], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_bfgs_end_to_end() {
        let mut solver = solver(json!({
            "solver": "BFGS",
            "line_search": { "method": "Armijo" },
            "max_iterations": 100,
            "grad_norm": 1e-8,
        }));
        let mut objective = Quadratic::new(vec![1.0, 2.0, 3.0]);
        let mut x = DVector::from_vec(vec![0.0, 0.0, 0.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-7);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-7);
        assert_relative_eq!(x[2], 3.0, epsilon = 1e-7);
    }

    #[test]
    fn test_post_step_and_save_hooks_fire_per_commit() {
        let mut solver = solver(json!({
            "solver": "GradientDescent",
            "line_search": { "method": "Armijo" },
            "max_iterations": 20,
            "grad_norm": 1e-14,
            "first_grad_norm_tol": 1e-14,
            "allow_out_of_iterations": true,
        }));
        let mut objective = Instrumented::new(Quadratic::new(vec![0.0, 0.0]));
        let mut x = DVector::from_vec(vec![1.0, 1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();

        assert_eq!(objective.post_steps, solver.criteria().iterations);
        assert_eq!(objective.saves, solver.criteria().iterations);
        assert_eq!(objective.callbacks, solver.criteria().iterations);
    }

    #[test]
    fn test_solver_info_keys() {
        let mut solver = solver(json!({
            "solver": "DenseNewton",
            "line_search": { "method": "Armijo" },
            "max_iterations": 50,
            "grad_norm": 1e-8,
        }));
        let mut objective = Quadratic::new(vec![1.0]);
        let mut x = DVector::from_vec(vec![0.0]);
        solver.minimize(&mut objective, &mut x).unwrap();

        let info = solver.solver_info();
        for key in [
            "solver",
            "line_search",
            "status",
            "error_code",
            "energy",
            "iterations",
            "xDelta",
            "fDelta",
            "gradNorm",
            "condition",
            "total_time",
            "time_grad",
            "time_assembly",
            "time_inverting",
            "time_line_search",
            "time_constraint_set_update",
            "time_obj_fun",
            "time_checking_for_nan_inf",
            "time_broad_phase_ccd",
            "time_ccd",
            "time_classical_line_search",
            "time_line_search_constraint_set_update",
            "line_search_iterations",
        ] {
            assert!(info.get(key).is_some(), "missing key {}", key);
        }

        assert_eq!(info["solver"], "DenseNewton");
        assert_eq!(info["line_search"], "Backtracking");
        assert_eq!(info["status"], "Gradient norm tolerance reached");
        assert_eq!(info["error_code"], "success");
        assert_eq!(
            info["iterations"].as_u64().unwrap(),
            solver.criteria().iterations
        );
    }

    #[test]
    fn test_construction_rejects_bad_documents() {
        let res = Solver::new(
            &json!({ "solver": "Simplex" }),
            &json!({}),
            1.0,
            log::discard(),
        );
        assert!(res.is_err());

        let res = Solver::new(
            &json!({ "solver": "BFGS" }),
            &json!({ "solver": "QR" }),
            1.0,
            log::discard(),
        );
        assert!(res.is_err());

        let res = Solver::new(&json!({ "solver": "BFGS" }), &json!({}), 0.0, log::discard());
        assert_error!(
            res,
            "Invalid configuration: \"Solver: characteristic_length must be positive.\""
        );
    }

    #[test]
    fn test_gradient_descent_ignores_x_delta() {
        // On the terminal strategy the step norm is not a stopping signal,
        // even with an absurdly large x_delta threshold.
        let mut solver = Solver::from_parts(
            Box::new(GradientDescent::new()),
            Box::new(Backtracking::new(1e-4, 0.5, 30, 1.0).unwrap()),
            SolverParams {
                x_delta: 1e6,
                grad_norm: 1e-8,
                max_iterations: 100,
                ..SolverParams::default()
            },
            1.0,
            log::discard(),
        )
        .unwrap();

        let mut objective = Quadratic::new(vec![0.0]);
        let mut x = DVector::from_vec(vec![1.0]);

        solver.minimize(&mut objective, &mut x).unwrap();
        assert_eq!(solver.status(), Status::GradNormTolerance);
        assert!(solver.criteria().iterations >= 1);
    }
}
