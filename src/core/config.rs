// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Configuration documents
//!
//! The solver is constructed from JSON documents. Unknown fields, wrong types
//! and out-of-range values are rejected at construction with an
//! [`InvalidConfig`](crate::core::DescentError::InvalidConfig) diagnostic;
//! omitted fields take the documented defaults.

use crate::core::Error;
use serde::Deserialize;
use serde_json::Value;

/// Descent strategies selectable by name.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum SolverKind {
    /// Dense inverse-Hessian BFGS
    #[serde(rename = "BFGS")]
    Bfgs,
    /// Newton with a dense Hessian and factorization
    #[serde(rename = "DenseNewton", alias = "dense_newton")]
    DenseNewton,
    /// Newton with a sparse Hessian and factorization
    #[serde(rename = "SparseNewton", alias = "Newton", alias = "sparse_newton")]
    SparseNewton,
    /// Plain gradient descent
    #[serde(rename = "GradientDescent", alias = "gradient_descent")]
    GradientDescent,
    /// Limited-memory BFGS
    #[serde(rename = "LBFGS", alias = "L-BFGS")]
    Lbfgs,
}

/// Line searches selectable by name.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum LineSearchKind {
    /// Fixed starting step, no search
    None,
    /// Armijo backtracking
    #[serde(alias = "Backtracking")]
    Armijo,
}

impl Default for LineSearchKind {
    fn default() -> Self {
        LineSearchKind::Armijo
    }
}

/// Top-level solver configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverConfig {
    /// Descent strategy to start every iteration with
    pub solver: SolverKind,
    /// Threshold on the update-direction norm (0 disables)
    #[serde(default)]
    pub x_delta: f64,
    /// Threshold on the absolute energy change (0 disables)
    #[serde(default)]
    pub f_delta: f64,
    /// Threshold on the gradient norm
    #[serde(default = "default_grad_norm")]
    pub grad_norm: f64,
    /// Iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    /// Gradient-norm threshold used during iteration 0 only
    #[serde(default = "default_first_grad_norm_tol")]
    pub first_grad_norm_tol: f64,
    /// Whether hitting the iteration cap counts as a successful exit
    #[serde(default)]
    pub allow_out_of_iterations: bool,
    /// Line-search subdocument
    #[serde(default)]
    pub line_search: LineSearchConfig,
    /// L-BFGS subdocument
    #[serde(default, rename = "LBFGS")]
    pub lbfgs: LbfgsConfig,
    /// Newton subdocument (shared by the dense and sparse variants)
    #[serde(default, rename = "Newton")]
    pub newton: NewtonConfig,
}

/// Line-search subdocument.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineSearchConfig {
    /// Line search selected by name
    #[serde(default)]
    pub method: LineSearchKind,
    /// Accept a trial point whose gradient norm falls below this value (0 disables)
    #[serde(default)]
    pub use_grad_norm_tol: f64,
    /// Armijo sufficient-decrease constant
    #[serde(default = "default_armijo_c")]
    pub c: f64,
    /// Step contraction factor
    #[serde(default = "default_shrink")]
    pub shrink: f64,
    /// Maximum number of step contractions before giving up
    #[serde(default = "default_max_step_halvings")]
    pub max_step_halvings: u32,
    /// Step size tried first (and returned verbatim by the fixed-step search)
    #[serde(default = "default_init_step_size")]
    pub default_init_step_size: f64,
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        LineSearchConfig {
            method: LineSearchKind::default(),
            use_grad_norm_tol: 0.0,
            c: default_armijo_c(),
            shrink: default_shrink(),
            max_step_halvings: default_max_step_halvings(),
            default_init_step_size: default_init_step_size(),
        }
    }
}

/// L-BFGS subdocument.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LbfgsConfig {
    /// Number of curvature pairs kept
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        LbfgsConfig {
            history_size: default_history_size(),
        }
    }
}

/// Newton subdocument.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewtonConfig {
    /// The initial regularization weight is `eps_multiplier * ‖H‖∞ * ε_machine`
    #[serde(default = "default_eps_multiplier")]
    pub eps_multiplier: f64,
    /// Doublings of the regularization weight before the direction is given up
    #[serde(default = "default_max_regularizations")]
    pub max_regularizations: u32,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        NewtonConfig {
            eps_multiplier: default_eps_multiplier(),
            max_regularizations: default_max_regularizations(),
        }
    }
}

/// Linear-solver configuration document, consumed by the Newton variants only.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinearSolverConfig {
    /// Factorization selected by name
    #[serde(default)]
    pub solver: LinearBackend,
}

/// Factorizations selectable by name for the Newton linear solves.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
pub enum LinearBackend {
    /// Cholesky factorization (requires an SPD system; detects indefiniteness)
    Cholesky,
    /// Full-pivot LU factorization (dense backend only)
    #[serde(rename = "LU", alias = "lu")]
    Lu,
}

impl Default for LinearBackend {
    fn default() -> Self {
        LinearBackend::Cholesky
    }
}

fn default_grad_norm() -> f64 {
    1e-8
}

fn default_max_iterations() -> u64 {
    1000
}

fn default_first_grad_norm_tol() -> f64 {
    1e-10
}

fn default_armijo_c() -> f64 {
    1e-4
}

fn default_shrink() -> f64 {
    0.5
}

fn default_max_step_halvings() -> u32 {
    30
}

fn default_init_step_size() -> f64 {
    1.0
}

fn default_history_size() -> usize {
    6
}

fn default_eps_multiplier() -> f64 {
    100.0
}

fn default_max_regularizations() -> u32 {
    64
}

impl SolverConfig {
    /// Deserializes and validates a solver configuration document.
    pub fn from_json(doc: &Value) -> Result<Self, Error> {
        let config: SolverConfig = serde_json::from_value(doc.clone())
            .map_err(|e| -> Error { descent_error!(InvalidConfig, e) })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("x_delta", self.x_delta),
            ("f_delta", self.f_delta),
            ("grad_norm", self.grad_norm),
            ("first_grad_norm_tol", self.first_grad_norm_tol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(descent_error!(
                    InvalidConfig,
                    format!("SolverConfig: {} must be a nonnegative real.", name)
                ));
            }
        }
        if self.max_iterations == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "SolverConfig: max_iterations must be positive."
            ));
        }
        self.line_search.validate()?;
        if self.lbfgs.history_size == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "SolverConfig: LBFGS history_size must be positive."
            ));
        }
        self.newton.validate()?;
        Ok(())
    }
}

impl LineSearchConfig {
    fn validate(&self) -> Result<(), Error> {
        if !self.use_grad_norm_tol.is_finite() || self.use_grad_norm_tol < 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "LineSearchConfig: use_grad_norm_tol must be a nonnegative real."
            ));
        }
        if self.c <= 0.0 || self.c >= 1.0 {
            return Err(descent_error!(
                InvalidConfig,
                "LineSearchConfig: c must be in (0, 1)."
            ));
        }
        if self.shrink <= 0.0 || self.shrink >= 1.0 {
            return Err(descent_error!(
                InvalidConfig,
                "LineSearchConfig: shrink factor must be in (0, 1)."
            ));
        }
        if self.max_step_halvings == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "LineSearchConfig: max_step_halvings must be positive."
            ));
        }
        if !self.default_init_step_size.is_finite() || self.default_init_step_size <= 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "LineSearchConfig: default_init_step_size must be positive."
            ));
        }
        Ok(())
    }
}

impl NewtonConfig {
    fn validate(&self) -> Result<(), Error> {
        if !self.eps_multiplier.is_finite() || self.eps_multiplier <= 0.0 {
            return Err(descent_error!(
                InvalidConfig,
                "NewtonConfig: eps_multiplier must be positive."
            ));
        }
        if self.max_regularizations == 0 {
            return Err(descent_error!(
                InvalidConfig,
                "NewtonConfig: max_regularizations must be positive."
            ));
        }
        Ok(())
    }
}

impl LinearSolverConfig {
    /// Deserializes and validates a linear-solver configuration document.
    pub fn from_json(doc: &Value) -> Result<Self, Error> {
        serde_json::from_value(doc.clone())
            .map_err(|e| -> Error { descent_error!(InvalidConfig, e) })
    }
}
