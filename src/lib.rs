// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! descent is a nonlinear unconstrained minimization engine written entirely in Rust.
//!
//! A single solve driver iteratively minimizes a user-supplied twice-differentiable
//! objective f(x) over a dense real vector x. Each iteration asks a descent strategy
//! for an update direction, validates that the direction actually points downhill,
//! scales it with a line search and commits the step. When a strategy produces an
//! unusable direction or the line search fails, the driver falls back along a ladder
//! of increasingly conservative strategies, ending at plain gradient descent.
//!
//! Solvers and line searches are selected by name from a JSON configuration
//! document, which makes the engine suitable as the optimization backend of larger
//! applications that keep their numerics in configuration files.
//!
//! # Descent strategies
//!
//! - [BFGS](`crate::solver::quasinewton::Bfgs`)
//! - [L-BFGS](`crate::solver::quasinewton::Lbfgs`)
//! - [Dense Newton](`crate::solver::newton::DenseNewton`)
//! - [Sparse Newton](`crate::solver::newton::SparseNewton`)
//! - [Gradient descent](`crate::solver::gradientdescent::GradientDescent`)
//!
//! # Line searches
//!
//! - [Armijo backtracking](`crate::solver::linesearch::Backtracking`)
//! - [Fixed step](`crate::solver::linesearch::FixedStep`)
//!
//! # Example
//!
//! ```
//! use descent::core::{Error, Objective, Solver};
//! use nalgebra::DVector;
//! use serde_json::json;
//!
//! struct Paraboloid;
//!
//! impl Objective for Paraboloid {
//!     fn value(&mut self, x: &DVector<f64>) -> f64 {
//!         x.norm_squared()
//!     }
//!
//!     fn gradient(&mut self, x: &DVector<f64>, grad: &mut DVector<f64>) {
//!         grad.copy_from(&(2.0 * x));
//!     }
//! }
//!
//! # fn run() -> Result<(), Error> {
//! let config = json!({
//!     "solver": "LBFGS",
//!     "line_search": { "method": "Armijo" },
//!     "max_iterations": 100,
//!     "grad_norm": 1e-8,
//! });
//!
//! let mut solver = Solver::new(&config, &json!({}), 1.0, descent::core::log::term())?;
//! let mut x = DVector::from_vec(vec![3.0, -4.0]);
//! solver.minimize(&mut Paraboloid, &mut x)?;
//!
//! println!("{}", solver.solver_info());
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```
//!
//! # License
//!
//! Licensed under either of
//!
//!   * Apache License, Version 2.0, <http://www.apache.org/licenses/LICENSE-2.0>
//!   * MIT License <http://opensource.org/licenses/MIT>
//!
//! at your option.

#![warn(missing_docs)]
#![allow(unused_attributes)]
// Explicitly disallow EQ comparison of floats. (This clippy lint is denied by default; however,
// this is just to make sure that it will always stay this way.)
#![deny(clippy::float_cmp)]

#[macro_use]
pub mod core;

/// Descent strategies and line searches
pub mod solver;
