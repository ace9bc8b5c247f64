// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! descent core
//!
//! This module contains the solve driver, the configuration layer and the traits
//! and types shared by all descent strategies and line searches.

/// Macros
#[macro_use]
pub mod macros;
/// Configuration documents
mod config;
/// Stopping criteria and status
mod criteria;
/// Error handling
mod errors;
/// Ready-made `slog` sinks
pub mod log;
/// The objective-function contract
mod objective;
/// The solve driver
mod solver;
/// Shared objectives for unit tests
#[cfg(test)]
pub mod test_utils;

pub use crate::solver::linesearch::{LineSearch, LineSearchTimings};
pub use crate::solver::{DescentStrategy, DirectionTimings};
pub use anyhow::Error;
pub use config::{
    LbfgsConfig, LineSearchConfig, LineSearchKind, LinearBackend, LinearSolverConfig,
    NewtonConfig, SolverConfig, SolverKind,
};
pub use criteria::{Criteria, Status};
pub use errors::{DescentError, ErrorCode};
pub use objective::Objective;
pub use solver::{Solver, SolverParams};
