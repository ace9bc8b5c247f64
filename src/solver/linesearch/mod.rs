// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Line searches
//!
//! A line search scales a validated descent direction: given x, Δx and the
//! objective it returns a step size α > 0 such that x + αΔx has a finite,
//! sufficiently decreased energy, or NaN when no such step was found.

mod backtracking;
mod fixed_step;

pub use self::backtracking::Backtracking;
pub use self::fixed_step::FixedStep;

use crate::core::{Error, LineSearchConfig, LineSearchKind, Objective};
use nalgebra::DVector;
use std::time::Duration;

/// Wall-clock buckets and trial counts accumulated by a line search.
///
/// `broad_phase_ccd` and `ccd` are reserved for step-limiting searches that
/// clamp the trial step against a collision or feasibility sweep; the built-in
/// searches leave them zero. `classical_line_search` includes the
/// `constraint_set_update` spent inside the trial loop; the solver-info
/// reporting subtracts it to avoid double counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSearchTimings {
    /// Time spent shrinking the step out of non-finite energy territory
    pub checking_for_nan_inf: Duration,
    /// Time spent in `solution_changed` for trial points
    pub constraint_set_update: Duration,
    /// Time spent in the sufficient-decrease trial loop
    pub classical_line_search: Duration,
    /// Reserved for broad-phase step limiting
    pub broad_phase_ccd: Duration,
    /// Reserved for narrow-phase step limiting
    pub ccd: Duration,
    /// Number of trial evaluations
    pub iterations: u64,
}

impl LineSearchTimings {
    /// Zeroes all buckets and the trial counter.
    pub fn reset(&mut self) {
        *self = LineSearchTimings::default();
    }
}

/// The step-size search consulted by the solve driver once per iteration.
///
/// On success the objective's auxiliary state is left synchronized with the
/// accepted trial point; on failure it is restored to x.
pub trait LineSearch {
    /// Name of the search, e.g. `"Backtracking"`.
    fn name(&self) -> &'static str;

    /// Gradient-norm acceptance tolerance (0 disables). The driver propagates
    /// the configured value, scaled by the characteristic length, at
    /// construction.
    fn set_use_grad_norm_tol(&mut self, tol: f64);

    /// Returns a step size α > 0 with finite, sufficiently decreased energy at
    /// x + αΔx, or NaN on failure.
    fn line_search(
        &mut self,
        x: &DVector<f64>,
        delta_x: &DVector<f64>,
        objective: &mut dyn Objective,
    ) -> f64;

    /// Timing buckets accumulated since the last
    /// [`reset_timings`](LineSearch::reset_timings).
    fn timings(&self) -> &LineSearchTimings;

    /// Zeroes the timing buckets.
    fn reset_timings(&mut self);
}

/// Builds the line search named by the configuration subdocument.
pub fn linesearch_from_config(config: &LineSearchConfig) -> Result<Box<dyn LineSearch>, Error> {
    Ok(match config.method {
        LineSearchKind::None => Box::new(FixedStep::new(config.default_init_step_size)?),
        LineSearchKind::Armijo => Box::new(Backtracking::new(
            config.c,
            config.shrink,
            config.max_step_halvings,
            config.default_init_step_size,
        )?),
    })
}
