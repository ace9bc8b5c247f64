// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Quasi-Newton methods
//!
//! Both strategies build curvature information from successive (s, y) =
//! (x_{k+1} − x_k, g_{k+1} − g_k) pairs. Pairs with non-positive curvature
//! yᵀs are skipped so that retries and pathological steps cannot corrupt the
//! approximation.
//!
//! # References:
//!
//! \[0\] Jorge Nocedal and Stephen J. Wright (2006). Numerical Optimization.
//! Springer. ISBN 0-387-30303-0.

mod bfgs;
mod lbfgs;

pub use self::bfgs::Bfgs;
pub use self::lbfgs::Lbfgs;
