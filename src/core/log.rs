// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Ready-made logging sinks based on the `slog` crate
//!
//! The solver constructor takes any [`slog::Logger`]; these helpers build the
//! common ones so that applications without their own logging setup can get
//! going with a single call.

use slog::{o, Drain};
use slog_async::OverflowStrategy;

/// A terminal logger which blocks when its channel overflows.
pub fn term() -> slog::Logger {
    term_internal(OverflowStrategy::Block)
}

/// A terminal logger which drops messages when its channel overflows.
pub fn term_noblock() -> slog::Logger {
    term_internal(OverflowStrategy::Drop)
}

fn term_internal(overflow_strategy: OverflowStrategy) -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator)
        .use_original_order()
        .build()
        .fuse();
    let drain = slog_async::Async::new(drain)
        .overflow_strategy(overflow_strategy)
        .build()
        .fuse();
    slog::Logger::root(drain, o!())
}

/// A logger which discards everything. Useful in tests and benchmarks.
pub fn discard() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!())
}
