// Copyright 2022-2024 descent developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Macros

/// Create a `DescentError` with a provided message.
#[macro_export]
macro_rules! descent_error {
    ($error_type:ident, $msg:expr) => {
        $crate::core::DescentError::$error_type {
            text: $msg.to_string(),
        }
        .into()
    };
}

/// Asserts that an expression produces a `DescentError` with the given display text.
#[cfg(test)]
#[macro_export]
macro_rules! assert_error {
    ($e:expr, $msg:expr) => {
        assert_eq!(
            $e.err()
                .unwrap()
                .downcast_ref::<$crate::core::DescentError>()
                .unwrap()
                .to_string(),
            $msg
        );
    };
}

/// Implements a simple send and a simple sync test for a given type.
#[cfg(test)]
#[macro_export]
macro_rules! send_sync_test {
    ($n:ident, $t:ty) => {
        mod $n {
            #[allow(unused_imports)]
            use super::*;

            #[test]
            fn test_send() {
                fn assert_send<T: Send>() {}
                assert_send::<$t>();
            }

            #[test]
            fn test_sync() {
                fn assert_sync<T: Sync>() {}
                assert_sync::<$t>();
            }
        }
    };
}
