// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-worker: the `poolworkerd` binary's testable building blocks — spawn
//! contract parsing, privilege drop, session home resolution, and per-query
//! execution (spec.md §4.3, §6). `main.rs` wires these together around the
//! actual socket loop.

pub mod privilege;
pub mod query;
pub mod session;
pub mod startup;
