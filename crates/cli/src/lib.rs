// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-cli: the operator-facing debug CLI (spec.md §6 observability
//! endpoint). A thin wrapper over `pool-engine`'s config loader and
//! `Pool::stats`/`Pool::debug_snapshot` — no HTTP server; the wire format
//! for this endpoint is left free.

pub mod config;
