// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pool-core: entities, ids, and error taxonomy shared by every other
//! crate in the worker pool.

pub mod clock;
pub mod error;
pub mod ids;
pub mod request;
pub mod stats;
pub mod workspace;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{AdmissionLimit, PoolError};
pub use ids::{OwnerKey, RequestId, WorkerId, WorkspaceKey};
pub use request::{validate_agent_request, AgentConfig, AgentRequest, FieldError, StreamTypes};
pub use stats::{PoolCounters, PoolStats};
pub use workspace::{sanitize_workspace_key, WorkspaceCredentials};
