//! Authenticated request gateway
//!
//! # Module Layout
//!
//! - [`request`]     -- request descriptors and credential headers
//! - [`client`]      -- [`Gateway`], the authenticated API client
//! - [`coordinator`] -- single-flight refresh with a FIFO waiter queue
//! - [`teardown`]    -- clears the session once every refresh avenue failed
//!
//! # Flow
//!
//! ```text
//! send ──► 2xx/4xx/5xx ───────────────────────────► caller
//!   │
//!   └──► 401 ──► coordinator.recover()
//!                  ├─ Ok(credential) ──► replay once ──► caller
//!                  └─ Err(shared)   ──► teardown ──► RefreshFailed
//! ```

pub mod client;
pub mod coordinator;
pub mod request;
pub mod teardown;

pub use client::{Gateway, GatewayBuilder, DEFAULT_LOGIN_ENTRY_POINT, DEFAULT_REFRESH_PATH};
pub use coordinator::{RefreshCoordinator, RefreshOutcome};
pub use request::{credential_header, ApiRequest, DEFAULT_SECONDARY_HEADER};
pub use teardown::{LoginRedirect, SessionTeardown, TracingRedirect};
