//! Request extractors enforcing authentication and authorization.
//!
//! - [`auth::AuthUser`]: the user behind a JWT Bearer token.
//! - [`rbac::RequireAdmin`]: requires the `admin` role.
//! - [`worker::WorkerAuth`]: gates worker-facing endpoints on `x-worker-token`.

pub mod auth;
pub mod rbac;
pub mod worker;
