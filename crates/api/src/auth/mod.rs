//! Authentication primitives.
//!
//! - [`jwt`]: HS256 access-token validation (and generation, for tooling
//!   and tests; tokens are normally issued by the account service).

pub mod jwt;
