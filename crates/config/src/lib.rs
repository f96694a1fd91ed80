//! Relay configuration: environment loading, validation, and proxy resolution.
//!
//! Every setting comes from an environment-style variable (see [`loader`]).
//! Required variables that are missing abort startup with a single error
//! listing all of them.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{from_env, from_lookup},
    schema::{POLL_TIMEOUT_SECS, ProxyConfig, RelayConfig},
};
