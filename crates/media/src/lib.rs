//! Media handling for the relay: scratch files, metadata stripping, and sweeps.

pub mod error;
pub mod image_ops;
pub mod scratch;
pub mod strip;

pub use {
    error::{Error, Result},
    scratch::{ScratchDir, ScratchFile, ScratchGuard, ScratchOrigin},
    strip::strip,
};
