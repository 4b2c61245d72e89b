//! Shared building blocks for rtspdump: configuration, the error type,
//! session data model, input validators and the output filename policy.
//!
//! Everything in this crate is free of process management so it can be
//! reused by any front end that collects capture parameters.

pub mod config;
pub mod error;
pub mod model;
pub mod naming;
pub mod validate;

pub use error::CaptureError;
