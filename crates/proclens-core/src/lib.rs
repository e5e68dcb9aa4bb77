//! Proclens Core - contract definitions for the process view layer
//!
//! This crate provides the data model, configuration, error types and the
//! transport seam that the layer crate builds on. It contains no I/O of its
//! own; everything that talks to the backend lives behind [`ProcessTransport`].

mod config;
mod error;
mod model;
mod transport;

pub use config::*;
pub use error::*;
pub use model::*;
pub use transport::*;
