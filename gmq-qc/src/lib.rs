//! GMQ queue controller library
//!
//! Per-guild playback sessions driving an external audio backend, plus a
//! durable playlist store, exposed over HTTP for a chat UI layer.
//!
//! Exposed as a library so integration tests can build the router and the
//! session registry against fake backends.

pub mod api;
pub mod backend;
pub mod commands;
pub mod config;
pub mod error;
pub mod resolver;
pub mod session;
pub mod store;

pub use error::{Error, Result};
