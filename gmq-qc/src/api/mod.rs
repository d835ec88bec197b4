//! HTTP command surface
//!
//! The chat UI layer (out of scope here) drives the controller through these
//! endpoints and renders control surfaces from the SSE event stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
