//! # GMQ Common Library
//!
//! Shared code for the GMQ queue controller and its tooling:
//! - Domain model (guild/user ids, tracks, playlist records)
//! - Event types (GmqEvent enum) and the EventBus
//! - Configuration loading and data folder resolution
//! - Utility functions (duration display, secret comparison)

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod model;
pub mod secret;

pub use error::{Error, Result};
pub use model::{GuildId, PlaylistRecord, PlaylistTrack, Track, UserId};
