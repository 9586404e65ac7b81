//! Runtime assembly: [`SystemConfig`] and [`SystemHandle`] (spec §9).
//!
//! This is the "global singletons, made explicit" module the rest of the
//! crate is built around: where CAF threads `actor_system&` through every
//! `scheduled_actor` and keeps its scheduler coordinator behind a singleton
//! accessor, every collaborator here instead holds a cloned [`SystemHandle`].

pub mod config;
mod handle;

pub use config::{
    SystemConfig, SystemConfigBuilder, DEFAULT_ENABLE_METRICS, DEFAULT_MAILBOX_CAPACITY,
    DEFAULT_MAX_ACTORS, DEFAULT_SHUTDOWN_TIMEOUT, DEFAULT_SPAWN_TIMEOUT,
};
pub use handle::SystemHandle;
pub use crate::error::SystemError;
