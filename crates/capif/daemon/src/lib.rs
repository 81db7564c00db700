//! CAPIF Daemon library
//!
//! This module provides the components behind `capifd`:
//! - REST API handlers for the provider, publish, invoker, discovery,
//!   security and events interfaces
//! - Event notification delivery
//! - Server lifecycle management

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod notifier;
pub mod server;

pub use config::CapifConfig;
pub use error::{ApiError, DaemonError};
pub use notifier::Notifier;
pub use server::Server;
