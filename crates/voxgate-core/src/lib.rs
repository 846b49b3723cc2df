//! Core types and configuration for voxgate.
//!
//! This crate provides the hardware- and engine-agnostic pieces shared by
//! all voxgate sub-crates: the session state value, the observable feed it
//! is published through, side-channel events, and configuration.

mod config;
mod event;
mod observable;
mod state;

pub use config::{Config, ConfigManager, models_dir};
pub use event::SessionEvent;
pub use observable::{Observable, Subscription};
pub use state::{SessionState, Transcript};

/// Application name
pub const APP_NAME: &str = "voxgate";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Voxgate";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";
