//! netclip library
//!
//! Background context, tab hosting, configuration and the CLI surface,
//! exposed for integration testing.

pub mod background;
pub mod cli;
pub mod config;
pub mod errors;
pub mod session;
pub mod tabs;

pub use background::{spawn_background, BackgroundDeps, BackgroundHandle, HandoffEvent};
pub use config::Config;
pub use errors::AppError;
pub use session::Session;
pub use tabs::{SimTabHost, TabHost};
