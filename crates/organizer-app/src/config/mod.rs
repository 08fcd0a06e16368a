//! Configuration file parsing for the file organizer host
//!
//! Reads `<config_dir>/file-organizer/config.toml` (or an explicit path)
//! into [`Settings`].

pub mod settings;
pub mod types;

pub use settings::{default_config_path, expand_tilde, load_from_path, load_or_default, load_settings};
pub use types::*;
