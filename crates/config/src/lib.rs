//! Configuration loading, validation, and env substitution.
//!
//! Config files: `massmover.toml`, `massmover.yaml`, or `massmover.json`
//! Searched in `./` then `~/.config/massmover/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. Configuration is
//! read-only; nothing is ever written back.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{CONFIG_DIR_ENV, config_dir, find_config_file, load_config, search_dirs},
    schema::{LoggingConfig, MassMoverConfig, MenuConfig, RelocationConfig},
    validate::{Diagnostic, MENU_TEXT_CAPACITY, Severity, validate},
};
