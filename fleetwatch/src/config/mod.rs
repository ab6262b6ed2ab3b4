//! Configuration file handling for `~/.fleetwatch/config.ini`.
//!
//! - [`settings`] - One struct per `[section]`
//! - [`defaults`] - `DEFAULT_*` constants and `ConfigFile::default()`
//! - [`file`] - Load / save, `ConfigFileError`
//!
//! INI parsing and serialization live in private `parser` and `writer`
//! modules.

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
