//! Configuration management module
//!
//! Loads observer settings from the environment and library mappings from a JSON file

pub mod file;
pub mod settings;

pub use file::LibraryConfig;
pub use settings::{LoggingConfig, ObserverConfig, Settings};
