//! Configuration for the Lucid journal metrics engine.
//!
//! The pipeline takes one immutable `LucidConfig` value per invocation:
//! metric definitions, scan scope, date filter, callout syntax and backup
//! policy. There is no ambient/global settings state; tests build synthetic
//! configurations directly.

pub mod config;
pub mod file_loader;
pub mod validator;

pub use config::{
    BackupPolicy, CalloutConfig, CustomRange, DateFilterSpec, DatePreset, LucidConfig, ScanScope,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use validator::validate;
