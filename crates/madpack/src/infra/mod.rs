//! Infrastructure adapters: model sources, file resolution, persistence,
//! kernel workspaces and configuration.

pub mod config;
pub mod document;
pub mod finder;
pub mod kernel;
pub mod persist;
pub mod source;
