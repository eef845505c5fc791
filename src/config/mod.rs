//! Configuration loading, layering, and the immutable run configuration.
pub(crate) mod apply;
mod loader;
mod run;
pub mod types;


pub use apply::apply_config;
pub use loader::load_config;
pub use run::{RunConfig, STOP_GRACE_PERIOD};

#[cfg(test)]
pub(crate) use loader::load_config_file;
