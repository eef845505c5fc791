//! Core library for the `hey-apm` CLI.
//!
//! The binary resolves one worker per target, lets the [`coordinator`] run
//! them under a global deadline with a graceful-then-forced shutdown, and
//! prints the per-target status distributions with [`report`]. The
//! [`worker::Worker`] and [`target::TargetResolver`] traits are the seams for
//! plugging in other request engines.
pub mod args;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod report;
pub mod shutdown;
pub mod shutdown_handlers;
pub mod target;
pub mod worker;
