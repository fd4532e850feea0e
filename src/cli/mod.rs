//! Command-line interface, available with the `cli` feature

mod config;
#[path = "main.rs"]
mod main_impl;
mod progress;

pub use main_impl::{main, Cli, CliLogFormat, CliMode, CliTextDetection};
