//! # certsweep-cli
//!
//! Command-line front end for the certsweep collectors.
//!
//! ## Commands
//!
//! - **list**: show the registered collectors and their required options
//! - **collect**: run one collector with options given on the command line
//! - **run**: run every collector in an inventory file concurrently
//!
//! Records print as a table or as JSON (`--format json`).

pub mod cli;
pub mod config;
pub mod output;

pub use cli::run;
