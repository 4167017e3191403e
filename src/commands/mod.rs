//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `catalog-sync` command-line tool. Each subcommand is defined in its own
//! file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` (and the global
//!   options when it needs the store or the sync settings) and performs the
//!   command's logic.

pub mod ls;
pub mod parse;
pub mod queue;
pub mod resync;
pub mod sync;
pub mod versions;
