//! Bookshelf application library
//!
//! Hosts the `books` module and the bootstrap routines shared by the
//! `bookshelf-app` binary and the CLI.

pub mod bootstrap;
pub mod modules;

pub use modules::*;
