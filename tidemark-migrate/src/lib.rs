//! Tidemark Migration Library
//!
//! Argument parsing, command handlers and report rendering behind the
//! `tidemark-migrate` binary.

pub mod cli;
pub mod commands;
pub mod render;
