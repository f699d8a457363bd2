//! Subcommand implementations.

pub mod classify;
pub mod info;
pub mod lifecycle;
pub mod search;
pub mod urn;
