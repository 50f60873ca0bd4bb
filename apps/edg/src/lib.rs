//! # edg
//!
//! The EDG gateway binary as a library: configuration, the in-process
//! subject bus, the HTTP bridge and the CLI. Integration tests build the
//! router from here.

pub mod api;
pub mod bus;
pub mod cli;
pub mod config;
