//! # strand
//!
//! Command-line front end for the strand event store: open the configured
//! database, apply migrations, create streams, append and read events.

#![deny(unsafe_code)]

pub mod cli;
pub mod logging;
