#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Filesystem and hashing helpers shared across the liffey crates.
//!
//! Everything here is a pure function over paths and bytes. Tracing and
//! error wrapping belong to the engine crate.

pub mod fs;
pub mod hash;
