// perch_core/src/lib.rs

// This file defines the public modules of the library.
pub mod abstractions;
pub mod config;
pub mod control;
pub mod error;
pub mod mission;
pub mod navigation;
pub mod perception;
pub mod prelude;
pub mod types;
pub mod vision;
