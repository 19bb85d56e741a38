//! Core types shared by every subsystem: errors and configuration.

pub mod config;
pub mod errors;
