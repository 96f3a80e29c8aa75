//! # ml-core
//!
//! Core types, traits, and configuration for Medialib RS.
//!
//! This crate provides the building blocks shared by the other crates:
//! - Primary key type and the Identifiable entity trait
//! - Application configuration loaded from the environment

pub mod config;
pub mod traits;

pub use config::{AppConfig, ConfigError};
pub use traits::*;
