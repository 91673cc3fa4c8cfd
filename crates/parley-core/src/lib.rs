//! # parley-core
//!
//! Core types, traits, configuration, and error handling for the Parley agent core.

pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod model;
pub mod onboarding;
pub mod traits;
