//! # parley-channels
//!
//! Outbound delivery for Parley.

pub mod http;
pub mod split;

pub use http::HttpGateway;
pub use split::split_paragraphs;
