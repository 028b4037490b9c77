//! Shared building blocks for the bus client workspace.
//!
//! This crate holds the small, dependency-light types every other crate
//! leans on. It has no knowledge of addresses, sockets or the wire format.
//!
//! ## Architecture
//!
//! - **common** (this crate): error locations, secret handling
//! - **bus-client**: connection bootstrap, SASL handshake, value decoding
//!
//! Keeping these apart lets error types in `bus-client` carry precise
//! source locations without pulling in any runtime dependencies.

pub mod error;
pub mod redacted_secret;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use redacted_secret::RedactedSecret;
