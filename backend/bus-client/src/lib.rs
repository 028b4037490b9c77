pub mod address;
pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod decoder;
pub mod error;
pub mod logger;
pub mod sasl;
pub mod signature;
pub mod transport;
pub mod value;
pub mod variant;

#[cfg(test)]
mod tests;

pub use address::{TransportSpec, parse_address};
pub use bootstrap::{ConnectionOptions, open_bus, open_connection, open_connection_with};
pub use channel::Channel;
pub use decoder::{ByteOrder, ValueDecoder, decode};
pub use signature::Signature;
pub use value::Value;
pub use variant::Variant;
