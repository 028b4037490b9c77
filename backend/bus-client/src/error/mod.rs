pub mod auth;
pub mod channel;
pub mod config;
pub mod connection;
pub mod decode;
pub mod logger;
pub mod signature;
pub mod transport;

pub use auth::AuthError;
pub use channel::ChannelError;
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use decode::DecodeError;
pub use logger::LoggerError;
pub use signature::SignatureError;
pub use transport::TransportError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logger(#[from] LoggerError),
}
