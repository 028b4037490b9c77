mod channel;
mod config;
mod decoder;
mod transport;
