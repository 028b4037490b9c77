mod auth;
mod decode;
mod transport;
