mod bootstrap;
mod decoder;
mod error;
mod fake_bus;
mod logger;
