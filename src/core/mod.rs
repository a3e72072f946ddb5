pub mod channel;
pub mod command;
#[cfg(feature = "cli")]
pub mod config;
pub mod error;
pub mod number;
pub mod session;
pub mod symbols;
