#[cfg(feature = "cli")]
pub use crate::core::config::{Commands, Config};
pub use crate::core::{
    channel::{Channel, Device, Transport},
    error::{Error, SdResult},
    number::{parse_address, Address},
    session::{CallbackKind, LineSource, Session},
    symbols::{SymbolEntry, SymbolTable},
};
