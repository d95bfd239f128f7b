//! Domain types shared across the engine.

pub mod error;
pub mod identity;
pub mod url;

pub use error::{EngineError, ErrorKind, Result};
pub use identity::ScreenIdentity;
