// src/lib.rs

pub mod league;

pub use league::envelope::{Envelope, MessagePayload};
pub use league::error::{ErrorCode, ProtocolError, TransportError};
