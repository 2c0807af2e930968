//! Unified error type for port control operations.
//!
//! `PortError` is the single error type returned by every fallible port,
//! registry, and backend call. It serializes as `{ "kind": "...", "message": "..." }`
//! so an RPC layer can distinguish error categories without parsing text.

use serde::ser::SerializeStruct;

use crate::core::port::PortState;

/// Port-level error returned by control and statistics operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The requested operation is not valid in the port's current state.
    #[error("cannot {op} while port is {state}")]
    BadStateForOp { op: &'static str, state: PortState },

    /// Traffic start requested with an empty stream table.
    #[error("no streams configured on port")]
    NoStreams,

    /// Another session already owns the port.
    #[error("port is owned by '{owner}'")]
    PortOwned { owner: String },

    /// The supplied handler does not match the current owner.
    #[error("handler does not match port owner")]
    NotOwner,

    /// Reading counters from the NIC failed.
    #[error("{0}")]
    CounterSource(String),

    /// No port with this id is managed.
    #[error("unknown port {0}")]
    UnknownPort(u8),
}

impl PortError {
    /// Returns the error kind as a string matching the variant name.
    pub fn kind(&self) -> &'static str {
        match self {
            PortError::BadStateForOp { .. } => "BadStateForOp",
            PortError::NoStreams => "NoStreams",
            PortError::PortOwned { .. } => "PortOwned",
            PortError::NotOwner => "NotOwner",
            PortError::CounterSource(_) => "CounterSource",
            PortError::UnknownPort(_) => "UnknownPort",
        }
    }
}

impl serde::Serialize for PortError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("PortError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}
