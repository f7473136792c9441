//! Core event wire protocol: type + payload + envelope.
//!
//! This crate defines the JSON shape of a single core event and envelope injection.
//! It does not depend on `ajora`; the core bridges its subscriber events into
//! [`ProtocolEvent`] and calls [`to_json`].

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::ProtocolEvent;
