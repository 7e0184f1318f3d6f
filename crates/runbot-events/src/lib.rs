//! Relay event data model shared across runbot crates.
//!
//! Defines signed events with discriminated tag lists, the query filters sent
//! to relays, the canonical event-id digest and the signing collaborator used
//! to publish replies.

mod event;
mod filter;
mod signer;

pub use event::{
    compute_event_id, Event, Tag, UnsignedEvent, KIND_TEXT_NOTE, TAG_EVENT, TAG_PUBKEY,
};
pub use filter::Filter;
pub use signer::{verify_event_signature, EventSigner, Secp256k1SchnorrSigner, SigningError};
