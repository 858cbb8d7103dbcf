//! Hand-written TL constructors, functions and wire-format primitives for
//! the handshake and its encrypted envelope.
//!
//! # Overview
//!
//! | Module    | Contents                                                       |
//! |-----------|-----------------------------------------------------------------|
//! | [`types`] | Handshake constructors (`resPQ`, `server_DH_params_ok`, …)      |
//! | [`tag`]   | CRC32-derived constructor tags, one per schema line             |
//!
//! There is no schema file or code generator here: each handshake object's
//! wire format is declared directly in [`types`], with its tag computed at
//! compile time in [`tag`] from the literal schema line it corresponds to.

#![deny(unsafe_code)]
#![allow(clippy::large_enum_variant)]

pub mod deserialize;
pub mod serialize;
pub mod tag;
pub mod types;

pub use deserialize::{Cursor, Deserializable};
pub use serialize::Serializable;

/// Bare vector — `vector` (lowercase) as opposed to the boxed `Vector`.
///
/// Used in rare cases where a length-prefixed list is sent without the
/// usual `0x1cb5c415` constructor ID header.
#[derive(Clone, Debug, PartialEq)]
pub struct RawVec<T>(pub Vec<T>);

// ─── Core traits ──────────────────────────────────────────────────────────────

/// Every generated type has a unique 32-bit constructor ID.
pub trait Identifiable {
    /// The constructor ID as specified in the TL schema.
    const CONSTRUCTOR_ID: u32;
}
