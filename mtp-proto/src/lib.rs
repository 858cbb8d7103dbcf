//! MTP handshake state machine, encrypted-envelope codec, and session registry.
//!
//! This crate handles:
//! * [`handshake`] — the unauthenticated Diffie-Hellman handshake a connection
//!   runs once, before any encrypted traffic is possible.
//! * [`encrypted`] — the MTProto 2.0 encrypted envelope exchanged afterwards.
//! * [`session_registry`] — the process-wide map of live client sessions.
//! * [`message`] / [`transport`] — plaintext message framing and the Abridged
//!   byte-stream framing handshake messages travel over before a key exists.
//!
//! It is intentionally transport-agnostic: bring your own TCP/WebSocket.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod encrypted;
pub mod handshake;
pub mod message;
pub mod session_registry;
pub mod transport;

pub use encrypted::{DecryptedMessage, DecryptError};
pub use handshake::{Finished, HandshakeState};
pub use message::{Message, MessageId};
pub use session_registry::{ClientSession, ClientSessionRegistry};
