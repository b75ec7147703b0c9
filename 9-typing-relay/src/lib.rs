//! Live-typing chat relay.
//!
//! A hub fans frames out to every other connected client; the terminal
//! client shows peers' lines as they type them and commits them on Enter.
//!
//! - [`frame`] is the message unit: sender label, payload bytes, kind.
//! - [`transport`] frames messages as JSON lines and defines the
//!   [`transport::FrameSource`] / [`transport::FrameSink`] seams.
//! - [`registry`] tracks live hub connections and their failure slots.
//! - [`hub`] accepts connections and relays every frame to everyone else.
//! - [`client`] is the raw-mode terminal client with full and incremental
//!   redraws.
//! - [`pipe`] is a plain stdin/stdout client without a UI.
//! - [`cli`] parses the command-line interface.

pub mod cli;
pub mod client;
pub mod frame;
pub mod hub;
pub mod pipe;
pub mod registry;
pub mod transport;
