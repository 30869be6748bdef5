//! Custom binary handshake protocol spoken with the conversion hosts.
//!
//! Every exchange runs over a short-lived TCP connection: fixed 4-byte
//! header markers for requests/responses and big-endian length-prefixed
//! UTF-8 strings for payloads.
//!
//! - [`protocol`]: header codes, framing primitives, client [`Connection`]
//! - [`probe`]: liveness/config handshake run as part of host selection
//! - [`handoff`]: the per-job work dialogue

pub mod handoff;
pub mod probe;
pub mod protocol;

pub use handoff::WorkHandoff;
pub use probe::{HostProbe, WireProbe};
pub use protocol::{Connection, Header};
