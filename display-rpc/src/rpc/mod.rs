//! Messaging layer between the controller and the embedded display.
//!
//! Calls go out as `{method, value?}` through the host's cross-origin
//! messaging primitive; the embedded content answers with either a reply
//! carrying the same method name or an unsolicited event.
//!
//! ## Message Flow
//!
//! ```text
//! Host page (controller)  <──postMessage──>  Display (iframe / element)
//!        │                                        │
//!        ├─ {method: "getColor"} ───────────────> │
//!        │ <──────────── {method: "getColor", value} ┤  oldest pending getColor
//!        │                                        │
//!        │ <────────── {event: "play", data} ────┤  every event:play listener
//!        │ <── {event: "error", data: {method}} ─┤  every pending call to method
//! ```
//!
//! ## Correlation
//!
//! There is no request id on the wire. Replies are matched to the oldest
//! outstanding call with the same method name, so concurrent calls to one
//! method settle in send order. An `error` event rejects every outstanding
//! call to the method it names.
//!
//! ## Modules
//!
//! - [`callbacks`]: per-element ordered callback lists
//! - [`codec`]: inbound decoding and outbound envelopes
//! - [`transport`]: source/origin filtering, origin pinning, listener lifecycle

/// Per-target callback storage with FIFO consumption for replies.
pub mod callbacks;
/// Tolerant decoding of inbound payloads.
pub mod codec;
/// Outbound dispatch and inbound filtering.
pub mod transport;
