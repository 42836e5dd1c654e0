//! Controller for an embedded display widget and the RPC channel to it.
//!
//! The crate resolves embed parameters into an oEmbed descriptor, asks the
//! host to inject the returned markup and then talks to the embedded content
//! over the host's cross-origin messaging primitive.
//!
//! ## Architecture
//!
//! ```text
//! Displays (composition root)
//!   ├─ InstanceRegistry   element key -> Display
//!   ├─ CallbackRegistry   element key -> name -> [Callback]
//!   └─ Host               Dom + MessageChannel + OEmbedClient + Spawn
//!
//! Display::get/set/call_method
//!   └─> await ready ─> store Callback::Reply ─> transport::send
//!
//! inbound message ─> Transport::accept (source, origin, pinning)
//!   └─> codec::decode ─> ready / ready error / dispatch
//! ```
//!
//! Everything is single-threaded: state lives behind `Rc<RefCell<_>>` and
//! futures are spawned on the host's local executor.

pub mod controller;
pub mod embed;
pub mod error;
pub mod host;
pub mod instances;
pub mod rpc;

#[cfg(any(test, feature = "helpers"))]
pub mod helpers;

pub use controller::{Display, Displays, ReadyState, method_name};
pub use embed::{DisplayOptions, EmbedMode, OEmbedDescriptor, OriginPolicy};
pub use error::DisplayError;
pub use host::{ElementKey, Host, HostRef, resolve_element};
pub use rpc::callbacks::{Callback, CallbackRegistry, EventListener};
pub use rpc::codec::{Envelope, RawMessage};
pub use rpc::transport::{InboundMessage, ListenerId, MessageChannel, Transport};
