use display_constants::origin::WILDCARD_ORIGIN;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::embed::{EmbedMode, OriginPolicy};
use crate::host::ElementKey;
use crate::rpc::codec::{self, Envelope, RawMessage};

/// Handle for an installed inbound listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Message event as observed by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub origin: String,
    /// Embed whose content window sent the message, when the host could match one.
    pub source: Option<ElementKey>,
    pub data: RawMessage,
}

/// Receives every message the host observes for one listener.
pub type InboundHandler = Box<dyn Fn(InboundMessage)>;

/// Cross-boundary messaging primitive of the host.
pub trait MessageChannel {
    /// Post `message` to the content window owned by `target`. Returns `false`
    /// when `target` has no message channel. Must not deliver inbound
    /// messages synchronously.
    fn post_message(&self, target: ElementKey, message: &Value, target_origin: &str) -> bool;

    /// Start delivering messages for `target`: window messages in
    /// [`EmbedMode::Iframe`], events dispatched on the element in [`EmbedMode::Js`].
    fn listen(&self, target: ElementKey, mode: EmbedMode, handler: InboundHandler) -> ListenerId;

    fn unlisten(&self, listener: ListenerId);
}

/// Send `method` to `target`. Calls are dropped, not queued, when the target
/// has no message channel yet.
pub fn send<C: MessageChannel + ?Sized>(
    channel: &C,
    target: ElementKey,
    origin: &str,
    method: &str,
    value: Option<Value>,
) -> bool {
    let message = match codec::encode(method, value) {
        Ok(message) => message,
        Err(error) => {
            warn!(%error, method, "Could not encode call");
            return false;
        }
    };
    let delivered = channel.post_message(target, &message, origin);
    if !delivered {
        debug!(%target, method, "No message channel for embed, dropping call");
    }
    delivered
}

/// Per-instance inbound state: pinned origin and installed listener.
#[derive(Debug)]
pub struct Transport {
    mode: EmbedMode,
    origin: String,
    policy: OriginPolicy,
    listener: Option<ListenerId>,
}

impl Transport {
    pub fn new(mode: EmbedMode, policy: OriginPolicy) -> Self {
        Self {
            mode,
            origin: WILDCARD_ORIGIN.to_string(),
            policy,
            listener: None,
        }
    }

    pub fn mode(&self) -> EmbedMode {
        self.mode
    }

    /// Pinned origin, or the wildcard before first contact.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Install the inbound listener for `target`, replacing any previous one.
    pub fn attach<C: MessageChannel + ?Sized>(
        &mut self,
        channel: &C,
        target: ElementKey,
        handler: InboundHandler,
    ) {
        self.detach(channel);
        self.listener = Some(channel.listen(target, self.mode, handler));
    }

    /// Remove the inbound listener; a no-op when already detached.
    pub fn detach<C: MessageChannel + ?Sized>(&mut self, channel: &C) {
        if let Some(listener) = self.listener.take() {
            channel.unlisten(listener);
        }
    }

    /// Filter a message observed for `target` and decode it. Iframe messages
    /// must come from `target`'s own content window and an allow-listed
    /// origin; the first accepted origin is pinned.
    pub fn accept(&mut self, target: ElementKey, message: InboundMessage) -> Option<Envelope> {
        if self.mode == EmbedMode::Iframe {
            if message.source != Some(target) || !self.policy.allows(&message.origin) {
                trace!(origin = %message.origin, "Ignoring message from foreign source");
                return None;
            }

            if self.origin == WILDCARD_ORIGIN {
                debug!(origin = %message.origin, "Pinned display origin");
                self.origin = message.origin;
            }
        }

        Some(codec::decode(message.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::TestHost;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    const ORIGIN: &str = "https://display.hubstairs.com";

    fn message(origin: &str, source: Option<ElementKey>, data: Value) -> InboundMessage {
        InboundMessage {
            origin: origin.to_string(),
            source,
            data: RawMessage::Structured(data),
        }
    }

    #[test]
    fn send_posts_with_current_origin() {
        let host = TestHost::new();
        let container = host.create_element(None);
        let embed = host.add_embed(container);

        assert!(send(&host, embed, "displayOrigin", "testMethod", None));
        assert!(send(
            &host,
            embed,
            "displayOrigin",
            "testMethodWithParams",
            Some(json!("testParam"))
        ));

        let posted = host.posted();
        assert_eq!(posted[0].message, json!({"method": "testMethod"}));
        assert_eq!(posted[0].origin, "displayOrigin");
        assert_eq!(
            posted[1].message,
            json!({"method": "testMethodWithParams", "value": "testParam"})
        );
    }

    #[test]
    fn send_without_channel_is_dropped() {
        let host = TestHost::new();
        let placeholder = host.create_element(None);

        assert!(!send(&host, placeholder, "*", "play", None));
        assert!(host.posted().is_empty());
    }

    #[test]
    fn iframe_messages_are_filtered_and_origin_is_pinned() {
        let mut transport = Transport::new(EmbedMode::Iframe, OriginPolicy::default());
        let target = ElementKey(7);
        let other = ElementKey(8);

        assert!(
            transport
                .accept(target, message(ORIGIN, Some(other), json!({"event": "play"})))
                .is_none()
        );
        assert!(
            transport
                .accept(
                    target,
                    message("https://evil.net", Some(target), json!({"event": "play"}))
                )
                .is_none()
        );
        assert_eq!(transport.origin(), "*");

        let envelope = transport
            .accept(target, message(ORIGIN, Some(target), json!({"event": "play"})))
            .expect("accepted");
        assert_eq!(envelope.event_name(), Some("play"));
        assert_eq!(transport.origin(), ORIGIN);

        transport.accept(
            target,
            message(
                "https://display-staging.hubstairs.io",
                Some(target),
                json!({"event": "play"}),
            ),
        );
        assert_eq!(transport.origin(), ORIGIN);
    }

    #[test]
    fn js_messages_are_not_filtered() {
        let mut transport = Transport::new(EmbedMode::Js, OriginPolicy::default());
        let envelope = transport
            .accept(ElementKey(1), message("", None, json!({"method": "getColor"})))
            .expect("accepted");

        assert_eq!(envelope.method_name(), Some("getColor"));
        assert_eq!(transport.origin(), "*");
    }

    #[test]
    fn detach_is_idempotent() {
        let host = TestHost::new();
        let container = host.create_element(None);
        let embed = host.add_embed(container);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut transport = Transport::new(EmbedMode::Iframe, OriginPolicy::default());

        let sink = seen.clone();
        transport.attach(
            &host,
            embed,
            Box::new(move |message| sink.borrow_mut().push(message)),
        );
        assert_eq!(host.listener_count(), 1);

        host.deliver(embed, ORIGIN, json!({"event": "play"}));
        assert_eq!(seen.borrow().len(), 1);

        transport.detach(&host);
        transport.detach(&host);
        assert_eq!(host.listener_count(), 0);

        host.deliver(embed, ORIGIN, json!({"event": "play"}));
        assert_eq!(seen.borrow().len(), 1);
    }
}
