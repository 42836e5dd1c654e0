//! Display controllers and the factory that keeps one per element.
//!
//! A [`Display`] moves through [`ReadyState`]: the oEmbed descriptor is
//! fetched, its markup injected, and calls made before the embedded content
//! announces `ready` wait for it. Replies are correlated purely by method
//! name in FIFO order.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use display_constants::protocol::{ADD_EVENT_LISTENER, EVENT_KEY_PREFIX, REMOVE_EVENT_LISTENER};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture, Shared};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::embed::{DisplayOptions, EmbedMode, OriginPolicy, fetch_descriptor};
use crate::error::DisplayError;
use crate::host::{ElementKey, Host, HostRef, resolve_element};
use crate::instances::InstanceRegistry;
use crate::rpc::callbacks::{Callback, CallbackRegistry, EventListener};
use crate::rpc::codec::Envelope;
use crate::rpc::transport::{self, InboundHandler, InboundMessage, Transport};

type ReadyFuture = Shared<LocalBoxFuture<'static, Result<(), DisplayError>>>;
type ReadySender = oneshot::Sender<Result<(), DisplayError>>;

/// Lifecycle of a display controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Constructing,
    /// Waiting for the oEmbed descriptor.
    AwaitingEmbed,
    /// Markup injected, waiting for the `ready` event.
    AwaitingReady,
    Ready,
    Failed,
    Destroyed,
}

/// Method name for a getter or setter: `color`/`GET` -> `getColor`.
pub fn method_name(prop: &str, kind: &str) -> String {
    let kind = kind.to_lowercase();
    if prop.starts_with(&kind) {
        return prop.to_string();
    }

    let mut chars = prop.chars();
    match chars.next() {
        Some(first) => format!("{kind}{}{}", first.to_uppercase(), chars.as_str()),
        None => kind,
    }
}

fn event_key(event: &str) -> String {
    format!("{EVENT_KEY_PREFIX}{event}")
}

struct Context<H: Host> {
    host: H,
    policy: OriginPolicy,
    instances: RefCell<InstanceRegistry<Display<H>>>,
    callbacks: RefCell<CallbackRegistry<Callback>>,
}

/// Owns the host, the instance registry and the callback registry. Cloning
/// shares them.
pub struct Displays<H: Host> {
    context: Rc<Context<H>>,
}

impl<H: Host> Clone for Displays<H> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<H: Host> Displays<H> {
    pub fn new(host: H) -> Self {
        Self::with_policy(host, OriginPolicy::default())
    }

    pub fn with_policy(host: H, policy: OriginPolicy) -> Self {
        Self {
            context: Rc::new(Context {
                host,
                policy,
                instances: RefCell::new(InstanceRegistry::new()),
                callbacks: RefCell::new(CallbackRegistry::new()),
            }),
        }
    }

    pub fn host(&self) -> &H {
        &self.context.host
    }

    pub fn policy(&self) -> &OriginPolicy {
        &self.context.policy
    }

    /// Return the controller already bound to the element, or create one and
    /// start embedding in the background.
    pub fn get_or_create(
        &self,
        host_ref: HostRef<H::Element>,
        options: DisplayOptions,
    ) -> Result<Display<H>, DisplayError> {
        let element = resolve_element(&self.context.host, host_ref)?;

        if let Some(existing) = self.get(element) {
            return Ok(existing);
        }

        let mode = options.embed_mode;
        let (ready_tx, ready_rx) = oneshot::channel();
        let ready: ReadyFuture = ready_rx
            .map(|result| result.unwrap_or(Err(DisplayError::UnknownInstance)))
            .boxed_local()
            .shared();

        let display = Display {
            inner: Rc::new(Inner {
                context: self.context.clone(),
                state: RefCell::new(State {
                    element,
                    original: None,
                    phase: ReadyState::Constructing,
                    transport: Transport::new(mode, self.context.policy.clone()),
                    ready: Some(ready),
                    ready_tx: Some(ready_tx),
                }),
            }),
        };

        self.context
            .instances
            .borrow_mut()
            .insert(element, display.clone());
        display.set_phase(ReadyState::AwaitingEmbed);

        info!(%element, mode = mode.as_str(), "Creating display");
        self.context
            .host
            .spawn_local(Box::pin(embed(Rc::downgrade(&display.inner), options)));

        Ok(display)
    }

    /// Controller bound to `element`, either its container or its embed node.
    pub fn get(&self, element: ElementKey) -> Option<Display<H>> {
        self.context.instances.borrow().get(element)
    }

    /// Number of registered elements. An injected display is registered
    /// under both its container and its embed node.
    pub fn len(&self) -> usize {
        self.context.instances.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.instances.borrow().is_empty()
    }
}

struct State {
    /// Container before injection, embed node after.
    element: ElementKey,
    original: Option<ElementKey>,
    phase: ReadyState,
    transport: Transport,
    ready: Option<ReadyFuture>,
    ready_tx: Option<ReadySender>,
}

struct Inner<H: Host> {
    context: Rc<Context<H>>,
    state: RefCell<State>,
}

/// Handle to one embedded display. Clones refer to the same controller.
pub struct Display<H: Host> {
    inner: Rc<Inner<H>>,
}

impl<H: Host> Clone for Display<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: Host> PartialEq for Display<H> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<H: Host> std::fmt::Debug for Display<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Display")
            .field("element", &state.element)
            .field("original", &state.original)
            .field("phase", &state.phase)
            .field("origin", &state.transport.origin())
            .finish()
    }
}

/// Fetch the descriptor, inject it and start listening.
async fn embed<H: Host>(target: Weak<Inner<H>>, options: DisplayOptions) {
    let Some(context) = target.upgrade().map(|inner| inner.context.clone()) else {
        return;
    };

    let fetched = fetch_descriptor(&context.host, &options, &context.policy).await;

    let Some(inner) = target.upgrade() else {
        return;
    };
    let display = Display { inner };

    let descriptor = match fetched {
        Ok(descriptor) => descriptor,
        Err(error) => {
            display.fail(error);
            return;
        }
    };

    if display.ready_state() != ReadyState::AwaitingEmbed {
        debug!("Display left before its embed arrived, skipping injection");
        return;
    }

    let container = display.element();
    display.set_phase(ReadyState::AwaitingReady);

    let embed = match context
        .host
        .inject(container, &descriptor.html, display.embed_mode())
    {
        Ok(embed) => embed,
        Err(error) => {
            display.fail(error);
            return;
        }
    };

    let receiver = Rc::downgrade(&display.inner);
    let handler: InboundHandler = Box::new(move |message| {
        if let Some(inner) = receiver.upgrade() {
            Display { inner }.receive(message);
        }
    });

    {
        let mut state = display.inner.state.borrow_mut();
        state.element = embed;
        state.original = Some(container);
        state.transport.attach(&context.host, embed, handler);
    }

    context.callbacks.borrow_mut().rekey(container, embed);
    if !context.instances.borrow_mut().alias(container, embed) {
        debug!(%container, "Container no longer registered, embed left unbound");
    }

    debug!(%container, %embed, "Injected display markup");
}

impl<H: Host> Display<H> {
    fn context(&self) -> &Context<H> {
        &self.inner.context
    }

    fn set_phase(&self, phase: ReadyState) {
        self.inner.state.borrow_mut().phase = phase;
    }

    /// Element messages are exchanged with: the container until the markup
    /// is injected, the embed node afterwards.
    pub fn element(&self) -> ElementKey {
        self.inner.state.borrow().element
    }

    /// Container the display was created on, once the markup is injected.
    pub fn original_element(&self) -> Option<ElementKey> {
        self.inner.state.borrow().original
    }

    /// Pinned origin of the embedded content, `*` until first contact.
    pub fn origin(&self) -> String {
        self.inner.state.borrow().transport.origin().to_string()
    }

    pub fn embed_mode(&self) -> EmbedMode {
        self.inner.state.borrow().transport.mode()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.state.borrow().phase
    }

    fn is_destroyed(&self) -> bool {
        self.ready_state() == ReadyState::Destroyed
    }

    /// Resolves once the embedded content is ready. Every waiter observes the
    /// same outcome; a destroyed display fails with
    /// [`DisplayError::UnknownInstance`].
    pub async fn ready(&self) -> Result<(), DisplayError> {
        let ready = self.inner.state.borrow().ready.clone();
        match ready {
            Some(ready) => ready.await,
            None => Err(DisplayError::UnknownInstance),
        }
    }

    /// Reject the readiness future unless it already settled.
    fn fail(&self, error: DisplayError) {
        let sender = {
            let mut state = self.inner.state.borrow_mut();
            let Some(sender) = state.ready_tx.take() else {
                return;
            };
            state.phase = ReadyState::Failed;
            sender
        };

        warn!(element = %self.element(), %error, "Display failed to become ready");
        let _ = sender.send(Err(error));
    }

    fn mark_ready(&self) {
        let (container, sender) = {
            let mut state = self.inner.state.borrow_mut();
            if state.phase == ReadyState::AwaitingReady {
                state.phase = ReadyState::Ready;
            }
            (state.original.unwrap_or(state.element), state.ready_tx.take())
        };

        self.context().host.reveal(container);

        if let Some(sender) = sender {
            info!(element = %self.element(), "Display ready");
            let _ = sender.send(Ok(()));
        }
    }

    /// Entry point for every message the host observed for this display.
    fn receive(&self, message: InboundMessage) {
        let envelope = {
            let mut state = self.inner.state.borrow_mut();
            if state.phase == ReadyState::Destroyed {
                return;
            }
            let element = state.element;
            match state.transport.accept(element, message) {
                Some(envelope) => envelope,
                None => return,
            }
        };

        if let Some(failure) = envelope.ready_failure() {
            self.fail(DisplayError::Remote {
                name: failure.name,
                message: failure.message,
            });
            return;
        }

        if envelope.is_ready() {
            self.mark_ready();
            return;
        }

        self.dispatch(&envelope);
    }

    /// Route an event or a reply to the callbacks stored for it. Listeners
    /// run with no registry borrow held.
    fn dispatch(&self, envelope: &Envelope) {
        let element = self.element();
        let callbacks = &self.context().callbacks;

        if let Some(event) = envelope.event_name() {
            if let Some(failure) = envelope.failure()
                && let Some(method) = failure.method.as_deref()
            {
                let pending = callbacks.borrow_mut().take_all(element, method);
                for callback in pending {
                    callback.reject(DisplayError::Remote {
                        name: failure.name.clone(),
                        message: failure.message.clone(),
                    });
                }
            }

            let listeners: Vec<EventListener> = callbacks
                .borrow()
                .list(element, &event_key(event))
                .iter()
                .filter_map(Callback::listener)
                .cloned()
                .collect();

            let data = envelope.payload();
            for listener in listeners {
                listener.call(&data);
            }
        } else if let Some(method) = envelope.method_name() {
            let reply = callbacks.borrow_mut().take_first(element, method);
            match reply {
                Some(reply) => reply.settle(envelope.reply_value()),
                None => debug!(method, "Reply without a pending call"),
            }
        }
    }

    /// Wait for readiness, register the reply slot and post the call.
    async fn request(&self, method: String, value: Option<Value>) -> Result<Value, DisplayError> {
        self.ready().await?;

        // Readiness may have settled before a destroy that ran ahead of us.
        let (element, origin) = {
            let state = self.inner.state.borrow();
            if state.phase == ReadyState::Destroyed {
                return Err(DisplayError::UnknownInstance);
            }
            (state.element, state.transport.origin().to_string())
        };

        let (sender, receiver) = oneshot::channel();

        let context = self.context();
        context
            .callbacks
            .borrow_mut()
            .store(element, &method, Callback::Reply(sender));
        transport::send(&context.host, element, &origin, &method, value);

        match receiver.await {
            Ok(result) => result,
            // The display was destroyed with the call outstanding.
            Err(oneshot::Canceled) => {
                debug!(%method, "Call abandoned by destroyed display");
                future::pending().await
            }
        }
    }

    /// Invoke a remote method. `None` sends an empty object.
    pub async fn call_method(&self, name: &str, args: Option<Value>) -> Result<Value, DisplayError> {
        let value = args.unwrap_or_else(|| json!({}));
        self.request(name.to_string(), Some(value)).await
    }

    /// Read a remote property, e.g. `color` calls `getColor`.
    pub async fn get(&self, name: &str) -> Result<Value, DisplayError> {
        self.request(method_name(name, "get"), None).await
    }

    /// Write a remote property, e.g. `color` calls `setColor`.
    pub async fn set(&self, name: &str, value: Option<Value>) -> Result<Value, DisplayError> {
        let Some(value) = value else {
            return Err(DisplayError::MissingValue);
        };
        self.request(method_name(name, "set"), Some(value)).await
    }

    /// Fire-and-forget subscription call; failures surface as `error` events.
    fn notify(&self, method: &'static str, event: &str) {
        let display = self.clone();
        let event = event.to_string();
        self.context().host.spawn_local(Box::pin(async move {
            if let Err(error) = display.call_method(method, Some(Value::String(event))).await {
                debug!(method, %error, "Ignoring listener subscription failure");
            }
        }));
    }

    /// Register `listener` for `event`. The first listener for an event
    /// subscribes the embedded content to it.
    pub fn on(&self, event: &str, listener: EventListener) -> Result<(), DisplayError> {
        if event.is_empty() {
            return Err(DisplayError::InvalidArgument(
                "You must pass an event name.".to_string(),
            ));
        }
        if self.is_destroyed() {
            debug!(event, "Ignoring listener on destroyed display");
            return Ok(());
        }

        let element = self.element();
        let key = event_key(event);
        let first = self.context().callbacks.borrow().list(element, &key).is_empty();
        if first {
            self.notify(ADD_EVENT_LISTENER, event);
        }

        self.context()
            .callbacks
            .borrow_mut()
            .store(element, &key, Callback::Listener(listener));
        Ok(())
    }

    /// Remove one listener, or all of them when `listener` is `None`. Removing
    /// the last one unsubscribes the embedded content.
    pub fn off(&self, event: &str, listener: Option<&EventListener>) -> Result<(), DisplayError> {
        if event.is_empty() {
            return Err(DisplayError::InvalidArgument(
                "You must pass an event name.".to_string(),
            ));
        }
        if self.is_destroyed() {
            return Ok(());
        }

        let entry = listener.cloned().map(Callback::Listener);
        let last = self
            .context()
            .callbacks
            .borrow_mut()
            .remove(self.element(), &event_key(event), entry.as_ref());
        if last {
            self.notify(REMOVE_EVENT_LISTENER, event);
        }
        Ok(())
    }

    /// Tear the display down. Idempotent; the handle is unusable afterwards.
    pub fn destroy(&self) {
        let context = self.context();
        let (element, original) = {
            let mut state = self.inner.state.borrow_mut();
            if state.phase == ReadyState::Destroyed {
                return;
            }
            state.phase = ReadyState::Destroyed;
            state.ready = None;
            state.ready_tx = None;
            state.transport.detach(&context.host);
            (state.element, state.original)
        };

        let mut removed = Vec::new();
        {
            let mut instances = context.instances.borrow_mut();
            for key in [Some(element), original].into_iter().flatten() {
                if instances.get(key).is_some_and(|bound| bound == *self) {
                    removed.extend(instances.remove(key));
                }
            }
        }
        drop(removed);

        {
            let mut callbacks = context.callbacks.borrow_mut();
            callbacks.remove_target(element);
            if let Some(original) = original {
                callbacks.remove_target(original);
            }
        }

        context.host.teardown(element, original);
        info!(%element, "Display destroyed");
    }

    /// Products shown by the display.
    pub async fn get_products(&self) -> Result<Value, DisplayError> {
        self.get("products").await
    }

    pub async fn next_scene(&self, cursor: Value) -> Result<Value, DisplayError> {
        self.call_method("nextScene", Some(json!({ "cursor": cursor })))
            .await
    }

    /// Set or clear the product filter.
    pub async fn set_filter(&self, filter: Option<Value>) -> Result<Value, DisplayError> {
        self.set("setFilter", filter).await
    }

    pub async fn set_language(&self, language: Option<Value>) -> Result<Value, DisplayError> {
        self.set("language", language).await
    }

    pub async fn set_config(&self, config: Option<Value>) -> Result<Value, DisplayError> {
        self.set("config", config).await
    }
}
