//! In-memory host and event-loop harness for exercising controllers without
//! a browser.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use serde_json::{Value, json};
use tracing::warn;
use url::Url;

use crate::controller::{Display, Displays};
use crate::embed::{DisplayOptions, EmbedMode, FetchError, HttpResponse, OEmbedClient};
use crate::error::DisplayError;
use crate::host::{Dom, ElementKey, HostRef, Spawn};
use crate::rpc::codec::RawMessage;
use crate::rpc::transport::{InboundHandler, InboundMessage, ListenerId, MessageChannel};

/// A message the controller posted.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub target: ElementKey,
    pub message: Value,
    pub origin: String,
}

#[derive(Debug, Default)]
struct Node {
    id: Option<String>,
    attached: bool,
    /// Owns a content window that accepts `postMessage`.
    channel: bool,
    initialized: bool,
    hidden: bool,
    embed: Option<ElementKey>,
}

struct Listener {
    id: ListenerId,
    target: ElementKey,
    mode: EmbedMode,
    handler: Rc<dyn Fn(InboundMessage)>,
}

struct State {
    next_key: u64,
    next_listener: u64,
    nodes: HashMap<ElementKey, Node>,
    listeners: Vec<Listener>,
    posted: Vec<Posted>,
    injected: Vec<(ElementKey, String)>,
    revealed: Vec<ElementKey>,
    teardowns: Vec<(ElementKey, Option<ElementKey>)>,
    oembed_requests: Vec<Url>,
    oembed_response: Result<HttpResponse, FetchError>,
    injection_failure: Option<DisplayError>,
}

fn descriptor_body() -> String {
    json!({
        "type": "rich",
        "version": "1.0",
        "html": "<iframe src=\"https://display.nfinite.app/v1/5e417dbac5d2651adbe509ec\"></iframe>",
        "provider_name": "Hubstairs"
    })
    .to_string()
}

/// Recording host. Clones share state.
#[derive(Clone)]
pub struct TestHost {
    state: Rc<RefCell<State>>,
    spawner: Option<LocalSpawner>,
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHost {
    /// Host without an executor; spawned tasks are dropped.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                next_key: 1,
                next_listener: 1,
                nodes: HashMap::new(),
                listeners: Vec::new(),
                posted: Vec::new(),
                injected: Vec::new(),
                revealed: Vec::new(),
                teardowns: Vec::new(),
                oembed_requests: Vec::new(),
                oembed_response: Ok(HttpResponse {
                    status: 200,
                    body: descriptor_body(),
                }),
                injection_failure: None,
            })),
            spawner: None,
        }
    }

    pub fn with_spawner(spawner: LocalSpawner) -> Self {
        Self {
            spawner: Some(spawner),
            ..Self::new()
        }
    }

    fn add_node(&self, node: Node) -> ElementKey {
        let mut state = self.state.borrow_mut();
        let key = ElementKey(state.next_key);
        state.next_key += 1;
        state.nodes.insert(key, node);
        key
    }

    /// A container attached to the document.
    pub fn create_element(&self, id: Option<&str>) -> ElementKey {
        self.add_node(Node {
            id: id.map(str::to_string),
            attached: true,
            ..Node::default()
        })
    }

    /// A node with no owning window.
    pub fn detached_node(&self) -> ElementKey {
        self.add_node(Node::default())
    }

    /// Put an iframe into `container` as if its markup had been injected.
    pub fn add_embed(&self, container: ElementKey) -> ElementKey {
        let embed = self.add_node(Node {
            attached: true,
            channel: true,
            hidden: true,
            ..Node::default()
        });

        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&container) {
            node.initialized = true;
            node.embed = Some(embed);
        }
        embed
    }

    pub fn set_oembed_response(&self, status: u16, body: &str) {
        self.state.borrow_mut().oembed_response = Ok(HttpResponse {
            status,
            body: body.to_string(),
        });
    }

    pub fn fail_oembed(&self, error: FetchError) {
        self.state.borrow_mut().oembed_response = Err(error);
    }

    pub fn fail_injection(&self, error: DisplayError) {
        self.state.borrow_mut().injection_failure = Some(error);
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.state.borrow().posted.clone()
    }

    pub fn injected(&self) -> Vec<(ElementKey, String)> {
        self.state.borrow().injected.clone()
    }

    pub fn revealed(&self) -> Vec<ElementKey> {
        self.state.borrow().revealed.clone()
    }

    pub fn teardowns(&self) -> Vec<(ElementKey, Option<ElementKey>)> {
        self.state.borrow().teardowns.clone()
    }

    pub fn oembed_requests(&self) -> Vec<Url> {
        self.state.borrow().oembed_requests.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn is_hidden(&self, element: ElementKey) -> bool {
        self.state
            .borrow()
            .nodes
            .get(&element)
            .is_some_and(|node| node.hidden)
    }

    /// Deliver `message` as observed for `target`. Window listeners see every
    /// message; element listeners only those dispatched on their element.
    pub fn deliver_message(&self, target: ElementKey, message: InboundMessage) {
        let handlers: Vec<Rc<dyn Fn(InboundMessage)>> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|listener| listener.mode == EmbedMode::Iframe || listener.target == target)
            .map(|listener| listener.handler.clone())
            .collect();

        for handler in handlers {
            handler(message.clone());
        }
    }

    /// Structured message sent by the content window of `embed`.
    pub fn deliver(&self, embed: ElementKey, origin: &str, data: Value) {
        self.deliver_message(
            embed,
            InboundMessage {
                origin: origin.to_string(),
                source: Some(embed),
                data: RawMessage::Structured(data),
            },
        );
    }

    /// String message sent by the content window of `embed`.
    pub fn deliver_text(&self, embed: ElementKey, origin: &str, text: &str) {
        self.deliver_message(
            embed,
            InboundMessage {
                origin: origin.to_string(),
                source: Some(embed),
                data: RawMessage::Text(text.to_string()),
            },
        );
    }
}

impl Dom for TestHost {
    type Element = ElementKey;

    fn element_by_id(&self, id: &str) -> Option<ElementKey> {
        self.state
            .borrow()
            .nodes
            .iter()
            .find(|(_, node)| node.id.as_deref() == Some(id))
            .map(|(key, _)| *key)
    }

    fn element_key(&self, element: &ElementKey) -> Option<ElementKey> {
        self.state
            .borrow()
            .nodes
            .get(element)
            .filter(|node| node.attached)
            .map(|_| *element)
    }

    fn inject(
        &self,
        container: ElementKey,
        markup: &str,
        _mode: EmbedMode,
    ) -> Result<ElementKey, DisplayError> {
        if let Some(error) = self.state.borrow().injection_failure.clone() {
            return Err(error);
        }

        let existing = self
            .state
            .borrow()
            .nodes
            .get(&container)
            .filter(|node| node.initialized)
            .and_then(|node| node.embed);
        if let Some(embed) = existing {
            return Ok(embed);
        }

        self.state
            .borrow_mut()
            .injected
            .push((container, markup.to_string()));
        Ok(self.add_embed(container))
    }

    fn reveal(&self, container: ElementKey) {
        let mut state = self.state.borrow_mut();
        state.revealed.push(container);
        let embed = state.nodes.get(&container).and_then(|node| node.embed);
        if let Some(node) = embed.and_then(|embed| state.nodes.get_mut(&embed)) {
            node.hidden = false;
        }
    }

    fn teardown(&self, embed: ElementKey, container: Option<ElementKey>) {
        let mut state = self.state.borrow_mut();
        state.teardowns.push((embed, container));

        if let Some(node) = container.and_then(|container| state.nodes.get_mut(&container)) {
            node.initialized = false;
            node.embed = None;
        }
        if container.is_some() {
            state.nodes.remove(&embed);
        }
    }
}

impl MessageChannel for TestHost {
    fn post_message(&self, target: ElementKey, message: &Value, target_origin: &str) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.nodes.get(&target).is_some_and(|node| node.channel) {
            return false;
        }

        state.posted.push(Posted {
            target,
            message: message.clone(),
            origin: target_origin.to_string(),
        });
        true
    }

    fn listen(&self, target: ElementKey, mode: EmbedMode, handler: InboundHandler) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push(Listener {
            id,
            target,
            mode,
            handler: Rc::from(handler),
        });
        id
    }

    fn unlisten(&self, listener: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|installed| installed.id != listener);
    }
}

#[async_trait(?Send)]
impl OEmbedClient for TestHost {
    async fn get(&self, url: &Url) -> Result<HttpResponse, FetchError> {
        let mut state = self.state.borrow_mut();
        state.oembed_requests.push(url.clone());
        state.oembed_response.clone()
    }
}

impl Spawn for TestHost {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        match &self.spawner {
            Some(spawner) => {
                if let Err(error) = spawner.spawn_local(task) {
                    warn!(%error, "Test executor is gone, dropping task");
                }
            }
            None => warn!("Test host has no executor, dropping task"),
        }
    }
}

/// Result slot of a task spawned on the [`Harness`].
pub struct Outcome<T>(Rc<RefCell<Option<T>>>);

impl<T> Outcome<T> {
    pub fn is_pending(&self) -> bool {
        self.0.borrow().is_none()
    }

    pub fn take(&self) -> Option<T> {
        self.0.borrow_mut().take()
    }
}

/// Single-threaded event loop driving a [`TestHost`] and its displays.
pub struct Harness {
    pub pool: LocalPool,
    pub host: TestHost,
    pub displays: Displays<TestHost>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let host = TestHost::with_spawner(pool.spawner());
        let displays = Displays::new(host.clone());
        Self {
            pool,
            host,
            displays,
        }
    }

    /// Run every task until none can make progress.
    pub fn run(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn spawn<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Outcome<T> {
        let slot = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        self.host.spawn_local(Box::pin(async move {
            let value = future.await;
            *sink.borrow_mut() = Some(value);
        }));
        Outcome(slot)
    }

    /// Create a display on a fresh container.
    pub fn create(&self, options: DisplayOptions) -> Display<TestHost> {
        let container = self.host.create_element(None);
        self.create_on(container, options)
    }

    pub fn create_on(&self, container: ElementKey, options: DisplayOptions) -> Display<TestHost> {
        match self
            .displays
            .get_or_create(HostRef::Element(container), options)
        {
            Ok(display) => display,
            Err(error) => panic!("display creation failed: {error}"),
        }
    }
}
