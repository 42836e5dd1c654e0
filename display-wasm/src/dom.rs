//! [`WebHost`]: the core host traits implemented against the page DOM.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use display_constants::attributes::{ELEMENT_KEY_PROPERTY, INITIALIZED_ATTRIBUTE};
use display_constants::protocol::MESSAGE_EVENT;
use display_rpc::host::{Dom, Spawn};
use display_rpc::rpc::transport::InboundHandler;
use display_rpc::{
    DisplayError, ElementKey, EmbedMode, InboundMessage, ListenerId, MessageChannel, RawMessage,
};
use futures::future::LocalBoxFuture;
use js_sys::{Function, Object, Reflect};
use serde_json::Value;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{CustomEvent, Element, Event, EventTarget, HtmlElement, HtmlIFrameElement, MessageEvent};

/// Convert a JSON value into a script value.
pub(crate) fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

/// Convert a script value into JSON; `undefined` and unserialisable values
/// yield `None`.
pub(crate) fn from_js(value: &JsValue) -> Option<Value> {
    if value.is_undefined() {
        return None;
    }

    let text = js_sys::JSON::stringify(value).ok()?;
    let text = JsValue::from(text).as_string()?;
    serde_json::from_str(&text).ok()
}

/// Message payload as delivered by the page.
pub(crate) fn raw_message(data: JsValue) -> RawMessage {
    match data.as_string() {
        Some(text) => RawMessage::Text(text),
        None => RawMessage::Structured(from_js(&data).unwrap_or(Value::Null)),
    }
}

/// Whether `source` is the content window of `frame`.
pub(crate) fn is_frame_source(frame: &HtmlIFrameElement, source: Option<&Object>) -> bool {
    match (frame.content_window(), source) {
        (Some(window), Some(source)) => Object::is(window.as_ref(), source.as_ref()),
        _ => false,
    }
}

fn js_failure(context: &str, error: JsValue) -> DisplayError {
    DisplayError::InvalidArgument(format!("{context}: {error:?}"))
}

struct Installed {
    target: EventTarget,
    closure: Closure<dyn FnMut(Event)>,
}

#[derive(Default)]
struct Registry {
    next_key: u64,
    next_listener: u64,
    elements: HashMap<ElementKey, Element>,
    listeners: HashMap<ListenerId, Installed>,
}

/// Browser implementation of the display host. Clones share state.
#[derive(Clone, Default)]
pub struct WebHost {
    registry: Rc<RefCell<Registry>>,
}

impl WebHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element registered under `key`.
    pub fn element(&self, key: ElementKey) -> Option<Element> {
        self.registry.borrow().elements.get(&key).cloned()
    }

    /// Key stored on the element, assigning a fresh one on first sight.
    fn key_for(&self, element: &Element) -> ElementKey {
        let property = JsValue::from_str(ELEMENT_KEY_PROPERTY);
        if let Some(key) = Reflect::get(element, &property)
            .ok()
            .and_then(|value| value.as_f64())
        {
            let key = ElementKey(key as u64);
            self.registry
                .borrow_mut()
                .elements
                .entry(key)
                .or_insert_with(|| element.clone());
            return key;
        }

        let mut registry = self.registry.borrow_mut();
        registry.next_key += 1;
        let key = ElementKey(registry.next_key);
        if Reflect::set(element, &property, &JsValue::from_f64(key.0 as f64)).is_err() {
            warn!(%key, "Could not tag element with its key");
        }
        registry.elements.insert(key, element.clone());
        key
    }

    fn forget(&self, key: ElementKey) {
        self.registry.borrow_mut().elements.remove(&key);
    }

    fn install(&self, target: EventTarget, closure: Closure<dyn FnMut(Event)>) -> ListenerId {
        if let Err(error) =
            target.add_event_listener_with_callback(MESSAGE_EVENT, closure.as_ref().unchecked_ref())
        {
            warn!(?error, "Failed to register message listener");
        }

        let mut registry = self.registry.borrow_mut();
        registry.next_listener += 1;
        let id = ListenerId(registry.next_listener);
        registry.listeners.insert(id, Installed { target, closure });
        id
    }
}

/// The node inside `container` that owns the message channel.
fn find_embed(container: &Element, mode: EmbedMode) -> Option<Element> {
    match mode {
        EmbedMode::Iframe => container.query_selector("iframe").ok().flatten(),
        EmbedMode::Js => container.first_element_child(),
    }
}

fn set_display(element: &Element, value: &str) {
    if let Some(element) = element.dyn_ref::<HtmlElement>()
        && let Err(error) = element.style().set_property("display", value)
    {
        debug!(?error, "Could not change embed visibility");
    }
}

impl Dom for WebHost {
    type Element = Element;

    fn element_by_id(&self, id: &str) -> Option<Element> {
        web_sys::window()?.document()?.get_element_by_id(id)
    }

    fn element_key(&self, element: &Element) -> Option<ElementKey> {
        element.owner_document()?.default_view()?;
        Some(self.key_for(element))
    }

    fn inject(
        &self,
        container: ElementKey,
        markup: &str,
        mode: EmbedMode,
    ) -> Result<ElementKey, DisplayError> {
        let container = self
            .element(container)
            .ok_or_else(|| DisplayError::InvalidElement(container.to_string()))?;

        if container.has_attribute(INITIALIZED_ATTRIBUTE)
            && let Some(existing) = find_embed(&container, mode)
        {
            return Ok(self.key_for(&existing));
        }

        let document = container
            .owner_document()
            .ok_or_else(|| DisplayError::InvalidElement("container".to_string()))?;
        let wrapper = document
            .create_element("div")
            .map_err(|error| js_failure("Could not create embed wrapper", error))?;
        wrapper.set_inner_html(markup);

        let Some(content) = wrapper.first_element_child() else {
            return Err(DisplayError::InvalidArgument(
                "The oEmbed response contained no markup.".to_string(),
            ));
        };

        set_display(&content, "none");
        container
            .append_child(&content)
            .map_err(|error| js_failure("Could not insert embed", error))?;
        container
            .set_attribute(INITIALIZED_ATTRIBUTE, "true")
            .map_err(|error| js_failure("Could not mark container", error))?;

        let embed = find_embed(&container, mode).unwrap_or(content);
        Ok(self.key_for(&embed))
    }

    fn reveal(&self, container: ElementKey) {
        if let Some(content) = self
            .element(container)
            .and_then(|container| container.first_element_child())
        {
            set_display(&content, "block");
        }
    }

    fn teardown(&self, embed: ElementKey, container: Option<ElementKey>) {
        if let Some(element) = self.element(embed)
            && element.tag_name().eq_ignore_ascii_case("iframe")
        {
            element.remove();
        }

        if let Some(element) = container.and_then(|container| self.element(container)) {
            if let Err(error) = element.remove_attribute(INITIALIZED_ATTRIBUTE) {
                debug!(?error, "Could not clear the initialized marker");
            }
            element.set_inner_html("");
        }

        // Both nodes are re-keyed from their expando if they come back.
        self.forget(embed);
        if let Some(container) = container {
            self.forget(container);
        }
    }
}

impl MessageChannel for WebHost {
    fn post_message(&self, target: ElementKey, message: &Value, target_origin: &str) -> bool {
        let Some(element) = self.element(target) else {
            return false;
        };

        // Iframes and script embeds both expose `contentWindow.postMessage`.
        let Some(window) = Reflect::get(&element, &JsValue::from_str("contentWindow"))
            .ok()
            .filter(|window| window.is_object())
        else {
            return false;
        };
        let Some(post) = Reflect::get(&window, &JsValue::from_str("postMessage"))
            .ok()
            .and_then(|post| post.dyn_into::<Function>().ok())
        else {
            return false;
        };

        let payload = match to_js(message) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(?error, "Could not convert outbound message");
                return false;
            }
        };

        match post.call2(&window, &payload, &JsValue::from_str(target_origin)) {
            Ok(_) => true,
            Err(error) => {
                warn!(?error, "postMessage failed");
                false
            }
        }
    }

    fn listen(&self, target: ElementKey, mode: EmbedMode, handler: InboundHandler) -> ListenerId {
        let element = self.element(target);

        match mode {
            EmbedMode::Iframe => {
                let frame = element.and_then(|element| element.dyn_into::<HtmlIFrameElement>().ok());
                let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                    let Ok(event) = event.dyn_into::<MessageEvent>() else {
                        return;
                    };
                    let source = event.source();
                    let from_frame = frame
                        .as_ref()
                        .is_some_and(|frame| is_frame_source(frame, source.as_ref()));

                    handler(InboundMessage {
                        origin: event.origin(),
                        source: from_frame.then_some(target),
                        data: raw_message(event.data()),
                    });
                });

                match web_sys::window() {
                    Some(window) => self.install(window.into(), closure),
                    None => {
                        warn!("No window to listen on");
                        ListenerId(0)
                    }
                }
            }
            EmbedMode::Js => {
                let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
                    let data = if let Some(custom) = event.dyn_ref::<CustomEvent>() {
                        custom.detail()
                    } else if let Some(message) = event.dyn_ref::<MessageEvent>() {
                        message.data()
                    } else {
                        return;
                    };

                    handler(InboundMessage {
                        origin: String::new(),
                        source: Some(target),
                        data: raw_message(data),
                    });
                });

                match element {
                    Some(element) => self.install(element.into(), closure),
                    None => {
                        warn!(%target, "No element to listen on");
                        ListenerId(0)
                    }
                }
            }
        }
    }

    fn unlisten(&self, listener: ListenerId) {
        let Some(installed) = self.registry.borrow_mut().listeners.remove(&listener) else {
            return;
        };

        if let Err(error) = installed.target.remove_event_listener_with_callback(
            MESSAGE_EVENT,
            installed.closure.as_ref().unchecked_ref(),
        ) {
            debug!(?error, "Failed to remove message listener");
        }

        // The listener may be the one currently running.
        wasm_bindgen_futures::spawn_local(async move {
            drop(installed);
        });
    }
}

impl Spawn for WebHost {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use serde_json::json;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    fn container() -> Element {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .expect("document");
        let element = document.create_element("div").expect("div");
        document
            .body()
            .expect("body")
            .append_child(&element)
            .expect("attach");
        element
    }

    #[wasm_bindgen_test]
    fn element_keys_are_stable() {
        let host = WebHost::new();
        let element = container();

        let key = host.element_key(&element).expect("key");
        assert_eq!(host.element_key(&element), Some(key));
        assert_eq!(host.element(key), Some(element));
    }

    #[wasm_bindgen_test]
    fn inject_hides_content_and_is_idempotent() {
        let host = WebHost::new();
        let element = container();
        let key = host.element_key(&element).expect("key");
        let markup = r#"<div style="position:relative"><iframe src="about:blank"></iframe></div>"#;

        let embed = host.inject(key, markup, EmbedMode::Iframe).expect("embed");
        assert_eq!(host.inject(key, markup, EmbedMode::Iframe), Ok(embed));
        assert_eq!(element.get_attribute(INITIALIZED_ATTRIBUTE).as_deref(), Some("true"));
        assert_eq!(element.child_element_count(), 1);
        assert_eq!(host.element(embed).expect("iframe").tag_name(), "IFRAME");

        host.teardown(embed, Some(key));
        assert!(!element.has_attribute(INITIALIZED_ATTRIBUTE));
        assert_eq!(element.child_element_count(), 0);
        assert_eq!(host.element(embed), None);
        assert_eq!(host.element(key), None);
    }

    #[wasm_bindgen_test]
    fn teardown_before_injection_releases_the_container() {
        let host = WebHost::new();
        let element = container();
        let key = host.element_key(&element).expect("key");

        host.teardown(key, None);
        assert_eq!(host.element(key), None);
        assert!(element.is_connected());

        // The expando brings the same key back.
        assert_eq!(host.element_key(&element), Some(key));
        assert_eq!(host.element(key), Some(element));
    }

    #[wasm_bindgen_test]
    fn values_cross_the_boundary_as_json() {
        let value = json!({"method": "getColor", "value": [1, "two", null]});
        let js = to_js(&value).expect("js value");
        assert_eq!(from_js(&js), Some(value));
        assert_eq!(from_js(&JsValue::UNDEFINED), None);
        assert_eq!(
            raw_message(JsValue::from_str("{}")),
            RawMessage::Text("{}".into())
        );
    }
}
