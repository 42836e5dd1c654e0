//! The script-facing `Display` class.

use std::cell::RefCell;

use display_rpc::{Display, DisplayError, DisplayOptions, Displays, EventListener, HostRef};
use js_sys::{Function, Reflect};
use serde_json::Value;
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use crate::dom::{WebHost, from_js, to_js};

thread_local! {
    static DISPLAYS: Displays<WebHost> = Displays::new(WebHost::new());
    static SUBSCRIPTIONS: RefCell<Vec<Subscription>> = const { RefCell::new(Vec::new()) };
}

/// Links a script callback to the listener registered for it.
struct Subscription {
    display: Display<WebHost>,
    event: String,
    function: Function,
    listener: EventListener,
}

pub(crate) fn displays() -> Displays<WebHost> {
    DISPLAYS.with(Displays::clone)
}

/// Script `Error` whose `name` carries the error class.
pub(crate) fn to_js_error(error: DisplayError) -> JsValue {
    let js_error = js_sys::Error::new(&error.message());
    js_error.set_name(error.name());
    js_error.into()
}

fn host_ref(value: &JsValue) -> Result<HostRef<Element>, DisplayError> {
    if let Some(id) = value.as_string() {
        return Ok(HostRef::Id(id));
    }

    if let Some(element) = value.dyn_ref::<Element>() {
        return Ok(HostRef::Element(element.clone()));
    }

    // Array-likes such as jQuery collections.
    let length = if value.is_object() {
        Reflect::get(value, &JsValue::from_str("length"))
            .ok()
            .and_then(|length| length.as_f64())
    } else {
        None
    };
    let Some(length) = length else {
        return Err(DisplayError::InvalidElement(format!("{value:?}")));
    };

    // Only the first entry is used; a second one just triggers the warning.
    let mut elements = Vec::new();
    for index in 0..length.clamp(0.0, 2.0) as u32 {
        let item = Reflect::get(value, &JsValue::from(index)).unwrap_or(JsValue::UNDEFINED);
        match item.dyn_into::<Element>() {
            Ok(element) => elements.push(element),
            Err(_) if index == 0 => break,
            Err(_) => {}
        }
    }
    Ok(HostRef::Collection(elements))
}

pub(crate) fn options_from_js(value: &JsValue) -> Result<DisplayOptions, DisplayError> {
    if value.is_undefined() || value.is_null() {
        return Ok(DisplayOptions::default());
    }

    let options = from_js(value)
        .ok_or_else(|| DisplayError::InvalidArgument("Options must be a plain object.".into()))?;
    serde_json::from_value(options)
        .map_err(|error| DisplayError::InvalidArgument(format!("Invalid options: {error}")))
}

fn value_to_js(value: Value) -> JsValue {
    to_js(&value).unwrap_or(JsValue::UNDEFINED)
}

/// Listener invoking `function` with `this` bound to the display object.
fn event_callback(function: Function, this: JsValue) -> EventListener {
    EventListener::new(move |data| {
        if let Err(error) = function.call1(&this, &value_to_js(data.clone())) {
            debug!(?error, "Event callback threw");
        }
    })
}

fn event_name(event: Option<String>) -> Result<String, DisplayError> {
    event
        .filter(|event| !event.is_empty())
        .ok_or_else(|| DisplayError::InvalidArgument("You must pass an event name.".into()))
}

/// Controller for an embedded display.
#[wasm_bindgen(js_name = "Display")]
pub struct DisplayBinding {
    display: Display<WebHost>,
}

#[wasm_bindgen(js_class = "Display")]
impl DisplayBinding {
    /// Bind to an element, an element id or a collection whose first entry
    /// is an element. Constructing twice for the same element shares the
    /// underlying controller.
    #[wasm_bindgen(constructor)]
    pub fn new(element: JsValue, options: JsValue) -> Result<DisplayBinding, JsValue> {
        let host_ref = host_ref(&element).map_err(to_js_error)?;
        let options = options_from_js(&options).map_err(to_js_error)?;
        let display = displays()
            .get_or_create(host_ref, options)
            .map_err(to_js_error)?;
        Ok(Self { display })
    }

    /// Resolves once the display is ready to receive calls.
    pub async fn ready(&self) -> Result<(), JsValue> {
        self.display.ready().await.map_err(to_js_error)
    }

    pub async fn get(&self, name: String) -> Result<JsValue, JsValue> {
        let value = self.display.get(&name).await.map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    pub async fn set(&self, name: String, value: JsValue) -> Result<JsValue, JsValue> {
        let value = self
            .display
            .set(&name, from_js(&value))
            .await
            .map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    #[wasm_bindgen(js_name = "callMethod")]
    pub async fn call_method(&self, name: String, args: JsValue) -> Result<JsValue, JsValue> {
        let value = self
            .display
            .call_method(&name, from_js(&args))
            .await
            .map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    /// Call `callback` with the payload of every `event`.
    pub fn on(&self, event: Option<String>, callback: JsValue) -> Result<(), JsValue> {
        let event = event_name(event).map_err(to_js_error)?;
        if callback.is_undefined() || callback.is_null() {
            return Err(to_js_error(DisplayError::InvalidArgument(
                "You must pass a callback function.".into(),
            )));
        }
        let function = callback.dyn_into::<Function>().map_err(|_| {
            to_js_error(DisplayError::InvalidArgument(
                "The callback must be a function.".into(),
            ))
        })?;

        let this = JsValue::from(DisplayBinding {
            display: self.display.clone(),
        });
        let listener = event_callback(function.clone(), this);

        self.display
            .on(&event, listener.clone())
            .map_err(to_js_error)?;

        SUBSCRIPTIONS.with(|subscriptions| {
            subscriptions.borrow_mut().push(Subscription {
                display: self.display.clone(),
                event,
                function,
                listener,
            })
        });
        Ok(())
    }

    /// Remove `callback`, or every callback for `event` when omitted.
    pub fn off(&self, event: Option<String>, callback: JsValue) -> Result<(), JsValue> {
        let event = event_name(event).map_err(to_js_error)?;
        let function = if callback.is_undefined() || callback.is_null() {
            None
        } else {
            Some(callback.dyn_into::<Function>().map_err(|_| {
                to_js_error(DisplayError::InvalidArgument(
                    "The callback must be a function.".into(),
                ))
            })?)
        };

        let matches = |subscription: &Subscription| {
            subscription.display == self.display
                && subscription.event == event
                && function
                    .as_ref()
                    .is_none_or(|function| subscription.function == *function)
        };

        let listener = match &function {
            None => {
                SUBSCRIPTIONS.with(|subscriptions| subscriptions.borrow_mut().retain(|s| !matches(s)));
                None
            }
            Some(_) => SUBSCRIPTIONS.with(|subscriptions| {
                let mut subscriptions = subscriptions.borrow_mut();
                let index = subscriptions.iter().position(matches)?;
                Some(subscriptions.remove(index).listener)
            }),
        };

        match (function, listener) {
            (None, _) => self.display.off(&event, None),
            (Some(_), Some(listener)) => self.display.off(&event, Some(&listener)),
            // Unknown callback: nothing to remove, but the last-listener
            // check still runs.
            (Some(_), None) => self.display.off(&event, Some(&EventListener::new(|_| {}))),
        }
        .map_err(to_js_error)
    }

    /// Remove the embed and release the controller.
    pub async fn destroy(&self) -> Result<(), JsValue> {
        SUBSCRIPTIONS.with(|subscriptions| {
            subscriptions
                .borrow_mut()
                .retain(|subscription| subscription.display != self.display)
        });
        self.display.destroy();
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn element(&self) -> Option<Element> {
        displays().host().element(self.display.element())
    }

    #[wasm_bindgen(getter)]
    pub fn origin(&self) -> String {
        self.display.origin()
    }

    #[wasm_bindgen(getter, js_name = "embedMode")]
    pub fn embed_mode(&self) -> String {
        self.display.embed_mode().as_str().to_string()
    }

    #[wasm_bindgen(js_name = "getProducts")]
    pub async fn get_products(&self) -> Result<JsValue, JsValue> {
        let value = self.display.get_products().await.map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    #[wasm_bindgen(js_name = "nextScene")]
    pub async fn next_scene(&self, cursor: JsValue) -> Result<JsValue, JsValue> {
        let cursor = from_js(&cursor).unwrap_or(Value::Null);
        let value = self.display.next_scene(cursor).await.map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    #[wasm_bindgen(js_name = "setFilter")]
    pub async fn set_filter(&self, filter: JsValue) -> Result<JsValue, JsValue> {
        let value = self
            .display
            .set_filter(from_js(&filter))
            .await
            .map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    #[wasm_bindgen(js_name = "setLanguage")]
    pub async fn set_language(&self, language: JsValue) -> Result<JsValue, JsValue> {
        let value = self
            .display
            .set_language(from_js(&language))
            .await
            .map_err(to_js_error)?;
        Ok(value_to_js(value))
    }

    #[wasm_bindgen(js_name = "setConfig")]
    pub async fn set_config(&self, config: JsValue) -> Result<JsValue, JsValue> {
        let value = self
            .display
            .set_config(from_js(&config))
            .await
            .map_err(to_js_error)?;
        Ok(value_to_js(value))
    }
}
