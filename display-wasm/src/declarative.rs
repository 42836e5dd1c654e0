use display_constants::attributes::{DECLARATIVE_SELECTOR, DEFER_ATTRIBUTE};
use display_rpc::embed::parameters_from_attributes;
use display_rpc::{DisplayError, DisplayOptions, HostRef};
use serde_json::Value;
use tracing::error;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, NodeList};

use crate::bindings::{displays, to_js_error};

fn attributes(element: &Element) -> Vec<(String, String)> {
    element
        .get_attribute_names()
        .iter()
        .filter_map(|name| name.as_string())
        .filter_map(|name| {
            let value = element.get_attribute(&name)?;
            Some((name, value))
        })
        .collect()
}

/// Every declarative container under `parent`, or under the document.
pub(crate) fn query(parent: Option<&Element>, selector: &str) -> Result<NodeList, JsValue> {
    match parent {
        Some(parent) => parent.query_selector_all(selector),
        None => web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| to_js_error(DisplayError::InvalidElement("document".into())))?
            .query_selector_all(selector),
    }
}

fn initialize(element: Element) -> Result<(), DisplayError> {
    let params = parameters_from_attributes(attributes(&element));
    let options: DisplayOptions = serde_json::from_value(Value::Object(params))
        .map_err(|error| DisplayError::InvalidArgument(format!("Invalid embed attributes: {error}")))?;

    let display = displays().get_or_create(HostRef::Element(element), options)?;
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(failure) = display.ready().await {
            error!("There was an error creating an embed: {failure}");
        }
    });
    Ok(())
}

/// Create a display for every element carrying embed attributes, skipping
/// those marked deferred.
#[wasm_bindgen(js_name = "initializeEmbeds")]
pub fn initialize_embeds(parent: Option<Element>) -> Result<(), JsValue> {
    let elements = query(parent.as_ref(), DECLARATIVE_SELECTOR)?;

    for index in 0..elements.length() {
        let Some(element) = elements
            .item(index)
            .and_then(|node| node.dyn_into::<Element>().ok())
        else {
            continue;
        };

        if element.has_attribute(DEFER_ATTRIBUTE) {
            continue;
        }

        if let Err(failure) = initialize(element) {
            error!("There was an error creating an embed: {failure}");
        }
    }

    Ok(())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use display_rpc::host::Dom;
    use wasm_bindgen_test::wasm_bindgen_test;

    wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn deferred_containers_are_skipped() {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .expect("document");
        let parent = document.create_element("section").expect("section");
        let deferred = document.create_element("div").expect("div");
        deferred
            .set_attribute("data-hubstairs-displayid", "5e417dbac5d2651adbe509ec")
            .expect("attribute");
        deferred
            .set_attribute(DEFER_ATTRIBUTE, "")
            .expect("attribute");
        parent.append_child(&deferred).expect("append");
        document
            .body()
            .expect("body")
            .append_child(&parent)
            .expect("attach");

        initialize_embeds(Some(parent)).expect("initialize");

        let displays = displays();
        let key = displays.host().element_key(&deferred).expect("key");
        assert!(displays.get(key).is_none());
    }

    #[wasm_bindgen_test]
    fn attributes_are_listed_with_values() {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .expect("document");
        let element = document.create_element("div").expect("div");
        element
            .set_attribute("data-hubstairs-embed-mode", "iframe")
            .expect("attribute");

        assert_eq!(
            attributes(&element),
            vec![("data-hubstairs-embed-mode".to_string(), "iframe".to_string())]
        );
    }
}
