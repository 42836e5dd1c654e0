use std::cell::Cell;

use display_constants::protocol::MESSAGE_EVENT;
use display_rpc::OriginPolicy;
use display_rpc::embed::space_change_padding;
use display_rpc::rpc::codec;
use tracing::debug;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, HtmlElement, HtmlIFrameElement, MessageEvent};

use crate::declarative::query;
use crate::dom::{is_frame_source, raw_message};

thread_local! {
    static INSTALLED: Cell<bool> = const { Cell::new(false) };
}

/// Apply a `spacechange` padding to the wrapper of the iframe that sent it.
fn apply_padding(parent: Option<&Element>, event: &MessageEvent, padding: f64) {
    let Ok(frames) = query(parent, "iframe") else {
        return;
    };
    let source = event.source();

    for index in 0..frames.length() {
        let Some(frame) = frames
            .item(index)
            .and_then(|node| node.dyn_into::<HtmlIFrameElement>().ok())
        else {
            continue;
        };
        if !is_frame_source(&frame, source.as_ref()) {
            continue;
        }

        if let Some(space) = frame
            .parent_element()
            .and_then(|parent| parent.dyn_into::<HtmlElement>().ok())
            && let Err(error) = space
                .style()
                .set_property("padding-bottom", &format!("{padding}px"))
        {
            debug!(?error, "Could not resize embed");
        }
        break;
    }
}

/// Keep card embeds' aspect ratio when their carousel changes height.
/// Installs a single window listener however often it is called.
#[wasm_bindgen(js_name = "resizeEmbeds")]
pub fn resize_embeds(parent: Option<Element>) -> Result<(), JsValue> {
    if INSTALLED.with(|installed| installed.replace(true)) {
        return Ok(());
    }

    let Some(window) = web_sys::window() else {
        return Ok(());
    };

    let policy = OriginPolicy::default();
    let closure = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
        if !policy.allows(&event.origin()) {
            return;
        }

        let envelope = codec::decode(raw_message(event.data()));
        if let Some(padding) = space_change_padding(&envelope) {
            apply_padding(parent.as_ref(), &event, padding);
        }
    });

    window.add_event_listener_with_callback(MESSAGE_EVENT, closure.as_ref().unchecked_ref())?;

    // Lives as long as the page.
    closure.forget();
    Ok(())
}
