//! Browser bindings for the display controller.
//!
//! Example usage in JavaScript:
//!
//! ```ignore
//! // This is JavaScript code that uses the WASM bindings, not a Rust doctest
//! import init, { Display } from "display-wasm";
//!
//! await init();
//!
//! const display = new Display("my-display", { displayId: "5e417dbac5d2651adbe509ec" });
//! display.on("play", data => console.log("playing", data));
//!
//! await display.ready();
//! const products = await display.getProducts();
//! await display.setLanguage("fr");
//! ```
//!
//! Containers declared with `data-hubstairs-displayid` or
//! `data-hubstairs-url` attributes are embedded automatically when the
//! module starts.

pub mod bindings;
pub mod declarative;
pub mod dom;
pub mod fetch;
pub mod logging;
pub mod resize;

use tracing::error;
use wasm_bindgen::prelude::*;

pub use bindings::DisplayBinding;
pub use dom::WebHost;

#[wasm_bindgen(start)]
pub fn start() {
    logging::init();

    if let Err(failure) = declarative::initialize_embeds(None) {
        error!(?failure, "Declarative embeds could not be initialised");
    }
    if let Err(failure) = resize::resize_embeds(None) {
        error!(?failure, "Embed resizing could not be installed");
    }
}
