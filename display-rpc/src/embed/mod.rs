//! Embed parameters: which display to load, how to ask the oEmbed endpoint
//! for it, and which origins may speak for it.

pub mod display_url;
pub mod oembed;
pub mod params;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use oembed::{FetchError, HttpResponse, OEmbedClient, OEmbedDescriptor, fetch_descriptor};
pub use params::{kebab_to_camel, parameters_from_attributes, space_change_padding};
pub use display_url::{OriginPolicy, is_object_id, oembed_request_url, resolve_display_url};

/// How the embedded content is hosted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// Content runs in a cross-origin iframe; messages arrive on the window.
    Iframe,
    /// Content runs in the page; messages are dispatched on the embed element.
    #[default]
    Js,
}

impl EmbedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iframe => "iframe",
            Self::Js => "js",
        }
    }
}

/// Construction options for a display. Unknown keys are forwarded to the
/// oEmbed endpoint, sorted by key.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayOptions {
    pub embed_mode: EmbedMode,
    #[serde(rename = "displayid", alias = "displayId")]
    pub display_id: Option<String>,
    pub url: Option<String>,
    pub display_url: Option<String>,
    pub oembed_url: Option<String>,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl DisplayOptions {
    pub fn from_display_id(id: impl Into<String>) -> Self {
        Self {
            display_id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: EmbedMode) -> Self {
        self.embed_mode = mode;
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Whether any of `keys` was supplied with a truthy value.
    pub fn has_truthy(&self, keys: &[&str]) -> bool {
        keys.iter()
            .any(|key| self.params.get(*key).is_some_and(is_truthy))
    }
}

/// Script truthiness of a JSON value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Textual form of a parameter value as it goes on a query string.
pub(crate) fn query_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
