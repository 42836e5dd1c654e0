use display_constants::attributes::{ATTRIBUTE_PREFIX, RESERVED_SUFFIXES};
use display_constants::protocol::SPACE_CHANGE_EVENT;
use serde_json::{Map, Value};

use crate::rpc::codec::Envelope;

/// `my-string-yes` -> `myStringYes`.
pub fn kebab_to_camel(name: &str) -> String {
    let mut camel = String::with_capacity(name.len());
    let mut upper = false;

    for c in name.chars() {
        if c == '-' {
            upper = true;
        } else if upper {
            camel.extend(c.to_uppercase());
            upper = false;
        } else {
            camel.push(c);
        }
    }

    camel
}

/// Collect embed options from `data-hubstairs-*` attributes. Marker
/// attributes are skipped and an empty value stands for `1`.
pub fn parameters_from_attributes<I, K, V>(attributes: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut params = Map::new();

    for (name, value) in attributes {
        let Some(suffix) = name.as_ref().strip_prefix(ATTRIBUTE_PREFIX) else {
            continue;
        };
        if suffix.is_empty() || RESERVED_SUFFIXES.contains(&suffix) {
            continue;
        }

        let value: String = value.into();
        let value = if value.is_empty() {
            Value::from(1)
        } else {
            Value::String(value)
        };
        params.insert(kebab_to_camel(suffix), value);
    }

    params
}

/// Bottom padding in pixels requested by a `spacechange` event.
pub fn space_change_padding(envelope: &Envelope) -> Option<f64> {
    if envelope.event_name() != Some(SPACE_CHANGE_EVENT) {
        return None;
    }

    envelope
        .data
        .as_ref()?
        .get(0)?
        .get("bottom")?
        .as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::{DisplayOptions, EmbedMode};
    use serde_json::json;

    #[test]
    fn converts_kebab_case() {
        assert_eq!(kebab_to_camel("my-string-yes"), "myStringYes");
        assert_eq!(kebab_to_camel("string"), "string");
    }

    #[test]
    fn collects_prefixed_attributes() {
        let params = parameters_from_attributes([
            ("data-hubstairs-displayid", "5e417dbac5d2651adbe509ec"),
            ("data-hubstairs-embed-mode", "iframe"),
            ("data-hubstairs-autoplay", ""),
            ("data-hubstairs-initialized", "true"),
            ("data-hubstairs-defer", ""),
            ("class", "display"),
        ]);

        assert_eq!(
            Value::Object(params.clone()),
            json!({
                "displayid": "5e417dbac5d2651adbe509ec",
                "embedMode": "iframe",
                "autoplay": 1
            })
        );

        let options: DisplayOptions =
            serde_json::from_value(Value::Object(params)).expect("options");
        assert_eq!(options.embed_mode, EmbedMode::Iframe);
        assert_eq!(options.params.get("autoplay"), Some(&json!(1)));
    }

    #[test]
    fn reads_space_change_padding() {
        let envelope = Envelope {
            event: Some("spacechange".into()),
            data: Some(json!([{"bottom": 42.5}])),
            ..Envelope::default()
        };
        assert_eq!(space_change_padding(&envelope), Some(42.5));

        let other = Envelope {
            event: Some("play".into()),
            data: Some(json!([{"bottom": 42.5}])),
            ..Envelope::default()
        };
        assert_eq!(space_change_padding(&other), None);

        let malformed = Envelope {
            event: Some("spacechange".into()),
            data: Some(json!({"bottom": 1})),
            ..Envelope::default()
        };
        assert_eq!(space_change_padding(&malformed), None);
    }
}
