use display_constants::endpoint::{
    DEFAULT_OEMBED_ENDPOINT, DISPLAY_BASE_URL, DISPLAY_ID_LENGTH, SIZING_PARAMETERS,
};
use display_constants::origin::{DISPLAY_DOMAINS, DISPLAY_HOST_PREFIX};
use url::Url;

use super::{DisplayOptions, query_value};
use crate::error::DisplayError;

/// Which URLs and message origins belong to the display domain family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    pub host_prefix: String,
    pub domains: Vec<String>,
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self {
            host_prefix: DISPLAY_HOST_PREFIX.to_string(),
            domains: DISPLAY_DOMAINS.iter().map(|domain| domain.to_string()).collect(),
        }
    }
}

impl OriginPolicy {
    /// Accepts `http`, `https` and protocol-relative URLs whose host starts
    /// with the display prefix and sits under an allow-listed domain.
    pub fn allows(&self, candidate: &str) -> bool {
        let parsed = if candidate.starts_with("//") {
            Url::parse(&format!("https:{candidate}"))
        } else {
            Url::parse(candidate)
        };

        let Ok(url) = parsed else {
            return false;
        };

        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        let Some(host) = url.host_str() else {
            return false;
        };

        host.starts_with(&self.host_prefix)
            && self
                .domains
                .iter()
                .any(|domain| host.ends_with(&format!(".{domain}")))
    }
}

/// A display object id: 24 hexadecimal digits.
pub fn is_object_id(candidate: &str) -> bool {
    candidate.len() == DISPLAY_ID_LENGTH && candidate.chars().all(|c| c.is_ascii_hexdigit())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

/// Canonical URL of the display named by `options`.
pub fn resolve_display_url(
    options: &DisplayOptions,
    policy: &OriginPolicy,
) -> Result<String, DisplayError> {
    let display_id = non_empty(&options.display_id);
    let Some(candidate) = display_id
        .or_else(|| non_empty(&options.url))
        .or_else(|| non_empty(&options.display_url))
    else {
        return Err(DisplayError::InvalidArgument(
            "An id or url must be passed, either in an options object or as a data-hubstairs-displayid attribute."
                .to_string(),
        ));
    };

    if is_object_id(candidate) {
        return Ok(format!("{DISPLAY_BASE_URL}{candidate}"));
    }

    if policy.allows(candidate) {
        return Ok(candidate.replacen("http:", "https:", 1));
    }

    Err(match display_id {
        Some(id) => DisplayError::NotEmbeddable(format!("\"{id}\" is not a valid display id.")),
        None => DisplayError::NotEmbeddable(format!("\"{candidate}\" is not a display url.")),
    })
}

/// Full oEmbed discovery URL: the display URL, every extra parameter, the
/// embed mode and `responsive=1` unless a size was requested.
pub fn oembed_request_url(
    options: &DisplayOptions,
    policy: &OriginPolicy,
) -> Result<Url, DisplayError> {
    let display_url = resolve_display_url(options, policy)?;
    let endpoint = non_empty(&options.oembed_url).unwrap_or(DEFAULT_OEMBED_ENDPOINT);

    let mut request = Url::parse(endpoint).map_err(|error| {
        DisplayError::InvalidArgument(format!(
            "\"{endpoint}\" is not a valid oEmbed endpoint: {error}"
        ))
    })?;

    {
        let mut query = request.query_pairs_mut();
        query.append_pair("url", &display_url);
        for (key, value) in &options.params {
            query.append_pair(key, &query_value(value));
        }
        query.append_pair("embedMode", options.embed_mode.as_str());
        if !options.has_truthy(SIZING_PARAMETERS) {
            query.append_pair("responsive", "1");
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::EmbedMode;

    const ID: &str = "5e417dbac5d2651adbe509ec";

    #[test]
    fn allows_display_hosts_only() {
        let policy = OriginPolicy::default();

        for allowed in [
            "http://display.hubstairs.io",
            "http://display.nfinite.app",
            "https://display.hubstairs.com",
            "//display.hubstairs.com",
            "https://display-something.hubstairs.com",
            "//display-something.hubstairs.com",
            "http://display.hubstairs.com:1000",
            "//display.hubstairs.com:1000",
            "https://display.hubstairs.com/v1/1234",
        ] {
            assert!(policy.allows(allowed), "{allowed}");
        }

        for rejected in [
            "http://display.hubstairs.tld",
            "https://nothubstairs.com",
            "https://hubstairs.someone.com",
            "https://display.hubstairs.com.evil.net",
            "ftp://display.hubstairs.com",
            "",
            "null",
        ] {
            assert!(!policy.allows(rejected), "{rejected}");
        }
    }

    #[test]
    fn object_ids_map_to_canonical_url() {
        assert!(is_object_id(ID));
        assert!(!is_object_id("any"));
        assert!(!is_object_id("5e417dbac5d2651adbe509eg"));

        assert_eq!(
            resolve_display_url(&DisplayOptions::from_display_id(ID), &OriginPolicy::default()),
            Ok(format!("https://display.hubstairs.com/v1/{ID}"))
        );
    }

    #[test]
    fn display_urls_are_upgraded_to_https() {
        let policy = OriginPolicy::default();
        let expected = Ok(format!("https://display.hubstairs.com/v1/{ID}"));

        assert_eq!(
            resolve_display_url(
                &DisplayOptions::from_url(format!("http://display.hubstairs.com/v1/{ID}")),
                &policy
            ),
            expected
        );
        assert_eq!(
            resolve_display_url(
                &DisplayOptions::from_url(format!("https://display.hubstairs.com/v1/{ID}")),
                &policy
            ),
            expected
        );
    }

    #[test]
    fn rejects_missing_and_foreign_displays() {
        let policy = OriginPolicy::default();

        assert!(matches!(
            resolve_display_url(&DisplayOptions::default(), &policy),
            Err(DisplayError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolve_display_url(
                &DisplayOptions::from_display_id("https://nothubstairs.com/2"),
                &policy
            ),
            Err(DisplayError::NotEmbeddable(_))
        ));
        assert!(matches!(
            resolve_display_url(&DisplayOptions::from_url("https://nothubstairs.com/2"), &policy),
            Err(DisplayError::NotEmbeddable(_))
        ));
    }

    #[test]
    fn request_url_carries_params_mode_and_responsive_flag() {
        let policy = OriginPolicy::default();
        let options = DisplayOptions::from_display_id(ID)
            .with_mode(EmbedMode::Iframe)
            .with_param("autoplay", true);

        let request = oembed_request_url(&options, &policy).expect("request url");
        assert_eq!(request.host_str(), Some("display.nfinite.app"));
        assert_eq!(request.path(), "/api/oembed");

        let pairs: Vec<(String, String)> = request.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("url".into(), format!("https://display.hubstairs.com/v1/{ID}")),
                ("autoplay".into(), "true".into()),
                ("embedMode".into(), "iframe".into()),
                ("responsive".into(), "1".into()),
            ]
        );
    }

    #[test]
    fn explicit_size_suppresses_responsive_flag() {
        let policy = OriginPolicy::default();

        let sized = DisplayOptions::from_display_id(ID).with_param("height", 400);
        let request = oembed_request_url(&sized, &policy).expect("request url");
        assert!(!request.query_pairs().any(|(key, _)| key == "responsive"));

        let falsy = DisplayOptions::from_display_id(ID).with_param("width", 0);
        let request = oembed_request_url(&falsy, &policy).expect("request url");
        assert!(
            request
                .query_pairs()
                .any(|(key, value)| key == "responsive" && value == "1")
        );
    }

    #[test]
    fn custom_endpoint_is_used() {
        let mut options = DisplayOptions::from_display_id(ID);
        options.oembed_url = Some("https://staging.example.test/oembed".into());

        let request = oembed_request_url(&options, &OriginPolicy::default()).expect("request url");
        assert_eq!(request.host_str(), Some("staging.example.test"));

        options.oembed_url = Some("not a url".into());
        assert!(matches!(
            oembed_request_url(&options, &OriginPolicy::default()),
            Err(DisplayError::InvalidArgument(_))
        ));
    }
}
