/// Discovery endpoint used when the caller does not supply `oembedUrl`
pub const DEFAULT_OEMBED_ENDPOINT: &str = "https://display.nfinite.app/api/oembed";

/// Canonical location of a display addressed by its object id
pub const DISPLAY_BASE_URL: &str = "https://display.hubstairs.com/v1/";

/// Length of a display object id (hexadecimal digits)
pub const DISPLAY_ID_LENGTH: usize = 24;

/// oEmbed parameters that opt out of the automatic `responsive=1`
pub const SIZING_PARAMETERS: &[&str] = &["height", "width", "responsive"];
