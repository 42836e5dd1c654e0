/// Prefix shared by every declarative embed attribute on a host element
pub const ATTRIBUTE_PREFIX: &str = "data-hubstairs-";

/// Marker set on a container once the embed markup has been injected
pub const INITIALIZED_ATTRIBUTE: &str = "data-hubstairs-initialized";

/// Containers carrying this attribute are skipped by declarative initialisation
pub const DEFER_ATTRIBUTE: &str = "data-hubstairs-defer";

/// Attribute suffixes that control the embed lifecycle rather than oEmbed parameters
pub const RESERVED_SUFFIXES: &[&str] = &["initialized", "defer"];

/// Selector matching every declarative embed container
pub const DECLARATIVE_SELECTOR: &str = "[data-hubstairs-displayid], [data-hubstairs-url]";

/// Expando property holding the element key assigned by the web host
pub const ELEMENT_KEY_PROPERTY: &str = "__displayElementKey";
