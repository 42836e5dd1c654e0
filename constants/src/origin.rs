/// Every display host name starts with this label
pub const DISPLAY_HOST_PREFIX: &str = "display";

/// Registrable domains allowed to serve displays and talk to the controller
pub const DISPLAY_DOMAINS: &[&str] = &["hubstairs.com", "hubstairs.io", "nfinite.app"];

/// Target origin used before the first legitimate message pins it
pub const WILDCARD_ORIGIN: &str = "*";
