/// Event signalling the embedded content finished initialising
pub const READY_EVENT: &str = "ready";

/// Event carrying a remote failure `{method, name, message}`
pub const ERROR_EVENT: &str = "error";

/// Event sent by card embeds when their bottom spacing changes
pub const SPACE_CHANGE_EVENT: &str = "spacechange";

/// Registry keys for event listeners are `event:<name>`
pub const EVENT_KEY_PREFIX: &str = "event:";

/// Remote method subscribing the content to an event
pub const ADD_EVENT_LISTENER: &str = "addEventListener";

/// Remote method unsubscribing the content from an event
pub const REMOVE_EVENT_LISTENER: &str = "removeEventListener";

/// Name given to errors that carry no remote class name
pub const DEFAULT_ERROR_NAME: &str = "Error";

/// DOM event name used by both transport variants
pub const MESSAGE_EVENT: &str = "message";
