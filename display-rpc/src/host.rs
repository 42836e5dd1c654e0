//! Platform seams: element identity, DOM effects and the local executor.

use futures::future::LocalBoxFuture;
use tracing::warn;

use crate::embed::EmbedMode;
use crate::embed::oembed::OEmbedClient;
use crate::error::DisplayError;
use crate::rpc::transport::MessageChannel;

/// Stable identity the host assigns to a DOM element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(pub u64);

impl std::fmt::Display for ElementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// Anything a caller may pass where a host element is expected.
#[derive(Debug, Clone)]
pub enum HostRef<E> {
    Element(E),
    /// Looked up with `getElementById`.
    Id(String),
    /// A collection-like wrapper; only the first entry is used.
    Collection(Vec<E>),
}

/// DOM operations the controller needs from the host page.
pub trait Dom {
    type Element: Clone;

    fn element_by_id(&self, id: &str) -> Option<Self::Element>;

    /// Key for `element`, or `None` when it is not a usable node attached to a window.
    fn element_key(&self, element: &Self::Element) -> Option<ElementKey>;

    /// Inject oEmbed markup into `container`, hidden, and return the node that
    /// owns the message channel. A container already carrying the initialized
    /// marker returns its existing embed node.
    fn inject(
        &self,
        container: ElementKey,
        markup: &str,
        mode: EmbedMode,
    ) -> Result<ElementKey, DisplayError>;

    /// Unhide the injected content of `container`.
    fn reveal(&self, container: ElementKey);

    /// Remove an iframe `embed` from its parent and clear `container`'s marker and contents.
    fn teardown(&self, embed: ElementKey, container: Option<ElementKey>);
}

/// Local (non-`Send`) task executor.
pub trait Spawn {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);
}

/// Everything a [`crate::Displays`] needs from its environment.
pub trait Host: Dom + MessageChannel + OEmbedClient + Spawn + 'static {}

impl<T> Host for T where T: Dom + MessageChannel + OEmbedClient + Spawn + 'static {}

/// Normalise a [`HostRef`] into the key of a usable element.
pub fn resolve_element<D: Dom + ?Sized>(
    dom: &D,
    host_ref: HostRef<D::Element>,
) -> Result<ElementKey, DisplayError> {
    let (element, description) = match host_ref {
        HostRef::Element(element) => (Some(element), "element".to_string()),
        HostRef::Id(id) => (dom.element_by_id(&id), format!("id \"{id}\"")),
        HostRef::Collection(elements) => {
            if elements.len() > 1 {
                warn!("A collection with multiple elements was passed, using the first element.");
            }
            (elements.into_iter().next(), "collection".to_string())
        }
    };

    element
        .and_then(|element| dom.element_key(&element))
        .ok_or(DisplayError::InvalidElement(description))
}
