//! UI-update engine lifecycle descriptors.
//!
//! The engine issues requests and swaps server-rendered fragments into the
//! page. The interceptors hook two of its lifecycle events:
//!
//! - "configure request": [`ConfigRequest`], mutable headers and parameters
//!   just before the request is sent
//! - "before swap": [`BeforeSwap`], the response and the element about to
//!   receive its content
//!
//! [`UiEngine`] is the narrow slice of the engine's DOM API the response
//! interceptor needs to substitute decrypted content.

use std::collections::BTreeMap;

use crate::headers::Headers;

/// Outgoing request as seen by the "configure request" hook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRequest {
    /// HTTP verb (`get`, `post`, ...)
    pub verb: String,
    /// Request path
    pub path: String,
    /// Mutable request headers
    pub headers: Headers,
    /// Mutable request parameters
    pub parameters: BTreeMap<String, String>,
}

impl ConfigRequest {
    /// Request with no headers or parameters.
    pub fn new(verb: impl Into<String>, path: impl Into<String>) -> Self {
        Self { verb: verb.into(), path: path.into(), ..Self::default() }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Status and headers of a completed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
}

/// Response as seen by the "before swap" hook.
///
/// `E` is the engine's element handle.
#[derive(Debug, Clone)]
pub struct BeforeSwap<E> {
    /// Response status and headers
    pub response: ResponseHead,
    /// Element the engine is about to swap into
    pub target: E,
    /// Raw response body
    pub server_response: String,
    /// Whether the engine should perform its own swap afterwards
    pub should_swap: bool,
}

impl<E> BeforeSwap<E> {
    /// A swap the engine would perform unless intercepted.
    pub fn new(response: ResponseHead, target: E, server_response: impl Into<String>) -> Self {
        Self { response, target, server_response: server_response.into(), should_swap: true }
    }
}

/// DOM operations the response interceptor needs from the engine.
pub trait UiEngine {
    /// Element handle (cheap to clone, like a DOM node reference).
    type Element;

    /// Create a detached container element whose content is `markup`.
    fn create_container(&mut self, markup: &str) -> Self::Element;

    /// Run the engine's processing step (attribute wiring) on `element`.
    fn process(&mut self, element: &Self::Element);

    /// Remove every child of `target`.
    fn clear_children(&mut self, target: &Self::Element);

    /// Append `child` as the last child of `target`.
    fn append_child(&mut self, target: &Self::Element, child: Self::Element);
}
