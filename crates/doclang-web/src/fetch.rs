#![forbid(unsafe_code)]

//! Fetching and parsing the sibling-locale page.
//!
//! Any failure here ends the in-place switch; the state machine then falls
//! back to a full navigation, so errors are classified but never retried.

use doclang_core::SwitchEvent;

/// Why the sibling page could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// `fetch` rejected (offline, CORS, aborted).
    Network(String),
    /// The server answered with a non-success status.
    Status(u16),
    /// The response body could not be read as text.
    Body(String),
    /// The body could not be parsed as an HTML document.
    Parse(String),
}

impl FetchError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status(status) => Some(*status),
            _ => None,
        }
    }

    /// Stable reason code recorded in switch transitions.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status(_) => "http_status",
            Self::Body(_) => "body",
            Self::Parse(_) => "parse",
        }
    }

    /// The state machine event reporting this failure.
    #[must_use]
    pub fn to_event(&self) -> SwitchEvent {
        SwitchEvent::FetchFailed {
            status: self.status(),
            reason: self.reason().to_owned(),
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(detail) => write!(f, "fetch failed: {detail}"),
            Self::Status(status) => write!(f, "server answered with status {status}"),
            Self::Body(detail) => write!(f, "response body unreadable: {detail}"),
            Self::Parse(detail) => write!(f, "response is not an HTML document: {detail}"),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(target_arch = "wasm32")]
pub(crate) use browser::fetch_document;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::FetchError;
    use crate::dom::describe_js;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{Document, DomParser, Response, SupportedType, Window};

    /// GET `url` and parse the body as `text/html`.
    pub(crate) async fn fetch_document(window: &Window, url: &str) -> Result<Document, FetchError> {
        let response = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(|e| FetchError::Network(describe_js(&e)))?;
        let response: Response = response
            .dyn_into()
            .map_err(|e| FetchError::Network(describe_js(&e)))?;
        if !response.ok() {
            return Err(FetchError::Status(response.status()));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::Body(describe_js(&e)))?;
        let html = JsFuture::from(body)
            .await
            .map_err(|e| FetchError::Body(describe_js(&e)))?
            .as_string()
            .ok_or_else(|| FetchError::Body("body is not a string".to_owned()))?;

        let parser = DomParser::new().map_err(|e| FetchError::Parse(describe_js(&e)))?;
        parser
            .parse_from_string(&html, SupportedType::TextHtml)
            .map_err(|e| FetchError::Parse(describe_js(&e)))
    }
}
