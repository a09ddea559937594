#![forbid(unsafe_code)]

//! `web-sys` adapters for the core document traits, plus small browser
//! helpers shared by the switch and the annotator.
//!
//! Selectors come from configuration. An invalid selector behaves like a
//! missing element: the adapters never surface DOM exceptions to the core.

use std::rc::Rc;

use doclang_core::{AnnotationSurface, AnnotatorConfig, LiveDocument, RemoteDocument, SwitchConfig};
use js_sys::Reflect;
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{AddEventListenerOptions, Document, Element, HtmlElement, Window};
use web_time::Instant;

/// Attribute remembering the TOC frame's authored relative `src`.
pub(crate) const TOC_SRC_ATTR: &str = "data-doclang-src";

pub(crate) fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("doclang: no window"))
}

pub(crate) fn document(window: &Window) -> Result<Document, JsValue> {
    window
        .document()
        .ok_or_else(|| JsValue::from_str("doclang: no document"))
}

/// Address bar and session history of the page.
pub(crate) trait PageLocation {
    fn href(&self) -> Result<String, JsValue>;
    fn pathname(&self) -> Result<String, JsValue>;
    /// `history.pushState(null, "", url)`.
    fn push_state(&self, url: &str) -> Result<(), JsValue>;
    /// Full navigation through `location.href`.
    fn assign(&self, url: &str) -> Result<(), JsValue>;
    fn reload(&self) -> Result<(), JsValue>;
}

/// [`PageLocation`] of a real browsing context.
pub(crate) struct BrowserLocation {
    window: Window,
}

impl PageLocation for BrowserLocation {
    fn href(&self) -> Result<String, JsValue> {
        self.window.location().href()
    }

    fn pathname(&self) -> Result<String, JsValue> {
        self.window.location().pathname()
    }

    fn push_state(&self, url: &str) -> Result<(), JsValue> {
        self.window
            .history()?
            .push_state_with_url(&JsValue::NULL, "", Some(url))
    }

    fn assign(&self, url: &str) -> Result<(), JsValue> {
        self.window.location().set_href(url)
    }

    fn reload(&self) -> Result<(), JsValue> {
        self.window.location().reload()
    }
}

/// Everything the switch and the annotator touch on the page.
#[derive(Clone)]
pub(crate) struct PageContext {
    pub(crate) window: Window,
    pub(crate) document: Document,
    pub(crate) location: Rc<dyn PageLocation>,
}

impl PageContext {
    /// The page this module was loaded into.
    pub(crate) fn current() -> Result<Self, JsValue> {
        let window = window()?;
        let document = document(&window)?;
        let location = Rc::new(BrowserLocation {
            window: window.clone(),
        });
        Ok(Self {
            window,
            document,
            location,
        })
    }
}

/// Human-readable form of a thrown JS value.
pub(crate) fn describe_js(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{value:?}")
}

fn query(root: &Document, selector: &str) -> Option<Element> {
    root.query_selector(selector).ok().flatten()
}

/// Run `f` once the document is interactive: immediately when it already
/// is, otherwise on the single `DOMContentLoaded` event.
pub(crate) fn when_ready(document: &Document, f: impl FnOnce() + 'static) -> Result<(), JsValue> {
    let state = Reflect::get(document, &"readyState".into())?;
    if state.as_string().as_deref() != Some("loading") {
        f();
        return Ok(());
    }
    let callback = Closure::once_into_js(f);
    let options = AddEventListenerOptions::new();
    options.set_once(true);
    document.add_event_listener_with_callback_and_add_event_listener_options(
        "DOMContentLoaded",
        callback.unchecked_ref(),
        &options,
    )
}

/// Call `f` after `delay_ms` through `setTimeout`.
pub(crate) fn set_timeout(
    window: &Window,
    delay_ms: u64,
    f: impl FnOnce() + 'static,
) -> Result<i32, JsValue> {
    let callback = Closure::once_into_js(f);
    let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
    window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
}

/// Milliseconds since the binding was installed.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageClock {
    epoch: Instant,
}

impl PageClock {
    pub(crate) fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub(crate) fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// The live page, as seen by the splice.
pub(crate) struct LiveDom<'a> {
    document: &'a Document,
    config: &'a SwitchConfig,
}

impl<'a> LiveDom<'a> {
    pub(crate) fn new(document: &'a Document, config: &'a SwitchConfig) -> Self {
        Self { document, config }
    }
}

impl LiveDocument for LiveDom<'_> {
    fn replace_main_html(&mut self, html: &str) -> bool {
        match query(self.document, &self.config.main_selector) {
            Some(main) => {
                main.set_inner_html(html);
                true
            }
            None => false,
        }
    }

    fn set_title(&mut self, title: &str) {
        self.document.set_title(title);
    }

    fn replace_menu_title(&mut self, text: &str) -> bool {
        match query(self.document, &self.config.menu_title_selector) {
            Some(menu_title) => {
                menu_title.set_text_content(Some(text));
                true
            }
            None => false,
        }
    }

    fn toc_frame_relative_src(&self) -> Option<String> {
        let frame = query(self.document, &self.config.toc_frame_selector)?;
        frame
            .get_attribute(TOC_SRC_ATTR)
            .or_else(|| frame.get_attribute("src"))
    }

    fn set_toc_frame_src(&mut self, src: &str, relative_src: &str) {
        let Some(frame) = query(self.document, &self.config.toc_frame_selector) else {
            return;
        };
        let result = frame
            .set_attribute(TOC_SRC_ATTR, relative_src)
            .and_then(|()| frame.set_attribute("src", src));
        if let Err(error) = result {
            warn!(src, error = %describe_js(&error), "could not repoint TOC frame");
        }
    }
}

/// A fetched sibling page parsed with `DOMParser`.
pub(crate) struct ParsedDom<'a> {
    document: Document,
    config: &'a SwitchConfig,
}

impl<'a> ParsedDom<'a> {
    pub(crate) fn new(document: Document, config: &'a SwitchConfig) -> Self {
        Self { document, config }
    }
}

impl RemoteDocument for ParsedDom<'_> {
    fn main_html(&self) -> Option<String> {
        query(&self.document, &self.config.main_selector).map(|main| main.inner_html())
    }

    fn title(&self) -> Option<String> {
        query(&self.document, &self.config.title_selector)
            .map(|title| title.text_content().unwrap_or_default())
    }

    fn menu_title(&self) -> Option<String> {
        query(&self.document, &self.config.menu_title_selector)
            .map(|menu_title| menu_title.text_content().unwrap_or_default())
    }
}

/// The main content region hosting the last-updated annotation.
pub(crate) struct AnnotationDom {
    document: Document,
    main_selector: String,
    annotation_selector: String,
    annotation_class: String,
    annotation_style: String,
}

impl AnnotationDom {
    pub(crate) fn new(document: Document, config: &AnnotatorConfig) -> Self {
        Self {
            document,
            main_selector: config.main_selector.clone(),
            annotation_selector: format!(".{}", config.annotation_class),
            annotation_class: config.annotation_class.clone(),
            annotation_style: config.annotation_style.clone(),
        }
    }

    pub(crate) fn main(&self) -> Option<Element> {
        query(&self.document, &self.main_selector)
    }

    fn annotation(&self) -> Option<Element> {
        self.main()?
            .query_selector(&self.annotation_selector)
            .ok()
            .flatten()
    }
}

impl AnnotationSurface for AnnotationDom {
    fn has_main(&self) -> bool {
        self.main().is_some()
    }

    fn annotation_exists(&self) -> bool {
        self.annotation().is_some()
    }

    fn create_annotation(&mut self) {
        let Some(main) = self.main() else {
            return;
        };
        let created = self.document.create_element("div").and_then(|element| {
            element.set_class_name(&self.annotation_class);
            main.append_child(&element)
        });
        if let Err(error) = created {
            warn!(error = %describe_js(&error), "could not create last-updated annotation");
        }
    }

    fn set_annotation_text(&mut self, text: &str) {
        let Some(element) = self.annotation() else {
            return;
        };
        element.set_text_content(Some(text));
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            element.style().set_css_text(&self.annotation_style);
        }
    }

    fn remove_annotation(&mut self) {
        if let Some(element) = self.annotation() {
            element.remove();
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use doclang_core::splice_document;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    const SIBLING: &str = r#"<!DOCTYPE html><html><head><title>第一章 - 本书</title></head>
        <body><div id="mdbook-content"><main><h1>第一章</h1></main></div>
        <span class="menu-title">本书</span></body></html>"#;

    fn parse(html: &str) -> Document {
        web_sys::DomParser::new()
            .expect("DOMParser available")
            .parse_from_string(html, web_sys::SupportedType::TextHtml)
            .expect("parsable document")
    }

    fn live_page() -> Document {
        parse(
            r#"<!DOCTYPE html><html><head><title>Chapter 1</title></head><body>
            <div class="right-buttons"></div>
            <iframe class="sidebar-iframe-outer" src="toc.html"></iframe>
            <span class="menu-title">The Book</span>
            <div id="mdbook-content"><main><h1>Chapter 1</h1></main></div>
            </body></html>"#,
        )
    }

    #[wasm_bindgen_test]
    fn splice_copies_regions_and_keeps_relative_toc_src() {
        let config = SwitchConfig::default();
        let live = live_page();
        let remote = ParsedDom::new(parse(SIBLING), &config);

        let report = splice_document(
            &mut LiveDom::new(&live, &config),
            &remote,
            "https://site/zh/guide/ch1.html",
        );
        assert!(report.main_replaced);
        assert_eq!(live.title(), "第一章 - 本书");

        let main = live
            .query_selector("#mdbook-content main")
            .expect("valid selector")
            .expect("main present");
        assert_eq!(main.inner_html(), "<h1>第一章</h1>");

        let frame = live
            .query_selector(".sidebar-iframe-outer")
            .expect("valid selector")
            .expect("frame present");
        assert_eq!(
            frame.get_attribute("src").as_deref(),
            Some("https://site/zh/guide/toc.html")
        );
        assert_eq!(frame.get_attribute(TOC_SRC_ATTR).as_deref(), Some("toc.html"));
    }

    #[wasm_bindgen_test]
    fn annotation_surface_keeps_a_single_element() {
        let page = live_page();
        let config = AnnotatorConfig::default();
        let mut surface = AnnotationDom::new(page.clone(), &config);

        assert!(surface.has_main());
        assert!(!surface.annotation_exists());
        surface.create_annotation();
        surface.set_annotation_text("本页最后更新：2024-05-01");
        assert!(surface.annotation_exists());

        let found = page
            .query_selector_all("main .last-updated")
            .expect("valid selector");
        assert_eq!(found.length(), 1);

        surface.remove_annotation();
        assert!(!surface.annotation_exists());
    }

    #[wasm_bindgen_test]
    fn invalid_selector_reads_as_missing() {
        let config = SwitchConfig {
            main_selector: "main[".to_owned(),
            ..SwitchConfig::default()
        };
        let page = live_page();
        assert!(!LiveDom::new(&page, &config).replace_main_html("<p>x</p>"));
    }
}
