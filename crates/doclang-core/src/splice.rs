#![forbid(unsafe_code)]

//! Copying the regions of a fetched sibling page into the live page.
//!
//! The live and remote documents are reached through two small traits so the
//! splice rules can be exercised without a browser. Every step is optional:
//! a region missing on either side is skipped, never reported as an error.

use tracing::debug;

use crate::page_url::toc_frame_url;

/// Read access to a parsed sibling-locale document.
pub trait RemoteDocument {
    /// Inner markup of the main content region, if the document has one.
    fn main_html(&self) -> Option<String>;
    /// Text of the title element, if present.
    fn title(&self) -> Option<String>;
    /// Text of the menu-title element, if present.
    fn menu_title(&self) -> Option<String>;
}

/// Write access to the regions of the live page a switch updates.
pub trait LiveDocument {
    /// Replace the main content region's inner markup. Returns `false` when
    /// the live page has no such region.
    fn replace_main_html(&mut self, html: &str) -> bool;
    fn set_title(&mut self, title: &str);
    /// Overwrite the menu title text. Returns `false` when absent.
    fn replace_menu_title(&mut self, text: &str) -> bool;
    /// The TOC frame's source as authored in the page (relative to it), or
    /// `None` when the page has no TOC frame.
    fn toc_frame_relative_src(&self) -> Option<String>;
    /// Point the TOC frame at `src`, remembering `relative_src` for the next
    /// switch.
    fn set_toc_frame_src(&mut self, src: &str, relative_src: &str);
}

/// What a splice changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpliceReport {
    pub main_replaced: bool,
    pub title_updated: bool,
    pub menu_title_updated: bool,
    pub toc_src: Option<String>,
}

/// Copy main content, title and menu title from `remote` into `live`, then
/// repoint the TOC frame at the directory of `target_url`.
pub fn splice_document<L, R>(live: &mut L, remote: &R, target_url: &str) -> SpliceReport
where
    L: LiveDocument + ?Sized,
    R: RemoteDocument + ?Sized,
{
    let mut report = SpliceReport::default();

    if let Some(html) = remote.main_html() {
        report.main_replaced = live.replace_main_html(&html);
    }

    if let Some(title) = remote.title() {
        live.set_title(&title);
        report.title_updated = true;
    }

    if let Some(menu_title) = remote.menu_title() {
        report.menu_title_updated = live.replace_menu_title(&menu_title);
    }

    if let Some(relative) = live.toc_frame_relative_src() {
        let src = toc_frame_url(target_url, &relative);
        live.set_toc_frame_src(&src, &relative);
        report.toc_src = Some(src);
    }

    debug!(
        main = report.main_replaced,
        title = report.title_updated,
        menu_title = report.menu_title_updated,
        toc = report.toc_src.as_deref().unwrap_or(""),
        "spliced sibling document"
    );
    report
}
