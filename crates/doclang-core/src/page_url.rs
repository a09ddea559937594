#![forbid(unsafe_code)]

//! Pure string transforms between the URLs of the two locale trees.
//!
//! Nothing here consults the network or the filesystem: the sibling page is
//! assumed to live at the same path with the locale segment substituted.
//!
//! # Failure Modes
//!
//! | Input | Behavior |
//! |-------|----------|
//! | Locale segment absent from the path | Target URL equals the current URL |
//! | Locale segment present more than once | Only the first occurrence is replaced |
//! | TOC source already absolute | Caller must pass the authored relative source |

use crate::locale::{Locale, LocaleConfig};

/// Split `href` at the first `#` into `(base, fragment)`.
///
/// The fragment keeps its leading `#`; it is empty when `href` has none.
#[must_use]
pub fn split_fragment(href: &str) -> (&str, &str) {
    match href.find('#') {
        Some(idx) => href.split_at(idx),
        None => (href, ""),
    }
}

/// Fragment as the browser reports it through `Location.hash`: a bare `#`
/// reads as empty.
#[must_use]
pub fn location_hash(href: &str) -> &str {
    match split_fragment(href).1 {
        "#" => "",
        fragment => fragment,
    }
}

/// URL of the same page in the other locale tree, without fragment.
#[must_use]
pub fn cross_locale_url(href: &str, from_code: &str, to_code: &str) -> String {
    let (base, _) = split_fragment(href);
    base.replacen(&format!("/{from_code}/"), &format!("/{to_code}/"), 1)
}

/// `url` with its final path segment removed; the trailing `/` is kept.
#[must_use]
pub fn directory_of(url: &str) -> &str {
    match url.rfind('/') {
        Some(idx) => &url[..=idx],
        None => "",
    }
}

/// Source for the sidebar TOC frame after a switch to `target_url`.
#[must_use]
pub fn toc_frame_url(target_url: &str, relative_src: &str) -> String {
    format!("{}{relative_src}", directory_of(target_url))
}

/// Where a page sits: its locale tree, the path below the locale segment and
/// the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIdentity {
    pub locale: Option<Locale>,
    pub path: String,
    pub fragment: String,
}

impl PageIdentity {
    #[must_use]
    pub fn from_href(href: &str, locales: &LocaleConfig) -> Self {
        let (base, _) = split_fragment(href);
        let fragment = location_hash(href).to_owned();
        let locale = locales.detect(base);
        let path = match locale {
            Some(locale) => {
                let marker = locales.marker(locale);
                base.find(&marker)
                    .map(|idx| base[idx + marker.len()..].to_owned())
                    .unwrap_or_default()
            }
            None => base.to_owned(),
        };
        Self {
            locale,
            path,
            fragment,
        }
    }
}
