#![forbid(unsafe_code)]

//! Page keys: the filename of the source document a rendered page came from.
//!
//! The last-updated table is keyed by these names, so the derivation here and
//! the generator of that table must agree exactly.

use serde::{Deserialize, Serialize};

/// How a URL path maps back to a source filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageKeyRules {
    /// Suffix of rendered pages.
    pub rendered_extension: String,
    /// Suffix of the authored source documents.
    pub source_extension: String,
    /// Rendered page served for directory-style paths.
    pub index_page: String,
}

impl Default for PageKeyRules {
    fn default() -> Self {
        Self {
            rendered_extension: ".html".to_owned(),
            source_extension: ".md".to_owned(),
            index_page: "index.html".to_owned(),
        }
    }
}

impl PageKeyRules {
    /// Key for the page at URL path `path`. Idempotent: a derived key fed back
    /// in yields itself.
    #[must_use]
    pub fn derive(&self, path: &str) -> String {
        let segment = path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or(&self.index_page);
        match segment.strip_suffix(self.rendered_extension.as_str()) {
            Some(stem) if !self.rendered_extension.is_empty() => {
                format!("{stem}{}", self.source_extension)
            }
            _ => segment.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_paths_map_to_index() {
        let rules = PageKeyRules::default();
        assert_eq!(rules.derive("/docs/zh/guide/"), "index.md");
        assert_eq!(rules.derive("/"), "index.md");
        assert_eq!(rules.derive(""), "index.md");
    }

    #[test]
    fn rendered_extension_becomes_source_extension() {
        let rules = PageKeyRules::default();
        assert_eq!(rules.derive("/docs/zh/guide/intro.html"), "intro.md");
        assert_eq!(rules.derive("ch01-02-hello.html"), "ch01-02-hello.md");
    }

    #[test]
    fn only_trailing_extension_is_rewritten() {
        let rules = PageKeyRules::default();
        assert_eq!(rules.derive("/zh/a.html.bak"), "a.html.bak");
        assert_eq!(rules.derive("/zh/print.htm"), "print.htm");
    }

    #[test]
    fn derivation_is_idempotent() {
        let rules = PageKeyRules::default();
        for path in ["/docs/zh/guide/", "/docs/zh/guide/intro.html", "/zh/x.md"] {
            let once = rules.derive(path);
            assert_eq!(rules.derive(&once), once);
        }
    }
}
