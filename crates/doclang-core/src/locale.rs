#![forbid(unsafe_code)]

//! The two locale trees of a bilingual documentation site.
//!
//! A site has exactly one *primary* tree (the authoring language) and one
//! *secondary* tree (the translation). At any moment one of them is current
//! and the other is the switch target; [`Locale::complement`] is the only way
//! to move between them, so the pair can never collapse to the same value.

use serde::{Deserialize, Serialize};

/// One of the two locale trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    Primary,
    Secondary,
}

impl Locale {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// The other locale. Total and involutive.
    #[must_use]
    pub const fn complement(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

/// Naming for one locale tree: its URL segment and how the toggle advertises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocaleProfile {
    /// Path segment identifying the tree, e.g. `en` in `/book/en/ch1.html`.
    pub code: String,
    /// Toggle text shown when this locale is the switch target.
    pub display_name: String,
    /// Toggle tooltip shown when this locale is the switch target.
    pub switch_prompt: String,
}

impl LocaleProfile {
    #[must_use]
    pub fn english() -> Self {
        Self {
            code: "en".to_owned(),
            display_name: "English".to_owned(),
            switch_prompt: "Switch to English".to_owned(),
        }
    }

    #[must_use]
    pub fn chinese() -> Self {
        Self {
            code: "zh".to_owned(),
            display_name: "中文".to_owned(),
            switch_prompt: "切换到中文".to_owned(),
        }
    }
}

/// Both locale profiles of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocaleConfig {
    pub primary: LocaleProfile,
    pub secondary: LocaleProfile,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            primary: LocaleProfile::english(),
            secondary: LocaleProfile::chinese(),
        }
    }
}

impl LocaleConfig {
    #[must_use]
    pub fn profile(&self, locale: Locale) -> &LocaleProfile {
        match locale {
            Locale::Primary => &self.primary,
            Locale::Secondary => &self.secondary,
        }
    }

    #[must_use]
    pub fn code(&self, locale: Locale) -> &str {
        &self.profile(locale).code
    }

    /// The literal path segment marking a page as belonging to `locale`.
    #[must_use]
    pub fn marker(&self, locale: Locale) -> String {
        format!("/{}/", self.code(locale))
    }

    /// Locale named by the path, if any. The secondary marker wins when a path
    /// happens to contain both.
    #[must_use]
    pub fn detect(&self, path: &str) -> Option<Locale> {
        [Locale::Secondary, Locale::Primary]
            .into_iter()
            .find(|&locale| path.contains(&self.marker(locale)))
    }

    /// Initial current locale for the switch control. Unmarked paths are
    /// treated as the primary tree.
    #[must_use]
    pub fn locale_for_switch(&self, path: &str) -> Locale {
        self.detect(path).unwrap_or(Locale::Primary)
    }
}

/// Visible text and tooltip of the language toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleLabel {
    pub text: String,
    pub title: String,
}

impl ToggleLabel {
    /// The toggle advertises where a click leads: the complement of `current`.
    #[must_use]
    pub fn for_current(current: Locale, locales: &LocaleConfig) -> Self {
        let target = locales.profile(current.complement());
        Self {
            text: target.display_name.clone(),
            title: target.switch_prompt.clone(),
        }
    }
}
