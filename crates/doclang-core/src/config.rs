#![forbid(unsafe_code)]

//! Configuration for the language switch and the last-updated annotator.
//!
//! Every field has a default matching an mdBook-generated site with `en`/`zh`
//! trees, so an empty JSON object (or no options at all) is a valid
//! configuration. Hosts override individual fields with camelCase keys:
//!
//! ```
//! use doclang_core::config::DocLangConfig;
//!
//! let config = DocLangConfig::from_json(r#"{"switch":{"fadeMs":120}}"#).unwrap();
//! assert_eq!(config.switch.fade_ms, 120);
//! assert_eq!(config.annotator.settle_ms, 50);
//! ```

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::locale::{Locale, LocaleConfig};
use crate::page_key::PageKeyRules;

/// Placeholder replaced by the looked-up timestamp in the annotation template.
pub const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Errors from loading or validating a [`DocLangConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Malformed JSON or a field of the wrong type.
    Json(String),
    /// A locale code was empty or contained a path separator.
    InvalidLocaleCode(String),
    /// Both locales share the same code.
    DuplicateLocaleCode(String),
    /// A required selector or DOM name was empty.
    EmptyField(&'static str),
    /// The transition log must hold at least one record.
    ZeroCapacity,
    /// `logLevel` is not a tracing level name.
    UnknownLogLevel(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(msg) => write!(f, "config JSON error: {msg}"),
            Self::InvalidLocaleCode(code) => write!(f, "invalid locale code: {code:?}"),
            Self::DuplicateLocaleCode(code) => {
                write!(f, "primary and secondary locales share code {code:?}")
            }
            Self::EmptyField(field) => write!(f, "config field must not be empty: {field}"),
            Self::ZeroCapacity => write!(f, "transitionLogCapacity must be at least 1"),
            Self::UnknownLogLevel(level) => write!(f, "unknown log level: {level:?}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Knobs for the language switch control and its swap protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SwitchConfig {
    /// Fade-out duration before the fetch starts (ms).
    pub fade_ms: u64,
    /// Id of the element receiving the fade class.
    pub content_container_id: String,
    /// Main content region, in both the live and the fetched document.
    pub main_selector: String,
    /// Title element of the fetched document.
    pub title_selector: String,
    pub menu_title_selector: String,
    /// Sidebar table-of-contents frame.
    pub toc_frame_selector: String,
    /// Container the toggle is inserted into as first child.
    pub button_bar_selector: String,
    pub toggle_id: String,
    pub toggle_class: String,
    pub toggle_style: String,
    pub fade_class: String,
    /// Inject a `<style>` element animating the fade class.
    pub inject_fade_style: bool,
    /// Maximum number of retained transition records.
    pub transition_log_capacity: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            fade_ms: 250,
            content_container_id: "mdbook-content".to_owned(),
            main_selector: "#mdbook-content main".to_owned(),
            title_selector: "title".to_owned(),
            menu_title_selector: ".menu-title".to_owned(),
            toc_frame_selector: ".sidebar-iframe-outer".to_owned(),
            button_bar_selector: ".right-buttons".to_owned(),
            toggle_id: "lang-toggle".to_owned(),
            toggle_class: "icon-button".to_owned(),
            toggle_style: "cursor:pointer;font-size:14px;padding:0 8px;line-height:50px;\
                           font-weight:bold;"
                .to_owned(),
            fade_class: "lang-fade".to_owned(),
            inject_fade_style: true,
            transition_log_capacity: 256,
        }
    }
}

impl SwitchConfig {
    /// CSS animating the fade class on the content container.
    #[must_use]
    pub fn fade_css(&self) -> String {
        let id = &self.content_container_id;
        let class = &self.fade_class;
        let seconds = self.fade_ms as f64 / 1000.0;
        format!(
            "#{id} {{ transition: opacity {seconds}s ease; }} #{id}.{class} {{ opacity: 0; }}"
        )
    }
}

/// Knobs for the last-updated footer annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotatorConfig {
    /// Main content region the annotation is appended to and watched on.
    pub main_selector: String,
    pub annotation_class: String,
    pub annotation_style: String,
    /// Annotation text; [`TIMESTAMP_PLACEHOLDER`] is replaced by the entry.
    pub template: String,
    #[serde(flatten)]
    pub page_keys: PageKeyRules,
    /// Locale tree whose pages carry the annotation.
    pub annotated_locale: Locale,
    /// Locale assumed for pages whose URL names neither tree, such as a
    /// standalone preview server.
    pub unmarked_locale: Locale,
    /// Delay between a content mutation and the re-evaluation (ms).
    pub settle_ms: u64,
    /// Global variable holding the last-updated table.
    pub table_global: String,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            main_selector: "main".to_owned(),
            annotation_class: "last-updated".to_owned(),
            annotation_style: "margin-top:2em;padding-top:0.8em;\
                               border-top:1px solid var(--table-border-color,#ddd);\
                               font-size:0.85em;color:var(--sidebar-non-existant,#aaa);\
                               text-align:right;"
                .to_owned(),
            template: format!("本页最后更新：{TIMESTAMP_PLACEHOLDER}"),
            page_keys: PageKeyRules::default(),
            annotated_locale: Locale::Secondary,
            unmarked_locale: Locale::Secondary,
            settle_ms: 50,
            table_global: "LAST_UPDATED_DATA".to_owned(),
        }
    }
}

impl AnnotatorConfig {
    /// Annotation text for `timestamp`.
    #[must_use]
    pub fn render(&self, timestamp: &str) -> String {
        self.template.replace(TIMESTAMP_PLACEHOLDER, timestamp)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocLangConfig {
    pub locales: LocaleConfig,
    pub switch: SwitchConfig,
    pub annotator: AnnotatorConfig,
    /// Maximum tracing level routed to the console.
    pub log_level: String,
}

impl Default for DocLangConfig {
    fn default() -> Self {
        Self {
            locales: LocaleConfig::default(),
            switch: SwitchConfig::default(),
            annotator: AnnotatorConfig::default(),
            log_level: "warn".to_owned(),
        }
    }
}

impl DocLangConfig {
    /// Parse and validate a configuration from JSON. `null` yields defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Option<Self> =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for locale in [Locale::Primary, Locale::Secondary] {
            let code = self.locales.code(locale);
            if code.is_empty() || code.contains('/') || code.contains('#') {
                return Err(ConfigError::InvalidLocaleCode(code.to_owned()));
            }
        }
        if self.locales.primary.code == self.locales.secondary.code {
            return Err(ConfigError::DuplicateLocaleCode(
                self.locales.primary.code.clone(),
            ));
        }

        let required = [
            ("switch.contentContainerId", &self.switch.content_container_id),
            ("switch.mainSelector", &self.switch.main_selector),
            ("switch.titleSelector", &self.switch.title_selector),
            ("switch.menuTitleSelector", &self.switch.menu_title_selector),
            ("switch.tocFrameSelector", &self.switch.toc_frame_selector),
            ("switch.buttonBarSelector", &self.switch.button_bar_selector),
            ("switch.toggleId", &self.switch.toggle_id),
            ("switch.fadeClass", &self.switch.fade_class),
            ("annotator.mainSelector", &self.annotator.main_selector),
            ("annotator.annotationClass", &self.annotator.annotation_class),
            ("annotator.indexPage", &self.annotator.page_keys.index_page),
            ("annotator.tableGlobal", &self.annotator.table_global),
        ];
        if let Some((field, _)) = required.into_iter().find(|(_, value)| value.is_empty()) {
            return Err(ConfigError::EmptyField(field));
        }

        if self.switch.transition_log_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.log_filter()?;
        Ok(())
    }

    /// Parsed form of [`log_level`](Self::log_level).
    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse::<LevelFilter>()
            .map_err(|_| ConfigError::UnknownLogLevel(self.log_level.clone()))
    }
}
