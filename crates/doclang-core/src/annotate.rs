#![forbid(unsafe_code)]

//! The "last updated" footer shown on translated pages.
//!
//! [`ContentAnnotator`] decides, for the page at a given path, whether the
//! annotation should be visible and with which text, and applies that
//! decision through an [`AnnotationSurface`].
//!
//! # Invariants
//!
//! 1. At most one annotation element exists: `refresh` creates one only when
//!    none is present and otherwise rewrites the existing text.
//! 2. A page outside the annotated locale, or without a table entry, ends a
//!    refresh with no annotation element.
//! 3. Absence of data is a normal `Hidden` outcome, never an error.

use tracing::debug;

use crate::config::AnnotatorConfig;
use crate::last_updated::LastUpdatedTable;
use crate::locale::LocaleConfig;

/// DOM operations the annotator needs on the main content region.
pub trait AnnotationSurface {
    fn has_main(&self) -> bool;
    fn annotation_exists(&self) -> bool;
    /// Append an empty annotation element to the main content region.
    fn create_annotation(&mut self);
    fn set_annotation_text(&mut self, text: &str);
    fn remove_annotation(&mut self);
}

/// Per-page-load evaluation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorState {
    Uninitialized,
    Shown,
    Hidden,
}

/// Why no annotation is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HideReason {
    /// The page belongs to a locale tree that is not annotated.
    NotAnnotatedLocale,
    /// The table has no (non-empty) entry for the page key.
    MissingEntry { key: String },
}

/// What the annotation should look like for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationDecision {
    Show { key: String, text: String },
    Hide(HideReason),
}

/// Result of a [`ContentAnnotator::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutcome {
    Shown { key: String, text: String },
    Hidden(HideReason),
    /// The annotation applies but the page has no main content region.
    NoMainRegion,
}

/// Decides and applies the last-updated annotation.
#[derive(Debug, Clone)]
pub struct ContentAnnotator {
    config: AnnotatorConfig,
    locales: LocaleConfig,
    table: LastUpdatedTable,
    state: AnnotatorState,
    evaluations: u64,
}

impl ContentAnnotator {
    #[must_use]
    pub fn new(config: AnnotatorConfig, locales: LocaleConfig, table: LastUpdatedTable) -> Self {
        Self {
            config,
            locales,
            table,
            state: AnnotatorState::Uninitialized,
            evaluations: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> AnnotatorState {
        self.state
    }

    /// Number of refreshes run so far.
    #[must_use]
    pub const fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Swap in a freshly read table; the next refresh uses it.
    pub fn replace_table(&mut self, table: LastUpdatedTable) {
        self.table = table;
    }

    #[must_use]
    pub fn derive_page_key(&self, path: &str) -> String {
        self.config.page_keys.derive(path)
    }

    /// Whether pages at `path` carry the annotation. Paths naming neither
    /// locale tree fall back to the configured unmarked locale.
    #[must_use]
    pub fn is_annotatable(&self, path: &str) -> bool {
        let locale = self
            .locales
            .detect(path)
            .unwrap_or(self.config.unmarked_locale);
        locale == self.config.annotated_locale
    }

    #[must_use]
    pub fn evaluate(&self, path: &str) -> AnnotationDecision {
        if !self.is_annotatable(path) {
            return AnnotationDecision::Hide(HideReason::NotAnnotatedLocale);
        }
        let key = self.derive_page_key(path);
        match self.table.lookup(&key) {
            Some(timestamp) => AnnotationDecision::Show {
                text: self.config.render(timestamp),
                key,
            },
            None => AnnotationDecision::Hide(HideReason::MissingEntry { key }),
        }
    }

    /// Evaluate the page at `path` and bring `surface` in line with the
    /// decision.
    pub fn refresh<S>(&mut self, path: &str, surface: &mut S) -> AnnotationOutcome
    where
        S: AnnotationSurface + ?Sized,
    {
        self.evaluations = self.evaluations.saturating_add(1);
        let outcome = match self.evaluate(path) {
            AnnotationDecision::Hide(reason) => {
                if surface.annotation_exists() {
                    surface.remove_annotation();
                }
                self.state = AnnotatorState::Hidden;
                AnnotationOutcome::Hidden(reason)
            }
            AnnotationDecision::Show { .. } if !surface.has_main() => {
                self.state = AnnotatorState::Hidden;
                AnnotationOutcome::NoMainRegion
            }
            AnnotationDecision::Show { key, text } => {
                if !surface.annotation_exists() {
                    surface.create_annotation();
                }
                surface.set_annotation_text(&text);
                self.state = AnnotatorState::Shown;
                AnnotationOutcome::Shown { key, text }
            }
        };
        debug!(
            path,
            evaluation = self.evaluations,
            outcome = ?outcome,
            "last-updated annotation refreshed"
        );
        outcome
    }
}
