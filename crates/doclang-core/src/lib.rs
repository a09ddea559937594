#![forbid(unsafe_code)]

//! Host-agnostic core of the doclang language switch.
//!
//! # Role in doclang
//! A bilingual documentation site ships two locale trees (`/en/...` and
//! `/zh/...` by default). `doclang-core` holds everything about switching
//! between them that does not need a browser: URL derivation, the switch
//! protocol state machine, the splice rules for a fetched sibling page, and
//! the "last updated" annotation logic. `doclang-web` binds these to the DOM.
//!
//! # Primary responsibilities
//! - **[`switch::SwitchMachine`]**: fade → fetch → commit-or-navigate protocol,
//!   emitting host actions in order.
//! - **[`splice::splice_document`]**: which regions of a fetched page replace
//!   which regions of the live page.
//! - **[`annotate::ContentAnnotator`]**: page key derivation, table lookup and
//!   the single-annotation invariant.
//! - **[`notify::ContentChannel`]**: "content replaced" notifications from the
//!   switch to the annotator without either knowing the other.

pub mod annotate;
pub mod config;
pub mod last_updated;
pub mod locale;
pub mod notify;
pub mod page_key;
pub mod page_url;
pub mod settle;
pub mod splice;
pub mod switch;

pub use annotate::{
    AnnotationDecision, AnnotationOutcome, AnnotationSurface, AnnotatorState, ContentAnnotator,
    HideReason,
};
pub use config::{AnnotatorConfig, ConfigError, DocLangConfig, SwitchConfig};
pub use last_updated::{LastUpdatedTable, TableError};
pub use locale::{Locale, LocaleConfig, LocaleProfile, ToggleLabel};
pub use notify::{ContentChannel, ContentReplaced, Subscription};
pub use page_key::PageKeyRules;
pub use page_url::PageIdentity;
pub use settle::{SettleTicket, SettleTimer};
pub use splice::{LiveDocument, RemoteDocument, SpliceReport, splice_document};
pub use switch::{
    SwitchAction, SwitchEvent, SwitchEventKind, SwitchMachine, SwitchPhase, SwitchSnapshot,
    SwitchTransition,
};
