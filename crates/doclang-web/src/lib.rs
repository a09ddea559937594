#![forbid(unsafe_code)]

//! Browser binding for doclang.
//!
//! Binds [`doclang_core`] to a live mdBook page through `wasm-bindgen` and
//! `web-sys`: the language toggle in the menu bar drives
//! [`doclang_core::SwitchMachine`], and the last-updated footer is kept in
//! sync by [`doclang_core::ContentAnnotator`].
//!
//! JavaScript hosts call one of the exports once the module is loaded:
//!
//! ```js
//! import init, { install } from "./doclang_web.js";
//! await init();
//! install({ switch: { fadeMs: 200 }, logLevel: "info" });
//! ```
//!
//! Everything touching the DOM is only compiled on `wasm32`. Error types and
//! the console log writer are plain Rust and are tested natively.

pub mod fetch;

// The console writer is used by the wasm exports and by native tests.
#[cfg(any(target_arch = "wasm32", test))]
mod logging;

#[cfg(target_arch = "wasm32")]
mod annotator;
#[cfg(target_arch = "wasm32")]
mod dom;
#[cfg(target_arch = "wasm32")]
mod options;
#[cfg(target_arch = "wasm32")]
mod switcher;
#[cfg(target_arch = "wasm32")]
mod wasm;

pub use fetch::FetchError;

#[cfg(target_arch = "wasm32")]
pub use wasm::{drain_switch_transitions, install, install_language_switch, install_last_updated};
