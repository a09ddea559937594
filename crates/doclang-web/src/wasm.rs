#![forbid(unsafe_code)]

//! `wasm-bindgen` exports.
//!
//! Each installer is idempotent per page: a second call logs and returns.
//! Options objects are optional; see
//! [`DocLangConfig`](doclang_core::DocLangConfig) for the recognized keys.

use std::cell::RefCell;

use doclang_core::{ContentChannel, DocLangConfig, Subscription};
use js_sys::Array;
use tracing::debug;
use wasm_bindgen::prelude::*;

use crate::annotator::{self, AnnotatorHandle};
use crate::dom::{PageClock, PageContext};
use crate::logging;
use crate::options::config_from_js;
use crate::switcher::{self, SwitchHandle};

struct Installed {
    channel: ContentChannel,
    clock: PageClock,
    switch: Option<SwitchHandle>,
    annotator: Option<(AnnotatorHandle, Subscription)>,
}

thread_local! {
    static INSTALLED: RefCell<Option<Installed>> = const { RefCell::new(None) };
}

fn with_installed<R>(f: impl FnOnce(&mut Installed) -> R) -> R {
    INSTALLED.with(|cell| {
        let mut slot = cell.borrow_mut();
        let installed = slot.get_or_insert_with(|| Installed {
            channel: ContentChannel::new(),
            clock: PageClock::start(),
            switch: None,
            annotator: None,
        });
        f(installed)
    })
}

fn prepare(options: &JsValue) -> Result<DocLangConfig, JsValue> {
    logging::install_panic_hook();
    let config = config_from_js(options)?;
    logging::init(&config);
    Ok(config)
}

fn install_switch(config: &DocLangConfig) -> Result<(), JsValue> {
    with_installed(|installed| {
        if installed.switch.is_some() {
            debug!("language switch already installed");
            return Ok(());
        }
        let handle = switcher::install(
            config,
            installed.channel.clone(),
            installed.clock,
            PageContext::current()?,
        )?;
        installed.switch = Some(handle);
        Ok(())
    })
}

fn install_annotator(config: &DocLangConfig) -> Result<(), JsValue> {
    with_installed(|installed| {
        if installed.annotator.is_some() {
            debug!("last-updated annotator already installed");
            return Ok(());
        }
        let installed_annotator = annotator::install(
            config,
            &installed.channel,
            installed.clock,
            PageContext::current()?,
        )?;
        installed.annotator = Some(installed_annotator);
        Ok(())
    })
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    logging::install_panic_hook();
}

/// Install the last-updated annotator and the language switch.
#[wasm_bindgen]
pub fn install(options: JsValue) -> Result<(), JsValue> {
    let config = prepare(&options)?;
    install_annotator(&config)?;
    install_switch(&config)
}

/// Install only the language toggle.
#[wasm_bindgen(js_name = installLanguageSwitch)]
pub fn install_language_switch(options: JsValue) -> Result<(), JsValue> {
    let config = prepare(&options)?;
    install_switch(&config)
}

/// Install only the last-updated footer.
#[wasm_bindgen(js_name = installLastUpdated)]
pub fn install_last_updated(options: JsValue) -> Result<(), JsValue> {
    let config = prepare(&options)?;
    install_annotator(&config)
}

/// Drain recorded switch transitions as JSONL strings tagged with `run_id`.
/// Empty when the switch is not installed.
#[wasm_bindgen(js_name = drainSwitchTransitions)]
pub fn drain_switch_transitions(run_id: &str) -> Array {
    let lines = with_installed(|installed| {
        installed
            .switch
            .as_ref()
            .map(|handle| handle.borrow_mut().drain_transition_jsonl(run_id))
            .unwrap_or_default()
    });
    lines.iter().map(|line| JsValue::from_str(line)).collect()
}
