#![forbid(unsafe_code)]

//! JS values to serde types.
//!
//! Options objects and the last-updated table global are plain JS data. They
//! cross into Rust as JSON text via `JSON.stringify`, so the core keeps a
//! single serde-based parser for both.

use doclang_core::{DocLangConfig, LastUpdatedTable};
use js_sys::{JSON, Reflect};
use tracing::warn;
use wasm_bindgen::prelude::*;
use web_sys::Window;

use crate::dom::describe_js;

/// JSON text of `value`, or `None` for `undefined`/`null`.
fn to_json(value: &JsValue) -> Result<Option<String>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    let text = JSON::stringify(value)?;
    Ok(text.as_string())
}

/// Configuration from an optional JS options object.
pub(crate) fn config_from_js(options: &JsValue) -> Result<DocLangConfig, JsValue> {
    let Some(json) = to_json(options)? else {
        return Ok(DocLangConfig::default());
    };
    DocLangConfig::from_json(&json).map_err(|error| JsValue::from_str(&error.to_string()))
}

/// The table published by the page under `window[global]`. Missing or
/// malformed data reads as an empty table.
pub(crate) fn table_from_global(window: &Window, global: &str) -> LastUpdatedTable {
    let value = match Reflect::get(window, &JsValue::from_str(global)) {
        Ok(value) => value,
        Err(error) => {
            warn!(global, error = %describe_js(&error), "could not read last-updated table");
            return LastUpdatedTable::new();
        }
    };
    let json = match to_json(&value) {
        Ok(Some(json)) => json,
        Ok(None) => return LastUpdatedTable::new(),
        Err(error) => {
            warn!(global, error = %describe_js(&error), "last-updated table is not JSON data");
            return LastUpdatedTable::new();
        }
    };
    LastUpdatedTable::from_json(&json).unwrap_or_else(|error| {
        warn!(global, %error, "ignoring malformed last-updated table");
        LastUpdatedTable::new()
    })
}
