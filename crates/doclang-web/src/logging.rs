#![forbid(unsafe_code)]

//! Routing `tracing` output to the browser console.
//!
//! A `tracing-subscriber` fmt layer formats each event without timestamps or
//! ANSI colors into a [`ConsoleWriter`]. The writer buffers the formatted line
//! and hands it to a [`ConsoleSink`] when dropped, which picks the console
//! method matching the event level.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::fmt::MakeWriter;

/// Receives one formatted log line.
pub(crate) type ConsoleSink = fn(&Level, &str);

/// Produces a [`ConsoleWriter`] per event, tagged with the event's level.
#[derive(Clone, Copy)]
pub(crate) struct ConsoleMakeWriter {
    sink: ConsoleSink,
}

impl ConsoleMakeWriter {
    pub(crate) const fn new(sink: ConsoleSink) -> Self {
        Self { sink }
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::new(Level::INFO, self.sink)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter::new(*meta.level(), self.sink)
    }
}

/// Buffers one formatted event; emits it on drop.
pub(crate) struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
    sink: ConsoleSink,
}

impl ConsoleWriter {
    fn new(level: Level, sink: ConsoleSink) -> Self {
        Self {
            level,
            buf: Vec::new(),
            sink,
        }
    }
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buf);
        let line = line.trim_end();
        if !line.is_empty() {
            (self.sink)(&self.level, line);
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) use browser::{init, install_panic_hook};

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::ConsoleMakeWriter;
    use doclang_core::DocLangConfig;
    use js_sys::Reflect;
    use tracing::Level;
    use tracing::level_filters::LevelFilter;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;

    fn console_error(msg: &str) {
        let global = js_sys::global();
        let Ok(console) = Reflect::get(&global, &"console".into()) else {
            return;
        };
        let Ok(error) = Reflect::get(&console, &"error".into()) else {
            return;
        };
        let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
            return;
        };
        let _ = error_fn.call1(&console, &JsValue::from_str(msg));
    }

    fn console_sink(level: &Level, line: &str) {
        let line = JsValue::from_str(line);
        match *level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            Level::DEBUG => web_sys::console::debug_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    pub(crate) fn install_panic_hook() {
        use std::sync::Once;

        static ONCE: Once = Once::new();
        ONCE.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = if let Some(loc) = info.location() {
                    format!(
                        "doclang panic at {}:{}:{}: {info}",
                        loc.file(),
                        loc.line(),
                        loc.column()
                    )
                } else {
                    format!("doclang panic: {info}")
                };
                console_error(&msg);
            }));
        });
    }

    /// Install the console subscriber at the configured level. Later calls,
    /// or a subscriber installed by the embedding page, win silently.
    pub(crate) fn init(config: &DocLangConfig) {
        let filter = config.log_filter().unwrap_or(LevelFilter::WARN);
        let _ = tracing_subscriber::fmt()
            .with_writer(ConsoleMakeWriter::new(console_sink))
            .with_max_level(filter)
            .without_time()
            .with_ansi(false)
            .with_target(false)
            .try_init();
    }
}
