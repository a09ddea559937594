#![forbid(unsafe_code)]

//! Keeps the last-updated footer in sync with the main content region.
//!
//! Two triggers re-run [`ContentAnnotator::refresh`]:
//!
//! - a [`ContentReplaced`](doclang_core::ContentReplaced) notification from
//!   the language switch, handled immediately;
//! - a `childList` mutation of the main region made by anyone else, handled
//!   after the settle delay so a burst of mutations costs one refresh.
//!
//! Mutation records caused by a refresh itself (or by a swap that was already
//! handled through the channel) are taken from the observer and dropped.
//!
//! The table global is read again on every refresh, so a table script that
//! runs after installation is still picked up.

use std::cell::RefCell;
use std::rc::Rc;

use doclang_core::{
    AnnotationOutcome, ContentAnnotator, ContentChannel, DocLangConfig, LastUpdatedTable,
    SettleTimer, Subscription,
};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MutationObserver, MutationObserverInit};

use crate::dom::{self, AnnotationDom, PageClock, PageContext, describe_js};
use crate::options::table_from_global;

pub(crate) struct LastUpdated {
    annotator: ContentAnnotator,
    surface: AnnotationDom,
    page: PageContext,
    table_global: String,
    settle: SettleTimer,
    observer: Option<MutationObserver>,
    clock: PageClock,
}

pub(crate) type AnnotatorHandle = Rc<RefCell<LastUpdated>>;

/// Create the annotator, subscribe it to `channel`, and bootstrap it once the
/// document is ready.
pub(crate) fn install(
    config: &DocLangConfig,
    channel: &ContentChannel,
    clock: PageClock,
    page: PageContext,
) -> Result<(AnnotatorHandle, Subscription), JsValue> {
    let annotator_config = config.annotator.clone();
    let document = page.document.clone();

    let handle = Rc::new(RefCell::new(LastUpdated {
        surface: AnnotationDom::new(document.clone(), &annotator_config),
        annotator: ContentAnnotator::new(
            annotator_config.clone(),
            config.locales.clone(),
            LastUpdatedTable::new(),
        ),
        page,
        table_global: annotator_config.table_global.clone(),
        settle: SettleTimer::new(annotator_config.settle_ms),
        observer: None,
        clock,
    }));

    let subscription = {
        let handle = Rc::clone(&handle);
        channel.subscribe(move |event| {
            debug!(seq = event.seq, url = %event.url, "content replaced; refreshing annotation");
            handle.borrow_mut().settle.cancel();
            refresh(&handle);
        })
    };

    let bootstrap_handle = Rc::clone(&handle);
    dom::when_ready(&document, move || {
        if let Err(error) = bootstrap(&bootstrap_handle) {
            warn!(error = %describe_js(&error), "could not observe main content");
        }
    })?;

    Ok((handle, subscription))
}

/// Refresh once, then watch the main region if the page has one.
fn bootstrap(handle: &AnnotatorHandle) -> Result<(), JsValue> {
    refresh(handle);
    let Some(main) = handle.borrow().surface.main() else {
        debug!("no main content region; annotation observer not installed");
        return Ok(());
    };

    let callback = {
        let handle = Rc::clone(handle);
        Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                on_mutation(&handle, records.length());
            },
        )
    };
    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
    callback.forget();

    let init = MutationObserverInit::new();
    init.set_child_list(true);
    observer.observe_with_options(&main, &init)?;
    handle.borrow_mut().observer = Some(observer);
    Ok(())
}

fn on_mutation(handle: &AnnotatorHandle, records: u32) {
    let (window, ticket) = {
        let mut last_updated = handle.borrow_mut();
        let now_ms = last_updated.clock.now_ms();
        let ticket = last_updated.settle.request(now_ms);
        (last_updated.page.window.clone(), ticket)
    };
    let Some(ticket) = ticket else {
        return;
    };
    debug!(records, delay_ms = ticket.delay_ms(), "main content mutated; refresh scheduled");

    let timer_handle = Rc::clone(handle);
    let armed = dom::set_timeout(&window, ticket.delay_ms(), move || {
        let due = timer_handle.borrow_mut().settle.fire(ticket);
        if due {
            refresh(&timer_handle);
        } else {
            debug!("settle timer superseded; refresh skipped");
        }
    });
    if let Err(error) = armed {
        warn!(error = %describe_js(&error), "could not arm settle timer; refreshing now");
        handle.borrow_mut().settle.cancel();
        refresh(handle);
    }
}

/// Re-read the table, re-evaluate the current page, and drop the mutation
/// records the refresh (and any swap before it) produced.
fn refresh(handle: &AnnotatorHandle) {
    let mut guard = handle.borrow_mut();
    let last_updated = &mut *guard;
    let path = match last_updated.page.location.pathname() {
        Ok(path) => path,
        Err(error) => {
            warn!(error = %describe_js(&error), "could not read location; annotation unchanged");
            return;
        }
    };
    let table = table_from_global(&last_updated.page.window, &last_updated.table_global);
    debug!(entries = table.len(), "last-updated table read");
    last_updated.annotator.replace_table(table);
    let outcome = last_updated
        .annotator
        .refresh(&path, &mut last_updated.surface);
    if matches!(outcome, AnnotationOutcome::NoMainRegion) {
        debug!(path = %path, "annotation applies but the page has no main region");
    }
    if let Some(observer) = &last_updated.observer {
        let _ = observer.take_records();
    }
}
