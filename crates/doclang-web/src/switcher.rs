#![forbid(unsafe_code)]

//! Drives [`SwitchMachine`] from the live page.
//!
//! Browser callbacks (toggle click, fade timer, fetch completion, `popstate`)
//! become [`SwitchEvent`]s; the actions of each resulting transition are
//! executed here, in order, against the DOM.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | No button bar | Toggle not mounted; the page is left untouched |
//! | Fetch fails or status not ok | Machine navigates to the target URL |
//! | A commit action throws (e.g. `history.pushState`) | Remaining commit actions are skipped; the machine navigates to the target URL |
//! | Timer cannot be armed | Logged; the switch stays faded out |

use std::cell::RefCell;
use std::rc::Rc;

use doclang_core::{
    ContentChannel, DocLangConfig, SwitchAction, SwitchEvent, SwitchEventKind, SwitchMachine,
    ToggleLabel, splice_document,
};
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Document;

use crate::dom::{self, LiveDom, PageClock, PageContext, ParsedDom, describe_js};
use crate::fetch::fetch_document;

/// The installed language switch.
pub(crate) struct LanguageSwitch {
    config: DocLangConfig,
    machine: SwitchMachine,
    page: PageContext,
    channel: ContentChannel,
    clock: PageClock,
    /// Sibling page held between `FetchSucceeded` and `SpliceDocument`.
    fetched: Option<Document>,
}

pub(crate) type SwitchHandle = Rc<RefCell<LanguageSwitch>>;

impl LanguageSwitch {
    /// Drain the transition log as JSONL lines tagged with `run_id`.
    pub(crate) fn drain_transition_jsonl(&mut self, run_id: &str) -> Vec<String> {
        self.machine.drain_transition_jsonl(run_id)
    }
}

/// Set up the switch for the current page: fade style now, `popstate`
/// listener now, toggle once the document is ready.
pub(crate) fn install(
    config: &DocLangConfig,
    channel: ContentChannel,
    clock: PageClock,
    page: PageContext,
) -> Result<SwitchHandle, JsValue> {
    let path = page.location.pathname()?;
    let machine = SwitchMachine::for_path(
        config.locales.clone(),
        &path,
        config.switch.fade_ms,
        config.switch.transition_log_capacity,
    );
    debug!(path = %path, locale = machine.current().as_str(), "installing language switch");

    if config.switch.inject_fade_style {
        inject_fade_style(&page.document, &config.switch.fade_css())?;
    }

    let window = page.window.clone();
    let document = page.document.clone();
    let handle = Rc::new(RefCell::new(LanguageSwitch {
        config: config.clone(),
        machine,
        page,
        channel,
        clock,
        fetched: None,
    }));

    let on_popstate = {
        let handle = Rc::clone(&handle);
        Closure::<dyn FnMut()>::new(move || dispatch(&handle, SwitchEvent::HistoryPopped))
    };
    window.add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref())?;
    on_popstate.forget();

    let mount_handle = Rc::clone(&handle);
    dom::when_ready(&document, move || {
        if let Err(error) = mount(&mount_handle) {
            warn!(error = %describe_js(&error), "could not mount language toggle");
        }
    })?;

    Ok(handle)
}

fn inject_fade_style(document: &Document, css: &str) -> Result<(), JsValue> {
    let Some(head) = document.head() else {
        debug!("no <head>; fade style skipped");
        return Ok(());
    };
    let style = document.create_element("style")?;
    style.set_text_content(Some(css));
    head.append_child(&style)?;
    Ok(())
}

/// Insert the toggle as first child of the button bar. Does nothing when the
/// bar is missing or the toggle already exists.
fn mount(handle: &SwitchHandle) -> Result<(), JsValue> {
    let (document, config, label) = {
        let switch = handle.borrow();
        (
            switch.page.document.clone(),
            switch.config.switch.clone(),
            switch.machine.toggle_label(),
        )
    };
    if document.get_element_by_id(&config.toggle_id).is_some() {
        debug!(id = %config.toggle_id, "language toggle already mounted");
        return Ok(());
    }
    let Some(bar) = document.query_selector(&config.button_bar_selector).ok().flatten() else {
        debug!(selector = %config.button_bar_selector, "no button bar; toggle not mounted");
        return Ok(());
    };

    let toggle = document.create_element("a")?;
    toggle.set_id(&config.toggle_id);
    toggle.set_class_name(&config.toggle_class);
    toggle.set_attribute("style", &config.toggle_style)?;
    apply_label(&toggle, &label)?;

    let on_click = {
        let handle = Rc::clone(handle);
        Closure::<dyn FnMut()>::new(move || {
            let href = handle.borrow().page.location.href();
            match href {
                Ok(href) => dispatch(&handle, SwitchEvent::Activate { href }),
                Err(error) => warn!(error = %describe_js(&error), "could not read location"),
            }
        })
    };
    toggle.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
    on_click.forget();

    bar.insert_before(&toggle, bar.first_child().as_ref())?;
    debug!(text = %label.text, "language toggle mounted");
    Ok(())
}

fn apply_label(toggle: &web_sys::Element, label: &ToggleLabel) -> Result<(), JsValue> {
    toggle.set_text_content(Some(&label.text));
    toggle.set_attribute("title", &label.title)
}

/// Feed `event` to the machine and execute the resulting actions.
///
/// When an action of a commit throws, the rest of the commit is skipped and
/// the machine is told, so it can fall back to a full navigation.
pub(crate) fn dispatch(handle: &SwitchHandle, event: SwitchEvent) {
    let transition = {
        let mut switch = handle.borrow_mut();
        let now_ms = switch.clock.now_ms();
        switch.machine.handle_event(now_ms, event)
    };
    let committing = transition.event == SwitchEventKind::FetchSucceeded;
    for action in transition.actions {
        let Err(error) = execute(handle, action) else {
            continue;
        };
        let reason = describe_js(&error);
        if committing {
            warn!(error = %reason, "language switch commit failed");
            dispatch(handle, SwitchEvent::CommitFailed { reason });
            return;
        }
        warn!(error = %reason, "language switch action failed");
    }
}

fn execute(handle: &SwitchHandle, action: SwitchAction) -> Result<(), JsValue> {
    match action {
        SwitchAction::AddFadeClass => set_fade(handle, true),
        SwitchAction::RemoveFadeClass => set_fade(handle, false),
        SwitchAction::ScheduleFetch { delay_ms, .. } => {
            let window = handle.borrow().page.window.clone();
            let timer_handle = Rc::clone(handle);
            dom::set_timeout(&window, delay_ms, move || {
                dispatch(&timer_handle, SwitchEvent::FadeElapsed);
            })?;
            Ok(())
        }
        SwitchAction::Fetch { url } => {
            let window = handle.borrow().page.window.clone();
            let fetch_handle = Rc::clone(handle);
            wasm_bindgen_futures::spawn_local(async move {
                match fetch_document(&window, &url).await {
                    Ok(document) => {
                        fetch_handle.borrow_mut().fetched = Some(document);
                        dispatch(&fetch_handle, SwitchEvent::FetchSucceeded);
                    }
                    Err(error) => {
                        debug!(url = %url, %error, "sibling page unavailable");
                        dispatch(&fetch_handle, error.to_event());
                    }
                }
            });
            Ok(())
        }
        SwitchAction::SpliceDocument { target_url } => {
            let mut switch = handle.borrow_mut();
            let Some(fetched) = switch.fetched.take() else {
                warn!(target_url = %target_url, "no fetched document to splice");
                return Ok(());
            };
            let remote = ParsedDom::new(fetched, &switch.config.switch);
            let mut live = LiveDom::new(&switch.page.document, &switch.config.switch);
            let report = splice_document(&mut live, &remote, &target_url);
            if !report.main_replaced {
                warn!(
                    target_url = %target_url,
                    title_updated = report.title_updated,
                    "main content not swapped; live or fetched page lacks the main region"
                );
            }
            Ok(())
        }
        SwitchAction::PushHistory { url } => handle.borrow().page.location.push_state(&url),
        SwitchAction::UpdateToggle { label } => {
            let switch = handle.borrow();
            match switch.page.document.get_element_by_id(&switch.config.switch.toggle_id) {
                Some(toggle) => apply_label(&toggle, &label),
                None => Ok(()),
            }
        }
        SwitchAction::PublishContentReplaced { url, locale } => {
            let channel = handle.borrow().channel.clone();
            channel.publish(url, locale);
            Ok(())
        }
        SwitchAction::Navigate { url } => handle.borrow().page.location.assign(&url),
        SwitchAction::Reload => handle.borrow().page.location.reload(),
    }
}

fn set_fade(handle: &SwitchHandle, faded: bool) -> Result<(), JsValue> {
    let switch = handle.borrow();
    let config = &switch.config.switch;
    let Some(container) = switch.page.document.get_element_by_id(&config.content_container_id)
    else {
        debug!(id = %config.content_container_id, "no content container to fade");
        return Ok(());
    };
    let classes = container.class_list();
    if faded {
        classes.add_1(&config.fade_class)
    } else {
        classes.remove_1(&config.fade_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::PageLocation;
    use crate::dom::testing::mount_fixture;
    use doclang_core::{Locale, SwitchConfig, SwitchPhase};
    use wasm_bindgen_test::*;
    use web_sys::HtmlElement;

    wasm_bindgen_test_configure!(run_in_browser);

    const START: &str = "https://site/en/ch1.html#overview";
    const DESTINATION: &str = "https://site/zh/ch1.html#overview";

    /// The Chinese sibling of fixture `id`, laid out like the fixture.
    fn sibling(id: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><head><title>第一章 - 本书</title></head><body>
            <div id="{id}"><span class="menu-title">本书</span>
            <div id="{id}-content"><main><h1>第一章</h1></main></div></div>
            </body></html>"#
        )
    }

    /// Address bar of a fixture page. Each call is logged together with the
    /// state of the fixture at that moment.
    struct ScriptedLocation {
        href: RefCell<String>,
        document: Document,
        config: SwitchConfig,
        refuse_push: bool,
        log: RefCell<Vec<String>>,
    }

    impl ScriptedLocation {
        fn page_state(&self) -> String {
            page_state(&self.document, &self.config)
        }
    }

    impl PageLocation for ScriptedLocation {
        fn href(&self) -> Result<String, JsValue> {
            Ok(self.href.borrow().clone())
        }

        fn pathname(&self) -> Result<String, JsValue> {
            let href = self.href.borrow();
            let rest = href.split_once("://").map_or(href.as_str(), |(_, rest)| rest);
            let path = rest.find('/').map_or("/", |idx| &rest[idx..]);
            Ok(path.split('#').next().unwrap_or("/").to_owned())
        }

        fn push_state(&self, url: &str) -> Result<(), JsValue> {
            self.log
                .borrow_mut()
                .push(format!("push {url} [{}]", self.page_state()));
            if self.refuse_push {
                return Err(JsValue::from_str("SecurityError: too many pushState calls"));
            }
            *self.href.borrow_mut() = url.to_owned();
            Ok(())
        }

        fn assign(&self, url: &str) -> Result<(), JsValue> {
            self.log.borrow_mut().push(format!("navigate {url}"));
            Ok(())
        }

        fn reload(&self) -> Result<(), JsValue> {
            self.log.borrow_mut().push("reload".to_owned());
            Ok(())
        }
    }

    fn page_state(document: &Document, config: &SwitchConfig) -> String {
        let main = document
            .query_selector(&config.main_selector)
            .ok()
            .flatten()
            .map(|main| main.inner_html())
            .unwrap_or_default();
        let toggle = document
            .get_element_by_id(&config.toggle_id)
            .and_then(|toggle| toggle.text_content())
            .unwrap_or_default();
        let faded = document
            .get_element_by_id(&config.content_container_id)
            .is_some_and(|container| container.class_list().contains(&config.fade_class));
        format!("main={main} toggle={toggle} faded={faded}")
    }

    struct Fixture {
        id: String,
        handle: SwitchHandle,
        location: Rc<ScriptedLocation>,
        config: SwitchConfig,
        document: Document,
        published: Rc<RefCell<Vec<String>>>,
        _subscription: doclang_core::Subscription,
    }

    fn fixture(id: &str, refuse_push: bool) -> Fixture {
        mount_fixture(
            id,
            &format!(
                r#"<div class="right-buttons"></div>
                <span class="menu-title">The Book</span>
                <div class="sidebar-iframe-outer" src="toc.html"></div>
                <div id="{id}-content"><main><h1>Chapter 1</h1></main></div>"#
            ),
        );
        let config = DocLangConfig {
            switch: SwitchConfig {
                content_container_id: format!("{id}-content"),
                main_selector: format!("#{id}-content main"),
                menu_title_selector: format!("#{id} .menu-title"),
                toc_frame_selector: format!("#{id} .sidebar-iframe-outer"),
                button_bar_selector: format!("#{id} .right-buttons"),
                toggle_id: format!("{id}-toggle"),
                inject_fade_style: false,
                ..SwitchConfig::default()
            },
            ..DocLangConfig::default()
        };

        let window = dom::window().expect("window");
        let document = dom::document(&window).expect("document");
        let location = Rc::new(ScriptedLocation {
            href: RefCell::new(START.to_owned()),
            document: document.clone(),
            config: config.switch.clone(),
            refuse_push,
            log: RefCell::new(Vec::new()),
        });
        let page = PageContext {
            window,
            document: document.clone(),
            location: Rc::clone(&location) as Rc<dyn PageLocation>,
        };

        let channel = ContentChannel::new();
        let published = Rc::new(RefCell::new(Vec::new()));
        let subscription = {
            let published = Rc::clone(&published);
            let document = document.clone();
            let switch_config = config.switch.clone();
            channel.subscribe(move |event| {
                published.borrow_mut().push(format!(
                    "{} [{}]",
                    event.url,
                    page_state(&document, &switch_config)
                ));
            })
        };

        let handle = install(&config, channel, PageClock::start(), page).expect("installed");
        Fixture {
            id: id.to_owned(),
            handle,
            location,
            config: config.switch,
            document,
            published,
            _subscription: subscription,
        }
    }

    fn parse(html: &str) -> Document {
        web_sys::DomParser::new()
            .expect("DOMParser available")
            .parse_from_string(html, web_sys::SupportedType::TextHtml)
            .expect("parsable document")
    }

    /// Click the toggle and let the fade run out without waiting for the timer.
    fn activate_and_fade(fixture: &Fixture) {
        fixture
            .document
            .get_element_by_id(&fixture.config.toggle_id)
            .expect("toggle mounted")
            .dyn_into::<HtmlElement>()
            .expect("toggle is an HTML element")
            .click();
        let mut switch = fixture.handle.borrow_mut();
        assert_eq!(switch.machine.phase(), SwitchPhase::FadingOut);
        let fetch = switch.machine.handle_event(0, SwitchEvent::FadeElapsed);
        assert_eq!(
            fetch.actions,
            vec![SwitchAction::Fetch {
                url: "https://site/zh/ch1.html".to_owned(),
            }]
        );
    }

    fn deliver_sibling(fixture: &Fixture) {
        fixture.handle.borrow_mut().fetched = Some(parse(&sibling(&fixture.id)));
        dispatch(&fixture.handle, SwitchEvent::FetchSucceeded);
    }

    #[wasm_bindgen_test]
    fn toggle_is_mounted_once_with_the_target_label() {
        let fixture = fixture("switch-mount", false);
        mount(&fixture.handle).expect("second mount is a no-op");

        let selector = format!("#{}", fixture.config.toggle_id);
        assert_eq!(crate::dom::testing::count(&selector), 1);
        let toggle = fixture
            .document
            .get_element_by_id(&fixture.config.toggle_id)
            .expect("toggle mounted");
        assert_eq!(toggle.text_content().as_deref(), Some("中文"));
        assert_eq!(toggle.get_attribute("title").as_deref(), Some("切换到中文"));
    }

    #[wasm_bindgen_test]
    fn commit_splices_then_pushes_then_updates_toggle_then_unfades() {
        let fixture = fixture("switch-commit", false);
        activate_and_fade(&fixture);
        assert!(page_state(&fixture.document, &fixture.config).ends_with("faded=true"));
        deliver_sibling(&fixture);

        assert_eq!(
            *fixture.location.log.borrow(),
            vec![format!(
                "push {DESTINATION} [main=<h1>第一章</h1> toggle=中文 faded=true]"
            )]
        );
        assert_eq!(
            *fixture.published.borrow(),
            vec![format!(
                "{DESTINATION} [main=<h1>第一章</h1> toggle=English faded=false]"
            )]
        );
        assert_eq!(fixture.location.href().expect("href"), DESTINATION);
        assert_eq!(fixture.document.title(), "第一章 - 本书");
        let menu_title = fixture
            .document
            .query_selector(&fixture.config.menu_title_selector)
            .expect("valid selector")
            .expect("menu title present");
        assert_eq!(menu_title.text_content().as_deref(), Some("本书"));

        let frame = fixture
            .document
            .query_selector(&fixture.config.toc_frame_selector)
            .expect("valid selector")
            .expect("frame present");
        assert_eq!(
            frame.get_attribute("src").as_deref(),
            Some("https://site/zh/toc.html")
        );

        let switch = fixture.handle.borrow();
        assert_eq!(switch.machine.phase(), SwitchPhase::Idle);
        assert_eq!(switch.machine.current(), Locale::Secondary);
    }

    #[wasm_bindgen_test]
    fn refused_push_state_falls_back_to_navigation() {
        let fixture = fixture("switch-refused", true);
        activate_and_fade(&fixture);
        deliver_sibling(&fixture);

        assert_eq!(
            *fixture.location.log.borrow(),
            vec![
                format!("push {DESTINATION} [main=<h1>第一章</h1> toggle=中文 faded=true]"),
                format!("navigate {DESTINATION}"),
            ]
        );
        assert!(fixture.published.borrow().is_empty());
        assert_eq!(fixture.location.href().expect("href"), START);
        assert!(
            page_state(&fixture.document, &fixture.config).ends_with("toggle=中文 faded=true")
        );
        assert_eq!(
            fixture.handle.borrow().machine.phase(),
            SwitchPhase::Navigating
        );
    }

    #[wasm_bindgen_test]
    fn failed_fetch_navigates_without_touching_the_page() {
        let fixture = fixture("switch-fetch-failed", false);
        activate_and_fade(&fixture);
        dispatch(
            &fixture.handle,
            crate::fetch::FetchError::Status(404).to_event(),
        );

        assert_eq!(
            *fixture.location.log.borrow(),
            vec![format!("navigate {DESTINATION}")]
        );
        assert!(fixture.published.borrow().is_empty());
        assert_eq!(
            page_state(&fixture.document, &fixture.config),
            "main=<h1>Chapter 1</h1> toggle=中文 faded=true"
        );
    }

    #[wasm_bindgen_test]
    fn sibling_without_main_region_still_commits() {
        let fixture = fixture("switch-no-main", false);
        activate_and_fade(&fixture);
        fixture.handle.borrow_mut().fetched = Some(parse(
            "<!DOCTYPE html><html><head><title>第一章 - 本书</title></head><body></body></html>",
        ));
        dispatch(&fixture.handle, SwitchEvent::FetchSucceeded);

        assert_eq!(
            *fixture.location.log.borrow(),
            vec![format!(
                "push {DESTINATION} [main=<h1>Chapter 1</h1> toggle=中文 faded=true]"
            )]
        );
        assert_eq!(
            page_state(&fixture.document, &fixture.config),
            "main=<h1>Chapter 1</h1> toggle=English faded=false"
        );
        assert_eq!(fixture.published.borrow().len(), 1);
    }

    #[wasm_bindgen_test]
    fn popstate_reloads() {
        let fixture = fixture("switch-popstate", false);
        dispatch(&fixture.handle, SwitchEvent::HistoryPopped);
        assert_eq!(*fixture.location.log.borrow(), vec!["reload".to_owned()]);
    }
}
