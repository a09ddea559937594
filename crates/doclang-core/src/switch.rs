#![forbid(unsafe_code)]

//! Deterministic state machine behind the language toggle.
//!
//! The machine never touches the DOM. The host feeds it [`SwitchEvent`]s with
//! a monotonic timestamp and executes the [`SwitchAction`]s listed in each
//! returned [`SwitchTransition`], in order:
//!
//! ```text
//! Idle ──Activate──▶ FadingOut ──FadeElapsed──▶ Fetching ──FetchSucceeded──▶ Idle (locales flipped)
//!                                                   │
//!                                                   └──FetchFailed──▶ Navigating
//! Idle (after a commit) ──CommitFailed──▶ Navigating
//! any phase ──HistoryPopped──▶ Reloading
//! ```
//!
//! # Invariants
//!
//! 1. Current and target locale are complements at all times.
//! 2. The target URL and fragment are captured on `Activate`, before the host
//!    mutates anything, and reused verbatim for history push or navigation.
//! 3. `PushHistory` is always emitted after `SpliceDocument`.
//! 4. At most one switch is in flight: `Activate` during `FadingOut` or
//!    `Fetching` is ignored with reason `switch_in_flight`.
//! 5. `Navigating` and `Reloading` are terminal for the page.
//! 6. A commit the host could not finish ends in a navigation to the same
//!    destination, so the page never shows one locale under the other's URL.

use serde::Serialize;
use serde_json::json;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use crate::locale::{Locale, LocaleConfig, ToggleLabel};
use crate::page_url::{PageIdentity, cross_locale_url};

/// Reason recorded for events that have no effect in the current phase.
pub const IGNORED_IN_CURRENT_PHASE: &str = "ignored_in_current_phase";
/// Reason recorded for an activation while another switch is running.
pub const SWITCH_IN_FLIGHT: &str = "switch_in_flight";

/// Lifecycle phase of the switch protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Idle,
    FadingOut,
    Fetching,
    Navigating,
    Reloading,
}

impl SwitchPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FadingOut => "fading_out",
            Self::Fetching => "fetching",
            Self::Navigating => "navigating",
            Self::Reloading => "reloading",
        }
    }

    /// Whether a switch is between activation and commit.
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::FadingOut | Self::Fetching)
    }
}

/// Event classes recorded in transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchEventKind {
    Activate,
    FadeElapsed,
    FetchSucceeded,
    FetchFailed,
    CommitFailed,
    HistoryPopped,
}

impl SwitchEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::FadeElapsed => "fade_elapsed",
            Self::FetchSucceeded => "fetch_succeeded",
            Self::FetchFailed => "fetch_failed",
            Self::CommitFailed => "commit_failed",
            Self::HistoryPopped => "history_popped",
        }
    }
}

/// Input events accepted by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchEvent {
    /// The user activated the toggle while the address bar showed `href`.
    Activate { href: String },
    /// The fade delay scheduled by `ScheduleFetch` has run out.
    FadeElapsed,
    /// The sibling document was fetched and parsed; the host holds it.
    FetchSucceeded,
    /// The fetch rejected, returned a non-success status, or was unparseable.
    FetchFailed { status: Option<u16>, reason: String },
    /// An action of the last commit threw (e.g. `pushState` refused).
    CommitFailed { reason: String },
    /// The browser fired `popstate`.
    HistoryPopped,
}

impl SwitchEvent {
    #[must_use]
    pub const fn kind(&self) -> SwitchEventKind {
        match self {
            Self::Activate { .. } => SwitchEventKind::Activate,
            Self::FadeElapsed => SwitchEventKind::FadeElapsed,
            Self::FetchSucceeded => SwitchEventKind::FetchSucceeded,
            Self::FetchFailed { .. } => SwitchEventKind::FetchFailed,
            Self::CommitFailed { .. } => SwitchEventKind::CommitFailed,
            Self::HistoryPopped => SwitchEventKind::HistoryPopped,
        }
    }
}

/// Side effects the host executes, in order, after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchAction {
    /// Add the fade class to the content container.
    AddFadeClass,
    /// Deliver `FadeElapsed` after `delay_ms`.
    ScheduleFetch { delay_ms: u64, deadline_ms: u64 },
    /// Fetch and parse `url`, then deliver `FetchSucceeded` or `FetchFailed`.
    Fetch { url: String },
    /// Copy the fetched document's regions into the live page.
    SpliceDocument { target_url: String },
    /// Push a history entry without reloading.
    PushHistory { url: String },
    UpdateToggle { label: ToggleLabel },
    RemoveFadeClass,
    /// Tell subscribers the main content now belongs to `locale`.
    PublishContentReplaced { url: String, locale: Locale },
    /// Full navigation to `url`.
    Navigate { url: String },
    Reload,
}

/// Snapshot returned to host callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchSnapshot {
    pub phase: SwitchPhase,
    pub current: Locale,
    pub target: Locale,
    pub pending_url: Option<String>,
    pub pending_fragment: Option<String>,
    pub commits: u64,
}

/// Transition record and deterministic log payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchTransition {
    pub seq: u64,
    pub at_ms: u64,
    pub event: SwitchEventKind,
    pub from_phase: SwitchPhase,
    pub to_phase: SwitchPhase,
    pub current: Locale,
    pub target: Locale,
    pub target_url: Option<String>,
    pub status: Option<u16>,
    pub reason: Option<String>,
    pub actions: Vec<SwitchAction>,
}

impl SwitchTransition {
    /// Whether the event changed nothing.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.actions.is_empty() && self.from_phase == self.to_phase
    }

    /// Serialize one JSONL transition line.
    #[must_use]
    pub fn to_jsonl_line(&self, run_id: &str) -> String {
        let record = SwitchTransitionJsonl {
            schema_version: "doclang-jsonl-v1",
            event: "switch_transition",
            run_id,
            ts_ms: self.at_ms,
            transition_seq: self.seq,
            switch_event: self.event.as_str(),
            from_phase: self.from_phase.as_str(),
            to_phase: self.to_phase.as_str(),
            current_locale: self.current.as_str(),
            target_locale: self.target.as_str(),
            target_url: self.target_url.as_deref(),
            status: self.status,
            reason: self.reason.as_deref(),
            actions: &self.actions,
        };
        serde_json::to_string(&record).unwrap_or_else(|error| {
            json!({
                "schema_version": "doclang-jsonl-v1",
                "event": "switch_transition_encode_error",
                "run_id": run_id,
                "transition_seq": self.seq,
                "error": error.to_string(),
            })
            .to_string()
        })
    }
}

#[derive(Serialize)]
struct SwitchTransitionJsonl<'a> {
    schema_version: &'static str,
    event: &'static str,
    run_id: &'a str,
    ts_ms: u64,
    transition_seq: u64,
    switch_event: &'static str,
    from_phase: &'static str,
    to_phase: &'static str,
    current_locale: &'static str,
    target_locale: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    actions: &'a [SwitchAction],
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSwitch {
    target_url: String,
    fragment: String,
}

impl PendingSwitch {
    fn destination(&self) -> String {
        format!("{}{}", self.target_url, self.fragment)
    }
}

/// Language switch protocol state machine.
#[derive(Debug, Clone)]
pub struct SwitchMachine {
    locales: LocaleConfig,
    fade_ms: u64,
    current: Locale,
    phase: SwitchPhase,
    pending: Option<PendingSwitch>,
    /// The last commit, until the next activation.
    committed: Option<PendingSwitch>,
    commits: u64,
    transition_seq: u64,
    transitions: VecDeque<SwitchTransition>,
    transition_capacity: usize,
}

impl SwitchMachine {
    /// Machine for a page currently showing `current`.
    #[must_use]
    pub fn new(locales: LocaleConfig, current: Locale, fade_ms: u64, capacity: usize) -> Self {
        Self {
            locales,
            fade_ms,
            current,
            phase: SwitchPhase::Idle,
            pending: None,
            committed: None,
            commits: 0,
            transition_seq: 0,
            transitions: VecDeque::new(),
            transition_capacity: capacity.max(1),
        }
    }

    /// Machine whose initial locale is read from the page path.
    #[must_use]
    pub fn for_path(locales: LocaleConfig, path: &str, fade_ms: u64, capacity: usize) -> Self {
        let current = locales.locale_for_switch(path);
        Self::new(locales, current, fade_ms, capacity)
    }

    #[must_use]
    pub const fn phase(&self) -> SwitchPhase {
        self.phase
    }

    #[must_use]
    pub const fn current(&self) -> Locale {
        self.current
    }

    #[must_use]
    pub const fn target(&self) -> Locale {
        self.current.complement()
    }

    /// Toggle text for the current state.
    #[must_use]
    pub fn toggle_label(&self) -> ToggleLabel {
        ToggleLabel::for_current(self.current, &self.locales)
    }

    /// URL of `href`'s sibling page in the target locale, without fragment.
    #[must_use]
    pub fn target_url(&self, href: &str) -> String {
        cross_locale_url(
            href,
            self.locales.code(self.current),
            self.locales.code(self.target()),
        )
    }

    #[must_use]
    pub fn snapshot(&self) -> SwitchSnapshot {
        SwitchSnapshot {
            phase: self.phase,
            current: self.current,
            target: self.target(),
            pending_url: self.pending.as_ref().map(|p| p.target_url.clone()),
            pending_fragment: self.pending.as_ref().map(|p| p.fragment.clone()),
            commits: self.commits,
        }
    }

    pub fn handle_event(&mut self, now_ms: u64, event: SwitchEvent) -> SwitchTransition {
        match event {
            SwitchEvent::Activate { href } => self.on_activate(now_ms, &href),
            SwitchEvent::FadeElapsed => self.on_fade_elapsed(now_ms),
            SwitchEvent::FetchSucceeded => self.on_fetch_succeeded(now_ms),
            SwitchEvent::FetchFailed { status, reason } => {
                self.on_fetch_failed(now_ms, status, reason)
            }
            SwitchEvent::CommitFailed { reason } => self.on_commit_failed(now_ms, &reason),
            SwitchEvent::HistoryPopped => self.on_history_popped(now_ms),
        }
    }

    #[must_use]
    pub fn drain_transitions(&mut self) -> Vec<SwitchTransition> {
        self.transitions.drain(..).collect()
    }

    #[must_use]
    pub fn drain_transition_jsonl(&mut self, run_id: &str) -> Vec<String> {
        self.drain_transitions()
            .into_iter()
            .map(|transition| transition.to_jsonl_line(run_id))
            .collect()
    }

    fn on_activate(&mut self, now_ms: u64, href: &str) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();
        let mut reason = None;

        match self.phase {
            SwitchPhase::Idle => {
                let identity = PageIdentity::from_href(href, &self.locales);
                let target_url = self.target_url(href);
                debug!(
                    path = %identity.path,
                    fragment = %identity.fragment,
                    target_url = %target_url,
                    "language switch activated"
                );
                self.pending = Some(PendingSwitch {
                    target_url,
                    fragment: identity.fragment,
                });
                self.committed = None;
                self.phase = SwitchPhase::FadingOut;
                actions.push(SwitchAction::AddFadeClass);
                actions.push(SwitchAction::ScheduleFetch {
                    delay_ms: self.fade_ms,
                    deadline_ms: now_ms.saturating_add(self.fade_ms),
                });
            }
            SwitchPhase::FadingOut | SwitchPhase::Fetching => {
                reason = Some(SWITCH_IN_FLIGHT.to_owned());
            }
            SwitchPhase::Navigating | SwitchPhase::Reloading => {
                reason = Some(IGNORED_IN_CURRENT_PHASE.to_owned());
            }
        }

        self.record_transition(
            now_ms,
            SwitchEventKind::Activate,
            from_phase,
            None,
            reason,
            actions,
        )
    }

    fn on_fade_elapsed(&mut self, now_ms: u64) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();
        let mut reason = None;

        match (&self.pending, self.phase) {
            (Some(pending), SwitchPhase::FadingOut) => {
                self.phase = SwitchPhase::Fetching;
                actions.push(SwitchAction::Fetch {
                    url: pending.target_url.clone(),
                });
            }
            _ => reason = Some(IGNORED_IN_CURRENT_PHASE.to_owned()),
        }

        self.record_transition(
            now_ms,
            SwitchEventKind::FadeElapsed,
            from_phase,
            None,
            reason,
            actions,
        )
    }

    fn on_fetch_succeeded(&mut self, now_ms: u64) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();
        let mut reason = None;

        let committed = match self.phase {
            SwitchPhase::Fetching => self.pending.take(),
            _ => None,
        };
        match committed {
            Some(pending) => {
                self.current = self.current.complement();
                self.phase = SwitchPhase::Idle;
                self.commits = self.commits.saturating_add(1);
                info!(
                    url = %pending.destination(),
                    locale = self.current.as_str(),
                    "language switch committed"
                );
                actions.push(SwitchAction::SpliceDocument {
                    target_url: pending.target_url.clone(),
                });
                actions.push(SwitchAction::PushHistory {
                    url: pending.destination(),
                });
                actions.push(SwitchAction::UpdateToggle {
                    label: self.toggle_label(),
                });
                actions.push(SwitchAction::RemoveFadeClass);
                actions.push(SwitchAction::PublishContentReplaced {
                    url: pending.destination(),
                    locale: self.current,
                });
                self.committed = Some(pending);
            }
            None => reason = Some(IGNORED_IN_CURRENT_PHASE.to_owned()),
        }

        self.record_transition(
            now_ms,
            SwitchEventKind::FetchSucceeded,
            from_phase,
            None,
            reason,
            actions,
        )
    }

    fn on_fetch_failed(
        &mut self,
        now_ms: u64,
        status: Option<u16>,
        reason_text: String,
    ) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();

        let reason = match (&self.pending, self.phase) {
            (Some(pending), SwitchPhase::Fetching) => {
                let destination = pending.destination();
                warn!(
                    url = %destination,
                    status = ?status,
                    reason = %reason_text,
                    "in-place language switch failed; navigating"
                );
                self.phase = SwitchPhase::Navigating;
                actions.push(SwitchAction::Navigate { url: destination });
                normalize_reason(&reason_text, "fetch_failed")
            }
            _ => IGNORED_IN_CURRENT_PHASE.to_owned(),
        };

        self.record_transition(
            now_ms,
            SwitchEventKind::FetchFailed,
            from_phase,
            status,
            Some(reason),
            actions,
        )
    }

    fn on_commit_failed(&mut self, now_ms: u64, reason_text: &str) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();

        let committed = match self.phase {
            SwitchPhase::Idle => self.committed.take(),
            _ => None,
        };
        let reason = match committed {
            Some(committed) => {
                let destination = committed.destination();
                warn!(
                    url = %destination,
                    reason = %reason_text,
                    "language switch could not be committed in place; navigating"
                );
                self.phase = SwitchPhase::Navigating;
                actions.push(SwitchAction::Navigate { url: destination });
                normalize_reason(reason_text, "commit_failed")
            }
            None => IGNORED_IN_CURRENT_PHASE.to_owned(),
        };

        self.record_transition(
            now_ms,
            SwitchEventKind::CommitFailed,
            from_phase,
            None,
            Some(reason),
            actions,
        )
    }

    fn on_history_popped(&mut self, now_ms: u64) -> SwitchTransition {
        let from_phase = self.phase;
        let mut actions = Vec::new();
        let mut reason = None;

        if self.phase == SwitchPhase::Reloading {
            reason = Some(IGNORED_IN_CURRENT_PHASE.to_owned());
        } else {
            self.committed = None;
            self.phase = SwitchPhase::Reloading;
            actions.push(SwitchAction::Reload);
        }

        self.record_transition(
            now_ms,
            SwitchEventKind::HistoryPopped,
            from_phase,
            None,
            reason,
            actions,
        )
    }

    fn record_transition(
        &mut self,
        now_ms: u64,
        event: SwitchEventKind,
        from_phase: SwitchPhase,
        status: Option<u16>,
        reason: Option<String>,
        actions: Vec<SwitchAction>,
    ) -> SwitchTransition {
        self.transition_seq = self.transition_seq.saturating_add(1);
        let transition = SwitchTransition {
            seq: self.transition_seq,
            at_ms: now_ms,
            event,
            from_phase,
            to_phase: self.phase,
            current: self.current,
            target: self.target(),
            target_url: self.pending.as_ref().map(|p| p.target_url.clone()),
            status,
            reason,
            actions,
        };
        debug!(
            seq = transition.seq,
            event = event.as_str(),
            from = from_phase.as_str(),
            to = self.phase.as_str(),
            reason = transition.reason.as_deref().unwrap_or(""),
            "switch transition"
        );

        if self.transitions.len() >= self.transition_capacity {
            let _ = self.transitions.pop_front();
        }
        self.transitions.push_back(transition.clone());
        transition
    }
}

fn normalize_reason(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        fallback.to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const HREF: &str = "https://site/en/ch1.html#overview";

    fn machine() -> SwitchMachine {
        SwitchMachine::for_path(LocaleConfig::default(), "/en/ch1.html", 250, 64)
    }

    fn activate(machine: &mut SwitchMachine, now_ms: u64) -> SwitchTransition {
        machine.handle_event(
            now_ms,
            SwitchEvent::Activate {
                href: HREF.to_owned(),
            },
        )
    }

    #[test]
    fn activation_fades_then_schedules_fetch() {
        let mut machine = machine();
        let transition = activate(&mut machine, 1_000);
        assert_eq!(transition.from_phase, SwitchPhase::Idle);
        assert_eq!(transition.to_phase, SwitchPhase::FadingOut);
        assert_eq!(
            transition.actions,
            vec![
                SwitchAction::AddFadeClass,
                SwitchAction::ScheduleFetch {
                    delay_ms: 250,
                    deadline_ms: 1_250,
                },
            ]
        );
        assert_eq!(
            transition.target_url.as_deref(),
            Some("https://site/zh/ch1.html")
        );
    }

    #[test]
    fn fetch_waits_for_fade() {
        let mut machine = machine();
        let early = machine.handle_event(0, SwitchEvent::FetchSucceeded);
        assert!(early.is_ignored());

        activate(&mut machine, 0);
        let premature = machine.handle_event(10, SwitchEvent::FetchSucceeded);
        assert!(premature.is_ignored());
        assert_eq!(machine.phase(), SwitchPhase::FadingOut);

        let fetch = machine.handle_event(250, SwitchEvent::FadeElapsed);
        assert_eq!(fetch.to_phase, SwitchPhase::Fetching);
        assert_eq!(
            fetch.actions,
            vec![SwitchAction::Fetch {
                url: "https://site/zh/ch1.html".to_owned(),
            }]
        );
    }

    #[test]
    fn successful_fetch_commits_in_protocol_order() {
        let mut machine = machine();
        activate(&mut machine, 0);
        machine.handle_event(250, SwitchEvent::FadeElapsed);
        let commit = machine.handle_event(300, SwitchEvent::FetchSucceeded);

        assert_eq!(commit.to_phase, SwitchPhase::Idle);
        assert_eq!(commit.current, Locale::Secondary);
        assert_eq!(commit.target, Locale::Primary);
        assert_eq!(
            commit.actions,
            vec![
                SwitchAction::SpliceDocument {
                    target_url: "https://site/zh/ch1.html".to_owned(),
                },
                SwitchAction::PushHistory {
                    url: "https://site/zh/ch1.html#overview".to_owned(),
                },
                SwitchAction::UpdateToggle {
                    label: ToggleLabel {
                        text: "English".to_owned(),
                        title: "Switch to English".to_owned(),
                    },
                },
                SwitchAction::RemoveFadeClass,
                SwitchAction::PublishContentReplaced {
                    url: "https://site/zh/ch1.html#overview".to_owned(),
                    locale: Locale::Secondary,
                },
            ]
        );
        assert_eq!(machine.snapshot().commits, 1);
        assert_eq!(machine.snapshot().pending_url, None);
    }

    #[test]
    fn failed_fetch_navigates_with_fragment() {
        let mut machine = machine();
        activate(&mut machine, 0);
        machine.handle_event(250, SwitchEvent::FadeElapsed);
        let failed = machine.handle_event(
            400,
            SwitchEvent::FetchFailed {
                status: Some(404),
                reason: "http_status".to_owned(),
            },
        );
        assert_eq!(failed.to_phase, SwitchPhase::Navigating);
        assert_eq!(failed.status, Some(404));
        assert_eq!(
            failed.actions,
            vec![SwitchAction::Navigate {
                url: "https://site/zh/ch1.html#overview".to_owned(),
            }]
        );
        assert_eq!(machine.current(), Locale::Primary);
    }

    fn committed_machine() -> SwitchMachine {
        let mut machine = machine();
        activate(&mut machine, 0);
        machine.handle_event(250, SwitchEvent::FadeElapsed);
        machine.handle_event(300, SwitchEvent::FetchSucceeded);
        machine
    }

    #[test]
    fn commit_the_host_could_not_finish_navigates_to_the_destination() {
        let mut machine = committed_machine();
        let failed = machine.handle_event(
            301,
            SwitchEvent::CommitFailed {
                reason: "SecurityError: pushState rate limit".to_owned(),
            },
        );
        assert_eq!(failed.from_phase, SwitchPhase::Idle);
        assert_eq!(failed.to_phase, SwitchPhase::Navigating);
        assert_eq!(
            failed.actions,
            vec![SwitchAction::Navigate {
                url: "https://site/zh/ch1.html#overview".to_owned(),
            }]
        );
        assert_eq!(
            failed.reason.as_deref(),
            Some("SecurityError: pushState rate limit")
        );

        let again = machine.handle_event(
            302,
            SwitchEvent::CommitFailed {
                reason: String::new(),
            },
        );
        assert!(again.is_ignored());
    }

    #[test]
    fn commit_failure_without_a_commit_is_ignored() {
        let mut fresh = machine();
        let ignored = fresh.handle_event(
            0,
            SwitchEvent::CommitFailed {
                reason: String::new(),
            },
        );
        assert!(ignored.is_ignored());
        assert_eq!(ignored.reason.as_deref(), Some(IGNORED_IN_CURRENT_PHASE));

        // A new activation supersedes the previous commit.
        let mut machine = committed_machine();
        machine.handle_event(
            1_000,
            SwitchEvent::Activate {
                href: "https://site/zh/ch1.html#overview".to_owned(),
            },
        );
        let stale = machine.handle_event(
            1_001,
            SwitchEvent::CommitFailed {
                reason: String::new(),
            },
        );
        assert!(stale.is_ignored());
        assert_eq!(machine.phase(), SwitchPhase::FadingOut);
    }

    #[test]
    fn blank_commit_failure_reason_is_normalized() {
        let mut machine = committed_machine();
        let failed = machine.handle_event(
            301,
            SwitchEvent::CommitFailed {
                reason: " ".to_owned(),
            },
        );
        assert_eq!(failed.reason.as_deref(), Some("commit_failed"));
        let line = failed.to_jsonl_line("run-2");
        let parsed: Value = serde_json::from_str(&line).expect("transition line should parse");
        assert_eq!(parsed["switch_event"], "commit_failed");
        assert_eq!(parsed["actions"][0]["kind"], "navigate");
    }

    #[test]
    fn blank_failure_reason_is_normalized() {
        let mut machine = machine();
        activate(&mut machine, 0);
        machine.handle_event(250, SwitchEvent::FadeElapsed);
        let failed = machine.handle_event(
            260,
            SwitchEvent::FetchFailed {
                status: None,
                reason: "  ".to_owned(),
            },
        );
        assert_eq!(failed.reason.as_deref(), Some("fetch_failed"));
    }

    #[test]
    fn second_activation_while_in_flight_is_ignored() {
        let mut machine = machine();
        activate(&mut machine, 0);
        let during_fade = activate(&mut machine, 100);
        assert!(during_fade.is_ignored());
        assert_eq!(during_fade.reason.as_deref(), Some(SWITCH_IN_FLIGHT));

        machine.handle_event(250, SwitchEvent::FadeElapsed);
        let during_fetch = activate(&mut machine, 260);
        assert!(during_fetch.is_ignored());
        assert_eq!(machine.phase(), SwitchPhase::Fetching);
    }

    #[test]
    fn repeated_switches_toggle_between_locales() {
        let mut machine = machine();
        let mut href = HREF.to_owned();
        for round in 0..4_u64 {
            let base = round * 1_000;
            machine.handle_event(base, SwitchEvent::Activate { href: href.clone() });
            machine.handle_event(base + 250, SwitchEvent::FadeElapsed);
            let commit = machine.handle_event(base + 300, SwitchEvent::FetchSucceeded);
            href = commit
                .actions
                .iter()
                .find_map(|action| match action {
                    SwitchAction::PushHistory { url } => Some(url.clone()),
                    _ => None,
                })
                .expect("commit pushes history");
        }
        assert_eq!(machine.current(), Locale::Primary);
        assert_eq!(href, HREF);
        assert_eq!(machine.snapshot().commits, 4);
    }

    #[test]
    fn popstate_reloads_from_any_phase() {
        let mut idle = machine();
        let popped = idle.handle_event(0, SwitchEvent::HistoryPopped);
        assert_eq!(popped.actions, vec![SwitchAction::Reload]);
        assert_eq!(popped.to_phase, SwitchPhase::Reloading);

        let again = idle.handle_event(1, SwitchEvent::HistoryPopped);
        assert!(again.is_ignored());

        let mut fetching = machine();
        activate(&mut fetching, 0);
        fetching.handle_event(250, SwitchEvent::FadeElapsed);
        let popped = fetching.handle_event(260, SwitchEvent::HistoryPopped);
        assert_eq!(popped.actions, vec![SwitchAction::Reload]);

        let late = fetching.handle_event(300, SwitchEvent::FetchSucceeded);
        assert!(late.is_ignored());
    }

    #[test]
    fn unmarked_url_targets_itself() {
        let mut machine =
            SwitchMachine::for_path(LocaleConfig::default(), "/book/ch1.html", 250, 8);
        let transition = machine.handle_event(
            0,
            SwitchEvent::Activate {
                href: "https://site/book/ch1.html#a".to_owned(),
            },
        );
        assert_eq!(
            transition.target_url.as_deref(),
            Some("https://site/book/ch1.html")
        );
    }

    #[test]
    fn transition_log_is_bounded() {
        let mut machine = SwitchMachine::new(LocaleConfig::default(), Locale::Primary, 250, 4);
        for now in 0..10 {
            machine.handle_event(now, SwitchEvent::FadeElapsed);
        }
        let drained = machine.drain_transitions();
        assert_eq!(drained.len(), 4);
        assert_eq!(drained[0].seq, 7);
        assert!(machine.drain_transitions().is_empty());
    }

    #[test]
    fn transition_jsonl_contains_required_fields() {
        let mut machine = machine();
        let transition = activate(&mut machine, 42);
        let line = transition.to_jsonl_line("run-1");
        let parsed: Value = serde_json::from_str(&line).expect("transition line should parse");

        assert_eq!(parsed["schema_version"], "doclang-jsonl-v1");
        assert_eq!(parsed["event"], "switch_transition");
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["ts_ms"], 42);
        assert_eq!(parsed["switch_event"], "activate");
        assert_eq!(parsed["from_phase"], "idle");
        assert_eq!(parsed["to_phase"], "fading_out");
        assert_eq!(parsed["current_locale"], "primary");
        assert_eq!(parsed["actions"][0]["kind"], "add_fade_class");
        assert_eq!(parsed["actions"][1]["deadline_ms"], 292);
    }
}
