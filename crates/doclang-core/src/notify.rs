#![forbid(unsafe_code)]

//! "Content replaced" notifications from the switch to anyone interested.
//!
//! The publisher does not know who listens. Subscribers are held as weak
//! references and dropped lazily once their [`Subscription`] guard is gone.
//!
//! # Failure Modes
//!
//! - **Re-entrant publish**: a subscriber may publish again; the callback list
//!   is snapshotted before delivery, so nested publishes reach the same set.
//! - **Subscriber leak**: guards stored indefinitely keep callbacks alive.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::locale::Locale;

/// The main content region now shows `url` in `locale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReplaced {
    /// Monotonic per channel, starting at 1.
    pub seq: u64,
    pub url: String,
    pub locale: Locale,
}

type CallbackRc = Rc<dyn Fn(&ContentReplaced)>;
type CallbackWeak = Weak<dyn Fn(&ContentReplaced)>;

struct ChannelInner {
    seq: u64,
    subscribers: Vec<CallbackWeak>,
}

/// Single-threaded broadcast channel for [`ContentReplaced`].
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct ContentChannel {
    inner: Rc<RefCell<ChannelInner>>,
}

impl Default for ContentChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ContentChannel")
            .field("seq", &inner.seq)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl ContentChannel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                seq: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register `callback`. It stays registered while the returned guard lives.
    pub fn subscribe(&self, callback: impl Fn(&ContentReplaced) + 'static) -> Subscription {
        let strong: CallbackRc = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription { _guard: strong }
    }

    /// Deliver a notification to live subscribers in registration order.
    /// Returns how many received it.
    pub fn publish(&self, url: impl Into<String>, locale: Locale) -> usize {
        let (event, callbacks) = {
            let mut inner = self.inner.borrow_mut();
            inner.seq = inner.seq.saturating_add(1);
            inner.subscribers.retain(|weak| weak.strong_count() > 0);
            let callbacks: Vec<CallbackRc> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            let event = ContentReplaced {
                seq: inner.seq,
                url: url.into(),
                locale,
            };
            (event, callbacks)
        };
        for callback in &callbacks {
            callback(&event);
        }
        callbacks.len()
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

/// RAII guard: dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    _guard: CallbackRc,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
