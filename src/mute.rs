// SPDX-License-Identifier: MPL-2.0

//! Process-wide mute/unmute signal.
//!
//! Any number of senders, at most one subscriber. The channel remembers the
//! last value sent so senders can toggle it. A signal with nobody listening
//! is recorded here and reaches no session.
//!
//! The channel lives in process memory only; nothing outside the process can
//! reach it.

use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use tracing::{debug, warn};

type Handler = Arc<dyn Fn(bool) + Send + Sync>;

struct Subscriber {
    token: u64,
    handler: Handler,
}

struct Shared {
    muted: AtomicBool,
    next_token: AtomicU64,
    subscriber: Mutex<Option<Subscriber>>,
}

/// Handle to a mute channel. Cheap to clone; clones share the same channel.
#[derive(Clone)]
pub struct MuteChannel {
    shared: Arc<Shared>,
}

static GLOBAL: OnceLock<MuteChannel> = OnceLock::new();

/// Mute the active wallpaper session, if any.
pub fn mute_music() {
    MuteChannel::global().mute();
}

/// Unmute the active wallpaper session, if any.
pub fn unmute_music() {
    MuteChannel::global().unmute();
}

impl MuteChannel {
    /// Sessions open muted unless the unmute marker says otherwise, so a
    /// fresh channel reports muted.
    #[must_use]
    pub fn new() -> Self {
        Self::with_state(true)
    }

    #[must_use]
    pub fn with_state(muted: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                muted: AtomicBool::new(muted),
                next_token: AtomicU64::new(0),
                subscriber: Mutex::new(None),
            }),
        }
    }

    /// The channel shared by everything in this process.
    pub fn global() -> &'static MuteChannel {
        GLOBAL.get_or_init(MuteChannel::new)
    }

    pub fn mute(&self) {
        self.send(true);
    }

    pub fn unmute(&self) {
        self.send(false);
    }

    /// Record `muted` and deliver it to the subscriber, if there is one.
    pub fn send(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::SeqCst);

        // Call outside the lock so the handler may subscribe or send itself.
        let handler = self
            .subscriber()
            .as_ref()
            .map(|subscriber| Arc::clone(&subscriber.handler));

        match handler {
            Some(handler) => handler(muted),
            None => debug!(muted, "Mute signal recorded with no subscriber"),
        }
    }

    /// Last value sent on this channel.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.shared.muted.load(Ordering::SeqCst)
    }

    /// Register the single reader of this channel.
    ///
    /// Replaces any previous subscriber. Dropping the returned guard
    /// unsubscribes.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, handler: impl Fn(bool) + Send + Sync + 'static) -> MuteSubscription {
        let token = self.shared.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = self.subscriber().replace(Subscriber {
            token,
            handler: Arc::new(handler),
        });
        if previous.is_some() {
            warn!("Replacing existing mute subscriber");
        }

        MuteSubscription {
            shared: Arc::clone(&self.shared),
            token,
        }
    }

    /// Whether anyone is currently listening.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.subscriber().is_some()
    }

    fn subscriber(&self) -> MutexGuard<'_, Option<Subscriber>> {
        self.shared.lock_subscriber()
    }
}

impl Default for MuteChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MuteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuteChannel")
            .field("muted", &self.is_muted())
            .field("subscribed", &self.has_subscriber())
            .finish()
    }
}

impl Shared {
    fn lock_subscriber(&self) -> MutexGuard<'_, Option<Subscriber>> {
        self.subscriber
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Keeps a [`MuteChannel`] subscription alive.
#[derive(Debug)]
pub struct MuteSubscription {
    shared: Arc<Shared>,
    token: u64,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").finish_non_exhaustive()
    }
}

impl Drop for MuteSubscription {
    fn drop(&mut self) {
        let mut subscriber = self.shared.lock_subscriber();
        // A newer subscription may have replaced ours; leave it alone.
        if subscriber.as_ref().is_some_and(|s| s.token == self.token) {
            subscriber.take();
        }
    }
}
