//! Waiting for the top-level window to hold input focus.
//!
//! Some platforms refuse to run a native credential ceremony from a window
//! that is not focused, so the native fallback waits here first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::ShimError;
use crate::platform::{ConditionalSync, sleep};

/// How long to wait when the top-level window cannot be inspected.
pub const DEFAULT_FALLBACK_WAIT: Duration = Duration::from_millis(500);

/// The longest a fallback waits for focus.
pub const DEFAULT_FOCUS_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The top-level window lives in another origin and cannot be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("top-level window is not accessible")]
pub struct TopWindowInaccessible;

/// The page's top-level window.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait TopWindow: ConditionalSync {
    /// `window.top.document.hasFocus()`
    fn has_focus(&self) -> Result<bool, TopWindowInaccessible>;

    /// Resolves at the next `focus` event. Dropping the future removes the
    /// listener.
    async fn focused(&self);
}

/// Tracks the single outstanding focus wait of a shim.
#[derive(Debug, Default)]
pub struct FocusGate {
    current: Mutex<Option<Wait>>,
    next_id: AtomicU64,
}

#[derive(Debug)]
struct Wait {
    id: u64,
    cancel: CancellationToken,
}

impl FocusGate {
    /// A gate with no wait outstanding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve once `window` has focus.
    ///
    /// An inaccessible window resolves after `fallback_wait` without any real
    /// check. Otherwise the wait fails with [`ShimError::FocusTimeout`] after
    /// `timeout`, or as soon as it is superseded by a newer wait or cleared.
    pub async fn wait_for_focus<W>(
        &self,
        window: &W,
        fallback_wait: Duration,
        timeout: Duration,
    ) -> Result<(), ShimError>
    where
        W: TopWindow + ?Sized,
    {
        match window.has_focus() {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(TopWindowInaccessible) => {
                tracing::debug!("Top window inaccessible; waiting {fallback_wait:?} instead");
                sleep(fallback_wait).await;
                return Ok(());
            }
        }

        let cancel = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(previous) = self.current.lock().replace(Wait {
            id,
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }

        let outcome = tokio::select! {
            _ = window.focused() => Ok(()),
            _ = sleep(timeout) => Err(ShimError::FocusTimeout),
            _ = cancel.cancelled() => Err(ShimError::FocusTimeout),
        };

        let mut current = self.current.lock();
        if current.as_ref().is_some_and(|wait| wait.id == id) {
            *current = None;
        }

        if outcome.is_err() {
            tracing::debug!("Gave up waiting for window focus");
        }
        outcome
    }

    /// Whether a wait is outstanding.
    pub fn is_waiting(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Settle the outstanding wait, if any, with [`ShimError::FocusTimeout`].
    pub fn clear(&self) {
        if let Some(wait) = self.current.lock().take() {
            wait.cancel.cancel();
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio::sync::Notify;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Window {
        focused: AtomicBool,
        cross_origin: bool,
        focus: Notify,
        listeners: AtomicUsize,
    }

    #[async_trait]
    impl TopWindow for Window {
        fn has_focus(&self) -> Result<bool, TopWindowInaccessible> {
            if self.cross_origin {
                return Err(TopWindowInaccessible);
            }
            Ok(self.focused.load(Ordering::SeqCst))
        }

        async fn focused(&self) {
            self.listeners.fetch_add(1, Ordering::SeqCst);
            self.focus.notified().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn it_resolves_immediately_when_already_focused() -> anyhow::Result<()> {
        let window = Window {
            focused: AtomicBool::new(true),
            ..Default::default()
        };
        let gate = FocusGate::new();
        let started = Instant::now();

        gate.wait_for_focus(&window, DEFAULT_FALLBACK_WAIT, DEFAULT_FOCUS_TIMEOUT)
            .await?;

        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(window.listeners.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn it_waits_the_fallback_delay_across_origins() -> anyhow::Result<()> {
        let window = Window {
            cross_origin: true,
            ..Default::default()
        };
        let gate = FocusGate::new();
        let started = Instant::now();

        gate.wait_for_focus(&window, DEFAULT_FALLBACK_WAIT, DEFAULT_FOCUS_TIMEOUT)
            .await?;

        assert_eq!(started.elapsed(), DEFAULT_FALLBACK_WAIT);
        assert_eq!(window.listeners.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_when_focus_never_arrives() {
        let window = Window::default();
        let gate = FocusGate::new();
        let started = Instant::now();

        let outcome = gate
            .wait_for_focus(&window, DEFAULT_FALLBACK_WAIT, Duration::from_secs(3))
            .await;

        assert_eq!(outcome, Err(ShimError::FocusTimeout));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert!(!gate.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn it_resolves_on_the_focus_event() -> anyhow::Result<()> {
        let window = Arc::new(Window::default());
        let gate = Arc::new(FocusGate::new());

        let waiting = tokio::spawn({
            let window = window.clone();
            let gate = gate.clone();
            async move {
                gate.wait_for_focus(window.as_ref(), DEFAULT_FALLBACK_WAIT, DEFAULT_FOCUS_TIMEOUT)
                    .await
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(gate.is_waiting());
        window.focus.notify_waiters();

        waiting.await??;
        assert!(!gate.is_waiting());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn it_lets_only_one_wait_stand() -> anyhow::Result<()> {
        let window = Arc::new(Window::default());
        let gate = Arc::new(FocusGate::new());

        let spawn_wait = || {
            let window = window.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                gate.wait_for_focus(window.as_ref(), DEFAULT_FALLBACK_WAIT, DEFAULT_FOCUS_TIMEOUT)
                    .await
            })
        };

        let first = spawn_wait();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = spawn_wait();

        assert_eq!(first.await?, Err(ShimError::FocusTimeout));
        assert!(gate.is_waiting());

        gate.clear();
        assert_eq!(second.await?, Err(ShimError::FocusTimeout));
        assert!(!gate.is_waiting());
        Ok(())
    }
}
