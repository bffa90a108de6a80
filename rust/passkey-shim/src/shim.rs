//! Installing and removing the interception on a page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ShimConfig;
use crate::delegate::Channel;
use crate::error::ShimError;
use crate::fallback;
use crate::focus::FocusGate;
use crate::options::{CreationOptions, Mediation, RequestOptions};
use crate::page::{Credentials, CredentialsContainer, Page, PublicKeyCredentialPolyfill, Unsupported};
use crate::platform::detach;
use crate::race;
use crate::wire::Envelope;

/// Native capabilities detected at install time.
///
/// `native_supported` is known synchronously. The platform authenticator
/// flag is filled in once by a background query; until then it reads as
/// unsupported.
#[derive(Debug)]
pub struct ShimState {
    native_supported: bool,
    platform_authenticator: OnceLock<bool>,
}

impl ShimState {
    fn new(native_supported: bool) -> Self {
        Self {
            native_supported,
            platform_authenticator: OnceLock::new(),
        }
    }

    /// Whether the page had a `PublicKeyCredential` at install.
    pub fn native_supported(&self) -> bool {
        self.native_supported
    }

    /// `None` while the query is outstanding.
    pub fn platform_authenticator_supported(&self) -> Option<bool> {
        self.platform_authenticator.get().copied()
    }

    /// Whether a declined call may be retried natively.
    pub fn fallback_supported(&self, platform_requested: bool) -> bool {
        if platform_requested {
            self.platform_authenticator_supported().unwrap_or(false)
        } else {
            self.native_supported
        }
    }

    fn record_platform_authenticator(&self, available: bool) {
        if self.platform_authenticator.set(available).is_err() {
            tracing::warn!("Platform authenticator support already recorded");
        }
    }
}

/// A point-in-time copy of [`ShimState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Capabilities {
    pub native_supported: bool,
    pub platform_authenticator_supported: Option<bool>,
}

impl From<&ShimState> for Capabilities {
    fn from(state: &ShimState) -> Self {
        Self {
            native_supported: state.native_supported(),
            platform_authenticator_supported: state.platform_authenticator_supported(),
        }
    }
}

/// The interception shim for one page.
///
/// A `Shim` is either uninstalled or installed. While installed, the page's
/// `create`/`get` entry points route WebAuthn calls to the delegate over
/// `channel`, and everything else to the entry points captured at install.
pub struct Shim<P: Page, C: Channel> {
    inner: Arc<ShimInner<P, C>>,
}

impl<P: Page, C: Channel> Clone for Shim<P, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ShimInner<P: Page, C: Channel> {
    page: Arc<P>,
    channel: Arc<C>,
    config: ShimConfig,
    focus: Arc<FocusGate>,
    request_ids: Arc<AtomicU64>,
    installation: Mutex<Option<Installation<P>>>,
}

struct Installation<P: Page> {
    bindings: P::Bindings,
    state: Arc<ShimState>,
    teardown: CancellationToken,
}

impl<P: Page, C: Channel> Shim<P, C> {
    /// A shim for `page` with the default [`ShimConfig`]. Nothing changes
    /// on the page until [`Shim::install`].
    pub fn new(page: P, channel: C) -> Self {
        Self::with_config(page, channel, ShimConfig::default())
    }

    /// Like [`Shim::new`], with custom timings.
    pub fn with_config(page: P, channel: C, config: ShimConfig) -> Self {
        Self {
            inner: Arc::new(ShimInner {
                page: Arc::new(page),
                channel: Arc::new(channel),
                config,
                focus: Arc::new(FocusGate::new()),
                request_ids: Arc::new(AtomicU64::new(0)),
                installation: Mutex::new(None),
            }),
        }
    }

    #[allow(missing_docs)]
    pub fn page(&self) -> &P {
        &self.inner.page
    }

    #[allow(missing_docs)]
    pub fn channel(&self) -> &C {
        &self.inner.channel
    }

    #[allow(missing_docs)]
    pub fn config(&self) -> &ShimConfig {
        &self.inner.config
    }

    /// Whether the page's entry points are currently intercepted.
    pub fn is_installed(&self) -> bool {
        self.inner.installation.lock().is_some()
    }

    /// The detected capabilities, or `None` while uninstalled.
    pub fn state(&self) -> Option<Capabilities> {
        self.inner
            .installation
            .lock()
            .as_ref()
            .map(|installation| Capabilities::from(installation.state.as_ref()))
    }

    /// Take over the page's credential entry points.
    ///
    /// Does nothing when already installed. Fails with
    /// [`ShimError::Ineligible`], leaving the page untouched, on documents
    /// that are not served as HTML over https (or http from localhost).
    pub fn install(&self) -> Result<(), ShimError> {
        let inner = &self.inner;
        let mut installation = inner.installation.lock();
        if installation.is_some() {
            tracing::debug!("Shim already installed");
            return Ok(());
        }

        let document = inner.page.document();
        if !document.is_eligible() {
            tracing::debug!(
                content_type = %document.content_type,
                protocol = %document.protocol,
                "Document not eligible for interception"
            );
            return Err(ShimError::Ineligible);
        }

        let bindings = inner.page.capture();
        let state = Arc::new(ShimState::new(inner.page.has_public_key_credential()));
        let teardown = CancellationToken::new();

        if state.native_supported() {
            detach(query_platform_authenticator(
                inner.page.clone(),
                state.clone(),
                teardown.clone(),
            ));
        } else {
            tracing::debug!("No native WebAuthn; installing stand-ins");
            inner.page.set_credentials(Arc::new(Unsupported));
            inner
                .page
                .polyfill_public_key_credential(PublicKeyCredentialPolyfill::Class);
        }

        let native: Credentials<P> = match inner.page.credentials() {
            Some(credentials) => credentials,
            None => Arc::new(Unsupported),
        };
        inner.page.set_credentials(Arc::new(Interception {
            page: inner.page.clone(),
            channel: inner.channel.clone(),
            native,
            state: state.clone(),
            focus: inner.focus.clone(),
            config: inner.config,
            request_ids: inner.request_ids.clone(),
        }));

        detach(listen_for_disconnect(
            Arc::downgrade(inner),
            teardown.clone(),
        ));

        *installation = Some(Installation {
            bindings,
            state,
            teardown,
        });
        tracing::debug!("Shim installed");
        Ok(())
    }

    /// Give the page back its original entry points, settle any pending
    /// focus wait and release the channel. Does nothing while uninstalled.
    pub fn destroy(&self) {
        self.inner.destroy();
    }
}

impl<P: Page, C: Channel> ShimInner<P, C> {
    fn destroy(&self) {
        let Some(installation) = self.installation.lock().take() else {
            return;
        };

        installation.teardown.cancel();
        self.page.restore(&installation.bindings);
        self.focus.clear();
        self.channel.destroy();
        tracing::debug!("Shim destroyed");
    }
}

async fn query_platform_authenticator<P: Page>(
    page: Arc<P>,
    state: Arc<ShimState>,
    teardown: CancellationToken,
) {
    let available = page
        .is_user_verifying_platform_authenticator_available()
        .await;
    tracing::debug!("Platform authenticator available: {available}");
    state.record_platform_authenticator(available);

    if !available && !teardown.is_cancelled() {
        page.polyfill_public_key_credential(PublicKeyCredentialPolyfill::PlatformAuthenticator);
    }
}

async fn listen_for_disconnect<P: Page, C: Channel>(
    shim: Weak<ShimInner<P, C>>,
    teardown: CancellationToken,
) {
    loop {
        let Some(channel) = shim.upgrade().map(|inner| inner.channel.clone()) else {
            return;
        };

        let message = tokio::select! {
            _ = teardown.cancelled() => return,
            message = channel.notification() => message,
        };

        match message {
            Some(Envelope::DisconnectRequest) => {
                tracing::debug!("Delegate disconnected");
                if let Some(inner) = shim.upgrade() {
                    inner.destroy();
                }
                return;
            }
            Some(other) => tracing::trace!("Ignoring {} notification", other.message_type()),
            None => return,
        }
    }
}

/// The entry points installed on the page.
///
/// Holds the page strongly, so the page and its installed interception keep
/// each other alive until `destroy` puts the captured bindings back.
pub(crate) struct Interception<P: Page, C: Channel> {
    pub(crate) page: Arc<P>,
    pub(crate) channel: Arc<C>,
    pub(crate) native: Credentials<P>,
    pub(crate) state: Arc<ShimState>,
    pub(crate) focus: Arc<FocusGate>,
    pub(crate) config: ShimConfig,
    request_ids: Arc<AtomicU64>,
}

impl<P: Page, C: Channel> Interception<P, C> {
    pub(crate) fn next_request_id(&self) -> u64 {
        self.request_ids.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<P: Page, C: Channel> CredentialsContainer<P> for Interception<P, C> {
    async fn create(&self, options: P::CreationOptions) -> Result<P::Credential, P::Error> {
        if options.public_key().is_none() {
            return self.native.create(options).await;
        }
        fallback::create_credential(self, options).await
    }

    async fn get(&self, options: P::RequestOptions) -> Result<P::Credential, P::Error> {
        if options.public_key().is_none() {
            return self.native.get(options).await;
        }
        if options.mediation() == Some(Mediation::Conditional) {
            return race::conditional_get(self, options).await;
        }
        fallback::get_credential(self, options).await
    }
}
