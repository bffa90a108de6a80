//! In-memory page and channel used by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use passkey_shim::codec::encode_bytes;
use passkey_shim::platform::sleep;
use passkey_shim::wire::{AssertCredentialResult, CreateCredentialResult};
use passkey_shim::{
    AbortSignal, Channel, ChannelError, CredentialCreationOptions, CredentialRequestOptions,
    Credentials, CredentialsContainer, DocumentInfo, Envelope, Mediation, Page, PublicKeyCredential,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialPolyfill,
    PublicKeyCredentialRequestOptions, Shim, ShimError, TopWindow, TopWindowInaccessible,
};
use tokio::sync::{Notify, mpsc};

#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Delegated(PublicKeyCredential),
    Native(&'static str),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error(transparent)]
    Shim(ShimError),
    #[error("native API rejected with {0}")]
    Native(&'static str),
}

impl From<PublicKeyCredential> for Credential {
    fn from(credential: PublicKeyCredential) -> Self {
        Credential::Delegated(credential)
    }
}

impl From<ShimError> for Rejection {
    fn from(error: ShimError) -> Self {
        Rejection::Shim(error)
    }
}

/// How the page's own `create`/`get` behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Native {
    Resolve,
    Reject,
    ResolveAfter(Duration),
    /// Settles only once its signal is aborted, rejecting with `AbortError`.
    UntilAborted,
}

pub struct NativeCredentials {
    behavior: Native,
    pub calls: Mutex<Vec<&'static str>>,
    pub signals: Mutex<Vec<Option<AbortSignal>>>,
}

impl NativeCredentials {
    pub fn new(behavior: Native) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::default(),
            signals: Mutex::default(),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn respond(
        &self,
        call: &'static str,
        signal: Option<AbortSignal>,
    ) -> Result<Credential, Rejection> {
        self.calls.lock().push(call);
        self.signals.lock().push(signal.clone());
        match self.behavior {
            Native::Resolve => Ok(Credential::Native(call)),
            Native::Reject => Err(Rejection::Native("NotAllowedError")),
            Native::ResolveAfter(delay) => {
                sleep(delay).await;
                Ok(Credential::Native(call))
            }
            Native::UntilAborted => {
                match signal {
                    Some(signal) => signal.cancelled().await,
                    None => std::future::pending().await,
                }
                Err(Rejection::Native("AbortError"))
            }
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl CredentialsContainer<FakePage> for NativeCredentials {
    async fn create(&self, options: CredentialCreationOptions) -> Result<Credential, Rejection> {
        self.respond("create", options.signal).await
    }

    async fn get(&self, options: CredentialRequestOptions) -> Result<Credential, Rejection> {
        self.respond("get", options.signal).await
    }
}

#[derive(Default)]
pub struct FakeWindow {
    pub focused: AtomicBool,
    pub cross_origin: AtomicBool,
    pub focus: Notify,
}

impl FakeWindow {
    pub fn focus(&self) {
        self.focused.store(true, Ordering::SeqCst);
        self.focus.notify_waiters();
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl TopWindow for FakeWindow {
    fn has_focus(&self) -> Result<bool, TopWindowInaccessible> {
        if self.cross_origin.load(Ordering::SeqCst) {
            return Err(TopWindowInaccessible);
        }
        Ok(self.focused.load(Ordering::SeqCst))
    }

    async fn focused(&self) {
        self.focus.notified().await
    }
}

/// Stands in for the global `PublicKeyCredential`.
#[derive(Debug, PartialEq, Eq)]
pub enum Class {
    Native { platform_authenticator: bool },
    Polyfill,
}

#[derive(Clone)]
pub struct Bindings {
    credentials: Option<Credentials<FakePage>>,
    class: Option<Arc<Class>>,
}

pub struct FakePage {
    pub document: DocumentInfo,
    pub window: FakeWindow,
    pub credentials: Mutex<Option<Credentials<FakePage>>>,
    pub class: Mutex<Option<Arc<Class>>>,
    pub polyfills: Mutex<Vec<PublicKeyCredentialPolyfill>>,
}

impl FakePage {
    /// A secure page whose native API behaves as `native`.
    pub fn new(native: &Arc<NativeCredentials>, platform_authenticator: bool) -> Self {
        let credentials: Credentials<FakePage> = native.clone();
        Self {
            document: DocumentInfo {
                content_type: "text/html".into(),
                protocol: "https:".into(),
                hostname: "example.com".into(),
            },
            window: FakeWindow {
                focused: AtomicBool::new(true),
                ..Default::default()
            },
            credentials: Mutex::new(Some(credentials)),
            class: Mutex::new(Some(Arc::new(Class::Native {
                platform_authenticator,
            }))),
            polyfills: Mutex::default(),
        }
    }

    /// A secure page without any WebAuthn support.
    pub fn without_webauthn() -> Self {
        Self {
            credentials: Mutex::new(None),
            class: Mutex::new(None),
            ..Self::new(&NativeCredentials::new(Native::Resolve), false)
        }
    }

    pub fn current(&self) -> Option<Credentials<FakePage>> {
        self.credentials.lock().clone()
    }

    /// `navigator.credentials.create(options)`
    pub async fn create(&self, options: CredentialCreationOptions) -> Result<Credential, Rejection> {
        let credentials = self.current().ok_or(Rejection::Native("TypeError"))?;
        credentials.create(options).await
    }

    /// `navigator.credentials.get(options)`
    pub async fn get(&self, options: CredentialRequestOptions) -> Result<Credential, Rejection> {
        let credentials = self.current().ok_or(Rejection::Native("TypeError"))?;
        credentials.get(options).await
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Page for FakePage {
    type CreationOptions = CredentialCreationOptions;
    type RequestOptions = CredentialRequestOptions;
    type Credential = Credential;
    type Error = Rejection;
    type Window = FakeWindow;
    type Bindings = Bindings;

    fn document(&self) -> DocumentInfo {
        self.document.clone()
    }

    fn top(&self) -> &FakeWindow {
        &self.window
    }

    fn capture(&self) -> Bindings {
        Bindings {
            credentials: self.current(),
            class: self.class.lock().clone(),
        }
    }

    fn restore(&self, bindings: &Bindings) {
        *self.credentials.lock() = bindings.credentials.clone();
        *self.class.lock() = bindings.class.clone();
    }

    fn has_public_key_credential(&self) -> bool {
        self.class.lock().is_some()
    }

    async fn is_user_verifying_platform_authenticator_available(&self) -> bool {
        matches!(
            self.class.lock().as_deref(),
            Some(Class::Native {
                platform_authenticator: true
            }) | Some(Class::Polyfill)
        )
    }

    fn polyfill_public_key_credential(&self, polyfill: PublicKeyCredentialPolyfill) {
        self.polyfills.lock().push(polyfill);
        if polyfill == PublicKeyCredentialPolyfill::Class {
            *self.class.lock() = Some(Arc::new(Class::Polyfill));
        }
    }

    fn credentials(&self) -> Option<Credentials<Self>> {
        self.current()
    }

    fn set_credentials(&self, credentials: Credentials<Self>) {
        *self.credentials.lock() = Some(credentials);
    }
}

/// How the channel answers a credential request.
#[derive(Debug, Clone)]
pub enum Reply {
    Answer(Envelope),
    Fail(ChannelError),
    /// Never answers; fails with `Aborted` once the request's signal is.
    Hang,
}

pub struct FakeChannel {
    replies: Mutex<VecDeque<Reply>>,
    pub sent: Mutex<Vec<Envelope>>,
    pub signals: Mutex<Vec<Option<AbortSignal>>>,
    destroyed: AtomicUsize,
    notifier: mpsc::UnboundedSender<Envelope>,
    inbox: tokio::sync::Mutex<mpsc::UnboundedReceiver<Envelope>>,
}

impl FakeChannel {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        let (notifier, inbox) = mpsc::unbounded_channel();
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            sent: Mutex::default(),
            signals: Mutex::default(),
            destroyed: AtomicUsize::new(0),
            notifier,
            inbox: tokio::sync::Mutex::new(inbox),
        }
    }

    /// Deliver an unprompted message from the delegate.
    pub fn notify(&self, envelope: Envelope) {
        let _ = self.notifier.send(envelope);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroy_count() > 0
    }

    pub fn destroy_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Credential requests only.
    pub fn requests(&self) -> Vec<Envelope> {
        self.sent
            .lock()
            .iter()
            .filter(|envelope| !matches!(envelope, Envelope::AbortRequest { .. }))
            .cloned()
            .collect()
    }

    pub fn aborts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|envelope| match envelope {
                Envelope::AbortRequest { aborted_request_id } => Some(aborted_request_id.clone()),
                _ => None,
            })
            .collect()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Channel for FakeChannel {
    async fn request(
        &self,
        envelope: Envelope,
        signal: Option<AbortSignal>,
    ) -> Result<Envelope, ChannelError> {
        let aborting = matches!(envelope, Envelope::AbortRequest { .. });
        self.sent.lock().push(envelope.clone());
        if aborting {
            return Ok(envelope);
        }

        self.signals.lock().push(signal.clone());
        let reply = self.replies.lock().pop_front().unwrap_or(Reply::Hang);
        match reply {
            Reply::Answer(envelope) => Ok(envelope),
            Reply::Fail(error) => Err(error),
            Reply::Hang => {
                match signal {
                    Some(signal) => signal.cancelled().await,
                    None => std::future::pending().await,
                }
                Err(ChannelError::Aborted)
            }
        }
    }

    async fn notification(&self) -> Option<Envelope> {
        self.inbox.lock().await.recv().await
    }

    fn destroy(&self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

pub type TestShim = Shim<FakePage, FakeChannel>;

/// Let background tasks run.
#[cfg(not(target_arch = "wasm32"))]
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Let background tasks run. Each zero-length timer lets every queued
/// microtask, and so every task spawned so far, run first.
#[cfg(target_arch = "wasm32")]
pub async fn settle() {
    for _ in 0..4 {
        sleep(Duration::ZERO).await;
    }
}

pub fn declined() -> Reply {
    declined_with("NotAllowedError", "vault locked")
}

pub fn declined_with(name: &str, message: &str) -> Reply {
    Reply::Fail(ChannelError::Remote {
        name: name.into(),
        message: message.into(),
        fallback_requested: true,
    })
}

pub fn rejected() -> Reply {
    Reply::Fail(ChannelError::Remote {
        name: "NotAllowedError".into(),
        message: "user cancelled".into(),
        fallback_requested: false,
    })
}

pub fn creation_response() -> Reply {
    Reply::Answer(Envelope::CredentialCreationResponse {
        result: CreateCredentialResult {
            credential_id: encode_bytes(b"created"),
            client_data_json: encode_bytes(br#"{"type":"webauthn.create"}"#),
            attestation_object: encode_bytes(&[0xa3, 0x01]),
            auth_data: encode_bytes(&[7; 37]),
            public_key: encode_bytes(&[4; 91]),
            public_key_algorithm: -7,
            transports: vec!["internal".into()],
            extensions: Default::default(),
        },
    })
}

pub fn assertion_response() -> Reply {
    Reply::Answer(Envelope::CredentialGetResponse {
        result: AssertCredentialResult {
            credential_id: encode_bytes(b"asserted"),
            client_data_json: encode_bytes(br#"{"type":"webauthn.get"}"#),
            authenticator_data: encode_bytes(&[9; 37]),
            signature: encode_bytes(&[3; 70]),
            user_handle: Some(encode_bytes(b"user")),
        },
    })
}

pub fn creation_options() -> CredentialCreationOptions {
    CredentialCreationOptions {
        public_key: Some(PublicKeyCredentialCreationOptions {
            challenge: vec![1; 32],
            pub_key_cred_params: vec![passkey_shim::PublicKeyCredentialParameters {
                alg: (-7_i64).into(),
                kind: "public-key".into(),
            }],
            ..Default::default()
        }),
        signal: None,
    }
}

pub fn request_options(mediation: Option<Mediation>) -> CredentialRequestOptions {
    CredentialRequestOptions {
        public_key: Some(PublicKeyCredentialRequestOptions {
            challenge: vec![2; 32],
            rp_id: Some("example.com".into()),
            ..Default::default()
        }),
        mediation,
        signal: None,
    }
}

/// An installed shim over a secure page with native WebAuthn whose platform
/// authenticator query has completed.
pub async fn installed(
    native: &Arc<NativeCredentials>,
    replies: impl IntoIterator<Item = Reply>,
) -> anyhow::Result<TestShim> {
    let shim = Shim::new(FakePage::new(native, true), FakeChannel::new(replies));
    shim.install()?;
    settle().await;
    Ok(shim)
}
