//! The page context the shim is installed into.
//!
//! A [`Page`] owns the page's credential globals: the `create`/`get` entry
//! points of `navigator.credentials` and the `PublicKeyCredential` class.
//! Only the shim's install and destroy operations rebind them.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credential::PublicKeyCredential;
use crate::error::ShimError;
use crate::focus::TopWindow;
use crate::options::{CreationOptions, RequestOptions};
use crate::platform::{ConditionalSend, ConditionalSync};

/// The page's `create`/`get` entry points, bound to their receiver.
pub type Credentials<P> = Arc<dyn CredentialsContainer<P>>;

/// `navigator.credentials`, reduced to the two calls the shim replaces.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait CredentialsContainer<P: Page>: ConditionalSync {
    /// `navigator.credentials.create(options)`
    async fn create(&self, options: P::CreationOptions) -> Result<P::Credential, P::Error>;
    /// `navigator.credentials.get(options)`
    async fn get(&self, options: P::RequestOptions) -> Result<P::Credential, P::Error>;
}

/// A stand-in for a page whose platform has no native credential API. Both
/// calls fail with [`ShimError::NotSupported`], so the native fallback path is
/// safe to take.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unsupported;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<P: Page> CredentialsContainer<P> for Unsupported {
    async fn create(&self, _options: P::CreationOptions) -> Result<P::Credential, P::Error> {
        Err(ShimError::NotSupported.into())
    }

    async fn get(&self, _options: P::RequestOptions) -> Result<P::Credential, P::Error> {
        Err(ShimError::NotSupported.into())
    }
}

/// Stand-ins the shim asks the page to put in place of `PublicKeyCredential`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyCredentialPolyfill {
    /// Replace the whole class (and `AuthenticatorAttestationResponse`) with
    /// stand-ins whose `isUserVerifyingPlatformAuthenticatorAvailable()`
    /// resolves to `true`.
    Class,
    /// Keep the native class but make its availability query resolve to
    /// `true`.
    PlatformAuthenticator,
}

/// Facts about the document that decide whether the shim runs at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    /// `document.contentType`
    pub content_type: String,
    /// The URL scheme including the trailing colon, e.g. `"https:"`.
    pub protocol: String,
    /// `location.hostname`
    pub hostname: String,
}

impl DocumentInfo {
    /// HTML documents served over https, or over http from localhost.
    pub fn is_eligible(&self) -> bool {
        self.content_type == "text/html"
            && (self.protocol == "https:"
                || (self.protocol == "http:" && self.hostname == "localhost"))
    }
}

/// A page execution context.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Page: Sized + ConditionalSync + 'static {
    /// What `create` is called with.
    type CreationOptions: CreationOptions;
    /// What `get` is called with.
    type RequestOptions: RequestOptions;
    /// What the entry points resolve with. Delegated credentials are turned
    /// into this type, which is where they acquire the native identity.
    type Credential: From<PublicKeyCredential> + ConditionalSend + 'static;
    /// What the entry points reject with.
    type Error: From<ShimError> + ConditionalSend + 'static;
    /// `window.top`
    type Window: TopWindow;
    /// An opaque snapshot of the credential globals.
    type Bindings: ConditionalSend + ConditionalSync + 'static;

    /// The loaded document.
    fn document(&self) -> DocumentInfo;

    /// The top-level window, for focus checks.
    fn top(&self) -> &Self::Window;

    /// Snapshot the credential globals exactly as they are now.
    fn capture(&self) -> Self::Bindings;

    /// Put back a snapshot taken by [`Page::capture`]. Must not fail; a
    /// binding that cannot be restored is skipped.
    fn restore(&self, bindings: &Self::Bindings);

    /// Whether the page has a native `PublicKeyCredential`.
    fn has_public_key_credential(&self) -> bool;

    /// `PublicKeyCredential.isUserVerifyingPlatformAuthenticatorAvailable()`
    async fn is_user_verifying_platform_authenticator_available(&self) -> bool;

    /// Put `polyfill` in place. Undone by [`Page::restore`].
    fn polyfill_public_key_credential(&self, polyfill: PublicKeyCredentialPolyfill);

    /// The current entry points, or `None` when `navigator.credentials` is
    /// absent.
    fn credentials(&self) -> Option<Credentials<Self>>;

    /// Replace the entry points.
    fn set_credentials(&self, credentials: Credentials<Self>);
}
