//! Page-facing credential options.
//!
//! These mirror the `CredentialCreationOptions` / `CredentialRequestOptions`
//! dictionaries a page hands to `navigator.credentials`. Binary members are
//! held as raw bytes; the [`codec`](crate::codec) turns them into wire text.
//!
//! Page bindings may wrap the original option object (so the native API can
//! be called with it untouched). They do so by implementing
//! [`CreationOptions`] and [`RequestOptions`], which expose the decoded view
//! the shim needs.

use tokio_util::sync::CancellationToken;

use crate::platform::{ConditionalSend, ConditionalSync};

/// The cancellation signal that accompanies a page call (the page's
/// `AbortSignal`). Cancelling a parent token cancels every child token
/// derived from it.
pub type AbortSignal = CancellationToken;

/// The authenticator attachment value that requests a platform authenticator.
pub const PLATFORM_ATTACHMENT: &str = "platform";

/// A `navigator.credentials.create()` argument, as seen by the shim.
pub trait CreationOptions: Clone + ConditionalSend + ConditionalSync + 'static {
    /// The `publicKey` member, if this is a WebAuthn call.
    fn public_key(&self) -> Option<&PublicKeyCredentialCreationOptions>;
    /// The caller's abort signal.
    fn signal(&self) -> Option<&AbortSignal>;
}

/// A `navigator.credentials.get()` argument, as seen by the shim.
pub trait RequestOptions: Clone + ConditionalSend + ConditionalSync + 'static {
    /// The `publicKey` member, if this is a WebAuthn call.
    fn public_key(&self) -> Option<&PublicKeyCredentialRequestOptions>;
    /// The requested mediation mode.
    fn mediation(&self) -> Option<Mediation>;
    /// The caller's abort signal.
    fn signal(&self) -> Option<&AbortSignal>;
    /// A copy of these options that carries `signal` in place of the caller's.
    fn with_signal(&self, signal: AbortSignal) -> Self;
}

/// Plain `navigator.credentials.create()` options.
#[derive(Debug, Clone, Default)]
pub struct CredentialCreationOptions {
    /// Present on WebAuthn calls.
    pub public_key: Option<PublicKeyCredentialCreationOptions>,
    /// The caller's abort signal.
    pub signal: Option<AbortSignal>,
}

impl CreationOptions for CredentialCreationOptions {
    fn public_key(&self) -> Option<&PublicKeyCredentialCreationOptions> {
        self.public_key.as_ref()
    }

    fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }
}

/// The `publicKey` member of a creation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicKeyCredentialCreationOptions {
    /// Attestation conveyance preference.
    pub attestation: Option<String>,
    /// Authenticator requirements.
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    /// The relying party's challenge.
    pub challenge: Vec<u8>,
    /// Credentials that must not be created again.
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    /// Extension inputs.
    pub extensions: Option<AuthenticationExtensionsClientInputs>,
    /// Acceptable algorithms, in order of preference.
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,
    /// The relying party.
    pub rp: PublicKeyCredentialRpEntity,
    /// The account.
    pub user: PublicKeyCredentialUserEntity,
    /// Timeout hint in milliseconds.
    pub timeout: Option<u64>,
}

impl PublicKeyCredentialCreationOptions {
    /// True when the relying party explicitly asked for a platform
    /// authenticator.
    pub fn requests_platform_authenticator(&self) -> bool {
        self.authenticator_selection
            .as_ref()
            .and_then(|selection| selection.authenticator_attachment.as_deref())
            == Some(PLATFORM_ATTACHMENT)
    }
}

/// `authenticatorSelection`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticatorSelectionCriteria {
    /// `"platform"` or `"cross-platform"`.
    pub authenticator_attachment: Option<String>,
    /// Legacy form of `resident_key`.
    pub require_resident_key: Option<bool>,
    /// Discoverable credential requirement.
    pub resident_key: Option<String>,
    /// User verification requirement.
    pub user_verification: Option<String>,
}

/// A reference to an existing credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    /// The raw credential id.
    pub id: Vec<u8>,
    /// Transport hints.
    pub transports: Option<Vec<String>>,
    /// The `type` member.
    pub kind: String,
}

impl PublicKeyCredentialDescriptor {
    /// A `"public-key"` descriptor for `id`.
    pub fn public_key(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            transports: None,
            kind: "public-key".into(),
        }
    }
}

/// The extension inputs the shim forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthenticationExtensionsClientInputs {
    /// `credProps`.
    pub cred_props: Option<bool>,
}

/// One entry of `pubKeyCredParams`.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicKeyCredentialParameters {
    /// The algorithm, as the page gave it.
    pub alg: Algorithm,
    /// The `type` member.
    pub kind: String,
}

/// A COSE algorithm identifier as the page supplied it.
///
/// Some relying parties (KeycloakJS among them) send the identifier as a
/// numeric string, so both shapes are accepted here and normalized by the
/// codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Algorithm {
    /// A JavaScript number.
    Number(f64),
    /// A string, possibly holding a number.
    Text(String),
}

impl Algorithm {
    /// The integer identifier, or `None` when the value is not an integer.
    pub fn to_cose(&self) -> Option<i64> {
        match self {
            Algorithm::Number(value) => integral(*value),
            Algorithm::Text(text) => text.trim().parse::<i64>().ok(),
        }
    }
}

impl From<i64> for Algorithm {
    fn from(value: i64) -> Self {
        Algorithm::Number(value as f64)
    }
}

impl From<&str> for Algorithm {
    fn from(value: &str) -> Self {
        Algorithm::Text(value.to_owned())
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// The relying party.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKeyCredentialRpEntity {
    /// The RP ID. Defaults to the page's effective domain.
    pub id: Option<String>,
    /// Human readable name.
    pub name: String,
}

/// The account a credential is created for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle.
    pub id: Vec<u8>,
    /// Name shown to the user.
    pub display_name: String,
    /// Account name, usually an email address or username.
    pub name: String,
}

/// Plain `navigator.credentials.get()` options.
#[derive(Debug, Clone, Default)]
pub struct CredentialRequestOptions {
    /// Present on WebAuthn calls.
    pub public_key: Option<PublicKeyCredentialRequestOptions>,
    /// The mediation mode.
    pub mediation: Option<Mediation>,
    /// The caller's abort signal.
    pub signal: Option<AbortSignal>,
}

impl RequestOptions for CredentialRequestOptions {
    fn public_key(&self) -> Option<&PublicKeyCredentialRequestOptions> {
        self.public_key.as_ref()
    }

    fn mediation(&self) -> Option<Mediation> {
        self.mediation
    }

    fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }

    fn with_signal(&self, signal: AbortSignal) -> Self {
        Self {
            signal: Some(signal),
            ..self.clone()
        }
    }
}

/// The `publicKey` member of a retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicKeyCredentialRequestOptions {
    /// Acceptable credentials. Absent means any.
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,
    /// The relying party's challenge.
    pub challenge: Vec<u8>,
    /// The RP ID.
    pub rp_id: Option<String>,
    /// User verification requirement.
    pub user_verification: Option<String>,
    /// Timeout hint in milliseconds.
    pub timeout: Option<u64>,
}

/// How the user agent should involve the user in a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mediation {
    /// No user interaction at all.
    Silent,
    /// Interaction only if needed.
    Optional,
    /// Offered passively, for example through autofill.
    Conditional,
    /// Always ask.
    Required,
}

impl Mediation {
    /// Parse the dictionary value, returning `None` for unknown modes.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "silent" => Some(Mediation::Silent),
            "optional" => Some(Mediation::Optional),
            "conditional" => Some(Mediation::Conditional),
            "required" => Some(Mediation::Required),
            _ => None,
        }
    }

    /// The dictionary value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mediation::Silent => "silent",
            Mediation::Optional => "optional",
            Mediation::Conditional => "conditional",
            Mediation::Required => "required",
        }
    }
}
