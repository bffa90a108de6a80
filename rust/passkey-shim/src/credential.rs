//! Credentials produced by the delegate, in page-facing form.
//!
//! A [`PublicKeyCredential`] crosses back into the page in place of a native
//! credential. Page bindings MUST present it with the native type identity
//! (`PublicKeyCredential`, and `AuthenticatorAttestationResponse` or
//! `AuthenticatorAssertionResponse` for its response) so that identity
//! checks made by page scripts succeed.

use serde::Serialize;
use serde_json::{Value, json};

use crate::codec::encode_bytes;
use crate::options::PLATFORM_ATTACHMENT;
use crate::wire::CredProps;

/// The `type` every credential produced here carries.
pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

/// A credential the delegate created or asserted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyCredential {
    pub(crate) id: String,
    pub(crate) raw_id: Vec<u8>,
    pub(crate) response: AuthenticatorResponse,
    pub(crate) extensions: ClientExtensionResults,
}

impl PublicKeyCredential {
    /// The base64url credential id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The credential id as bytes.
    pub fn raw_id(&self) -> &[u8] {
        &self.raw_id
    }

    /// Always [`PUBLIC_KEY_CREDENTIAL_TYPE`].
    pub fn kind(&self) -> &'static str {
        PUBLIC_KEY_CREDENTIAL_TYPE
    }

    /// Delegated credentials always report a platform attachment.
    pub fn authenticator_attachment(&self) -> &'static str {
        PLATFORM_ATTACHMENT
    }

    /// `response`
    pub fn response(&self) -> &AuthenticatorResponse {
        &self.response
    }

    /// `getClientExtensionResults()`
    pub fn client_extension_results(&self) -> &ClientExtensionResults {
        &self.extensions
    }

    /// The `RegistrationResponseJSON` or `AuthenticationResponseJSON` form
    /// of this credential, as `PublicKeyCredential.toJSON()` returns it.
    pub fn to_json(&self) -> Value {
        let response = match &self.response {
            AuthenticatorResponse::Attestation(attestation) => json!({
                "clientDataJSON": encode_bytes(&attestation.client_data_json),
                "attestationObject": encode_bytes(&attestation.attestation_object),
                "authenticatorData": encode_bytes(&attestation.authenticator_data),
                "publicKey": encode_bytes(&attestation.public_key),
                "publicKeyAlgorithm": attestation.public_key_algorithm,
                "transports": attestation.transports,
            }),
            AuthenticatorResponse::Assertion(assertion) => {
                let mut response = json!({
                    "clientDataJSON": encode_bytes(&assertion.client_data_json),
                    "authenticatorData": encode_bytes(&assertion.authenticator_data),
                    "signature": encode_bytes(&assertion.signature),
                });
                if let Some(user_handle) = &assertion.user_handle {
                    response["userHandle"] = Value::String(encode_bytes(user_handle));
                }
                response
            }
        };

        json!({
            "id": self.id,
            "rawId": encode_bytes(&self.raw_id),
            "type": PUBLIC_KEY_CREDENTIAL_TYPE,
            "authenticatorAttachment": PLATFORM_ATTACHMENT,
            "response": response,
            "clientExtensionResults": self.extensions,
        })
    }
}

/// The `response` of a [`PublicKeyCredential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticatorResponse {
    /// From a creation.
    Attestation(AuthenticatorAttestationResponse),
    /// From a retrieval.
    Assertion(AuthenticatorAssertionResponse),
}

impl AuthenticatorResponse {
    /// `clientDataJSON`
    pub fn client_data_json(&self) -> &[u8] {
        match self {
            AuthenticatorResponse::Attestation(attestation) => &attestation.client_data_json,
            AuthenticatorResponse::Assertion(assertion) => &assertion.client_data_json,
        }
    }

    /// The authenticator data, whichever kind of response this is.
    pub fn authenticator_data(&self) -> &[u8] {
        match self {
            AuthenticatorResponse::Attestation(attestation) => &attestation.authenticator_data,
            AuthenticatorResponse::Assertion(assertion) => &assertion.authenticator_data,
        }
    }
}

/// The response half of a newly created credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorAttestationResponse {
    pub(crate) client_data_json: Vec<u8>,
    pub(crate) attestation_object: Vec<u8>,
    pub(crate) authenticator_data: Vec<u8>,
    pub(crate) public_key: Vec<u8>,
    pub(crate) public_key_algorithm: i64,
    pub(crate) transports: Vec<String>,
}

impl AuthenticatorAttestationResponse {
    /// `clientDataJSON`
    pub fn client_data_json(&self) -> &[u8] {
        &self.client_data_json
    }

    /// `attestationObject`
    pub fn attestation_object(&self) -> &[u8] {
        &self.attestation_object
    }

    /// `getAuthenticatorData()`
    pub fn authenticator_data(&self) -> &[u8] {
        &self.authenticator_data
    }

    /// `getPublicKey()`; DER `SubjectPublicKeyInfo`.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// `getPublicKeyAlgorithm()`
    pub fn public_key_algorithm(&self) -> i64 {
        self.public_key_algorithm
    }

    /// `getTransports()`
    pub fn transports(&self) -> &[String] {
        &self.transports
    }
}

/// The response half of an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorAssertionResponse {
    pub(crate) client_data_json: Vec<u8>,
    pub(crate) authenticator_data: Vec<u8>,
    pub(crate) signature: Vec<u8>,
    pub(crate) user_handle: Option<Vec<u8>>,
}

#[allow(missing_docs)]
impl AuthenticatorAssertionResponse {
    pub fn client_data_json(&self) -> &[u8] {
        &self.client_data_json
    }

    pub fn authenticator_data(&self) -> &[u8] {
        &self.authenticator_data
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn user_handle(&self) -> Option<&[u8]> {
        self.user_handle.as_deref()
    }
}

/// `getClientExtensionResults()`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExtensionResults {
    /// `credProps`, on a creation that asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredProps>,
}
