//! Transport-safe shapes exchanged with the delegate.
//!
//! Every binary value travels as unpadded base64url text (see
//! [`crate::codec::encode_bytes`]). Field names follow the camelCase
//! convention the delegate speaks.

use serde::{Deserialize, Serialize};

/// A creation request as sent to the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCreationRequest {
    /// Attestation conveyance preference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    /// Authenticator requirements, without the attachment.
    pub authenticator_selection: AuthenticatorSelectionParams,
    /// The relying party's challenge.
    pub challenge: String,
    /// Credentials the relying party already knows about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_credentials: Option<Vec<CredentialDescriptorParams>>,
    /// Requested extensions.
    pub extensions: ExtensionParams,
    /// Acceptable algorithms, in order of preference.
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    /// The relying party.
    pub rp: RelyingPartyParams,
    /// The account the credential is for.
    pub user: UserParams,
    /// The page's timeout hint in milliseconds. Not enforced by the shim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Whether the page can still run the call natively if the delegate
    /// declines it.
    pub fallback_supported: bool,
}

/// `authenticatorSelection` as forwarded to the delegate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionParams {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_resident_key: Option<bool>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_key: Option<String>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
}

/// A credential reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDescriptorParams {
    /// The credential id.
    pub id: String,
    /// Transport hints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transports: Option<Vec<String>>,
    /// Always `"public-key"` in practice.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Extension inputs the delegate understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionParams {
    /// Whether the relying party asked for `credProps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<bool>,
}

/// A requested credential algorithm. `alg` is always a COSE integer here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    /// COSE algorithm identifier.
    pub alg: i64,
    /// Always `"public-key"` in practice.
    #[serde(rename = "type")]
    pub kind: String,
}

/// The relying party of a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingPartyParams {
    /// The RP ID, when the page gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human readable name.
    pub name: String,
}

/// The account of a creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserParams {
    /// The user handle.
    pub id: String,
    #[allow(missing_docs)]
    pub display_name: String,
    #[allow(missing_docs)]
    pub name: String,
}

/// An assertion request as sent to the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialAssertionRequest {
    /// Acceptable credential ids. Empty when the page allows any.
    pub allowed_credential_ids: Vec<String>,
    /// The relying party's challenge.
    pub challenge: String,
    /// The RP ID, when the page gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,
    /// User verification requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_verification: Option<String>,
    /// The page's timeout hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// The page's mediation mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediation: Option<String>,
    /// Whether the page can still run the call natively if the delegate
    /// declines it.
    pub fallback_supported: bool,
}

/// The delegate's answer to a [`CredentialCreationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialResult {
    /// The new credential's id.
    pub credential_id: String,
    /// The serialized client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    /// The CBOR attestation object.
    pub attestation_object: String,
    /// The authenticator data.
    pub auth_data: String,
    /// The credential public key, SPKI encoded.
    pub public_key: String,
    /// COSE algorithm of `public_key`.
    pub public_key_algorithm: i64,
    /// Transports the credential can be reached over.
    pub transports: Vec<String>,
    /// Extension outputs.
    #[serde(default)]
    pub extensions: CreateExtensionResults,
}

/// Extension outputs of a creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExtensionResults {
    /// `credProps`, when it was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredProps>,
}

/// Output of the `credProps` extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredProps {
    /// Whether the credential is discoverable.
    pub rk: bool,
}

/// The delegate's answer to a [`CredentialAssertionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertCredentialResult {
    /// The id of the credential that signed.
    pub credential_id: String,
    /// The serialized client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    /// The authenticator data.
    pub authenticator_data: String,
    /// The assertion signature.
    pub signature: String,
    /// The user handle stored with the credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// A single message on the channel between the page and the delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[allow(missing_docs)]
pub enum Envelope {
    CredentialCreationRequest {
        data: CredentialCreationRequest,
    },
    CredentialCreationResponse {
        result: CreateCredentialResult,
    },
    CredentialGetRequest {
        data: CredentialAssertionRequest,
    },
    CredentialGetResponse {
        result: AssertCredentialResult,
    },
    /// Tells the delegate to stop working on a request the page no longer
    /// waits for.
    AbortRequest {
        #[serde(rename = "abortedRequestId")]
        aborted_request_id: String,
    },
    /// Sent by the delegate when it goes away.
    DisconnectRequest,
}

impl Envelope {
    /// The tag this envelope travels under.
    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::CredentialCreationRequest { .. } => MessageType::CredentialCreationRequest,
            Envelope::CredentialCreationResponse { .. } => MessageType::CredentialCreationResponse,
            Envelope::CredentialGetRequest { .. } => MessageType::CredentialGetRequest,
            Envelope::CredentialGetResponse { .. } => MessageType::CredentialGetResponse,
            Envelope::AbortRequest { .. } => MessageType::AbortRequest,
            Envelope::DisconnectRequest => MessageType::DisconnectRequest,
        }
    }
}

/// The bare tag of an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MessageType {
    CredentialCreationRequest,
    CredentialCreationResponse,
    CredentialGetRequest,
    CredentialGetResponse,
    AbortRequest,
    DisconnectRequest,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageType::CredentialCreationRequest => "CredentialCreationRequest",
            MessageType::CredentialCreationResponse => "CredentialCreationResponse",
            MessageType::CredentialGetRequest => "CredentialGetRequest",
            MessageType::CredentialGetResponse => "CredentialGetResponse",
            MessageType::AbortRequest => "AbortRequest",
            MessageType::DisconnectRequest => "DisconnectRequest",
        };
        f.write_str(name)
    }
}
