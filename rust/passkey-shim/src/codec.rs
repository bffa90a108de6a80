//! Conversion between page-facing options/credentials and the wire format.
//!
//! Binary values travel as base64url without padding. Decoding also accepts
//! padded input, since some delegates pad.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::credential::{
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, AuthenticatorResponse,
    ClientExtensionResults, PublicKeyCredential,
};
use crate::error::ShimError;
use crate::options::{CreationOptions, RequestOptions};
use crate::wire::{
    AssertCredentialResult, AuthenticatorSelectionParams, CreateCredentialResult,
    CredentialAssertionRequest, CredentialCreationRequest, CredentialDescriptorParams,
    ExtensionParams, PubKeyCredParam, RelyingPartyParams, UserParams,
};

const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode raw bytes as wire text.
pub fn encode_bytes(bytes: &[u8]) -> String {
    BASE64URL.encode(bytes)
}

/// Decode wire text back into the raw bytes it carries.
pub fn decode_bytes(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64URL.decode(text)
}

/// Map `navigator.credentials.create()` options to a delegate request.
///
/// Algorithm entries that are not integers are dropped. An empty list is
/// passed through as is; the delegate decides what that means.
pub fn encode_creation_options<O>(
    options: &O,
    fallback_supported: bool,
) -> Result<CredentialCreationRequest, ShimError>
where
    O: CreationOptions,
{
    let key_options = options
        .public_key()
        .ok_or_else(|| ShimError::InvalidInput("Public-key options not found".into()))?;

    let selection = key_options.authenticator_selection.as_ref();

    Ok(CredentialCreationRequest {
        attestation: key_options.attestation.clone(),
        authenticator_selection: AuthenticatorSelectionParams {
            require_resident_key: selection.and_then(|s| s.require_resident_key),
            resident_key: selection.and_then(|s| s.resident_key.clone()),
            user_verification: selection.and_then(|s| s.user_verification.clone()),
        },
        challenge: encode_bytes(&key_options.challenge),
        exclude_credentials: key_options.exclude_credentials.as_ref().map(|credentials| {
            credentials
                .iter()
                .map(|credential| CredentialDescriptorParams {
                    id: encode_bytes(&credential.id),
                    transports: credential.transports.clone(),
                    kind: credential.kind.clone(),
                })
                .collect()
        }),
        extensions: ExtensionParams {
            cred_props: key_options
                .extensions
                .as_ref()
                .and_then(|extensions| extensions.cred_props),
        },
        pub_key_cred_params: key_options
            .pub_key_cred_params
            .iter()
            .filter_map(|params| {
                Some(PubKeyCredParam {
                    alg: params.alg.to_cose()?,
                    kind: params.kind.clone(),
                })
            })
            .collect(),
        rp: RelyingPartyParams {
            id: key_options.rp.id.clone(),
            name: key_options.rp.name.clone(),
        },
        user: UserParams {
            id: encode_bytes(&key_options.user.id),
            display_name: key_options.user.display_name.clone(),
            name: key_options.user.name.clone(),
        },
        timeout: key_options.timeout,
        fallback_supported,
    })
}

/// Map `navigator.credentials.get()` options to a delegate request.
pub fn encode_assertion_options<O>(
    options: &O,
    fallback_supported: bool,
) -> Result<CredentialAssertionRequest, ShimError>
where
    O: RequestOptions,
{
    let key_options = options
        .public_key()
        .ok_or_else(|| ShimError::InvalidInput("Public-key options not found".into()))?;

    Ok(CredentialAssertionRequest {
        allowed_credential_ids: key_options
            .allow_credentials
            .iter()
            .flatten()
            .map(|credential| encode_bytes(&credential.id))
            .collect(),
        challenge: encode_bytes(&key_options.challenge),
        rp_id: key_options.rp_id.clone(),
        user_verification: key_options.user_verification.clone(),
        timeout: key_options.timeout,
        mediation: options.mediation().map(|mediation| mediation.as_str().to_owned()),
        fallback_supported,
    })
}

/// Turn a delegate's creation result into a page credential.
pub fn decode_creation_result(
    result: CreateCredentialResult,
) -> Result<PublicKeyCredential, ShimError> {
    let response = AuthenticatorAttestationResponse {
        client_data_json: field("clientDataJSON", &result.client_data_json)?,
        attestation_object: field("attestationObject", &result.attestation_object)?,
        authenticator_data: field("authData", &result.auth_data)?,
        public_key: field("publicKey", &result.public_key)?,
        public_key_algorithm: result.public_key_algorithm,
        transports: result.transports,
    };

    Ok(PublicKeyCredential {
        raw_id: field("credentialId", &result.credential_id)?,
        id: result.credential_id,
        response: AuthenticatorResponse::Attestation(response),
        extensions: ClientExtensionResults {
            cred_props: result.extensions.cred_props,
        },
    })
}

/// Turn a delegate's assertion result into a page credential.
pub fn decode_assertion_result(
    result: AssertCredentialResult,
) -> Result<PublicKeyCredential, ShimError> {
    let response = AuthenticatorAssertionResponse {
        client_data_json: field("clientDataJSON", &result.client_data_json)?,
        authenticator_data: field("authenticatorData", &result.authenticator_data)?,
        signature: field("signature", &result.signature)?,
        user_handle: result
            .user_handle
            .as_deref()
            .map(|handle| field("userHandle", handle))
            .transpose()?,
    };

    Ok(PublicKeyCredential {
        raw_id: field("credentialId", &result.credential_id)?,
        id: result.credential_id,
        response: AuthenticatorResponse::Assertion(response),
        extensions: ClientExtensionResults::default(),
    })
}

fn field(name: &str, text: &str) -> Result<Vec<u8>, ShimError> {
    decode_bytes(text).map_err(|error| ShimError::MalformedResult(format!("{name}: {error}")))
}
