//! Moving values between script and Rust.

use js_sys::{Array, ArrayBuffer, Function, JSON, Object, Promise, Reflect, Uint8Array};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use tokio_util::sync::{CancellationToken, DropGuard};
use web_sys::{AbortController, AbortSignal as JsAbortSignal, DomException};

use crate::credential::{AuthenticatorResponse, PublicKeyCredential};
use crate::error::ShimError;
use crate::options::{
    AbortSignal, Algorithm, AuthenticationExtensionsClientInputs, AuthenticatorSelectionCriteria,
    CreationOptions, Mediation, PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    PublicKeyCredentialParameters, PublicKeyCredentialRequestOptions, PublicKeyCredentialRpEntity,
    PublicKeyCredentialUserEntity, RequestOptions,
};

pub(crate) fn js_get(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
}

pub(crate) fn js_set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

/// `js_get`, with `undefined` and `null` read as absent.
fn member(target: &JsValue, key: &str) -> Option<JsValue> {
    js_get(target, key)
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

/// Sets `key` on an object created here. Reflect.set only fails on frozen
/// or exotic targets, which these never are.
fn put(target: &Object, key: &str, value: &JsValue) {
    let _ = Reflect::set(target, &JsValue::from_str(key), value);
}

fn invalid(what: &str) -> ShimError {
    ShimError::InvalidInput(format!("{what} is missing or malformed"))
}

/// Copy a `BufferSource` (an `ArrayBuffer` or a view of one).
pub(crate) fn buffer_bytes(value: &JsValue) -> Option<Vec<u8>> {
    let array = if value.is_instance_of::<ArrayBuffer>() {
        Uint8Array::new(value)
    } else {
        let buffer = member(value, "buffer")?.dyn_into::<ArrayBuffer>().ok()?;
        let offset = member(value, "byteOffset")?.as_f64()? as u32;
        let length = member(value, "byteLength")?.as_f64()? as u32;
        Uint8Array::new_with_byte_offset_and_length(&buffer, offset, length)
    };
    Some(array.to_vec())
}

fn array_buffer(bytes: &[u8]) -> JsValue {
    Uint8Array::from(bytes).buffer().into()
}

fn string(target: &JsValue, key: &str) -> Option<String> {
    member(target, key).and_then(|value| value.as_string())
}

fn timeout(target: &JsValue) -> Option<u64> {
    member(target, "timeout")
        .and_then(|value| value.as_f64())
        .filter(|millis| millis.is_finite() && *millis >= 0.0)
        .map(|millis| millis as u64)
}

fn descriptors(
    target: &JsValue,
    key: &str,
) -> Result<Option<Vec<PublicKeyCredentialDescriptor>>, ShimError> {
    let Some(list) = member(target, key) else {
        return Ok(None);
    };
    let list = list.dyn_into::<Array>().map_err(|_| invalid(key))?;
    list.iter()
        .map(|entry| {
            Ok(PublicKeyCredentialDescriptor {
                id: member(&entry, "id")
                    .as_ref()
                    .and_then(buffer_bytes)
                    .ok_or_else(|| invalid("credential id"))?,
                transports: member(&entry, "transports")
                    .and_then(|value| value.dyn_into::<Array>().ok())
                    .map(|transports| transports.iter().filter_map(|t| t.as_string()).collect()),
                kind: string(&entry, "type").unwrap_or_else(|| "public-key".into()),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn decode_creation(public_key: &JsValue) -> Result<PublicKeyCredentialCreationOptions, ShimError> {
    let challenge = member(public_key, "challenge")
        .as_ref()
        .and_then(buffer_bytes)
        .ok_or_else(|| invalid("challenge"))?;

    let rp = member(public_key, "rp").ok_or_else(|| invalid("rp"))?;
    let user = member(public_key, "user").ok_or_else(|| invalid("user"))?;

    let pub_key_cred_params = match member(public_key, "pubKeyCredParams") {
        Some(params) => params
            .dyn_into::<Array>()
            .map_err(|_| invalid("pubKeyCredParams"))?
            .iter()
            .filter_map(|param| {
                let alg = member(&param, "alg")?;
                let alg = match alg.as_f64() {
                    Some(number) => Algorithm::Number(number),
                    None => Algorithm::Text(alg.as_string()?),
                };
                Some(PublicKeyCredentialParameters {
                    alg,
                    kind: string(&param, "type").unwrap_or_else(|| "public-key".into()),
                })
            })
            .collect(),
        None => Vec::new(),
    };

    let authenticator_selection =
        member(public_key, "authenticatorSelection").map(|selection| {
            AuthenticatorSelectionCriteria {
                authenticator_attachment: string(&selection, "authenticatorAttachment"),
                require_resident_key: member(&selection, "requireResidentKey")
                    .and_then(|value| value.as_bool()),
                resident_key: string(&selection, "residentKey"),
                user_verification: string(&selection, "userVerification"),
            }
        });

    let extensions = member(public_key, "extensions").map(|extensions| {
        AuthenticationExtensionsClientInputs {
            cred_props: member(&extensions, "credProps").and_then(|value| value.as_bool()),
        }
    });

    Ok(PublicKeyCredentialCreationOptions {
        attestation: string(public_key, "attestation"),
        authenticator_selection,
        challenge,
        exclude_credentials: descriptors(public_key, "excludeCredentials")?,
        extensions,
        pub_key_cred_params,
        rp: PublicKeyCredentialRpEntity {
            id: string(&rp, "id"),
            name: string(&rp, "name").unwrap_or_default(),
        },
        user: PublicKeyCredentialUserEntity {
            id: member(&user, "id")
                .as_ref()
                .and_then(buffer_bytes)
                .ok_or_else(|| invalid("user.id"))?,
            display_name: string(&user, "displayName").unwrap_or_default(),
            name: string(&user, "name").unwrap_or_default(),
        },
        timeout: timeout(public_key),
    })
}

fn decode_request(public_key: &JsValue) -> Result<PublicKeyCredentialRequestOptions, ShimError> {
    Ok(PublicKeyCredentialRequestOptions {
        allow_credentials: descriptors(public_key, "allowCredentials")?,
        challenge: member(public_key, "challenge")
            .as_ref()
            .and_then(buffer_bytes)
            .ok_or_else(|| invalid("challenge"))?,
        rp_id: string(public_key, "rpId"),
        user_verification: string(public_key, "userVerification"),
        timeout: timeout(public_key),
    })
}

/// Follow a page `AbortSignal` with a token.
fn follow_signal(raw: &JsValue) -> Option<AbortSignal> {
    let signal = member(raw, "signal")?.dyn_into::<JsAbortSignal>().ok()?;
    let token = AbortSignal::new();
    if signal.aborted() {
        token.cancel();
        return Some(token);
    }

    let cancel = token.clone();
    let listener = Closure::once_into_js(move || cancel.cancel());
    if signal
        .add_event_listener_with_callback("abort", listener.unchecked_ref())
        .is_err()
    {
        tracing::warn!("Could not follow the page's abort signal");
    }
    Some(token)
}

/// A page `AbortSignal` that aborts when `token` is cancelled.
///
/// The signal only follows `token` while the returned guard is alive.
/// Dropping the guard ends the follower without aborting.
pub(crate) fn lead_signal(token: &AbortSignal) -> Option<(JsAbortSignal, DropGuard)> {
    let controller = AbortController::new().ok()?;
    let signal = controller.signal();
    let finished = CancellationToken::new();
    if token.is_cancelled() {
        controller.abort();
        return Some((signal, finished.drop_guard()));
    }

    let token = token.clone();
    let done = finished.clone();
    wasm_bindgen_futures::spawn_local(async move {
        tokio::select! {
            _ = token.cancelled() => controller.abort(),
            _ = done.cancelled() => {}
        }
    });
    Some((signal, finished.drop_guard()))
}

/// A `navigator.credentials.create()` argument.
#[derive(Debug, Clone)]
pub struct JsCreationOptions {
    pub(crate) raw: JsValue,
    public_key: Option<PublicKeyCredentialCreationOptions>,
    signal: Option<AbortSignal>,
}

impl JsCreationOptions {
    /// Read the parts of `raw` the shim needs, keeping `raw` for the
    /// native API.
    pub fn decode(raw: JsValue) -> Result<Self, ShimError> {
        let public_key = match member(&raw, "publicKey") {
            Some(public_key) => Some(decode_creation(&public_key)?),
            None => None,
        };
        let signal = follow_signal(&raw);
        Ok(Self {
            raw,
            public_key,
            signal,
        })
    }
}

impl CreationOptions for JsCreationOptions {
    fn public_key(&self) -> Option<&PublicKeyCredentialCreationOptions> {
        self.public_key.as_ref()
    }

    fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }
}

/// A `navigator.credentials.get()` argument.
#[derive(Debug, Clone)]
pub struct JsRequestOptions {
    pub(crate) raw: JsValue,
    public_key: Option<PublicKeyCredentialRequestOptions>,
    mediation: Option<Mediation>,
    signal: Option<AbortSignal>,
}

impl JsRequestOptions {
    /// Read the parts of `raw` the shim needs, keeping `raw` for the
    /// native API.
    pub fn decode(raw: JsValue) -> Result<Self, ShimError> {
        let public_key = match member(&raw, "publicKey") {
            Some(public_key) => Some(decode_request(&public_key)?),
            None => None,
        };
        let mediation = string(&raw, "mediation").and_then(|mode| Mediation::parse(&mode));
        let signal = follow_signal(&raw);
        Ok(Self {
            raw,
            public_key,
            mediation,
            signal,
        })
    }
}

impl RequestOptions for JsRequestOptions {
    fn public_key(&self) -> Option<&PublicKeyCredentialRequestOptions> {
        self.public_key.as_ref()
    }

    fn mediation(&self) -> Option<Mediation> {
        self.mediation
    }

    fn signal(&self) -> Option<&AbortSignal> {
        self.signal.as_ref()
    }

    /// Shallow-copies the page's object, so the native call sees everything
    /// the page passed plus the new signal.
    fn with_signal(&self, signal: AbortSignal) -> Self {
        let raw = Object::assign(&Object::new(), &Object::from(self.raw.clone()));
        // The race cancels every token it hands out here, which ends the
        // follower, so it is kept until then.
        if let Some((page_signal, following)) = lead_signal(&signal) {
            put(&raw, "signal", &page_signal);
            following.disarm();
        }
        Self {
            raw: raw.into(),
            public_key: self.public_key.clone(),
            mediation: self.mediation,
            signal: Some(signal),
        }
    }
}

/// What the page's entry points resolve with.
#[derive(Debug, Clone)]
pub struct JsCredential(pub JsValue);

fn prototype(class: &str) -> Option<Object> {
    member(&member(&js_sys::global(), class)?, "prototype")?
        .dyn_into::<Object>()
        .ok()
}

fn method<F>(target: &Object, name: &str, body: F)
where
    F: Fn() -> JsValue + 'static,
{
    let function = Closure::<dyn Fn() -> JsValue>::new(body).into_js_value();
    put(target, name, &function);
}

impl From<PublicKeyCredential> for JsCredential {
    fn from(credential: PublicKeyCredential) -> Self {
        let response = Object::new();
        put(
            &response,
            "clientDataJSON",
            &array_buffer(credential.response().client_data_json()),
        );

        let response_class = match credential.response() {
            AuthenticatorResponse::Attestation(attestation) => {
                put(
                    &response,
                    "attestationObject",
                    &array_buffer(attestation.attestation_object()),
                );

                let authenticator_data = attestation.authenticator_data().to_vec();
                method(&response, "getAuthenticatorData", move || {
                    array_buffer(&authenticator_data)
                });
                let public_key = attestation.public_key().to_vec();
                method(&response, "getPublicKey", move || array_buffer(&public_key));
                let algorithm = attestation.public_key_algorithm();
                method(&response, "getPublicKeyAlgorithm", move || {
                    JsValue::from_f64(algorithm as f64)
                });
                let transports = attestation.transports().to_vec();
                method(&response, "getTransports", move || {
                    transports
                        .iter()
                        .map(|transport| JsValue::from_str(transport))
                        .collect::<Array>()
                        .into()
                });
                "AuthenticatorAttestationResponse"
            }
            AuthenticatorResponse::Assertion(assertion) => {
                put(
                    &response,
                    "authenticatorData",
                    &array_buffer(assertion.authenticator_data()),
                );
                put(&response, "signature", &array_buffer(assertion.signature()));
                let user_handle = match assertion.user_handle() {
                    Some(handle) => array_buffer(handle),
                    None => JsValue::NULL,
                };
                put(&response, "userHandle", &user_handle);
                "AuthenticatorAssertionResponse"
            }
        };
        if let Some(prototype) = prototype(response_class) {
            Object::set_prototype_of(&response, &prototype);
        }

        let object = Object::new();
        put(&object, "id", &JsValue::from_str(credential.id()));
        put(&object, "rawId", &array_buffer(credential.raw_id()));
        put(&object, "type", &JsValue::from_str(credential.kind()));
        put(
            &object,
            "authenticatorAttachment",
            &JsValue::from_str(credential.authenticator_attachment()),
        );
        put(&object, "response", &response);

        let json = credential.to_json();
        let extensions = json["clientExtensionResults"].to_string();
        method(&object, "getClientExtensionResults", move || {
            JSON::parse(&extensions).unwrap_or_else(|_| Object::new().into())
        });
        let json = json.to_string();
        method(&object, "toJSON", move || {
            JSON::parse(&json).unwrap_or(JsValue::UNDEFINED)
        });

        if let Some(prototype) = prototype("PublicKeyCredential") {
            Object::set_prototype_of(&object, &prototype);
        }
        JsCredential(object.into())
    }
}

/// What the page's entry points reject with.
#[derive(Debug, Clone)]
pub struct JsRejection(pub JsValue);

impl From<ShimError> for JsRejection {
    fn from(error: ShimError) -> Self {
        let message = error.page_message();
        match &error {
            ShimError::InvalidInput(_) => JsRejection(js_sys::TypeError::new(&message).into()),
            ShimError::NotSupported => JsRejection(js_sys::Error::new(&message).into()),
            other => match DomException::new_with_message_and_name(&message, other.dom_name()) {
                Ok(exception) => JsRejection(exception.into()),
                Err(_) => JsRejection(js_sys::Error::new(&message).into()),
            },
        }
    }
}

/// Wrap a Rust future as the `Promise` a page entry point returns.
pub(crate) fn promise<F>(future: F) -> Promise
where
    F: Future<Output = Result<JsValue, JsValue>> + 'static,
{
    wasm_bindgen_futures::future_to_promise(future)
}

/// A function that returns `Promise.resolve(true)`.
pub(crate) fn resolves_true() -> Function {
    Closure::<dyn Fn() -> Promise>::new(|| Promise::resolve(&JsValue::TRUE))
        .into_js_value()
        .unchecked_into()
}
