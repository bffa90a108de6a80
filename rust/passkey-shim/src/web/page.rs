use std::sync::Arc;

use async_trait::async_trait;
use js_sys::{Function, Object, Promise, Reflect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::convert::{
    JsCreationOptions, JsCredential, JsRejection, JsRequestOptions, js_get, js_set, promise,
    resolves_true,
};
use super::window::BrowserWindow;
use crate::page::{
    Credentials, CredentialsContainer, DocumentInfo, Page, PublicKeyCredentialPolyfill,
};

const PUBLIC_KEY_CREDENTIAL: &str = "PublicKeyCredential";
const ATTESTATION_RESPONSE: &str = "AuthenticatorAttestationResponse";
const IS_UVPAA: &str = "isUserVerifyingPlatformAuthenticatorAvailable";

/// The browser's global scope.
#[derive(Debug, Clone)]
pub struct BrowserPage {
    global: JsValue,
    top: BrowserWindow,
}

impl BrowserPage {
    /// The page this module was loaded into.
    pub fn new() -> Self {
        let global: JsValue = js_sys::global().into();
        Self {
            top: BrowserWindow::new(global.clone()),
            global,
        }
    }

    fn navigator(&self) -> Option<JsValue> {
        js_get(&self.global, "navigator")
            .ok()
            .filter(|navigator| navigator.is_object())
    }

    fn credentials_object(&self) -> Option<JsValue> {
        js_get(&self.navigator()?, "credentials")
            .ok()
            .filter(|credentials| credentials.is_object())
    }

    fn global_member(&self, name: &str) -> JsValue {
        js_get(&self.global, name).unwrap_or(JsValue::UNDEFINED)
    }

    /// Assign `navigator.credentials`, which is an accessor in browsers that
    /// have it.
    fn define_credentials_object(&self, value: &JsValue) {
        let Some(navigator) = self.navigator() else {
            return;
        };
        let descriptor = Object::new();
        let _ = js_set(&descriptor, "value", value);
        let _ = js_set(&descriptor, "configurable", &JsValue::TRUE);
        let _ = js_set(&descriptor, "writable", &JsValue::TRUE);
        let defined = Reflect::define_property(
            navigator.unchecked_ref::<Object>(),
            &JsValue::from_str("credentials"),
            &descriptor,
        );
        if !matches!(defined, Ok(true)) {
            tracing::warn!("Could not assign navigator.credentials");
        }
    }
}

impl Default for BrowserPage {
    fn default() -> Self {
        Self::new()
    }
}

/// The credential globals as captured at install.
pub struct BrowserBindings {
    credentials: JsValue,
    create: JsValue,
    get: JsValue,
    public_key_credential: JsValue,
    is_uvpaa: JsValue,
    attestation_response: JsValue,
}

/// `create`/`get` functions of the page, called with `navigator.credentials`
/// as receiver.
struct PageCredentials {
    receiver: JsValue,
    create: Function,
    get: Function,
}

impl PageCredentials {
    async fn call(
        &self,
        function: &Function,
        options: &JsValue,
    ) -> Result<JsCredential, JsRejection> {
        let pending: Promise = function
            .call1(&self.receiver, options)
            .map_err(JsRejection)?
            .dyn_into()
            .map_err(JsRejection)?;
        JsFuture::from(pending)
            .await
            .map(JsCredential)
            .map_err(JsRejection)
    }
}

#[async_trait(?Send)]
impl CredentialsContainer<BrowserPage> for PageCredentials {
    async fn create(&self, options: JsCreationOptions) -> Result<JsCredential, JsRejection> {
        self.call(&self.create, &options.raw).await
    }

    async fn get(&self, options: JsRequestOptions) -> Result<JsCredential, JsRejection> {
        self.call(&self.get, &options.raw).await
    }
}

/// Script functions that forward to `credentials`.
fn entry_points(credentials: Credentials<BrowserPage>) -> (JsValue, JsValue) {
    let creator = credentials.clone();
    let create = Closure::<dyn Fn(JsValue) -> Promise>::new(move |options: JsValue| {
        let credentials = creator.clone();
        promise(async move {
            let options =
                JsCreationOptions::decode(options).map_err(|error| JsRejection::from(error).0)?;
            credentials
                .create(options)
                .await
                .map(|credential| credential.0)
                .map_err(|rejection| rejection.0)
        })
    });

    let get = Closure::<dyn Fn(JsValue) -> Promise>::new(move |options: JsValue| {
        let credentials = credentials.clone();
        promise(async move {
            let options =
                JsRequestOptions::decode(options).map_err(|error| JsRejection::from(error).0)?;
            credentials
                .get(options)
                .await
                .map(|credential| credential.0)
                .map_err(|rejection| rejection.0)
        })
    });

    (create.into_js_value(), get.into_js_value())
}

#[async_trait(?Send)]
impl Page for BrowserPage {
    type CreationOptions = JsCreationOptions;
    type RequestOptions = JsRequestOptions;
    type Credential = JsCredential;
    type Error = JsRejection;
    type Window = BrowserWindow;
    type Bindings = BrowserBindings;

    fn document(&self) -> DocumentInfo {
        let document = js_get(&self.global, "document").unwrap_or(JsValue::UNDEFINED);
        let location = js_get(&document, "location").unwrap_or(JsValue::UNDEFINED);
        let text = |target: &JsValue, key: &str| {
            js_get(target, key)
                .ok()
                .and_then(|value| value.as_string())
                .unwrap_or_default()
        };
        DocumentInfo {
            content_type: text(&document, "contentType"),
            protocol: text(&location, "protocol"),
            hostname: text(&location, "hostname"),
        }
    }

    fn top(&self) -> &BrowserWindow {
        &self.top
    }

    fn capture(&self) -> BrowserBindings {
        let credentials = self.credentials_object().unwrap_or(JsValue::UNDEFINED);
        let public_key_credential = self.global_member(PUBLIC_KEY_CREDENTIAL);
        BrowserBindings {
            create: js_get(&credentials, "create").unwrap_or(JsValue::UNDEFINED),
            get: js_get(&credentials, "get").unwrap_or(JsValue::UNDEFINED),
            is_uvpaa: js_get(&public_key_credential, IS_UVPAA).unwrap_or(JsValue::UNDEFINED),
            attestation_response: self.global_member(ATTESTATION_RESPONSE),
            public_key_credential,
            credentials,
        }
    }

    fn restore(&self, bindings: &BrowserBindings) {
        if bindings.credentials.is_object() {
            let _ = js_set(&bindings.credentials, "create", &bindings.create);
            let _ = js_set(&bindings.credentials, "get", &bindings.get);
        }
        let current = self.credentials_object().unwrap_or(JsValue::UNDEFINED);
        if current != bindings.credentials {
            self.define_credentials_object(&bindings.credentials);
        }

        let _ = js_set(&self.global, PUBLIC_KEY_CREDENTIAL, &bindings.public_key_credential);
        let _ = js_set(&self.global, ATTESTATION_RESPONSE, &bindings.attestation_response);
        let class = &bindings.public_key_credential;
        if class.is_object() || class.is_function() {
            let _ = js_set(class, IS_UVPAA, &bindings.is_uvpaa);
        }
    }

    fn has_public_key_credential(&self) -> bool {
        !self.global_member(PUBLIC_KEY_CREDENTIAL).is_undefined()
    }

    async fn is_user_verifying_platform_authenticator_available(&self) -> bool {
        let class = self.global_member(PUBLIC_KEY_CREDENTIAL);
        let Some(query) = js_get(&class, IS_UVPAA)
            .ok()
            .and_then(|query| query.dyn_into::<Function>().ok())
        else {
            return false;
        };
        let Ok(pending) = query.call0(&class) else {
            return false;
        };
        match pending.dyn_into::<Promise>() {
            Ok(pending) => JsFuture::from(pending)
                .await
                .map(|available| available.is_truthy())
                .unwrap_or(false),
            Err(available) => available.is_truthy(),
        }
    }

    fn polyfill_public_key_credential(&self, polyfill: PublicKeyCredentialPolyfill) {
        match polyfill {
            PublicKeyCredentialPolyfill::Class => {
                let class = Closure::<dyn Fn()>::new(|| {}).into_js_value();
                let _ = js_set(&class, IS_UVPAA, &resolves_true());
                let _ = js_set(&self.global, PUBLIC_KEY_CREDENTIAL, &class);
                let response = Closure::<dyn Fn()>::new(|| {}).into_js_value();
                let _ = js_set(&self.global, ATTESTATION_RESPONSE, &response);
            }
            PublicKeyCredentialPolyfill::PlatformAuthenticator => {
                let class = self.global_member(PUBLIC_KEY_CREDENTIAL);
                let _ = js_set(&class, IS_UVPAA, &resolves_true());
            }
        }
    }

    fn credentials(&self) -> Option<Credentials<Self>> {
        let receiver = self.credentials_object()?;
        let function = |name| {
            js_get(&receiver, name)
                .ok()
                .and_then(|function| function.dyn_into::<Function>().ok())
        };
        let create = function("create")?;
        let get = function("get")?;
        Some(Arc::new(PageCredentials {
            receiver,
            create,
            get,
        }))
    }

    fn set_credentials(&self, credentials: Credentials<Self>) {
        let receiver = match self.credentials_object() {
            Some(receiver) => receiver,
            None => {
                let receiver: JsValue = Object::new().into();
                self.define_credentials_object(&receiver);
                receiver
            }
        };
        let (create, get) = entry_points(credentials);
        let rebound =
            js_set(&receiver, "create", &create).and_then(|_| js_set(&receiver, "get", &get));
        if rebound.is_err() {
            tracing::warn!("Could not rebind navigator.credentials");
        }
    }
}
