//! Browser bindings.
//!
//! Script loads the module and calls `install(messenger)` as early as it can
//! on the page. From then on `navigator.credentials.create()` and
//! `navigator.credentials.get()` go through the shim until the returned
//! handle's `destroy()` is called or the delegate disconnects.

mod channel;
mod convert;
mod page;
mod window;

pub use channel::JsChannel;
pub use convert::{JsCreationOptions, JsCredential, JsRejection, JsRequestOptions};
pub use page::{BrowserBindings, BrowserPage};
pub use window::BrowserWindow;

use js_sys::JSON;
use wasm_bindgen::prelude::*;

use crate::config::ShimConfig;
use crate::error::ShimError;
use crate::shim::Shim;

/// An installed shim, as seen from script.
#[wasm_bindgen]
pub struct ShimHandle {
    shim: Shim<BrowserPage, JsChannel>,
}

#[wasm_bindgen]
impl ShimHandle {
    /// Put the page's own credential functions back. Safe to call more than
    /// once.
    pub fn destroy(&self) {
        self.shim.destroy();
    }

    /// Whether the shim is still intercepting.
    #[wasm_bindgen(js_name = isInstalled)]
    pub fn is_installed(&self) -> bool {
        self.shim.is_installed()
    }
}

/// Install the shim with default settings.
#[wasm_bindgen]
pub fn install(messenger: JsValue) -> Result<ShimHandle, JsValue> {
    install_with_config(messenger, JsValue::UNDEFINED)
}

/// Install the shim. `config` is an optional
/// `{ focusFallbackWaitMs, focusTimeoutMs }` object.
#[wasm_bindgen(js_name = installWithConfig)]
pub fn install_with_config(messenger: JsValue, config: JsValue) -> Result<ShimHandle, JsValue> {
    let config = if config.is_undefined() || config.is_null() {
        ShimConfig::default()
    } else {
        let text = JSON::stringify(&config)?
            .as_string()
            .ok_or_else(|| JsValue::from_str("config is not serializable"))?;
        serde_json::from_str(&text).map_err(|error| JsValue::from_str(&error.to_string()))?
    };

    let channel = JsChannel::new(messenger)?;
    let shim = Shim::with_config(BrowserPage::new(), channel, config);
    match shim.install() {
        Ok(()) => {}
        Err(ShimError::Ineligible) => {
            tracing::debug!("Document is not eligible, leaving the page untouched");
        }
        Err(error) => return Err(JsRejection::from(error).0),
    }
    Ok(ShimHandle { shim })
}
