use async_trait::async_trait;
use js_sys::Function;
use tokio::sync::oneshot;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::EventTarget;

use super::convert::js_get;
use crate::focus::{TopWindow, TopWindowInaccessible};

/// `window.top`, inspected through reflection so that a cross-origin top
/// surfaces as an error rather than a trap.
#[derive(Debug, Clone)]
pub struct BrowserWindow {
    global: JsValue,
}

impl BrowserWindow {
    /// The top-level window as seen from `global`.
    pub fn new(global: JsValue) -> Self {
        Self { global }
    }

    fn top(&self) -> Result<JsValue, TopWindowInaccessible> {
        js_get(&self.global, "top")
            .ok()
            .filter(|top| top.is_object())
            .ok_or(TopWindowInaccessible)
    }
}

#[async_trait(?Send)]
impl TopWindow for BrowserWindow {
    fn has_focus(&self) -> Result<bool, TopWindowInaccessible> {
        let document = js_get(&self.top()?, "document").map_err(|_| TopWindowInaccessible)?;
        let has_focus = js_get(&document, "hasFocus")
            .ok()
            .and_then(|has_focus| has_focus.dyn_into::<Function>().ok())
            .ok_or(TopWindowInaccessible)?;
        has_focus
            .call0(&document)
            .map(|focused| focused.is_truthy())
            .map_err(|_| TopWindowInaccessible)
    }

    async fn focused(&self) {
        let Ok(top) = self.top() else {
            return std::future::pending().await;
        };
        let target: EventTarget = top.unchecked_into();

        let (sender, receiver) = oneshot::channel();
        let mut sender = Some(sender);
        let listener = Closure::<dyn FnMut()>::new(move || {
            if let Some(sender) = sender.take() {
                let _ = sender.send(());
            }
        });
        if target
            .add_event_listener_with_callback("focus", listener.as_ref().unchecked_ref())
            .is_err()
        {
            tracing::warn!("Could not listen for focus on the top window");
            return std::future::pending().await;
        }

        let _listening = Listening { target, listener };
        let _ = receiver.await;
    }
}

/// Removes the focus listener when the wait ends, however it ends.
struct Listening {
    target: EventTarget,
    listener: Closure<dyn FnMut()>,
}

impl Drop for Listening {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback("focus", self.listener.as_ref().unchecked_ref());
    }
}
