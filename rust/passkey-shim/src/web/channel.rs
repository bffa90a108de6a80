use async_trait::async_trait;
use js_sys::{Function, JSON, Promise};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::convert::{js_get, js_set, lead_signal};
use crate::delegate::Channel;
use crate::error::ChannelError;
use crate::options::AbortSignal;
use crate::wire::Envelope;

/// A [`Channel`] over a script messenger.
///
/// The messenger is any object with `request(message, signal)` returning a
/// promise of the reply, `destroy()`, and an assignable `handler` that
/// receives messages the far side sends unprompted. Rejections are read as
/// `{ name, message, fallbackRequested }`.
pub struct JsChannel {
    messenger: JsValue,
    notifications: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    closed: CancellationToken,
}

impl JsChannel {
    /// Take over `messenger`'s `handler`.
    pub fn new(messenger: JsValue) -> Result<Self, JsValue> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = Closure::<dyn FnMut(JsValue)>::new(move |message: JsValue| {
            match from_js(&message) {
                Ok(envelope) => {
                    let _ = sender.send(envelope);
                }
                Err(error) => tracing::trace!("Ignoring unrecognized message: {error}"),
            }
        });
        js_set(&messenger, "handler", &handler.into_js_value())?;

        Ok(Self {
            messenger,
            notifications: Mutex::new(receiver),
            closed: CancellationToken::new(),
        })
    }
}

fn to_js(envelope: &Envelope) -> Result<JsValue, ChannelError> {
    let text =
        serde_json::to_string(envelope).map_err(|error| ChannelError::Transport(error.to_string()))?;
    JSON::parse(&text).map_err(|_| ChannelError::Transport("unserializable message".into()))
}

fn from_js(message: &JsValue) -> Result<Envelope, ChannelError> {
    let text = JSON::stringify(message)
        .ok()
        .and_then(|text| text.as_string())
        .ok_or_else(|| ChannelError::Transport("unreadable message".into()))?;
    serde_json::from_str(&text).map_err(|error| ChannelError::Transport(error.to_string()))
}

fn rejection(error: &JsValue) -> ChannelError {
    let text = |key| js_get(error, key).ok().and_then(|value| value.as_string());
    let name = text("name").unwrap_or_else(|| "Error".into());
    let message = text("message").unwrap_or_default();
    if name == "AbortError" {
        return ChannelError::Aborted;
    }
    ChannelError::Remote {
        name,
        message,
        fallback_requested: js_get(error, "fallbackRequested")
            .map(|flag| flag.is_truthy())
            .unwrap_or(false),
    }
}

#[async_trait(?Send)]
impl Channel for JsChannel {
    async fn request(
        &self,
        envelope: Envelope,
        signal: Option<AbortSignal>,
    ) -> Result<Envelope, ChannelError> {
        if self.closed.is_cancelled() {
            return Err(ChannelError::Closed);
        }

        let message = to_js(&envelope)?;
        let (signal, _following): (JsValue, _) = match signal.as_ref().and_then(lead_signal) {
            Some((signal, guard)) => (signal.into(), Some(guard)),
            None => (JsValue::UNDEFINED, None),
        };
        let request = js_get(&self.messenger, "request")
            .ok()
            .and_then(|request| request.dyn_into::<Function>().ok())
            .ok_or_else(|| ChannelError::Transport("messenger has no request()".into()))?;
        let reply: Promise = request
            .call2(&self.messenger, &message, &signal)
            .map_err(|error| rejection(&error))?
            .dyn_into()
            .map_err(|_| ChannelError::Transport("request() did not return a promise".into()))?;

        let reply = tokio::select! {
            reply = JsFuture::from(reply) => reply,
            _ = self.closed.cancelled() => return Err(ChannelError::Closed),
        };
        from_js(&reply.map_err(|error| rejection(&error))?)
    }

    async fn notification(&self) -> Option<Envelope> {
        let mut notifications = self.notifications.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => None,
            envelope = notifications.recv() => envelope,
        }
    }

    fn destroy(&self) {
        self.closed.cancel();
        let destroy = js_get(&self.messenger, "destroy")
            .ok()
            .and_then(|destroy| destroy.dyn_into::<Function>().ok());
        if let Some(destroy) = destroy {
            if let Err(error) = destroy.call0(&self.messenger) {
                tracing::trace!("Messenger destroy failed: {error:?}");
            }
        }
    }
}
