//! Conditional (autofill style) retrieval.
//!
//! The delegate and the native implementation are asked at the same time,
//! each in its own task under its own child of the caller's signal.
//! Whichever produces a result first wins and both children are cancelled.
//!
//! The delegated branch never settles the race with a failure. Its errors
//! are logged and the branch simply stops competing, so a native rejection
//! settles the race in that case.

use std::future::pending;

use tokio::sync::oneshot;

use crate::credential::PublicKeyCredential;
use crate::delegate::{Channel, delegate_assertion};
use crate::error::ShimError;
use crate::options::RequestOptions;
use crate::page::Page;
use crate::platform::detach;
use crate::shim::Interception;
use crate::wire::Envelope;

enum Winner<T> {
    Delegated(PublicKeyCredential),
    Native(T),
}

pub(crate) async fn conditional_get<P, C>(
    shim: &Interception<P, C>,
    options: P::RequestOptions,
) -> Result<P::Credential, P::Error>
where
    P: Page,
    C: Channel,
{
    let outer = options.signal().cloned().unwrap_or_default();
    let delegated_signal = outer.child_token();
    let native_signal = outer.child_token();
    let request_id = shim.next_request_id();
    let fallback_supported = shim.state.fallback_supported(false);

    let (delegated_sender, delegated_receiver) = oneshot::channel();
    let channel = shim.channel.clone();
    let delegated_options = options.with_signal(delegated_signal.clone());
    detach(async move {
        match delegate_assertion(channel.as_ref(), &delegated_options, fallback_supported).await {
            Ok(credential) => {
                let _ = delegated_sender.send(credential);
            }
            Err(error) => {
                tracing::debug!("Delegated conditional request {request_id} failed: {error}");
            }
        }
    });

    let (native_sender, native_receiver) = oneshot::channel();
    let native = shim.native.clone();
    let native_options = options.with_signal(native_signal.clone());
    detach(async move {
        let _ = native_sender.send(native.get(native_options).await);
    });

    let delegated = async {
        match delegated_receiver.await {
            Ok(credential) => credential,
            Err(_) => pending().await,
        }
    };
    let native = async {
        native_receiver
            .await
            .unwrap_or_else(|_| Err(ShimError::Aborted.into()))
    };

    let winner = tokio::select! {
        credential = delegated => Winner::Delegated(credential),
        outcome = native => Winner::Native(outcome),
    };

    delegated_signal.cancel();
    native_signal.cancel();

    match winner {
        Winner::Delegated(credential) => {
            tracing::debug!("Delegate won conditional request {request_id}");
            Ok(credential.into())
        }
        Winner::Native(outcome) => {
            tracing::debug!("Native API settled conditional request {request_id}");
            let channel = shim.channel.clone();
            detach(async move {
                let abort = Envelope::AbortRequest {
                    aborted_request_id: request_id.to_string(),
                };
                if let Err(error) = channel.request(abort, None).await {
                    tracing::trace!("Abort notification not delivered: {error}");
                }
            });
            outcome
        }
    }
}
