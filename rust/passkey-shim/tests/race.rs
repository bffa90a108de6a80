//! Conditional mediation races the delegate against the page's own API.

mod common;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen_test::wasm_bindgen_test;
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_dedicated_worker);

use std::time::Duration;

use anyhow::Result;
use common::*;
use passkey_shim::{AbortSignal, CredentialRequestOptions, Mediation, RequestOptions};

fn conditional() -> CredentialRequestOptions {
    request_options(Some(Mediation::Conditional))
}

fn cancelled(signals: &[Option<AbortSignal>]) -> Vec<bool> {
    signals
        .iter()
        .map(|signal| signal.as_ref().is_some_and(AbortSignal::is_cancelled))
        .collect()
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_cancels_the_native_attempt_when_the_delegate_wins() -> Result<()> {
    let native = NativeCredentials::new(Native::UntilAborted);
    let shim = installed(&native, [assertion_response()]).await?;

    let Credential::Delegated(credential) = shim.page().get(conditional()).await? else {
        anyhow::bail!("expected the delegated credential");
    };
    assert_eq!(credential.raw_id(), b"asserted");

    assert_eq!(cancelled(&native.signals.lock()), vec![true]);
    settle().await;
    assert!(shim.channel().aborts().is_empty());
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_cancels_the_delegate_when_the_page_wins() -> Result<()> {
    let native = NativeCredentials::new(Native::Resolve);
    let shim = installed(&native, [Reply::Hang]).await?;

    let outcome = shim.page().get(conditional()).await?;
    assert_eq!(outcome, Credential::Native("get"));

    assert_eq!(cancelled(&shim.channel().signals.lock()), vec![true]);
    settle().await;
    assert_eq!(shim.channel().aborts(), vec!["0".to_string()]);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_numbers_abort_notifications_per_shim() -> Result<()> {
    let native = NativeCredentials::new(Native::Resolve);
    let shim = installed(&native, [Reply::Hang, Reply::Hang]).await?;

    shim.page().get(conditional()).await?;
    shim.page().get(conditional()).await?;
    settle().await;

    assert_eq!(shim.channel().aborts(), vec!["0".to_string(), "1".to_string()]);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_ignores_a_failed_delegate() -> Result<()> {
    let native = NativeCredentials::new(Native::ResolveAfter(Duration::from_millis(20)));
    let shim = installed(&native, [rejected()]).await?;

    let outcome = shim.page().get(conditional()).await?;

    assert_eq!(outcome, Credential::Native("get"));
    assert_eq!(shim.channel().requests().len(), 1);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_settles_with_the_native_rejection_when_both_fail() -> Result<()> {
    let native = NativeCredentials::new(Native::Reject);
    let shim = installed(&native, [declined()]).await?;

    let outcome = shim.page().get(conditional()).await;

    assert_eq!(outcome, Err(Rejection::Native("NotAllowedError")));
    assert_eq!(native.call_count(), 1);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_tears_down_both_branches_when_the_caller_aborts() -> Result<()> {
    let native = NativeCredentials::new(Native::UntilAborted);
    let shim = installed(&native, [Reply::Hang]).await?;

    let outer = AbortSignal::new();
    let (outcome, ()) = tokio::join!(
        shim.page().get(conditional().with_signal(outer.clone())),
        async {
            settle().await;
            outer.cancel();
        }
    );

    assert_eq!(outcome, Err(Rejection::Native("AbortError")));
    assert_eq!(cancelled(&native.signals.lock()), vec![true]);
    assert_eq!(cancelled(&shim.channel().signals.lock()), vec![true]);
    Ok(())
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test)]
#[cfg_attr(not(target_arch = "wasm32"), tokio::test)]
async fn it_never_delegates_when_aborted_up_front() -> Result<()> {
    let native = NativeCredentials::new(Native::UntilAborted);
    let shim = installed(&native, []).await?;

    let outer = AbortSignal::new();
    outer.cancel();
    let outcome = shim.page().get(conditional().with_signal(outer)).await;

    assert_eq!(outcome, Err(Rejection::Native("AbortError")));
    assert!(shim.channel().requests().is_empty());
    Ok(())
}
