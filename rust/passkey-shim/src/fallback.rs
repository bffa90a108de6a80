//! Delegation with a native fallback.
//!
//! A call goes to the delegate first. When the delegate declines it, and the
//! page has a native implementation able to take the same call, the call is
//! retried natively with the caller's original options once the top-level
//! window has focus.

use crate::delegate::{Channel, delegate_assertion, delegate_creation};
use crate::error::ShimError;
use crate::options::CreationOptions;
use crate::page::Page;
use crate::shim::Interception;

pub(crate) async fn create_credential<P, C>(
    shim: &Interception<P, C>,
    options: P::CreationOptions,
) -> Result<P::Credential, P::Error>
where
    P: Page,
    C: Channel,
{
    let platform_requested = options
        .public_key()
        .is_some_and(|public_key| public_key.requests_platform_authenticator());
    let fallback_supported = shim.state.fallback_supported(platform_requested);

    match delegate_creation(shim.channel.as_ref(), &options, fallback_supported).await {
        Ok(credential) => Ok(credential.into()),
        Err(error) => {
            prepare_fallback(shim, error, fallback_supported).await?;
            shim.native.create(options).await
        }
    }
}

pub(crate) async fn get_credential<P, C>(
    shim: &Interception<P, C>,
    options: P::RequestOptions,
) -> Result<P::Credential, P::Error>
where
    P: Page,
    C: Channel,
{
    let fallback_supported = shim.state.fallback_supported(false);

    match delegate_assertion(shim.channel.as_ref(), &options, fallback_supported).await {
        Ok(credential) => Ok(credential.into()),
        Err(error) => {
            prepare_fallback(shim, error, fallback_supported).await?;
            shim.native.get(options).await
        }
    }
}

/// Decide whether `error` may be recovered from natively, and if so wait
/// until the native call can be made. Otherwise hand `error` back.
async fn prepare_fallback<P, C>(
    shim: &Interception<P, C>,
    error: ShimError,
    fallback_supported: bool,
) -> Result<(), ShimError>
where
    P: Page,
    C: Channel,
{
    if !error.is_fallback_eligible() {
        tracing::debug!("Delegation failed: {error}");
        return Err(error);
    }
    if !fallback_supported {
        tracing::debug!("Delegate declined and no native fallback is available");
        return Err(error);
    }

    tracing::debug!("Delegate declined; falling back to the native API");
    shim.focus
        .wait_for_focus(
            shim.page.top(),
            shim.config.focus_fallback_wait,
            shim.config.focus_timeout,
        )
        .await
}
