//! Issuing requests to the out-of-page delegate.

use async_trait::async_trait;

use crate::codec;
use crate::credential::PublicKeyCredential;
use crate::error::{ChannelError, ShimError};
use crate::options::{AbortSignal, CreationOptions, RequestOptions};
use crate::platform::ConditionalSync;
use crate::wire::{AssertCredentialResult, CreateCredentialResult, Envelope, MessageType};

/// The request/response channel to the delegate.
///
/// Correlating replies with requests, and propagating an aborted `signal` to
/// the far side, are the channel's job.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Channel: ConditionalSync + 'static {
    /// Send `envelope` and wait for the reply to it.
    async fn request(
        &self,
        envelope: Envelope,
        signal: Option<AbortSignal>,
    ) -> Result<Envelope, ChannelError>;

    /// The next message the delegate sent on its own initiative, or `None`
    /// once the channel is closed.
    async fn notification(&self) -> Option<Envelope>;

    /// Release the channel. Best effort.
    fn destroy(&self);
}

/// A reply type the delegate may answer with.
pub trait DelegatedResponse: Sized {
    /// The envelope type this reply travels under.
    const TYPE: MessageType;

    /// The payload, when `envelope` is of type [`Self::TYPE`].
    fn from_envelope(envelope: Envelope) -> Option<Self>;
}

impl DelegatedResponse for CreateCredentialResult {
    const TYPE: MessageType = MessageType::CredentialCreationResponse;

    fn from_envelope(envelope: Envelope) -> Option<Self> {
        match envelope {
            Envelope::CredentialCreationResponse { result } => Some(result),
            _ => None,
        }
    }
}

impl DelegatedResponse for AssertCredentialResult {
    const TYPE: MessageType = MessageType::CredentialGetResponse;

    fn from_envelope(envelope: Envelope) -> Option<Self> {
        match envelope {
            Envelope::CredentialGetResponse { result } => Some(result),
            _ => None,
        }
    }
}

/// Send one request and wait for a reply of type `R`.
///
/// Nothing is sent when `signal` is already cancelled. A cancellation while
/// waiting resolves to [`ShimError::Aborted`] immediately, whatever the
/// channel does with it.
pub async fn delegate<R, C>(
    channel: &C,
    envelope: Envelope,
    signal: Option<&AbortSignal>,
) -> Result<R, ShimError>
where
    R: DelegatedResponse,
    C: Channel + ?Sized,
{
    let sent = envelope.message_type();
    let reply = match signal {
        Some(signal) if signal.is_cancelled() => return Err(ShimError::Aborted),
        Some(signal) => tokio::select! {
            reply = channel.request(envelope, Some(signal.clone())) => reply?,
            _ = signal.cancelled() => return Err(ShimError::Aborted),
        },
        None => channel.request(envelope, None).await?,
    };

    let received = reply.message_type();
    tracing::trace!("{sent} answered with {received}");
    R::from_envelope(reply).ok_or(ShimError::ProtocolMismatch {
        expected: R::TYPE,
        received,
    })
}

/// Ask the delegate to create a credential.
pub async fn delegate_creation<C, O>(
    channel: &C,
    options: &O,
    fallback_supported: bool,
) -> Result<PublicKeyCredential, ShimError>
where
    C: Channel + ?Sized,
    O: CreationOptions,
{
    let data = codec::encode_creation_options(options, fallback_supported)?;
    let result: CreateCredentialResult = delegate(
        channel,
        Envelope::CredentialCreationRequest { data },
        options.signal(),
    )
    .await?;
    codec::decode_creation_result(result)
}

/// Ask the delegate for an assertion.
pub async fn delegate_assertion<C, O>(
    channel: &C,
    options: &O,
    fallback_supported: bool,
) -> Result<PublicKeyCredential, ShimError>
where
    C: Channel + ?Sized,
    O: RequestOptions,
{
    let data = codec::encode_assertion_options(options, fallback_supported)?;
    let result: AssertCredentialResult = delegate(
        channel,
        Envelope::CredentialGetRequest { data },
        options.signal(),
    )
    .await?;
    codec::decode_assertion_result(result)
}
