//! Page-side interception of WebAuthn calls.
//!
//! A [`Shim`] takes over a page's `navigator.credentials.create()` and
//! `navigator.credentials.get()` and hands public-key calls to a trusted
//! delegate over a [`Channel`]. When the delegate declines a call and the
//! page has a native implementation, the call falls back to it.
//! Conditional (autofill) retrievals race the delegate against the native
//! implementation.
//!
//! The core is platform neutral: a [`Page`] supplies the page's globals and
//! a [`Channel`] carries [`Envelope`]s. On `wasm32` the `web` module binds
//! both to the browser and exports an `install` entry point to script.

#![warn(missing_docs)]

pub mod codec;
pub mod config;
pub mod credential;
pub mod delegate;
pub mod error;
mod fallback;
pub mod focus;
pub mod options;
pub mod page;
pub mod platform;
mod race;
pub mod shim;
pub mod wire;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::ShimConfig;
pub use credential::{
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, AuthenticatorResponse,
    PublicKeyCredential,
};
pub use delegate::Channel;
pub use error::{ChannelError, ShimError};
pub use focus::{FocusGate, TopWindow, TopWindowInaccessible};
pub use options::*;
pub use page::{Credentials, CredentialsContainer, DocumentInfo, Page, PublicKeyCredentialPolyfill};
pub use shim::{Capabilities, Shim, ShimState};
pub use wire::{Envelope, MessageType};
