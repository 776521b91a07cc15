//! Client-side cache and reconciliation engine for cloud-controlled smart lights.
//!
//! [`Client`] owns the single in-memory copy of every known light and scene; a
//! [`LightTarget`] is a live view over the subset a [`Selector`](domain::Selector) matches.
//! Mutations apply optimistically and reconcile against later fetches, so the UI state a
//! target exposes is always the freshest information available, local or remote.

mod client;
pub mod domain;
mod error;
pub mod http;
mod light_target;
mod remote;
#[cfg(test)]
mod testing;

pub use client::{Client, ObserverToken};
pub use error::ClientError;
pub use light_target::LightTarget;
pub use remote::RemoteService;
