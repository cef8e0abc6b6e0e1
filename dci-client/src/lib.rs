//! Client for the DCI control-plane REST API
//!
//! Every call is a signed HTTP GET returning JSON (or raw file content) and
//! goes through a retrying transport that only retries connection errors and
//! timeouts. The [`CiApi`] trait is the seam the sync orchestrator depends on.

pub mod api;
pub mod client;
pub mod error;
pub mod signer;

pub use api::CiApi;
pub use client::DciClient;
pub use error::{ClientError, ClientResult};
pub use signer::Signer;
