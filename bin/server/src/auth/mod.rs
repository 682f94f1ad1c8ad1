//! Authentication module for the authgate server.
//!
//! This module provides:
//! - The login orchestrator: the state machine taking a client from "wants
//!   to log in" through the identity-provider round trips, optional terms
//!   acceptance, provisioning, and session issuance
//! - The identity-provider broker (OIDC client)
//! - Database repositories for the user/company directory and session store
//! - The HTTP handlers wiring it all to axum
//!
//! # Flow model
//!
//! There is no server-side flow object: the browser is the continuation
//! between steps, and the signed [`FlowState`](authgate_identity::FlowState)
//! is the only carried context. Each callback is handled independently and
//! may run concurrently with others; all database writes for a callback
//! happen in one transaction, and provisioning races are absorbed by the
//! directory's natural-key constraints.

pub mod broker;
pub mod db;
pub mod orchestrator;
pub mod redirect;
pub mod relations;
pub mod routes;

use authgate_identity::StateCodec;

use crate::config::TokenConfig;

pub use broker::{IdentityBroker, OidcBroker};
pub use orchestrator::{CallbackPurpose, LoginOrchestrator};
pub use routes::{
    accept_terms, health, invalidate, login, login_callback, logout, verification_callback,
};

/// Shared application state.
pub struct AppState {
    /// The login flow orchestrator.
    pub orchestrator: LoginOrchestrator,
    /// Codec for the inbound state parameter.
    pub codec: StateCodec,
    /// Session token and cookie configuration.
    pub token: TokenConfig,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(orchestrator: LoginOrchestrator, codec: StateCodec, token: TokenConfig) -> Self {
        Self {
            orchestrator,
            codec,
            token,
        }
    }
}
