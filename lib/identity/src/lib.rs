//! Login-flow domain library for the authgate authentication gateway.
//!
//! This crate provides:
//! - The transient login flow state (`FlowState`) carried through the
//!   identity-provider redirect round trip
//! - A tamper-evident codec for that state (`StateCodec`)
//!   and a symmetric cipher for the secrets smuggled inside it (`FlowCipher`)
//! - Directory record types (`User`, `Company`, `ExternalIdentityLink`,
//!   `AccessToken`, `LoginRecord`)
//! - Identity-provider configuration and token types (`IdpConfig`, `IdpToken`)
//! - The stable client-facing error-code vocabulary (`ErrorCode`)
//!
//! # Flow model
//!
//! The login protocol is a sequence of independent request/response cycles:
//! the client's browser is the continuation between steps, and the signed
//! `FlowState` is the only context that survives a redirect. Everything a
//! later step needs must therefore live inside the state, and the state must
//! be authenticated because it travels through a client-controlled channel.

pub mod cipher;
pub mod codec;
pub mod company;
pub mod error;
pub mod flow;
pub mod idp;
pub mod token;
pub mod user;

// Re-export main types at crate root
pub use cipher::{CipherError, FlowCipher};
pub use codec::{StateCodec, StateDecodeError};
pub use company::Company;
pub use error::ErrorCode;
pub use flow::FlowState;
pub use idp::{IdpConfig, IdpToken};
pub use token::{AccessToken, LoginRecord, generate_opaque_token};
pub use user::{ExternalIdentityLink, User};
