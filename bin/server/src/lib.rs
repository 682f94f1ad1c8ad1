//! The authgate server library.
//!
//! An authentication gateway mediating between client applications, an
//! external OpenID Connect identity provider, and the internal user/company
//! directory.

pub mod auth;
pub mod config;
