//! Core domain types for the authgate authentication gateway.
//!
//! This crate provides the foundational identifier types shared by the
//! directory records and the HTTP service.

pub mod id;

pub use id::{CompanyId, ParseIdError, UserId};
