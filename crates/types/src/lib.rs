//! Core types and traits for the oauthdb workspace.
//!
//! This crate defines the OAuth2 token and client models persisted by the
//! stores, the storage contracts the authorization server consumes, the row
//! lifecycle state shared by the store and its garbage collector, and the
//! error type used across all crates.

pub mod client;
pub mod error;
pub mod token;
pub mod traits;

pub use client::Client;
pub use error::Error;
pub use token::{Token, TokenRowState};
pub use traits::{ClientStore, Result, TokenStore};
