//! REST API client module for the Pathway backend.
//!
//! This module provides the `ApiClient` used by the auth components to
//! exchange credentials, refresh access tokens, and fetch the signed-in
//! user's profile.
//!
//! The backend issues JWT bearer tokens; the profile endpoint expects the
//! access token in the `Authorization` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, ProfileId, RefreshResponse, TokenResponse, UserProfile};
pub use error::ApiError;
