// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer JWT authentication for the holdings API.
//!
//! ## Auth Flow
//!
//! 1. The web application signs the user in and obtains a JWT
//! 2. It sends `Authorization: Bearer <JWT>`
//! 3. The server:
//!    - Verifies the HS256 signature (production) or only the structure
//!      (development)
//!    - Checks expiry (60 s clock skew) and, if configured, the issuer
//!    - Extracts `sub` → canonical `user_id` and the role claim
//!
//! ## Access
//!
//! - Holdings and tip listings are public
//! - Profile, hidden lists and tip creation need [`Auth`]
//! - Token administration and tip re-verification need [`AdminOnly`]

pub mod claims;
pub mod error;
pub mod extractor;
pub mod roles;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, JwtVerifier, OptionalAuth};
pub use roles::Role;
