// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod google_oidc;

pub use google_oidc::{GoogleIdTokenVerifier, OidcError, VerifiedIdentity};
