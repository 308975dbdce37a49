//! # Security Module
//!
//! Consumer identification for protected routes and throttle selection.
//!
//! The router only needs one capability from authentication: given a request,
//! who is calling? That is the [`Authenticator`] trait. Credential mechanics
//! stay small and closed: [`AuthProvider`] covers HTTP Basic against a
//! credential table, API keys / bearer tokens against a token table, and a
//! custom variant for anything else (JWT, OAuth2 introspection, ...).
//!
//! ## Flow
//!
//! 1. The router asks the configured authenticator to identify every
//!    external API request.
//! 2. Protected routes without an identity fail with 401.
//! 3. Routes declaring scopes fail with 403 unless the identity holds all of
//!    them.
//! 4. The identity (or its absence) feeds throttle selection.
//!
//! Internal sub-requests skip the authenticator and inherit the outer
//! identity, or the one pretended through the internal dispatcher.
//!
//! ## Example
//!
//! ```rust
//! use vnd_api::security::{AuthProvider, Authenticator, Identity, TokenAuth};
//! use vnd_api::request::ApiRequest;
//!
//! let auth = AuthProvider::Token(
//!     TokenAuth::bearer().token("s3cret", Identity::new("42").with_scopes(["read"])),
//! );
//! let req = ApiRequest::get("/api/me").header("Authorization", "Bearer s3cret");
//! assert_eq!(auth.identify(&req).unwrap().id, "42");
//! ```

mod basic;
mod token;

use std::sync::Arc;

pub use basic::BasicAuth;
pub use token::TokenAuth;

use crate::request::ApiRequest;

/// An authenticated consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub scopes: Vec<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }

    /// Scopes from `required` this identity lacks.
    #[must_use]
    pub fn missing_scopes<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|s| !self.has_scope(s))
            .map(String::as_str)
            .collect()
    }
}

/// Identifies the consumer behind a request.
pub trait Authenticator: Send + Sync {
    /// `None` when the request carries no valid credentials.
    fn identify(&self, req: &ApiRequest) -> Option<Identity>;
}

impl<F> Authenticator for F
where
    F: Fn(&ApiRequest) -> Option<Identity> + Send + Sync,
{
    fn identify(&self, req: &ApiRequest) -> Option<Identity> {
        self(req)
    }
}

/// Closed set of authentication providers selected by configuration.
#[derive(Clone)]
pub enum AuthProvider {
    Basic(BasicAuth),
    Token(TokenAuth),
    Custom(Arc<dyn Authenticator>),
    /// Try each provider in order; first identity wins.
    Chain(Vec<AuthProvider>),
}

impl AuthProvider {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuthProvider::Basic(_) => "basic",
            AuthProvider::Token(_) => "token",
            AuthProvider::Custom(_) => "custom",
            AuthProvider::Chain(_) => "chain",
        }
    }
}

impl Authenticator for AuthProvider {
    fn identify(&self, req: &ApiRequest) -> Option<Identity> {
        match self {
            AuthProvider::Basic(basic) => basic.identify(req),
            AuthProvider::Token(token) => token.identify(req),
            AuthProvider::Custom(custom) => custom.identify(req),
            AuthProvider::Chain(providers) => providers.iter().find_map(|p| p.identify(req)),
        }
    }
}
