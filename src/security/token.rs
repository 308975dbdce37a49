use std::collections::HashMap;
use std::sync::Arc;

use http::header::AUTHORIZATION;

use super::{Authenticator, Identity};
use crate::request::ApiRequest;

#[derive(Debug, Clone)]
enum TokenSource {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// Raw value of a named header.
    Header(String),
    Query(String),
}

/// Opaque tokens (bearer tokens or API keys) looked up in a token table.
#[derive(Clone)]
pub struct TokenAuth {
    source: TokenSource,
    tokens: Arc<HashMap<String, Identity>>,
}

impl TokenAuth {
    fn with_source(source: TokenSource) -> Self {
        Self {
            source,
            tokens: Arc::new(HashMap::new()),
        }
    }

    pub fn bearer() -> Self {
        Self::with_source(TokenSource::Bearer)
    }

    /// API key carried in `header` (e.g. `X-API-Key`).
    pub fn api_key_header(header: &str) -> Self {
        Self::with_source(TokenSource::Header(header.to_ascii_lowercase()))
    }

    pub fn api_key_query(param: &str) -> Self {
        Self::with_source(TokenSource::Query(param.to_string()))
    }

    #[must_use]
    pub fn token(mut self, token: &str, identity: Identity) -> Self {
        Arc::make_mut(&mut self.tokens).insert(token.to_string(), identity);
        self
    }

    fn extract<'a>(&self, req: &'a ApiRequest) -> Option<&'a str> {
        match &self.source {
            TokenSource::Bearer => {
                let header = req.get_header(AUTHORIZATION.as_str())?;
                let (scheme, token) = header.split_once(' ')?;
                scheme
                    .eq_ignore_ascii_case("bearer")
                    .then(|| token.trim())
            }
            TokenSource::Header(name) => req.get_header(name),
            TokenSource::Query(name) => req.get_query_param(name),
        }
    }
}

impl Authenticator for TokenAuth {
    fn identify(&self, req: &ApiRequest) -> Option<Identity> {
        let token = self.extract(req)?;
        self.tokens.get(token).cloned()
    }
}
