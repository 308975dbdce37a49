use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::AUTHORIZATION;

use super::{Authenticator, Identity};
use crate::request::ApiRequest;

/// HTTP Basic authentication against an in-memory credential table.
#[derive(Clone, Default)]
pub struct BasicAuth {
    users: Arc<HashMap<String, (String, Identity)>>,
}

impl BasicAuth {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(mut self, username: &str, password: &str, identity: Identity) -> Self {
        Arc::make_mut(&mut self.users).insert(username.to_string(), (password.to_string(), identity));
        self
    }

    fn credentials(req: &ApiRequest) -> Option<(String, String)> {
        let header = req.get_header(AUTHORIZATION.as_str())?;
        let (scheme, encoded) = header.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }
}

impl Authenticator for BasicAuth {
    fn identify(&self, req: &ApiRequest) -> Option<Identity> {
        let (user, pass) = Self::credentials(req)?;
        match self.users.get(&user) {
            Some((expected, identity)) if *expected == pass => Some(identity.clone()),
            _ => None,
        }
    }
}
