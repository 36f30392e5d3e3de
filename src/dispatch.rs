//! Request resolution against a [`Registry`].
//!
//! Transport is left to the embedding server: a [`Request`] is already the
//! route, body, peer address and cookie header. Checks run in a fixed order
//! (lookup, rate limit, decode, session) and the first failure wins.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::codec::{Arguments, DecodeError};
use crate::credentials::Credentials;
use crate::error::GenError;
use crate::method::{MethodDescriptor, Registry};

/// Looks up server-side sessions by the id carried in the session cookie.
pub trait SessionStore {
    type Session;

    fn get_by_session_id(&self, session_id: &str) -> Option<Self::Session>;
}

/// Returns `true` when `accessor` must NOT be let through to `resource` yet.
pub trait RateLimiter {
    fn rate_limit(&self, accessor: &str, resource: &str, window_secs: u32) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRateLimit;

impl RateLimiter for NoRateLimit {
    fn rate_limit(&self, _: &str, _: &str, _: u32) -> bool {
        false
    }
}

/// One lock per (accessor, resource) that expires after the method's window.
#[derive(Debug, Default)]
pub struct MemoryRateLimiter {
    locks: Mutex<HashMap<(String, String), Instant>>,
}

impl RateLimiter for MemoryRateLimiter {
    fn rate_limit(&self, accessor: &str, resource: &str, window_secs: u32) -> bool {
        let now = Instant::now();
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, until| *until > now);
        let key = (accessor.to_string(), resource.to_string());
        if locks.contains_key(&key) {
            return true;
        }
        locks.insert(key, now + Duration::from_secs(u64::from(window_secs)));
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct Request {
    pub route: String,
    pub body: Vec<u8>,
    pub peer: String,
    pub cookie: Option<String>,
}

/// A request that passed every check, ready for the handler.
#[derive(Debug)]
pub struct Call<'r, S> {
    pub method: &'r MethodDescriptor,
    pub arguments: Arguments,
    /// `None` when the method takes no session or an optional one is missing.
    pub session: Option<S>,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub set_cookies: Vec<String>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method `{0}` does not exist")]
    UnknownMethod(String),
    #[error("rate limit exceeded for `{method}` by {peer}")]
    RateLimited { method: String, peer: String },
    #[error("invalid parameters for `{method}`: {source}")]
    InvalidParameters {
        method: String,
        #[source]
        source: DecodeError,
    },
    #[error("invalid session for `{0}`")]
    InvalidSession(String),
    #[error("`{method}` failed: {source}")]
    Handler {
        method: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("`{method}` returned a value outside its declared type: {source}")]
    InvalidResult {
        method: String,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Schema(#[from] GenError),
}

impl DispatchError {
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::UnknownMethod(_) | DispatchError::InvalidParameters { .. } => 400,
            DispatchError::InvalidSession(_) => 401,
            DispatchError::RateLimited { .. } => 429,
            DispatchError::Handler { .. } | DispatchError::InvalidResult { .. } | DispatchError::Schema(_) => 500,
        }
    }

    /// Response body for a rejected request.
    pub fn public_message(&self) -> &'static str {
        match self {
            DispatchError::UnknownMethod(_) => "Method does not exist",
            DispatchError::RateLimited { .. } => "Rate limit exceeded",
            DispatchError::InvalidParameters { .. } => "Invalid parameters",
            DispatchError::InvalidSession(_) => "Invalid session",
            _ => "Internal server error",
        }
    }

    pub fn into_response(self) -> Response {
        Response {
            status: self.status(),
            body: self.public_message().as_bytes().to_vec(),
            set_cookies: Vec::new(),
        }
    }
}

pub struct Dispatcher<'r, S, L = NoRateLimit> {
    registry: &'r Registry,
    sessions: S,
    limiter: L,
}

impl<'r, S: SessionStore> Dispatcher<'r, S, NoRateLimit> {
    pub fn new(registry: &'r Registry, sessions: S) -> Self {
        Self { registry, sessions, limiter: NoRateLimit }
    }
}

impl<'r, S: SessionStore, L: RateLimiter> Dispatcher<'r, S, L> {
    pub fn with_limiter<M: RateLimiter>(self, limiter: M) -> Dispatcher<'r, S, M> {
        Dispatcher { registry: self.registry, sessions: self.sessions, limiter }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Run every check and decode the body, without calling anything.
    pub fn prepare(&self, request: &Request) -> Result<Call<'r, S::Session>, DispatchError> {
        let result = self.prepare_inner(request);
        if let Err(err) = &result {
            warn!(route = %request.route, peer = %request.peer, status = err.status(), "rejected request: {err}");
        }
        result
    }

    fn prepare_inner(&self, request: &Request) -> Result<Call<'r, S::Session>, DispatchError> {
        let name = request.route.strip_prefix('/').unwrap_or(&request.route);
        let method = self
            .registry
            .method(name)
            .ok_or_else(|| DispatchError::UnknownMethod(name.to_string()))?;

        if method.rate_limit > 0 && self.limiter.rate_limit(&request.peer, name, method.rate_limit) {
            return Err(DispatchError::RateLimited {
                method: method.name.clone(),
                peer: request.peer.clone(),
            });
        }

        let arguments = match method.codec.decode(self.registry.types(), &request.body) {
            Ok(arguments) => arguments,
            Err(DecodeError::Schema(err)) => return Err(err.into()),
            Err(source) => {
                return Err(DispatchError::InvalidParameters { method: method.name.clone(), source });
            }
        };

        let credentials = Credentials::from_cookie_header(request.cookie.as_deref());
        let mut session = None;
        if method.uses_session {
            session = credentials
                .session_id()
                .and_then(|id| self.sessions.get_by_session_id(id));
            if session.is_none() && !method.session_optional {
                return Err(DispatchError::InvalidSession(method.name.clone()));
            }
        }

        Ok(Call {
            method,
            arguments,
            session,
            credentials: method.uses_credentials.then_some(credentials),
        })
    }

    /// Resolve `request`, run `handler` on it and encode the checked result.
    pub fn dispatch<F>(&self, request: &Request, handler: F) -> Result<Response, DispatchError>
    where
        F: FnOnce(&mut Call<'r, S::Session>) -> anyhow::Result<Value>,
    {
        let mut call = self.prepare(request)?;
        let method = call.method;
        let result = handler(&mut call).map_err(|source| DispatchError::Handler {
            method: method.name.clone(),
            source,
        })?;
        let body = match method.codec.encode(self.registry.types(), &result) {
            Ok(body) => body,
            Err(DecodeError::Schema(err)) => return Err(err.into()),
            Err(source) => {
                let err = DispatchError::InvalidResult { method: method.name.clone(), source };
                warn!(method = %method.name, "{err}");
                return Err(err);
            }
        };
        Ok(Response {
            status: 200,
            body,
            set_cookies: call.credentials.map(Credentials::into_set_cookies).unwrap_or_default(),
        })
    }
}
