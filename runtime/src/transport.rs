use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Per-call settings passed to every generated operation.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

/// What a generated client knows about the operation being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call<'a> {
    pub endpoint: &'a str,
    pub action: &'a str,
    pub operation: &'a str,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unable to encode request: {0}")]
    Encode(String),

    #[error("Unable to decode response: {0}")]
    Decode(String),

    #[error("Fault {code}: {message}")]
    Fault {
        code: String,
        message: String,
        detail: Option<String>,
    },
}

/// Moves a request to the service and its response back. Envelope encoding
/// is up to the implementation.
pub trait Transport {
    fn call<Req, Resp>(&self, ctx: &Context, call: &Call<'_>, request: Option<&Req>) -> Result<Resp, Error>
    where
        Req: Serialize,
        Resp: DeserializeOwned;
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn call<Req, Resp>(&self, ctx: &Context, call: &Call<'_>, request: Option<&Req>) -> Result<Resp, Error>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        (**self).call(ctx, call, request)
    }
}
