//! Remote catalog access
//!
//! This module holds the types shared by the endpoint resolver and the remote
//! fetcher: the lookup identifier, and the error taxonomy for everything that
//! can go wrong between an endpoint name and a parsed response body.

pub mod endpoints;
pub mod fetcher;

pub use endpoints::{EndpointResolver, ParameterMapping, KNOWN_ENDPOINTS};
pub use fetcher::{render_template, RemoteFetcher};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identifier looked up at a catalog endpoint (a type id, region id, ...)
///
/// Serialized untagged, so the integer `587` and the string `"587"` are
/// distinct keys in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexKey {
    Int(i64),
    Str(String),
}

impl IndexKey {
    /// Parses a command-line style argument: canonical integers become `Int`,
    /// anything else (including `007` or `+5`) is kept as a string key.
    pub fn parse_arg(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => IndexKey::Int(n),
            _ => IndexKey::Str(s.to_string()),
        }
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKey::Int(n) => write!(f, "{}", n),
            IndexKey::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for IndexKey {
    fn from(n: i64) -> Self {
        IndexKey::Int(n)
    }
}

impl From<i32> for IndexKey {
    fn from(n: i32) -> Self {
        IndexKey::Int(n as i64)
    }
}

impl From<u32> for IndexKey {
    fn from(n: u32) -> Self {
        IndexKey::Int(n as i64)
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        IndexKey::Str(s.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        IndexKey::Str(s)
    }
}

/// Where an unsupported endpoint name was found missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    /// The endpoint-to-parameter table used by the resolver
    Parameters,
    /// The address template table used by the fetcher
    Resources,
}

/// Category of a fetch failure, for callers that log or count errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedEndpoint,
    AddressConstruction,
    RemoteFetch,
}

/// Errors that can occur while resolving and fetching a catalog entry
#[derive(Debug, Error)]
pub enum FetchError {
    /// Endpoint name is not configured
    #[error("{}", unsupported_message(.endpoint, .source_table))]
    UnsupportedEndpoint {
        endpoint: String,
        source_table: EndpointSource,
    },

    /// Address template could not be filled in or produced an invalid URL
    #[error("Unable to build address: {0}")]
    AddressConstruction(String),

    /// Transport failure, non-success status, or unparseable body
    #[error("{}", remote_message(.status, .message))]
    RemoteFetch {
        status: Option<u16>,
        message: String,
    },
}

fn unsupported_message(endpoint: &str, source_table: &EndpointSource) -> String {
    match source_table {
        EndpointSource::Parameters => format!("No configuration for {}", endpoint),
        EndpointSource::Resources => format!("No {} found in resources", endpoint),
    }
}

fn remote_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("Remote fetch failed with status {}: {}", code, message),
        None => format!("Remote fetch failed: {}", message),
    }
}

impl FetchError {
    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::UnsupportedEndpoint { .. } => ErrorKind::UnsupportedEndpoint,
            FetchError::AddressConstruction(_) => ErrorKind::AddressConstruction,
            FetchError::RemoteFetch { .. } => ErrorKind::RemoteFetch,
        }
    }

    /// HTTP status of the failed response, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::RemoteFetch { status, .. } => *status,
            _ => None,
        }
    }

    /// Only remote failures may succeed when tried again; the rest are
    /// configuration mistakes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::RemoteFetch { .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::RemoteFetch {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
