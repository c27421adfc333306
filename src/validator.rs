//! Id validation against the remote catalog
//!
//! `Validator` ties the pieces together: resolve the endpoint's parameter,
//! serve a fresh cache entry if there is one, otherwise fetch from CREST and
//! store the result. Only a failed fetch (or an unknown endpoint) fails a
//! validation; cache problems are logged and worked around.

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::{CacheStore, FreshnessPolicy};
use crate::catalog::{EndpointResolver, ErrorKind, FetchError, IndexKey, RemoteFetcher};
use crate::config::{ConfigError, Settings};

/// A failed validation of one `(endpoint, identifier)` pair
#[derive(Debug, Error)]
#[error("Unable to validate {endpoint}:{identifier}")]
pub struct IdValidationError {
    /// Endpoint the lookup was made against
    pub endpoint: String,
    /// Identifier that could not be validated
    pub identifier: IndexKey,
    /// What went wrong
    #[source]
    pub cause: FetchError,
}

impl IdValidationError {
    /// Category of the underlying failure
    pub fn kind(&self) -> ErrorKind {
        self.cause.kind()
    }

    /// HTTP status returned by the remote service, if any
    pub fn status(&self) -> Option<u16> {
        self.cause.status()
    }

    pub fn is_retryable(&self) -> bool {
        self.cause.is_retryable()
    }
}

/// Validates ids against CREST with a local TTL cache in front
#[derive(Debug, Clone)]
pub struct Validator {
    resolver: EndpointResolver,
    fetcher: RemoteFetcher,
    cache: Option<CacheStore>,
    freshness: FreshnessPolicy,
}

impl Validator {
    /// Builds a validator from settings
    ///
    /// The cache lives in `settings.cache_dir`, or the XDG cache directory
    /// when unset. If neither is available the validator runs uncached.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut builder = Client::builder();
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| ConfigError::Invalid(format!("unable to build HTTP client: {}", e)))?;

        let fetcher = RemoteFetcher::new(
            settings.base_url.clone(),
            settings.resources.clone(),
            settings.user_agent.clone(),
        )
        .with_client(client);

        let resolver = EndpointResolver::new().extend(settings.parameters.clone());

        let cache = match &settings.cache_dir {
            Some(dir) => Some(CacheStore::with_dir(dir.clone())),
            None => CacheStore::new(),
        };

        Ok(Self::from_parts(resolver, fetcher, cache, settings.freshness()))
    }

    /// Assembles a validator from already-built components
    pub fn from_parts(
        resolver: EndpointResolver,
        fetcher: RemoteFetcher,
        cache: Option<CacheStore>,
        freshness: FreshnessPolicy,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            cache,
            freshness,
        }
    }

    /// Cache store in use, if any
    pub fn cache(&self) -> Option<&CacheStore> {
        self.cache.as_ref()
    }

    /// TTL policy used for cache lookups
    pub fn freshness(&self) -> FreshnessPolicy {
        self.freshness
    }

    /// Checks CREST as the source of truth for `identifier` at `endpoint`
    ///
    /// # Arguments
    /// * `endpoint` - Logical endpoint name, e.g. `inventory_types`
    /// * `identifier` - Id to look up
    /// * `cache_bypass` - Skip the cache read and always fetch
    ///
    /// # Returns
    /// * `Ok(Value)` - Cached or freshly fetched document for the id
    /// * `Err(IdValidationError)` - Unknown endpoint, bad address template, or
    ///   the remote lookup failed
    ///
    /// # Behavior
    /// - Unknown endpoints fail before the cache or network is touched
    /// - A fresh cache entry is returned without a network call
    /// - Fetched data is written back to the cache; a failed write is logged
    ///   and the data is still returned
    pub async fn validate(
        &self,
        endpoint: &str,
        identifier: impl Into<IndexKey>,
        cache_bypass: bool,
    ) -> Result<Value, IdValidationError> {
        let identifier = identifier.into();

        let params = self
            .resolver
            .resolve(endpoint, &identifier)
            .map_err(|cause| self.failure(endpoint, &identifier, cause))?;

        if !cache_bypass {
            if let Some(cache) = &self.cache {
                info!(endpoint, %identifier, "searching cache");
                let cutoff = self.freshness.cutoff(Utc::now());
                if let Some(entry) = cache.find(endpoint, &identifier, cutoff) {
                    info!(endpoint, %identifier, "found cache entry");
                    debug!(cached_at = %entry.cache_datetime, "serving cached payload");
                    return Ok(entry.payload);
                }
            }
        }

        info!(endpoint, %identifier, "fetching catalog entry");
        let data = self
            .fetcher
            .fetch(endpoint, &params)
            .await
            .map_err(|cause| self.failure(endpoint, &identifier, cause))?;

        if let Some(cache) = &self.cache {
            info!(endpoint, %identifier, "updating cache");
            if let Err(err) = cache.upsert(endpoint, &identifier, &data) {
                error!(endpoint, %identifier, error = %err, "unable to write to cache");
            }
        }

        Ok(data)
    }

    fn failure(&self, endpoint: &str, identifier: &IndexKey, cause: FetchError) -> IdValidationError {
        error!(
            endpoint,
            %identifier,
            kind = ?cause.kind(),
            error = %cause,
            "unable to validate id"
        );
        IdValidationError {
            endpoint: endpoint.to_string(),
            identifier: identifier.clone(),
            cause,
        }
    }
}
