//! Endpoint name to query parameter resolution
//!
//! Each catalog endpoint takes exactly one identifier, but under a different
//! parameter name. The mapping lives in a lookup table so that adding an
//! endpoint is a data change.

use std::collections::BTreeMap;

use super::{EndpointSource, FetchError, IndexKey};

/// Endpoints understood out of the box, as `(endpoint_name, parameter_name)`
pub const KNOWN_ENDPOINTS: &[(&str, &str)] = &[
    ("inventory_types", "type_id"),
    ("map_regions", "region_id"),
];

/// Parameters used to fill in an endpoint's address template
pub type ParameterMapping = BTreeMap<String, IndexKey>;

/// Maps endpoint names to the parameter each one expects
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    parameters: BTreeMap<String, String>,
}

impl Default for EndpointResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver {
    /// Creates a resolver populated with `KNOWN_ENDPOINTS`
    pub fn new() -> Self {
        let parameters = KNOWN_ENDPOINTS
            .iter()
            .map(|(endpoint, param)| (endpoint.to_string(), param.to_string()))
            .collect();
        Self { parameters }
    }

    /// Adds (or replaces) the parameter name for an endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>, param: impl Into<String>) -> Self {
        self.parameters.insert(endpoint.into(), param.into());
        self
    }

    /// Adds every row of `extra`, replacing existing rows with the same name
    pub fn extend<I, K, V>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(extra.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns whether `endpoint` has a parameter mapping
    pub fn supports(&self, endpoint: &str) -> bool {
        self.parameters.contains_key(endpoint)
    }

    /// Returns the parameter name for `endpoint`, if known
    pub fn parameter_name(&self, endpoint: &str) -> Option<&str> {
        self.parameters.get(endpoint).map(String::as_str)
    }

    /// Builds the parameter mapping for looking up `identifier` at `endpoint`
    ///
    /// # Returns
    /// * `Ok(ParameterMapping)` with a single `parameter_name -> identifier` pair
    /// * `Err(FetchError::UnsupportedEndpoint)` if the endpoint is not in the table
    pub fn resolve(
        &self,
        endpoint: &str,
        identifier: &IndexKey,
    ) -> Result<ParameterMapping, FetchError> {
        let param = self
            .parameter_name(endpoint)
            .ok_or_else(|| FetchError::UnsupportedEndpoint {
                endpoint: endpoint.to_string(),
                source_table: EndpointSource::Parameters,
            })?;

        let mut mapping = ParameterMapping::new();
        mapping.insert(param.to_string(), identifier.clone());
        Ok(mapping)
    }
}
