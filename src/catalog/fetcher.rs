//! CREST endpoint client
//!
//! Builds a concrete address from the base URL and a per-endpoint template,
//! performs a single GET and parses the body as JSON.

use std::collections::HashMap;

use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::debug;

use super::{EndpointSource, FetchError, ParameterMapping};

/// Fills `{name}` placeholders in `template` from `params`
///
/// `{{` and `}}` produce literal braces. Substituted values are
/// percent-encoded so an id always lands in a single path segment.
///
/// # Returns
/// * `Ok(String)` with every placeholder replaced
/// * `Err(FetchError::AddressConstruction)` if a placeholder has no value,
///   a value is empty, `.` or `..`, or a brace is left unbalanced
pub fn render_template(template: &str, params: &ParameterMapping) -> Result<String, FetchError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(FetchError::AddressConstruction(format!(
                                "unterminated placeholder in '{}'",
                                template
                            )))
                        }
                    }
                }
                let value = params.get(&name).ok_or_else(|| {
                    FetchError::AddressConstruction(format!("missing parameter '{}'", name))
                })?;
                out.push_str(&encode_segment(&name, &value.to_string())?);
            }
            '}' => {
                return Err(FetchError::AddressConstruction(format!(
                    "unmatched '}}' in '{}'",
                    template
                )))
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Percent-encodes every byte outside the RFC 3986 unreserved set
fn encode_segment(name: &str, value: &str) -> Result<String, FetchError> {
    if value.is_empty() || value == "." || value == ".." {
        return Err(FetchError::AddressConstruction(format!(
            "'{}' is not a usable value for '{}'",
            value, name
        )));
    }

    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    Ok(encoded)
}

/// Client for fetching catalog entries from CREST
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    base_url: String,
    resources: HashMap<String, String>,
    user_agent: String,
}

impl RemoteFetcher {
    /// Creates a fetcher with a default HTTP client
    ///
    /// # Arguments
    /// * `base_url` - Address every template is appended to
    /// * `resources` - Address template per endpoint name
    /// * `user_agent` - Sent as the `User-Agent` header on every request
    pub fn new(
        base_url: impl Into<String>,
        resources: HashMap<String, String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            resources,
            user_agent: user_agent.into(),
        }
    }

    /// Replaces the HTTP client (timeouts, proxies, ...)
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Base address requests are built from
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the concrete address for `endpoint` from its template
    pub fn build_url(&self, endpoint: &str, params: &ParameterMapping) -> Result<Url, FetchError> {
        let template =
            self.resources
                .get(endpoint)
                .ok_or_else(|| FetchError::UnsupportedEndpoint {
                    endpoint: endpoint.to_string(),
                    source_table: EndpointSource::Resources,
                })?;

        let path = render_template(template, params)?;
        let address = join_address(&self.base_url, &path);

        Url::parse(&address).map_err(|e| {
            FetchError::AddressConstruction(format!("invalid address '{}': {}", address, e))
        })
    }

    /// Fetches the JSON document for `endpoint` with the given parameters
    ///
    /// # Returns
    /// * `Ok(Value)` - Parsed response body
    /// * `Err(FetchError)` - Unknown endpoint, bad template, transport failure,
    ///   non-success status, or a body that is not JSON
    pub async fn fetch(&self, endpoint: &str, params: &ParameterMapping) -> Result<Value, FetchError> {
        let url = self.build_url(endpoint, params)?;
        debug!(%url, endpoint, "requesting catalog endpoint");

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RemoteFetch {
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("non-success status")
                    .to_string(),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::RemoteFetch {
            status: Some(status.as_u16()),
            message: format!("Failed to parse JSON response: {}", e),
        })
    }
}

/// Appends `path` to `base` with exactly one `/` between them
fn join_address(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ErrorKind, IndexKey};

    fn params(name: &str, id: i64) -> ParameterMapping {
        let mut mapping = ParameterMapping::new();
        mapping.insert(name.to_string(), IndexKey::Int(id));
        mapping
    }

    fn resources() -> HashMap<String, String> {
        HashMap::from([
            (
                "inventory_types".to_string(),
                "inventory/types/{type_id}/".to_string(),
            ),
            (
                "map_regions".to_string(),
                "regions/{region_id}/".to_string(),
            ),
        ])
    }

    #[test]
    fn test_render_template_substitutes_parameter() {
        let rendered =
            render_template("inventory/types/{type_id}/", &params("type_id", 587)).unwrap();
        assert_eq!(rendered, "inventory/types/587/");
    }

    #[test]
    fn test_render_template_missing_parameter() {
        let err =
            render_template("inventory/types/{type_id}/", &params("region_id", 1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddressConstruction);
        assert!(err.to_string().contains("type_id"));
    }

    #[test]
    fn test_render_template_escaped_braces() {
        let rendered = render_template("x/{{literal}}/{type_id}", &params("type_id", 1)).unwrap();
        assert_eq!(rendered, "x/{literal}/1");
    }

    fn str_params(name: &str, id: &str) -> ParameterMapping {
        let mut mapping = ParameterMapping::new();
        mapping.insert(name.to_string(), IndexKey::Str(id.to_string()));
        mapping
    }

    #[test]
    fn test_render_template_keeps_string_id_in_one_segment() {
        let rendered = render_template(
            "inventory/types/{type_id}/",
            &str_params("type_id", "../../regions/10000002"),
        )
        .unwrap();
        assert_eq!(rendered, "inventory/types/..%2F..%2Fregions%2F10000002/");

        let fetcher = RemoteFetcher::new("https://crest.example/", resources(), "ua");
        let url = fetcher
            .build_url("inventory_types", &str_params("type_id", "../../regions/10000002"))
            .unwrap();
        assert!(url.path().starts_with("/inventory/types/"), "{}", url);
        assert!(!url.path().starts_with("/regions/"), "{}", url);
    }

    #[test]
    fn test_render_template_encodes_query_and_fragment() {
        let fetcher = RemoteFetcher::new("https://crest.example/", resources(), "ua");
        let url = fetcher
            .build_url("inventory_types", &str_params("type_id", "587?x=1#"))
            .unwrap();
        assert_eq!(url.path(), "/inventory/types/587%3Fx%3D1%23/");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_render_template_encodes_spaces_and_unicode() {
        let rendered =
            render_template("types/{type_id}/", &str_params("type_id", "Caldari Navy é")).unwrap();
        assert_eq!(rendered, "types/Caldari%20Navy%20%C3%A9/");
    }

    #[test]
    fn test_render_template_rejects_dot_segments() {
        for value in ["", ".", ".."] {
            let err = render_template("types/{type_id}/", &str_params("type_id", value))
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AddressConstruction, "{:?}", value);
        }
    }

    #[test]
    fn test_render_template_negative_int() {
        let rendered = render_template("types/{type_id}/", &params("type_id", -3)).unwrap();
        assert_eq!(rendered, "types/-3/");
    }

    #[test]
    fn test_render_template_unbalanced_braces() {
        let p = params("type_id", 1);
        assert!(render_template("types/{type_id", &p).is_err());
        assert!(render_template("types/type_id}", &p).is_err());
    }

    #[test]
    fn test_join_address() {
        assert_eq!(join_address("https://a/", "b/"), "https://a/b/");
        assert_eq!(join_address("https://a", "b/"), "https://a/b/");
        assert_eq!(join_address("https://a/", "/b/"), "https://a/b/");
        assert_eq!(join_address("https://a", "/b/"), "https://a/b/");
    }

    #[test]
    fn test_build_url() {
        let fetcher = RemoteFetcher::new("https://crest-tq.eveonline.com/", resources(), "ua");
        let url = fetcher
            .build_url("map_regions", &params("region_id", 10000002))
            .unwrap();
        assert_eq!(url.as_str(), "https://crest-tq.eveonline.com/regions/10000002/");
    }

    #[test]
    fn test_build_url_unknown_template() {
        let fetcher = RemoteFetcher::new("https://crest-tq.eveonline.com/", resources(), "ua");
        let err = fetcher
            .build_url("market_history", &params("type_id", 34))
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::UnsupportedEndpoint {
                source_table: EndpointSource::Resources,
                ..
            }
        ));
    }

    #[test]
    fn test_build_url_invalid_base() {
        let fetcher = RemoteFetcher::new("not a url", resources(), "ua");
        let err = fetcher
            .build_url("inventory_types", &params("type_id", 34))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AddressConstruction);
    }

    #[tokio::test]
    async fn test_fetch_sends_user_agent_and_parses_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/inventory/types/587/")
            .match_header("user-agent", "crestcheck-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 587, "name": "Rifter"}"#)
            .create_async()
            .await;

        let fetcher = RemoteFetcher::new(server.url(), resources(), "crestcheck-test");
        let data = fetcher
            .fetch("inventory_types", &params("type_id", 587))
            .await
            .unwrap();

        assert_eq!(data["name"], "Rifter");
        assert_eq!(data["id"], 587);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/inventory/types/999/")
            .with_status(404)
            .with_body(r#"{"message": "Type not found"}"#)
            .create_async()
            .await;

        let fetcher = RemoteFetcher::new(server.url(), resources(), "ua");
        let err = fetcher
            .fetch("inventory_types", &params("type_id", 999))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteFetch);
        assert_eq!(err.status(), Some(404));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_invalid_json_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/regions/10000002/")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let fetcher = RemoteFetcher::new(server.url(), resources(), "ua");
        let err = fetcher
            .fetch("map_regions", &params("region_id", 10000002))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::RemoteFetch);
        assert!(err.to_string().contains("parse"));
    }

    #[tokio::test]
    async fn test_fetch_unknown_endpoint_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let fetcher = RemoteFetcher::new(server.url(), resources(), "ua");
        let err = fetcher
            .fetch("market_history", &params("type_id", 34))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedEndpoint);
        mock.assert_async().await;
    }
}
