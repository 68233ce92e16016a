//! Endpoint URL helpers

use url::Url;

use crate::models::PLACEHOLDER;

/// Split a URL into its explicit port and its path with query string.
///
/// The port is `"-"` when the URL has none. Input that is not an absolute
/// URL with a host is returned unchanged as the endpoint.
pub fn extract_port_and_endpoint(url: &str) -> (String, String) {
    match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => {
            let port = parsed
                .port()
                .map_or_else(|| PLACEHOLDER.to_string(), |p| p.to_string());
            let endpoint = match parsed.query() {
                Some(query) => format!("{}?{query}", parsed.path()),
                None => parsed.path().to_string(),
            };
            (port, endpoint)
        }
        _ => (PLACEHOLDER.to_string(), url.to_string()),
    }
}

/// Legend of an endpoint's chart series: the domain for a domain-wide
/// chart, otherwise the endpoint path prefixed by its port when it has one.
pub fn endpoint_legend(domain: &str, endpoint: Option<&str>) -> String {
    let Some(endpoint) = endpoint.filter(|e| !e.is_empty()) else {
        return domain.to_string();
    };
    match extract_port_and_endpoint(endpoint) {
        (port, path) if port == PLACEHOLDER => path,
        (port, path) => format!("{port}:{path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        "http://example.com:8080/api/endpoint?param=value",
        "8080",
        "/api/endpoint?param=value"
    )]
    #[case("http://example.com/api/endpoint", "-", "/api/endpoint")]
    #[case("https://api.example.com:8443/v1/users", "8443", "/v1/users")]
    #[case("/api/endpoint", "-", "/api/endpoint")]
    #[case("not a url", "-", "not a url")]
    fn test_extract_port_and_endpoint(
        #[case] url: &str,
        #[case] port: &str,
        #[case] endpoint: &str,
    ) {
        assert_eq!(
            extract_port_and_endpoint(url),
            (port.to_string(), endpoint.to_string())
        );
    }

    #[test]
    fn test_legend_without_endpoint_is_domain() {
        assert_eq!(endpoint_legend("api.example.com", None), "api.example.com");
        assert_eq!(endpoint_legend("api.example.com", Some("")), "api.example.com");
    }

    #[test]
    fn test_legend_with_port() {
        let legend = endpoint_legend("example.com", Some("http://example.com:8080/api/test"));
        assert!(legend.contains("/api/test"));
        assert!(legend.contains("8080"));
        assert_ne!(legend, "example.com");
    }

    #[test]
    fn test_legend_without_port() {
        assert_eq!(
            endpoint_legend("example.com", Some("http://example.com/api/test")),
            "/api/test"
        );
    }
}
