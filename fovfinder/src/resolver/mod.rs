//! Object name resolution
//!
//! Turns an object name such as "M1" into J2000 coordinates through the CDS
//! Sesame service.

use std::sync::Arc;

use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::imagery::{FetchError, HttpClient};

/// Sesame endpoint returning plain text, queried across Simbad, NED and VizieR.
pub const SESAME_URL: &str = "https://cds.unistra.fr/cgi-bin/nph-sesame/-oI/SNV?";

/// Errors from resolving an object name.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unable to find coordinates for name '{0}'")]
    NotFound(String),

    #[error("name resolver request failed: {0}")]
    Http(String),

    #[error("malformed resolver response: {0}")]
    Malformed(String),

    #[error("invalid resolver URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<FetchError> for ResolveError {
    fn from(err: FetchError) -> Self {
        ResolveError::Http(err.to_string())
    }
}

/// Looks up sky coordinates for an object name.
pub trait NameResolver: Send + Sync {
    /// Resolves `name` to `(ra, dec)` in degrees.
    fn resolve(&self, name: &str) -> Result<(f64, f64), ResolveError>;
}

/// Resolver backed by CDS Sesame.
pub struct SesameResolver {
    client: Arc<dyn HttpClient>,
    base_url: String,
}

impl SesameResolver {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            base_url: SESAME_URL.to_string(),
        }
    }

    /// Uses a different Sesame mirror.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The object name is the whole query string.
    fn url_for(&self, name: &str) -> Result<Url, ResolveError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ResolveError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let encoded: String = form_urlencoded::byte_serialize(name.trim().as_bytes()).collect();
        url.set_query(Some(&encoded));
        Ok(url)
    }
}

impl NameResolver for SesameResolver {
    fn resolve(&self, name: &str) -> Result<(f64, f64), ResolveError> {
        if name.trim().is_empty() {
            return Err(ResolveError::NotFound(name.to_string()));
        }

        let body = self.client.get(self.url_for(name)?.as_str())?;
        let text = String::from_utf8_lossy(&body);
        let coords = parse_sesame(&text).ok_or_else(|| ResolveError::NotFound(name.to_string()))??;

        tracing::debug!(name, ra = coords.0, dec = coords.1, "Resolved object name");
        Ok(coords)
    }
}

/// Extracts the first `%J ra dec` line of a Sesame text response.
///
/// Returns `None` when no such line exists.
fn parse_sesame(text: &str) -> Option<Result<(f64, f64), ResolveError>> {
    let line = text.lines().find_map(|l| l.trim().strip_prefix("%J "))?;
    let mut fields = line.split_whitespace();

    let mut next_number = |what: &str| -> Result<f64, ResolveError> {
        let token = fields
            .next()
            .ok_or_else(|| ResolveError::Malformed(format!("%J line without {}", what)))?;
        token
            .parse::<f64>()
            .map_err(|_| ResolveError::Malformed(format!("bad {} '{}'", what, token)))
    };

    Some(next_number("RA").and_then(|ra| Ok((ra, next_number("Dec")?))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::MockHttpClient;

    const CRAB: &str = "# M1\t#Q12345\n\
#=S=Simbad (via url):    1\n\
%@ 1234\n\
%I.0 M   1\n\
%C.0 SNR\n\
%J 83.63308 +22.01450 = 05:34:31.94 +22:00:52.2\n\
%J.E [3.7 3.7 0] 2020yCat.1350....0G\n\
#B 123\n";

    #[test]
    fn test_resolve_crab() {
        let client = Arc::new(MockHttpClient::ok(CRAB.as_bytes().to_vec()));
        let resolver = SesameResolver::new(client.clone());

        let (ra, dec) = resolver.resolve("M 1").unwrap();
        assert!((ra - 83.63308).abs() < 1e-9);
        assert!((dec - 22.01450).abs() < 1e-9);
        assert_eq!(
            client.requested(),
            vec![format!("{}M+1", SESAME_URL)]
        );
    }

    #[test]
    fn test_resolve_unknown_name() {
        let client = Arc::new(MockHttpClient::ok(
            b"# Nonsense\t#Q1\n#! *** Nothing found *** \n".to_vec(),
        ));
        let resolver = SesameResolver::new(client);

        let result = resolver.resolve("Nonsense");
        assert!(matches!(result, Err(ResolveError::NotFound(n)) if n == "Nonsense"));
    }

    #[test]
    fn test_resolve_empty_name_skips_request() {
        let client = Arc::new(MockHttpClient::ok(CRAB.as_bytes().to_vec()));
        let resolver = SesameResolver::new(client.clone());

        assert!(matches!(resolver.resolve("  "), Err(ResolveError::NotFound(_))));
        assert!(client.requested().is_empty());
    }

    #[test]
    fn test_resolve_http_failure() {
        let resolver = SesameResolver::new(Arc::new(MockHttpClient::failing("HTTP 500")));
        assert!(matches!(resolver.resolve("M1"), Err(ResolveError::Http(_))));
    }

    #[test]
    fn test_malformed_coordinates() {
        let result = parse_sesame("%J 83.6x +22.0\n");
        assert!(matches!(result, Some(Err(ResolveError::Malformed(_)))));

        let result = parse_sesame("%J 83.6\n");
        assert!(matches!(result, Some(Err(ResolveError::Malformed(_)))));
    }

    #[test]
    fn test_catalogue_designation_escaped() {
        let client = Arc::new(MockHttpClient::ok(CRAB.as_bytes().to_vec()));
        let resolver = SesameResolver::new(client.clone());
        resolver.resolve("BD+20 307").unwrap();
        assert_eq!(client.requested(), vec![format!("{}BD%2B20+307", SESAME_URL)]);
    }

    #[test]
    fn test_invalid_mirror_rejected() {
        let client = Arc::new(MockHttpClient::ok(CRAB.as_bytes().to_vec()));
        let resolver = SesameResolver::new(client.clone()).with_base_url("sesame");
        assert!(matches!(resolver.resolve("M1"), Err(ResolveError::InvalidUrl { .. })));
        assert!(client.requested().is_empty());
    }

    #[test]
    fn test_custom_mirror() {
        let client = Arc::new(MockHttpClient::ok(CRAB.as_bytes().to_vec()));
        let resolver = SesameResolver::new(client.clone()).with_base_url("http://mirror/sesame?");
        resolver.resolve("M1").unwrap();
        assert_eq!(client.requested(), vec!["http://mirror/sesame?M1".to_string()]);
    }
}
