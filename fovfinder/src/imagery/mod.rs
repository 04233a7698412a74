//! Survey image servers
//!
//! An [`ImageServer`] turns an [`ImageQuery`] (field centre and size) into a
//! file on disk. Servers are registered in a [`ServerBank`] under a short
//! name, which is what configuration and the command line refer to.

mod http;

pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};

#[cfg(test)]
pub use http::tests::MockHttpClient;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use url::Url;

/// URL template of the ESO Digitized Sky Survey server.
pub const ESO_DSS_URL: &str = "http://archive.eso.org/dss/dss?ra={ra}&dec={dec}&mime-type=application/x-fits&x={width}&y={height}";

/// Short name of the ESO DSS server.
pub const ESO_DSS_SHORT_NAME: &str = "eso";

/// Errors from fetching survey imagery.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unknown image server '{0}'")]
    UnknownServer(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The fetch worker ended without reporting a result.
    #[error("image fetch worker exited without a result")]
    WorkerLost,
}

/// Field requested from an image server.
///
/// RA and Dec are sexagesimal text as the servers expect them; sizes are in
/// arcminutes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    pub ra: String,
    pub dec: String,
    pub width_arcmin: f64,
    pub height_arcmin: f64,
}

impl ImageQuery {
    pub fn new(ra: impl Into<String>, dec: impl Into<String>, width_arcmin: f64, height_arcmin: f64) -> Self {
        Self {
            ra: ra.into(),
            dec: dec.into(),
            width_arcmin,
            height_arcmin,
        }
    }

    /// A square field `size_arcmin` on a side.
    pub fn square(ra: impl Into<String>, dec: impl Into<String>, size_arcmin: f64) -> Self {
        Self::new(ra, dec, size_arcmin, size_arcmin)
    }
}

/// A source of survey images.
pub trait ImageServer: Send + Sync {
    /// Human readable name.
    fn name(&self) -> &str;

    /// Key the server is registered under.
    fn short_name(&self) -> &str;

    /// Downloads the field described by `query` to `dest`.
    ///
    /// # Returns
    ///
    /// The path of the written file.
    fn fetch(&self, dest: &Path, query: &ImageQuery) -> Result<PathBuf, FetchError>;
}

/// Image server reached through a URL template.
///
/// Query values of the template may hold `{ra}`, `{dec}`, `{width}` and
/// `{height}` placeholders; placeholders elsewhere in the URL are not filled.
pub struct UrlImageServer {
    name: String,
    short_name: String,
    description: String,
    template: String,
    client: Arc<dyn HttpClient>,
}

impl UrlImageServer {
    pub fn new(
        name: impl Into<String>,
        short_name: impl Into<String>,
        template: impl Into<String>,
        description: impl Into<String>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            name: name.into(),
            short_name: short_name.into(),
            description: description.into(),
            template: template.into(),
            client,
        }
    }

    /// The ESO Digitized Sky Survey, returning FITS.
    pub fn eso_dss(client: Arc<dyn HttpClient>) -> Self {
        Self::new("ESO", ESO_DSS_SHORT_NAME, ESO_DSS_URL, "ESO DSS archive", client)
    }

    /// Builds the request URL for a query.
    ///
    /// Placeholders are filled before the query is re-encoded, so sexagesimal
    /// signs and separators reach the server escaped.
    pub fn url_for(&self, query: &ImageQuery) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.template).map_err(|e| FetchError::InvalidUrl {
            url: self.template.clone(),
            reason: e.to_string(),
        })?;

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), fill_placeholders(&value, query)))
            .collect();
        url.set_query(None);
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        Ok(url)
    }
}

fn fill_placeholders(value: &str, query: &ImageQuery) -> String {
    value
        .replace("{ra}", &query.ra)
        .replace("{dec}", &query.dec)
        .replace("{width}", &query.width_arcmin.to_string())
        .replace("{height}", &query.height_arcmin.to_string())
}

impl ImageServer for UrlImageServer {
    fn name(&self) -> &str {
        &self.name
    }

    fn short_name(&self) -> &str {
        &self.short_name
    }

    fn fetch(&self, dest: &Path, query: &ImageQuery) -> Result<PathBuf, FetchError> {
        let url = self.url_for(query)?;
        tracing::info!(
            server = %self.short_name,
            description = %self.description,
            url = %url,
            "Requesting survey image"
        );

        let body = self.client.get(url.as_str())?;
        std::fs::write(dest, &body).map_err(|source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        tracing::info!(
            server = %self.short_name,
            path = %dest.display(),
            bytes = body.len(),
            "Survey image saved"
        );
        Ok(dest.to_path_buf())
    }
}

/// Registry of image servers by short name.
#[derive(Default)]
pub struct ServerBank {
    servers: BTreeMap<String, Box<dyn ImageServer>>,
}

impl ServerBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bank holding the built-in archives.
    pub fn with_defaults(client: Arc<dyn HttpClient>) -> Self {
        let mut bank = Self::new();
        bank.add_image_server(Box::new(UrlImageServer::eso_dss(client)));
        bank
    }

    /// Registers a server, replacing any with the same short name.
    pub fn add_image_server(&mut self, server: Box<dyn ImageServer>) {
        let key = server.short_name().to_string();
        if self.servers.insert(key.clone(), server).is_some() {
            tracing::warn!(server = %key, "Replaced existing image server");
        }
    }

    /// Short names of all registered servers, sorted.
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.servers.contains_key(short_name)
    }

    /// Fetches an image through the server registered as `short_name`.
    pub fn get_image(
        &self,
        short_name: &str,
        dest: &Path,
        query: &ImageQuery,
    ) -> Result<PathBuf, FetchError> {
        let server = self
            .servers
            .get(short_name)
            .ok_or_else(|| FetchError::UnknownServer(short_name.to_string()))?;
        server.fetch(dest, query)
    }
}

impl std::fmt::Debug for ServerBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBank")
            .field("servers", &self.server_names())
            .finish()
    }
}
