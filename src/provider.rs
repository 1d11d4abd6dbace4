//! # Forecast Provider Client
//!
//! Talks to an OGC EDR forecast API (DMI's `forecastedr` service by default)
//! and returns raw CoverageJSON documents.
//!
//! ## Query Types
//!
//! - **Area** (`collections/{collection}/cube`): every forecast step for every
//!   grid cell inside a bounding box, for the requested parameters
//! - **Point** (`collections/{collection}/position`): every forecast step at a
//!   single `POINT(lon lat)`
//!
//! ## Error Handling
//!
//! A non-success status becomes [`ProviderError::Status`] with the response
//! body attached. Nothing is retried here: callers decide whether a failure
//! aborts the whole job or only skips one unit of work (see [`crate::sweep`]).

use crate::config::ProviderConfig;
use crate::coverage::CoverageResponse;
use async_trait::async_trait;
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Errors from a single provider request.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport failure (DNS, TLS, timeout, connection reset)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not valid CoverageJSON
    #[error("undecodable response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Source of forecast coverages.
///
/// Implementations must not be called concurrently for the same upstream
/// service; pacing is handled by the callers in [`crate::sweep`].
#[async_trait]
pub trait EnvironmentalProvider: Send + Sync {
    /// Area query for `parameters` over `bbox`.
    async fn fetch_batch(
        &self,
        parameters: &[String],
        bbox: &BBox,
        format: &str,
        crs: &str,
    ) -> Result<CoverageResponse, ProviderError>;

    /// Time series for `parameters` at a single location.
    async fn fetch_point(
        &self,
        lat: f64,
        lon: f64,
        parameters: &[String],
    ) -> Result<CoverageResponse, ProviderError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid bbox \"{0}\", expected lonMin,latMin,lonMax,latMax")]
pub struct BBoxError(String);

/// Geographic bounding box in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub lon_min: f64,
    pub lat_min: f64,
    pub lon_max: f64,
    pub lat_max: f64,
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.lon_min, self.lat_min, self.lon_max, self.lat_max
        )
    }
}

impl FromStr for BBox {
    type Err = BBoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BBoxError(s.to_string()))?;

        match values[..] {
            [lon_min, lat_min, lon_max, lat_max] if lon_min <= lon_max && lat_min <= lat_max => {
                Ok(Self {
                    lon_min,
                    lat_min,
                    lon_max,
                    lat_max,
                })
            }
            _ => Err(BBoxError(s.to_string())),
        }
    }
}

/// Split `parameters` into consecutive groups of at most `batch_size`.
///
/// # Example
/// ```
/// use mackerel_lib::provider::batch_parameters;
///
/// let params: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(batch_parameters(&params, 2).len(), 2);
/// assert_eq!(batch_parameters(&params, 0).len(), 3);
/// ```
pub fn batch_parameters(parameters: &[String], batch_size: usize) -> Vec<Vec<String>> {
    parameters
        .chunks(batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Hide the API key in a URL before it reaches the logs.
pub fn redact_api_key(url: &str) -> String {
    const MARKER: &str = "api-key=";
    match url.find(MARKER) {
        Some(start) => {
            let value_start = start + MARKER.len();
            let value_end = url[value_start..]
                .find('&')
                .map_or(url.len(), |i| value_start + i);
            format!("{}***{}", &url[..value_start], &url[value_end..])
        }
        None => url.to_string(),
    }
}

/// HTTP client for the DMI forecast EDR API.
pub struct DmiClient {
    http: reqwest::Client,
    base_url: String,
    point_collection: String,
    collection: String,
    crs: String,
    format: String,
    api_key: Option<String>,
}

impl DmiClient {
    /// Build a client for the endpoint and collections in `config`.
    ///
    /// `api_key` is appended to every request as `api-key`. Without one the
    /// client is still built, but a warning is logged because DMI rejects
    /// unauthenticated requests.
    ///
    /// # Errors
    /// [`ProviderError::Http`] if the underlying HTTP client cannot be
    /// initialised (for example when no TLS backend is available).
    ///
    /// # Example
    /// ```
    /// use mackerel_lib::config::Config;
    /// use mackerel_lib::provider::DmiClient;
    ///
    /// let config = Config::default();
    /// let client = DmiClient::new(&config.provider, Some("secret".to_string()));
    /// assert!(client.is_ok());
    /// ```
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        if api_key.is_none() {
            log::warn!(
                "{} is not set, provider requests will be rejected",
                config.api_key_env
            );
        }
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            point_collection: config.point_collection.clone(),
            crs: config.crs.clone(),
            format: config.format.clone(),
            api_key,
        })
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<CoverageResponse, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.http.get(&url).query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api-key", key)]);
        }
        let request = request.build()?;
        log::debug!("Fetching: {}", redact_api_key(request.url().as_str()));

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl EnvironmentalProvider for DmiClient {
    async fn fetch_batch(
        &self,
        parameters: &[String],
        bbox: &BBox,
        format: &str,
        crs: &str,
    ) -> Result<CoverageResponse, ProviderError> {
        let endpoint = format!("collections/{}/cube", self.collection);
        let params = [
            ("bbox", bbox.to_string()),
            ("crs", crs.to_string()),
            ("parameter-name", parameters.join(",")),
            ("format", format.to_string()),
        ];
        self.get(&endpoint, &params).await
    }

    async fn fetch_point(
        &self,
        lat: f64,
        lon: f64,
        parameters: &[String],
    ) -> Result<CoverageResponse, ProviderError> {
        let endpoint = format!("collections/{}/position", self.point_collection);
        let params = [
            ("coords", format!("POINT({lon} {lat})")),
            ("crs", self.crs.clone()),
            ("parameter-name", parameters.join(",")),
            ("model", self.point_collection.clone()),
            ("format", self.format.clone()),
        ];
        self.get(&endpoint, &params).await
    }
}
