//! Coordinates of geographic terms.
//!
//! Two modes: a pre-baked `{ uri: wkt }` file, or live lookups against the
//! linked-data services a term's `closeMatch` points at.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::finto::SkosConcept;
use super::retry::{retry, RetryPolicy};
use crate::errors::PipelineError;

const WIKIDATA_HOST: &str = "wikidata.org";
const PAIKKATIEDOT_HOST: &str = "paikkatiedot.fi";
const WIKIDATA_CLAIMS_URL: &str = "https://www.wikidata.org/w/api.php";
const LIVE_LOOKUP_CONCURRENCY: usize = 8;

/// Where coordinates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateMode {
    #[default]
    File,
    Live,
}

impl FromStr for CoordinateMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(CoordinateMode::File),
            "live" => Ok(CoordinateMode::Live),
            other => Err(PipelineError::config(format!(
                "Unknown coordinate mode '{}', expected 'file' or 'live'",
                other
            ))),
        }
    }
}

/// Resolves `wkt` geometries for geographic concepts.
#[derive(Debug, Clone)]
pub struct CoordinateResolver {
    mode: CoordinateMode,
    file: PathBuf,
    http: reqwest::Client,
    policy: RetryPolicy,
    wikidata_url: String,
}

impl CoordinateResolver {
    pub fn new(mode: CoordinateMode, file: impl Into<PathBuf>, http: reqwest::Client) -> Self {
        Self {
            mode,
            file: file.into(),
            http,
            policy: RetryPolicy::coordinate_lookup(),
            wikidata_url: WIKIDATA_CLAIMS_URL.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the Wikidata API endpoint.
    pub fn with_wikidata_url(mut self, url: impl Into<String>) -> Self {
        self.wikidata_url = url.into();
        self
    }

    pub fn mode(&self) -> CoordinateMode {
        self.mode
    }

    /// Map concept URIs to WKT for every concept that could be resolved.
    ///
    /// Never fails: concepts without coordinates are simply absent.
    pub async fn resolve(&self, concepts: &[SkosConcept]) -> HashMap<String, String> {
        match self.mode {
            CoordinateMode::File => self.from_file().await,
            CoordinateMode::Live => self.live(concepts).await,
        }
    }

    async fn from_file(&self) -> HashMap<String, String> {
        let raw = match tokio::fs::read_to_string(&self.file).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %self.file.display(), error = %e, "Coordinate file unavailable");
                return HashMap::new();
            }
        };

        match serde_json::from_str::<HashMap<String, String>>(&raw) {
            Ok(map) => {
                info!(path = %self.file.display(), count = map.len(), "Loaded coordinates");
                map
            }
            Err(e) => {
                warn!(
                    path = %self.file.display(),
                    error = %e,
                    "Coordinate file is not a uri-to-wkt map"
                );
                HashMap::new()
            }
        }
    }

    async fn live(&self, concepts: &[SkosConcept]) -> HashMap<String, String> {
        let lookups: Vec<(String, String)> = concepts
            .iter()
            .filter_map(|c| {
                c.close_match
                    .iter()
                    .find(|m| m.contains(WIKIDATA_HOST) || m.contains(PAIKKATIEDOT_HOST))
                    .map(|m| (c.uri.clone(), m.clone()))
            })
            .collect();

        let resolved: HashMap<String, String> = stream::iter(lookups)
            .map(|(uri, target)| async move {
                let wkt = self.lookup(&target).await;
                (uri, wkt)
            })
            .buffer_unordered(LIVE_LOOKUP_CONCURRENCY)
            .filter_map(|(uri, wkt)| async move { wkt.map(|w| (uri, w)) })
            .collect()
            .await;

        info!(count = resolved.len(), "Resolved live coordinates");
        resolved
    }

    async fn lookup(&self, target: &str) -> Option<String> {
        let result = if target.contains(WIKIDATA_HOST) {
            let entity = super::code_from_uri(target).to_string();
            retry(&self.policy, target, || self.wikidata_point(&entity)).await
        } else {
            retry(&self.policy, target, || self.geojson_point(target)).await
        };

        match result {
            Ok(wkt) => wkt,
            Err(e) => {
                debug!(target_uri = target, error = %e, "Coordinate lookup gave up");
                None
            }
        }
    }

    async fn wikidata_point(&self, entity: &str) -> Result<Option<String>, reqwest::Error> {
        let body: Value = self
            .http
            .get(&self.wikidata_url)
            .query(&[
                ("action", "wbgetclaims"),
                ("entity", entity),
                ("property", "P625"),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_wikidata_claims(&body))
    }

    async fn geojson_point(&self, url: &str) -> Result<Option<String>, reqwest::Error> {
        let body: Value = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/geo+json, application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_geojson_point(&body))
    }
}

fn point(lon: f64, lat: f64) -> String {
    format!("POINT({} {})", lon, lat)
}

/// Extract the P625 coordinate of a `wbgetclaims` response.
pub fn parse_wikidata_claims(body: &Value) -> Option<String> {
    let value = body
        .pointer("/claims/P625/0/mainsnak/datavalue/value")?;
    let lat = value.get("latitude")?.as_f64()?;
    let lon = value.get("longitude")?.as_f64()?;
    Some(point(lon, lat))
}

/// Extract the first point of a GeoJSON feature collection.
pub fn parse_geojson_point(body: &Value) -> Option<String> {
    let coordinates = body
        .pointer("/features/0/geometry/coordinates")?
        .as_array()?;
    let lon = coordinates.first()?.as_f64()?;
    let lat = coordinates.get(1)?.as_f64()?;
    Some(point(lon, lat))
}
