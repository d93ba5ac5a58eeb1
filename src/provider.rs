use crate::domain::GeoCandidate;
use crate::error::{GeocodeError, Result};
use crate::normalizer::NormalizedQuery;
use crate::rate_limiter::RateLimiter;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Maximum candidates requested per query; more specific results surface in
/// the top handful and anything past that is noise.
const RESULT_LIMIT: u8 = 5;

/// Base delay for the exponential retry backoff.
const BACKOFF_BASE_MS: u64 = 500;

/// Seam over the external geocoding service so the batch orchestrator can be
/// exercised without network access.
#[async_trait::async_trait]
pub trait GeocodeProvider: Send + Sync {
    /// Issue one geocode query and return up to five candidates in the
    /// provider's own ranking order. A well-formed empty result is an empty
    /// list, not an error.
    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<GeoCandidate>>;
}

/// One entry of a Nominatim search response. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
pub struct NominatimPlace {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(rename = "type", default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub address: BTreeMap<String, String>,
}

impl NominatimPlace {
    /// Convert into a GeoCandidate, rejecting entries whose coordinates do
    /// not parse as floats.
    pub fn into_candidate(self) -> Option<GeoCandidate> {
        let latitude: f64 = self.lat.parse().ok()?;
        let longitude: f64 = self.lon.parse().ok()?;
        Some(GeoCandidate {
            latitude,
            longitude,
            display_name: self.display_name,
            importance: self.importance.unwrap_or(0.0).clamp(0.0, 1.0),
            class: self.class,
            place_type: self.place_type,
            address: self.address,
        })
    }
}

/// Nominatim-backed provider client. All outbound requests funnel through a
/// single injected RateLimiter instance; transient failures are retried with
/// bounded exponential backoff.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    max_retries: u32,
    rate_limiter: Arc<RateLimiter>,
}

impl NominatimClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
        rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            user_agent: user_agent.into(),
            max_retries: max_retries.max(1),
            rate_limiter,
        })
    }

    /// Build the search text sent to the provider. The country name is
    /// appended so informal queries anchor to Indonesia even before the
    /// countrycodes filter applies.
    pub fn build_search_text(query: &NormalizedQuery) -> String {
        if query.query.contains("indonesia") {
            query.query.clone()
        } else {
            format!("{}, Indonesia", query.query)
        }
    }

    /// Check provider reachability before starting a batch.
    pub async fn ping(&self) -> bool {
        let url = format!("{}/status.php", self.base_url);
        match self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Provider status check failed: {}", e);
                false
            }
        }
    }

    async fn search_once(&self, search_text: &str) -> Result<Vec<GeoCandidate>> {
        let url = format!("{}/search", self.base_url);
        let limit = RESULT_LIMIT.to_string();
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("q", search_text),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("countrycodes", "id"),
                ("addressdetails", "1"),
            ])
            .header("User-Agent", &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Provider {
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let places: Vec<NominatimPlace> = resp.json().await?;
        Ok(places
            .into_iter()
            .filter_map(NominatimPlace::into_candidate)
            .collect())
    }
}

#[async_trait::async_trait]
impl GeocodeProvider for NominatimClient {
    #[instrument(skip(self, query), fields(query = %query.query))]
    async fn search(&self, query: &NormalizedQuery) -> Result<Vec<GeoCandidate>> {
        let search_text = Self::build_search_text(query);

        let mut last_error = String::new();
        for attempt in 0..self.max_retries {
            // Every attempt advances the shared rate-limit clock, success or not
            self.rate_limiter.acquire().await;

            match self.search_once(&search_text).await {
                Ok(candidates) => {
                    info!(
                        "Provider returned {} candidate(s) for '{}'",
                        candidates.len(),
                        search_text
                    );
                    return Ok(candidates);
                }
                Err(GeocodeError::Http(e)) if e.is_timeout() || e.is_connect() => {
                    last_error = e.to_string();
                    if attempt + 1 < self.max_retries {
                        let delay = Duration::from_millis(BACKOFF_BASE_MS << attempt);
                        warn!(
                            "Transient provider failure (attempt {}/{}): {} - retrying in {:?}",
                            attempt + 1,
                            self.max_retries,
                            last_error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(GeocodeError::Network {
            attempts: self.max_retries,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    #[test]
    fn search_text_appends_country() {
        let query = normalize("desa ampel, boyolali");
        assert_eq!(
            NominatimClient::build_search_text(&query),
            "ampel, boyolali, Indonesia"
        );
    }

    #[test]
    fn search_text_keeps_existing_country() {
        let query = normalize("ampel, boyolali, indonesia");
        assert_eq!(
            NominatimClient::build_search_text(&query),
            "ampel, boyolali, indonesia"
        );
    }

    #[test]
    fn parses_nominatim_response() {
        let body = r#"[
            {
                "lat": "-7.4561",
                "lon": "110.6281",
                "display_name": "Ampel, Boyolali, Jawa Tengah, Indonesia",
                "importance": 0.35,
                "class": "place",
                "type": "village",
                "address": {
                    "village": "Ampel",
                    "county": "Boyolali",
                    "state": "Jawa Tengah",
                    "country": "Indonesia",
                    "country_code": "id"
                }
            },
            {
                "lat": "not-a-number",
                "lon": "110.0",
                "display_name": "Broken"
            }
        ]"#;

        let places: Vec<NominatimPlace> = serde_json::from_str(body).unwrap();
        let candidates: Vec<GeoCandidate> = places
            .into_iter()
            .filter_map(NominatimPlace::into_candidate)
            .collect();

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.latitude, -7.4561);
        assert_eq!(c.importance, 0.35);
        assert_eq!(c.address.get("village").unwrap(), "Ampel");
        assert_eq!(c.place_type.as_deref(), Some("village"));
    }

    #[test]
    fn missing_importance_defaults_to_zero() {
        let body = r#"[{"lat": "-6.2", "lon": "106.8", "display_name": "Jakarta"}]"#;
        let places: Vec<NominatimPlace> = serde_json::from_str(body).unwrap();
        let candidate = places
            .into_iter()
            .filter_map(NominatimPlace::into_candidate)
            .next()
            .unwrap();
        assert_eq!(candidate.importance, 0.0);
    }
}
