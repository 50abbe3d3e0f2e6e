//! Keyword place search for nearby animal clinics.
//!
//! This half of the checkup response degrades independently of the AI half:
//! every failure mode (missing key, malformed input, transport error, empty
//! results) is reported as a single placeholder entry instead of an error.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PlacesConfig;

const SEARCH_KEYWORD: &str = "animal clinic";

#[derive(Clone)]
pub struct PlaceClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    radius_m: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Clinic {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
    pub distance_km: f64,
}

#[derive(Deserialize)]
struct SearchResponse {
    documents: Vec<PlaceDocument>,
}

#[derive(Deserialize)]
struct PlaceDocument {
    id: String,
    place_name: String,
    #[serde(default)]
    road_address_name: String,
    #[serde(default)]
    address_name: String,
    #[serde(default)]
    phone: String,
    /// Distance in meters, returned as a string by the API.
    #[serde(default)]
    distance: String,
}

impl PlaceClient {
    pub fn from_config(config: &PlacesConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            radius_m: config.radius_m,
        }
    }

    /// Search clinics near a coordinate, sorted by distance. Never errors.
    pub async fn nearby(&self, lat: f64, lng: f64) -> Vec<Clinic> {
        let Some(api_key) = self.api_key.as_deref() else {
            return placeholder("Place search is not configured");
        };
        if !coordinate_is_valid(lat, lng) {
            return placeholder("Location is malformed");
        }

        let result = self
            .client
            .get(&self.endpoint)
            .header("Authorization", format!("KakaoAK {api_key}"))
            .query(&[
                ("query", SEARCH_KEYWORD.to_string()),
                ("x", lng.to_string()),
                ("y", lat.to_string()),
                ("radius", self.radius_m.to_string()),
                ("sort", "distance".to_string()),
            ])
            .send()
            .await;

        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("place search returned status {}", r.status());
                return placeholder("Place search failed");
            }
            Err(e) => {
                tracing::warn!("place search request failed: {}", e);
                return placeholder("Place search failed");
            }
        };

        let body: SearchResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("place search response unreadable: {}", e);
                return placeholder("Place search failed");
            }
        };

        if body.documents.is_empty() {
            return placeholder("No clinics found nearby");
        }

        body.documents.into_iter().map(Clinic::from).collect()
    }
}

impl From<PlaceDocument> for Clinic {
    fn from(doc: PlaceDocument) -> Self {
        let address = if doc.road_address_name.is_empty() {
            doc.address_name
        } else {
            doc.road_address_name
        };
        let distance_km = doc
            .distance
            .parse::<f64>()
            .map(|m| m / 1000.0)
            .unwrap_or(0.0);
        Clinic {
            id: doc.id,
            name: doc.place_name,
            address,
            phone: doc.phone,
            distance_km,
        }
    }
}

pub fn coordinate_is_valid(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// A one-element list naming the failure reason, in the same shape as a
/// real result, so the response contract never changes.
pub fn placeholder(reason: &str) -> Vec<Clinic> {
    vec![Clinic {
        id: String::new(),
        name: reason.to_string(),
        address: String::new(),
        phone: String::new(),
        distance_km: 0.0,
    }]
}
