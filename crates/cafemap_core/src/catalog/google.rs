//! Google Places (New) text-search adapter.
//!
//! # Responsibility
//! - Translate a `SearchRequest` into a `places:searchText` call.
//! - Resolve the first photo of each place into a sized media URL.
//!
//! # Invariants
//! - Only the requested field mask is asked for.
//! - The API key is never logged.

use super::{
    CatalogError, CatalogResult, PlaceField, PlaceSearch, RawPlace, SearchArea, SearchRequest,
};
use crate::config::AppConfig;
use crate::model::cafe::LatLng;
use async_trait::async_trait;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_BASE_URL: &str = "https://places.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Largest bias circle the provider accepts.
const MAX_BIAS_RADIUS_M: f64 = 50_000.0;

static PHOTO_RESOURCE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^places/[^/\s]+/photos/[^/\s]+$").expect("photo resource regex is valid")
});

/// HTTP client for the Places API text search.
pub struct GooglePlacesClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    photo_max_width_px: u32,
}

impl GooglePlacesClient {
    /// Creates a client against `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, photo_max_width_px: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            photo_max_width_px,
        }
    }

    /// Creates a client against the public endpoint using config values.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DEFAULT_BASE_URL,
            config.places_api_key.clone(),
            config.photo_max_width_px,
        )
    }

    fn search_url(&self) -> String {
        format!("{}/v1/places:searchText", self.base_url)
    }
}

#[async_trait]
impl PlaceSearch for GooglePlacesClient {
    async fn search_by_text(&self, request: &SearchRequest) -> CatalogResult<Vec<RawPlace>> {
        let api_key = self.api_key.as_deref().ok_or(CatalogError::MissingApiKey)?;
        let started_at = Instant::now();
        let body = SearchTextBody::from_request(request);

        let resp = self
            .client
            .post(self.search_url())
            .header("X-Goog-Api-Key", api_key)
            .header("X-Goog-FieldMask", field_mask(request.fields))
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(
                "event=catalog_search module=catalog status=error http_status={} duration_ms={}",
                status.as_u16(),
                started_at.elapsed().as_millis()
            );
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        let mut places = parse_search_response(
            &text,
            &self.base_url,
            api_key,
            self.photo_max_width_px,
        )?;
        places.truncate(request.max_results as usize);

        info!(
            "event=catalog_search module=catalog status=ok count={} duration_ms={}",
            places.len(),
            started_at.elapsed().as_millis()
        );
        Ok(places)
    }
}

/// Builds the `X-Goog-FieldMask` header value.
pub fn field_mask(fields: &[PlaceField]) -> String {
    fields
        .iter()
        .map(|field| match field {
            PlaceField::Id => "places.id",
            PlaceField::DisplayName => "places.displayName",
            PlaceField::Location => "places.location",
            PlaceField::Rating => "places.rating",
            PlaceField::UserRatingCount => "places.userRatingCount",
            PlaceField::Photos => "places.photos",
            PlaceField::MapsUri => "places.googleMapsUri",
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Decodes a `places:searchText` response body.
pub fn parse_search_response(
    body: &str,
    base_url: &str,
    api_key: &str,
    photo_max_width_px: u32,
) -> CatalogResult<Vec<RawPlace>> {
    let response: SearchTextResponse =
        serde_json::from_str(body).map_err(|err| CatalogError::Decode(err.to_string()))?;

    Ok(response
        .places
        .into_iter()
        .map(|place| {
            let photo_uri = place
                .photos
                .first()
                .and_then(|photo| photo_media_url(base_url, &photo.name, api_key, photo_max_width_px));
            RawPlace {
                id: place.id,
                display_name: place.display_name.map(|name| name.text),
                location: place
                    .location
                    .map(|location| LatLng::new(location.latitude, location.longitude)),
                rating: place.rating,
                user_rating_count: place.user_rating_count,
                maps_uri: place.google_maps_uri,
                photo_uri,
            }
        })
        .collect())
}

fn photo_media_url(base_url: &str, name: &str, api_key: &str, max_width_px: u32) -> Option<String> {
    if !PHOTO_RESOURCE_NAME.is_match(name) {
        return None;
    }
    Some(format!(
        "{base_url}/v1/{name}/media?maxWidthPx={max_width_px}&key={api_key}"
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchTextBody<'a> {
    text_query: &'a str,
    max_result_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_restriction: Option<LocationRestriction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_bias: Option<LocationBias>,
}

impl<'a> SearchTextBody<'a> {
    fn from_request(request: &'a SearchRequest) -> Self {
        let (location_restriction, location_bias) = match request.area {
            SearchArea::Viewport(bounds) => (
                Some(LocationRestriction {
                    rectangle: Rectangle {
                        low: bounds.south_west.into(),
                        high: bounds.north_east.into(),
                    },
                }),
                None,
            ),
            SearchArea::Point { center, radius_m } => (
                None,
                Some(LocationBias {
                    circle: Circle {
                        center: center.into(),
                        radius: radius_m.clamp(0.0, MAX_BIAS_RADIUS_M),
                    },
                }),
            ),
        };
        Self {
            text_query: request.text_query.as_str(),
            max_result_count: request.max_results,
            location_restriction,
            location_bias,
        }
    }
}

#[derive(Debug, Serialize)]
struct LocationRestriction {
    rectangle: Rectangle,
}

#[derive(Debug, Serialize)]
struct Rectangle {
    low: ApiLatLng,
    high: ApiLatLng,
}

#[derive(Debug, Serialize)]
struct LocationBias {
    circle: Circle,
}

#[derive(Debug, Serialize)]
struct Circle {
    center: ApiLatLng,
    radius: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiLatLng {
    latitude: f64,
    longitude: f64,
}

impl From<LatLng> for ApiLatLng {
    fn from(value: LatLng) -> Self {
        Self {
            latitude: value.lat,
            longitude: value.lng,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchTextResponse {
    #[serde(default)]
    places: Vec<ApiPlace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPlace {
    id: String,
    display_name: Option<LocalizedText>,
    location: Option<ApiLatLng>,
    rating: Option<f64>,
    user_rating_count: Option<u32>,
    google_maps_uri: Option<String>,
    #[serde(default)]
    photos: Vec<ApiPhoto>,
}

#[derive(Debug, Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiPhoto {
    name: String,
}
