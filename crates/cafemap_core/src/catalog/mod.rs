//! Remote place catalog boundary.
//!
//! # Responsibility
//! - Define the text-search contract the scan pipeline consumes.
//! - Normalize provider-neutral raw results into `CafeRecord`s.
//!
//! # Invariants
//! - A missing photo yields `image_url = None`, never an error.
//! - Raw results without id or location are dropped, never guessed.

pub mod google;

use crate::model::cafe::{CafeRecord, LatLng};
use async_trait::async_trait;
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use google::GooglePlacesClient;

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Rectangle described by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn new(south_west: LatLng, north_east: LatLng) -> Self {
        Self {
            south_west,
            north_east,
        }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }
}

/// Area a scan covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SearchArea {
    /// Visible map rectangle; results are restricted to it.
    Viewport(LatLngBounds),
    /// Point with a bias radius; results are only biased towards it.
    Point { center: LatLng, radius_m: f64 },
}

/// Fields requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceField {
    Id,
    DisplayName,
    Location,
    Rating,
    UserRatingCount,
    Photos,
    MapsUri,
}

impl PlaceField {
    /// Bounded field set every scan requests.
    pub const SCAN_FIELDS: &'static [PlaceField] = &[
        Self::Id,
        Self::DisplayName,
        Self::Location,
        Self::Rating,
        Self::UserRatingCount,
        Self::Photos,
        Self::MapsUri,
    ];
}

/// One text search against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub text_query: String,
    pub area: SearchArea,
    pub fields: &'static [PlaceField],
    pub max_results: u32,
}

/// Provider-neutral search hit. Every field except `id` may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlace {
    pub id: String,
    pub display_name: Option<String>,
    pub location: Option<LatLng>,
    pub rating: Option<f64>,
    pub user_rating_count: Option<u32>,
    pub maps_uri: Option<String>,
    pub photo_uri: Option<String>,
}

/// Place-search capability injected into the pipeline.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Runs one text search; implementations return at most `max_results` hits.
    async fn search_by_text(&self, request: &SearchRequest) -> CatalogResult<Vec<RawPlace>>;
}

#[derive(Debug)]
pub enum CatalogError {
    MissingApiKey,
    Transport(String),
    Status { status: u16, body: String },
    Decode(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "place search API key is not configured"),
            Self::Transport(message) => write!(f, "place search request failed: {message}"),
            Self::Status { status, body } => {
                write!(f, "place search returned {status}: {body}")
            }
            Self::Decode(message) => write!(f, "place search response is malformed: {message}"),
        }
    }
}

impl Error for CatalogError {}

impl From<reqwest::Error> for CatalogError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Converts raw hits into cafe records, keeping provider order.
pub fn normalize_places(raw: Vec<RawPlace>) -> Vec<CafeRecord> {
    raw.into_iter().filter_map(normalize_place).collect()
}

fn normalize_place(place: RawPlace) -> Option<CafeRecord> {
    let id = place.id.trim().to_string();
    if id.is_empty() {
        warn!("event=normalize_place module=catalog status=skipped reason=empty_id");
        return None;
    }
    let Some(position) = place.location else {
        warn!("event=normalize_place module=catalog status=skipped reason=no_location id={id}");
        return None;
    };

    let record = CafeRecord {
        name: place.display_name.unwrap_or_default(),
        position,
        rating: place.rating,
        review_count: place.user_rating_count,
        link: place.maps_uri.filter(|link| !link.trim().is_empty()),
        image_url: place.photo_uri.filter(|uri| !uri.trim().is_empty()),
        distance_km: None,
        id,
    };
    if let Err(err) = record.validate() {
        warn!(
            "event=normalize_place module=catalog status=skipped reason=invalid id={} error={}",
            record.id, err
        );
        return None;
    }
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::{normalize_places, LatLngBounds, RawPlace};
    use crate::model::cafe::LatLng;

    fn raw(id: &str, location: Option<LatLng>) -> RawPlace {
        RawPlace {
            id: id.to_string(),
            display_name: Some(format!("Café {id}")),
            location,
            ..RawPlace::default()
        }
    }

    #[test]
    fn missing_photo_yields_no_image_url() {
        let records = normalize_places(vec![raw("a", Some(LatLng::new(20.97, -89.61)))]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image_url, None);
        assert_eq!(records[0].name, "Café a");
    }

    #[test]
    fn places_without_id_or_location_are_dropped() {
        let records = normalize_places(vec![
            raw(" ", Some(LatLng::new(20.97, -89.61))),
            raw("b", None),
            raw("c", Some(LatLng::new(20.98, -89.62))),
            raw("d", Some(LatLng::new(200.0, 0.0))),
        ]);
        let ids: Vec<_> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["c"]);
    }

    #[test]
    fn optional_fields_are_carried_over() {
        let mut place = raw("a", Some(LatLng::new(20.97, -89.61)));
        place.rating = Some(4.6);
        place.user_rating_count = Some(311);
        place.maps_uri = Some("https://maps.google.com/?cid=42".to_string());
        place.photo_uri = Some("https://example.test/photo.jpg".to_string());

        let record = normalize_places(vec![place]).remove(0);
        assert_eq!(record.rating, Some(4.6));
        assert_eq!(record.review_count, Some(311));
        assert_eq!(record.link.as_deref(), Some("https://maps.google.com/?cid=42"));
        assert_eq!(record.image_url.as_deref(), Some("https://example.test/photo.jpg"));
    }

    #[test]
    fn bounds_center_is_midpoint() {
        let bounds = LatLngBounds::new(LatLng::new(20.0, -90.0), LatLng::new(21.0, -89.0));
        assert_eq!(bounds.center(), LatLng::new(20.5, -89.5));
    }
}
