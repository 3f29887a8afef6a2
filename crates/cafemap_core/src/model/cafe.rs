//! Cafe domain model.
//!
//! # Responsibility
//! - Define the canonical record for one discovered place.
//! - Provide validation shared by normalization and persistence paths.
//!
//! # Invariants
//! - `id` is assigned by the remote catalog and never generated locally.
//! - `id` is unique within the cache and the store.
//! - Records are never mutated after creation, except for the transient
//!   `distance_km` annotation which is never persisted.

use crate::geo::haversine_km;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable identifier assigned by the place provider.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type CafeId = String;

/// WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Validates that both components are finite and within WGS84 range.
    pub fn validate(&self) -> Result<(), CafeValidationError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(CafeValidationError::NonFiniteCoordinate);
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CafeValidationError::LatitudeOutOfRange(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(CafeValidationError::LongitudeOutOfRange(self.lng));
        }
        Ok(())
    }
}

/// Canonical record for one cafe.
///
/// Serialized in camelCase so exported JSON matches the names the map UI uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CafeRecord {
    /// Provider-assigned dedup key.
    pub id: CafeId,
    /// Display name.
    pub name: String,
    pub position: LatLng,
    /// Provider rating, usually in `0.0..=5.0`.
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
    /// External detail page (maps link).
    pub link: Option<String>,
    /// Representative photo; `None` when the provider returned no photo.
    pub image_url: Option<String>,
    /// Only set in ranking contexts. Never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl CafeRecord {
    /// Creates a record with only the required fields set.
    pub fn new(id: impl Into<CafeId>, name: impl Into<String>, position: LatLng) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            position,
            rating: None,
            review_count: None,
            link: None,
            image_url: None,
            distance_km: None,
        }
    }

    /// Validates identity, coordinates and rating.
    ///
    /// # Errors
    /// - `EmptyId` when `id` is blank.
    /// - Coordinate errors when `position` is outside WGS84 range.
    /// - `InvalidRating` when `rating` is negative or not finite.
    pub fn validate(&self) -> Result<(), CafeValidationError> {
        if self.id.trim().is_empty() {
            return Err(CafeValidationError::EmptyId);
        }
        self.position.validate()?;
        if let Some(rating) = self.rating {
            if !rating.is_finite() || rating < 0.0 {
                return Err(CafeValidationError::InvalidRating(rating));
            }
        }
        Ok(())
    }

    /// Returns a copy annotated with the distance from `origin`.
    pub fn with_distance_from(&self, origin: LatLng) -> Self {
        let mut annotated = self.clone();
        annotated.distance_km = Some(haversine_km(origin, self.position));
        annotated
    }

    /// Returns the navigation link when one is present and non-empty.
    pub fn navigable_link(&self) -> Option<&str> {
        self.link.as_deref().filter(|link| !link.trim().is_empty())
    }
}

/// Validation failures for cafe records.
#[derive(Debug, Clone, PartialEq)]
pub enum CafeValidationError {
    EmptyId,
    NonFiniteCoordinate,
    LatitudeOutOfRange(f64),
    LongitudeOutOfRange(f64),
    InvalidRating(f64),
}

impl Display for CafeValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "cafe id cannot be empty"),
            Self::NonFiniteCoordinate => write!(f, "cafe position must be finite"),
            Self::LatitudeOutOfRange(value) => {
                write!(f, "latitude {value} is outside -90..=90")
            }
            Self::LongitudeOutOfRange(value) => {
                write!(f, "longitude {value} is outside -180..=180")
            }
            Self::InvalidRating(value) => write!(f, "rating {value} is not a valid score"),
        }
    }
}

impl Error for CafeValidationError {}
