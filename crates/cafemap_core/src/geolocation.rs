//! User position lookup.
//!
//! Platform location services are injected through [`Geolocation`];
//! [`locate_user`] adds the fix timeout and turns every failure into one
//! error notification so callers only ever see "position or no position".

use crate::model::cafe::LatLng;
use crate::notify::{NotificationKind, NotificationQueue};
use async_trait::async_trait;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeolocationError {
    /// The user refused location access.
    Denied,
    /// The host has no location service.
    Unsupported,
    TimedOut,
    Unavailable(String),
}

impl Display for GeolocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied => write!(f, "location permission denied"),
            Self::Unsupported => write!(f, "geolocation is not supported"),
            Self::TimedOut => write!(f, "geolocation timed out"),
            Self::Unavailable(reason) => write!(f, "position unavailable: {reason}"),
        }
    }
}

impl Error for GeolocationError {}

/// Source of fresh position fixes. Cached fixes must not be returned.
#[async_trait]
pub trait Geolocation: Send + Sync {
    async fn current_position(&self) -> Result<LatLng, GeolocationError>;
}

/// Message shown when no position could be obtained.
pub fn failure_message(err: &GeolocationError) -> &'static str {
    match err {
        GeolocationError::Denied => "Location access was denied.",
        GeolocationError::Unsupported => "Geolocation is not supported on this device.",
        GeolocationError::TimedOut | GeolocationError::Unavailable(_) => {
            "Could not get your location."
        }
    }
}

/// Requests one fix within `timeout`.
///
/// Returns `None` (no user-position mode) on any failure, after posting
/// exactly one error notification.
pub async fn locate_user(
    geolocation: &dyn Geolocation,
    timeout: Duration,
    notifications: &NotificationQueue,
) -> Option<LatLng> {
    let result = match tokio::time::timeout(timeout, geolocation.current_position()).await {
        Ok(result) => result.and_then(|position| {
            position
                .validate()
                .map(|()| position)
                .map_err(|err| GeolocationError::Unavailable(err.to_string()))
        }),
        Err(_) => Err(GeolocationError::TimedOut),
    };

    match result {
        Ok(position) => {
            info!("event=geolocate module=geolocation status=ok");
            Some(position)
        }
        Err(err) => {
            warn!(
                "event=geolocate module=geolocation status=error error={}",
                err
            );
            notifications.push(failure_message(&err), NotificationKind::Error);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{locate_user, Geolocation, GeolocationError};
    use crate::model::cafe::LatLng;
    use crate::notify::{NotificationKind, NotificationQueue};
    use async_trait::async_trait;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(10_000);
    const TTL: Duration = Duration::from_millis(4_000);

    struct Fixed(Result<LatLng, GeolocationError>);

    #[async_trait]
    impl Geolocation for Fixed {
        async fn current_position(&self) -> Result<LatLng, GeolocationError> {
            self.0.clone()
        }
    }

    struct Never;

    #[async_trait]
    impl Geolocation for Never {
        async fn current_position(&self) -> Result<LatLng, GeolocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_position_without_notifying() {
        let queue = NotificationQueue::new(TTL);
        let position = LatLng::new(20.97, -89.62);

        let located = locate_user(&Fixed(Ok(position)), TIMEOUT, &queue).await;

        assert_eq!(located, Some(position));
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn denied_posts_one_error() {
        let queue = NotificationQueue::new(TTL);

        let located = locate_user(&Fixed(Err(GeolocationError::Denied)), TIMEOUT, &queue).await;

        assert_eq!(located, None);
        let live = queue.live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].kind, NotificationKind::Error);
        assert_eq!(live[0].message, "Location access was denied.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fix_times_out_after_configured_duration() {
        let queue = NotificationQueue::new(TTL);
        let started = tokio::time::Instant::now();

        let located = locate_user(&Never, TIMEOUT, &queue).await;

        assert_eq!(located, None);
        assert!(started.elapsed() >= TIMEOUT);
        assert_eq!(queue.live()[0].message, "Could not get your location.");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_fix_is_rejected() {
        let queue = NotificationQueue::new(TTL);

        let located = locate_user(&Fixed(Ok(LatLng::new(120.0, 0.0))), TIMEOUT, &queue).await;

        assert_eq!(located, None);
        assert_eq!(queue.len(), 1);
    }
}
