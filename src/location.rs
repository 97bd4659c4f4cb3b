/// One-shot device location fixes
///
/// The capture workflow requests a single high-accuracy fix with a bounded
/// wait. Providers are behind a trait so the application can run with a
/// configured home location on machines without a location source.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::finds::Coordinates;

/// Upper bound on one location fix
pub const LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("timed out waiting for a location fix")]
    Timeout,
    #[error("no location source available")]
    Unavailable,
}

/// A source of one-shot location fixes
pub trait LocationProvider {
    fn current_location(&self) -> impl Future<Output = Result<Coordinates, LocationError>> + Send;
}

/// Request one fix from `provider`, bounded by LOCATION_TIMEOUT
pub async fn locate_once<P: LocationProvider>(provider: &P) -> Result<Coordinates, LocationError> {
    timeout(LOCATION_TIMEOUT, provider.current_location())
        .await
        .map_err(|_| LocationError::Timeout)?
}

/// Provider backed by the configured home coordinates.
/// Resolves immediately; fails when no home location is configured.
#[derive(Debug, Clone)]
pub struct HomeLocation {
    home: Option<Coordinates>,
}

impl HomeLocation {
    pub fn new(home: Option<Coordinates>) -> Self {
        HomeLocation { home }
    }
}

impl LocationProvider for HomeLocation {
    async fn current_location(&self) -> Result<Coordinates, LocationError> {
        self.home.ok_or(LocationError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider whose fix never arrives
    struct NeverResolves;

    impl LocationProvider for NeverResolves {
        async fn current_location(&self) -> Result<Coordinates, LocationError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_home_location_fix() {
        let provider = HomeLocation::new(Coordinates::new(44.8, -85.5));
        let fix = locate_once(&provider).await.unwrap();
        assert_eq!(fix, Coordinates { lat: 44.8, lng: -85.5 });
    }

    #[tokio::test]
    async fn test_missing_home_location_is_unavailable() {
        let provider = HomeLocation::new(None);
        let err = locate_once(&provider).await.unwrap_err();
        assert_eq!(err, LocationError::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_times_out() {
        let err = locate_once(&NeverResolves).await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
    }
}
