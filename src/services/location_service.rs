use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::Coordinate;

/// Request parameters handed to the platform position API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the platform may answer with. Zero means a new fix.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// Background fix taken once when the board starts.
    pub fn ambient(timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age,
        }
    }

    /// Fix taken at the moment a post is submitted.
    pub fn fresh(timeout: Duration) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self::ambient(Duration::from_secs(15), Duration::from_secs(300))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    Unavailable,
    #[error("timed out")]
    Timeout,
    #[error("geolocation not supported")]
    Unsupported,
}

/// Platform position API.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_position(&self, options: &PositionOptions)
        -> Result<Coordinate, PositionError>;
}

/// Outcome of an acquisition. Missing location is a normal result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationFix {
    Available(Coordinate),
    Unavailable,
}

impl LocationFix {
    pub fn coordinate(self) -> Option<Coordinate> {
        match self {
            LocationFix::Available(c) => Some(c),
            LocationFix::Unavailable => None,
        }
    }
}

impl From<Option<Coordinate>> for LocationFix {
    fn from(value: Option<Coordinate>) -> Self {
        value.map_or(LocationFix::Unavailable, LocationFix::Available)
    }
}

/// Asks `source` for a position, bounded by `options.timeout`.
///
/// Never fails: denial, timeout and unsupported platforms all resolve to
/// [`LocationFix::Unavailable`].
pub async fn acquire(source: &dyn PositionSource, options: &PositionOptions) -> LocationFix {
    match tokio::time::timeout(options.timeout, source.current_position(options)).await {
        Ok(Ok(coordinate)) => LocationFix::Available(coordinate),
        Ok(Err(e)) => {
            debug!("📍 Position unavailable: {}", e);
            LocationFix::Unavailable
        }
        Err(_) => {
            debug!("📍 Position request timed out after {:?}", options.timeout);
            LocationFix::Unavailable
        }
    }
}

/// A position known up front: a configured static location, or the fix a
/// browser attached to a request. `None` behaves like a platform without
/// geolocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPosition(Option<Coordinate>);

impl FixedPosition {
    pub fn new(coordinate: Option<Coordinate>) -> Self {
        Self(coordinate)
    }

    pub fn unsupported() -> Self {
        Self(None)
    }
}

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinate, PositionError> {
        self.0.ok_or(PositionError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Denied;

    #[async_trait]
    impl PositionSource for Denied {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinate, PositionError> {
            Err(PositionError::PermissionDenied)
        }
    }

    struct Hangs;

    #[async_trait]
    impl PositionSource for Hangs {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinate, PositionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn fixed_position_resolves() {
        let here = Coordinate { lat: 10.0, lng: 20.0 };
        let fix = acquire(
            &FixedPosition::new(Some(here)),
            &PositionOptions::fresh(Duration::from_secs(8)),
        )
        .await;
        assert_eq!(fix, LocationFix::Available(here));
    }

    #[tokio::test]
    async fn errors_become_unavailable() {
        let opts = PositionOptions::default();
        assert_eq!(acquire(&Denied, &opts).await, LocationFix::Unavailable);
        assert_eq!(
            acquire(&FixedPosition::unsupported(), &opts).await,
            LocationFix::Unavailable
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_platform_is_cut_off_by_timeout() {
        let opts = PositionOptions::fresh(Duration::from_secs(8));
        let started = tokio::time::Instant::now();
        assert_eq!(acquire(&Hangs, &opts).await, LocationFix::Unavailable);
        assert!(started.elapsed() >= Duration::from_secs(8));
    }

    #[test]
    fn fresh_policy_never_accepts_cached_fixes() {
        let opts = PositionOptions::fresh(Duration::from_secs(8));
        assert!(opts.high_accuracy);
        assert_eq!(opts.maximum_age, Duration::ZERO);
    }
}
