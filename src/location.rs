//! One-shot geolocation queries and the latest known user location.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{oneshot, watch};

use crate::geo::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeolocationError {
    #[error("Geolocation is not supported in this environment.")]
    Unsupported,
    #[error("Location access was denied.")]
    PermissionDenied,
    #[error("Location information is unavailable.")]
    PositionUnavailable,
    #[error("Timed out waiting for a location fix.")]
    Timeout,
}

impl GeolocationError {
    /// Everything except a missing capability can succeed on a later request.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GeolocationError::Unsupported)
    }
}

pub type PositionFuture = BoxFuture<'static, Result<Coordinate, GeolocationError>>;

pub trait GeolocationProvider: Send + Sync {
    fn is_supported(&self) -> bool {
        true
    }

    fn current_position(&self) -> PositionFuture;
}

/// Always answers with a configured coordinate.
pub struct FixedPosition(pub Coordinate);

impl GeolocationProvider for FixedPosition {
    fn current_position(&self) -> PositionFuture {
        let coordinate = self.0;
        Box::pin(async move { Ok(coordinate) })
    }
}

/// Environment without any geolocation capability.
pub struct NoGeolocation;

impl GeolocationProvider for NoGeolocation {
    fn is_supported(&self) -> bool {
        false
    }

    fn current_position(&self) -> PositionFuture {
        Box::pin(async { Err(GeolocationError::Unsupported) })
    }
}

type Waiter = oneshot::Sender<Result<Coordinate, GeolocationError>>;

/// Positions reported by the page's `navigator.geolocation`. A query waits
/// until the page posts an answer through [`BrowserGeolocation::report`].
#[derive(Default)]
pub struct BrowserGeolocation {
    waiters: Mutex<Vec<Waiter>>,
}

impl BrowserGeolocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands `result` to every outstanding query. Returns `false` when nobody
    /// was waiting.
    pub fn report(&self, result: Result<Coordinate, GeolocationError>) -> bool {
        let waiters = std::mem::take(&mut *self.waiters.lock());
        let mut delivered = false;
        for waiter in waiters {
            delivered |= waiter.send(result).is_ok();
        }
        delivered
    }
}

impl GeolocationProvider for BrowserGeolocation {
    fn current_position(&self) -> PositionFuture {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().push(tx);
        Box::pin(async move { rx.await.unwrap_or(Err(GeolocationError::PositionUnavailable)) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationStatus {
    Idle,
    Pending,
    Failed { error: GeolocationError },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSnapshot {
    pub user_location: Option<Coordinate>,
    pub status: LocationStatus,
}

pub struct GeolocationTracker {
    provider: Arc<dyn GeolocationProvider>,
    state: watch::Sender<LocationSnapshot>,
    resolutions: u64,
}

impl GeolocationTracker {
    pub fn new(provider: Arc<dyn GeolocationProvider>) -> Self {
        let (state, _) = watch::channel(LocationSnapshot {
            user_location: None,
            status: LocationStatus::Idle,
        });
        GeolocationTracker {
            provider,
            state,
            resolutions: 0,
        }
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.state.borrow().user_location
    }

    pub fn snapshot(&self) -> LocationSnapshot {
        *self.state.borrow()
    }

    /// `true` once the environment has been found to lack geolocation.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self.state.borrow().status,
            LocationStatus::Failed {
                error: GeolocationError::Unsupported
            }
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<LocationSnapshot> {
        self.state.subscribe()
    }

    /// Starts a location query.
    ///
    /// Returns the provider future the caller must drive to completion and
    /// feed back into [`resolve`](Self::resolve) or [`reject`](Self::reject),
    /// or `None` when a query is already in flight. An unsupported
    /// environment fails immediately without touching the provider, and only
    /// the first such failure is recorded.
    pub fn request_location(&mut self) -> Result<Option<PositionFuture>, GeolocationError> {
        if !self.provider.is_supported() {
            if !self.is_unsupported() {
                self.reject(GeolocationError::Unsupported);
            }
            return Err(GeolocationError::Unsupported);
        }
        if self.state.borrow().status == LocationStatus::Pending {
            return Ok(None);
        }
        self.state.send_modify(|s| s.status = LocationStatus::Pending);
        tracing::debug!("location requested");
        Ok(Some(self.provider.current_position()))
    }

    /// Stores a fix. Returns `true` on the first successful resolution.
    pub fn resolve(&mut self, coordinate: Coordinate) -> bool {
        self.resolutions += 1;
        self.state.send_modify(|s| {
            s.user_location = Some(coordinate);
            s.status = LocationStatus::Idle;
        });
        tracing::info!(%coordinate, "location acquired");
        self.resolutions == 1
    }

    /// Records a failed query. A previously known location is kept.
    pub fn reject(&mut self, error: GeolocationError) {
        self.state.send_modify(|s| s.status = LocationStatus::Failed { error });
        tracing::warn!(%error, "location unavailable");
    }
}

/// Resolves once a location is known, or with `None` as soon as the
/// outstanding query fails.
pub async fn wait_for_location(mut rx: watch::Receiver<LocationSnapshot>) -> Option<Coordinate> {
    loop {
        {
            let snapshot = rx.borrow_and_update();
            if let Some(coordinate) = snapshot.user_location {
                return Some(coordinate);
            }
            if let LocationStatus::Failed { .. } = snapshot.status {
                return None;
            }
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seoul() -> Coordinate {
        Coordinate::new(37.5665, 126.978)
    }

    #[test]
    fn unsupported_environment_fails_without_a_query() {
        let mut tracker = GeolocationTracker::new(Arc::new(NoGeolocation));
        assert_eq!(tracker.request_location().err(), Some(GeolocationError::Unsupported));
        assert_eq!(
            tracker.snapshot().status,
            LocationStatus::Failed {
                error: GeolocationError::Unsupported
            }
        );
        assert!(!GeolocationError::Unsupported.is_retryable());
        assert!(GeolocationError::PermissionDenied.is_retryable());
    }

    #[test]
    fn repeated_unsupported_requests_do_not_notify_again() {
        let mut tracker = GeolocationTracker::new(Arc::new(NoGeolocation));
        assert!(!tracker.is_unsupported());
        assert!(tracker.request_location().is_err());
        assert!(tracker.is_unsupported());

        let mut rx = tracker.subscribe();
        rx.borrow_and_update();
        assert!(tracker.request_location().is_err());
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn fixed_position_answers_the_query() {
        let mut tracker = GeolocationTracker::new(Arc::new(FixedPosition(seoul())));
        let query = tracker.request_location().unwrap().unwrap();
        // A second request while the first is in flight is not duplicated.
        assert!(tracker.request_location().unwrap().is_none());

        let coordinate = query.await.unwrap();
        assert!(tracker.resolve(coordinate));
        assert_eq!(tracker.user_location(), Some(seoul()));
        assert!(!tracker.resolve(coordinate));
    }

    #[tokio::test]
    async fn browser_reports_complete_pending_queries() {
        let browser = Arc::new(BrowserGeolocation::new());
        assert!(!browser.report(Ok(seoul())));

        let mut tracker = GeolocationTracker::new(browser.clone());
        let query = tracker.request_location().unwrap().unwrap();
        assert!(browser.report(Err(GeolocationError::PermissionDenied)));
        assert_eq!(query.await, Err(GeolocationError::PermissionDenied));
    }

    #[tokio::test]
    async fn waiters_see_the_resolution() {
        let mut tracker = GeolocationTracker::new(Arc::new(BrowserGeolocation::new()));
        let _query = tracker.request_location().unwrap();
        let waiter = tokio::spawn(wait_for_location(tracker.subscribe()));
        let second = tokio::spawn(wait_for_location(tracker.subscribe()));

        tokio::task::yield_now().await;
        tracker.resolve(seoul());

        assert_eq!(waiter.await.unwrap(), Some(seoul()));
        assert_eq!(second.await.unwrap(), Some(seoul()));
    }

    #[tokio::test]
    async fn waiters_give_up_when_the_query_fails() {
        let mut tracker = GeolocationTracker::new(Arc::new(BrowserGeolocation::new()));
        let _query = tracker.request_location().unwrap();
        let waiter = tokio::spawn(wait_for_location(tracker.subscribe()));

        tokio::task::yield_now().await;
        tracker.reject(GeolocationError::PositionUnavailable);
        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn known_location_survives_a_later_failure() {
        let mut tracker = GeolocationTracker::new(Arc::new(FixedPosition(seoul())));
        tracker.resolve(seoul());
        tracker.reject(GeolocationError::Timeout);
        assert_eq!(tracker.user_location(), Some(seoul()));
        assert_eq!(wait_for_location(tracker.subscribe()).await, Some(seoul()));
    }
}
