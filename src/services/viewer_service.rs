use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::BoardError;
use crate::models::{Coordinate, Session};
use crate::services::geo_service::RadiusKm;
use crate::services::location_service::LocationFix;
use crate::services::publish_service::{PublishGate, PublishState};
use crate::services::session_service::SessionGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One-shot message for the user, shown on the next full render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Everything that belongs to one browser's view of the board. Only the
/// feed is shared between viewers.
pub struct Viewer {
    id: String,
    pub(crate) session: SessionGate,
    pub(crate) publish: PublishGate,
    location: RwLock<Option<Coordinate>>,
    // Bumped on every location write, so a slow startup fix cannot overwrite
    // a newer report.
    location_version: AtomicU64,
    radius: RwLock<RadiusKm>,
    draft: RwLock<String>,
    notice: Mutex<Option<Notice>>,
    last_seen: RwLock<Instant>,
}

impl Viewer {
    pub fn new(radius: RadiusKm) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session: SessionGate::new(),
            publish: PublishGate::default(),
            location: RwLock::new(None),
            location_version: AtomicU64::new(0),
            radius: RwLock::new(radius),
            draft: RwLock::new(String::new()),
            notice: Mutex::new(None),
            last_seen: RwLock::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Latest result wins, including "unavailable".
    pub async fn set_location(&self, fix: LocationFix) {
        let mut location = self.location.write().await;
        self.location_version.fetch_add(1, Ordering::AcqRel);
        *location = fix.coordinate();
    }

    pub(crate) fn location_version(&self) -> u64 {
        self.location_version.load(Ordering::Acquire)
    }

    /// Applies `fix` only if nothing was written since `version` was read.
    pub(crate) async fn set_location_since(&self, fix: LocationFix, version: u64) -> bool {
        let mut location = self.location.write().await;
        if self.location_version() != version {
            return false;
        }
        self.location_version.fetch_add(1, Ordering::AcqRel);
        *location = fix.coordinate();
        true
    }

    pub async fn location(&self) -> Option<Coordinate> {
        *self.location.read().await
    }

    pub async fn set_radius(&self, km: u32) -> Result<RadiusKm, BoardError> {
        let radius = RadiusKm::try_from(km)?;
        *self.radius.write().await = radius;
        Ok(radius)
    }

    pub async fn radius(&self) -> RadiusKm {
        *self.radius.read().await
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.current().await
    }

    pub async fn draft(&self) -> String {
        self.draft.read().await.clone()
    }

    pub(crate) async fn set_draft(&self, text: &str) {
        *self.draft.write().await = text.to_string();
    }

    pub(crate) async fn clear_draft(&self) {
        self.draft.write().await.clear();
    }

    pub fn publish_state(&self) -> PublishState {
        self.publish.state()
    }

    pub async fn notify(&self, notice: Notice) {
        *self.notice.lock().await = Some(notice);
    }

    pub async fn take_notice(&self) -> Option<Notice> {
        self.notice.lock().await.take()
    }

    async fn touch(&self) {
        *self.last_seen.write().await = Instant::now();
    }

    async fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(*self.last_seen.read().await)
    }
}

/// Viewers by id. Ids are only ever minted here; an id the registry does not
/// know gets a fresh viewer rather than being adopted.
pub struct ViewerRegistry {
    viewers: RwLock<HashMap<String, Arc<Viewer>>>,
    idle_limit: Duration,
}

impl ViewerRegistry {
    pub fn new(idle_limit: Duration) -> Self {
        Self {
            viewers: RwLock::new(HashMap::new()),
            idle_limit,
        }
    }

    /// Returns the viewer for `id`, or a new one. The flag is true when the
    /// viewer was created by this call.
    pub async fn open(&self, id: Option<&str>, radius: RadiusKm) -> (Arc<Viewer>, bool) {
        if let Some(id) = id {
            let known = self.viewers.read().await.get(id).cloned();
            if let Some(viewer) = known {
                viewer.touch().await;
                return (viewer, false);
            }
        }

        self.prune_idle().await;
        let viewer = Arc::new(Viewer::new(radius));
        self.viewers
            .write()
            .await
            .insert(viewer.id().to_string(), Arc::clone(&viewer));
        debug!("👀 New viewer {}", viewer.id());
        (viewer, true)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Viewer>> {
        self.viewers.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.viewers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Signs out every viewer holding `token`; returns how many there were.
    pub async fn end_session(&self, token: &str) -> usize {
        let viewers: Vec<Arc<Viewer>> = self.viewers.read().await.values().cloned().collect();
        let mut ended = 0;
        for viewer in viewers {
            if viewer.session.end_if_token(token).await {
                ended += 1;
            }
        }
        ended
    }

    async fn prune_idle(&self) {
        let now = Instant::now();
        let viewers: Vec<Arc<Viewer>> = self.viewers.read().await.values().cloned().collect();
        let mut stale = Vec::new();
        for viewer in viewers {
            if viewer.idle_for(now).await > self.idle_limit {
                stale.push(viewer.id().to_string());
            }
        }
        if stale.is_empty() {
            return;
        }
        let mut map = self.viewers.write().await;
        for id in &stale {
            map.remove(id);
        }
        debug!("👀 Dropped {} idle viewers", stale.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radius() -> RadiusKm {
        RadiusKm::default()
    }

    #[tokio::test]
    async fn unknown_ids_get_a_fresh_viewer() {
        let registry = ViewerRegistry::new(Duration::from_secs(60));
        let (first, created) = registry.open(None, radius()).await;
        assert!(created);

        let (again, created) = registry.open(Some(first.id()), radius()).await;
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &again));

        let (other, created) = registry.open(Some("chosen-by-client"), radius()).await;
        assert!(created);
        assert_ne!(other.id(), "chosen-by-client");
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn viewers_keep_their_own_state() {
        let registry = ViewerRegistry::new(Duration::from_secs(60));
        let (a, _) = registry.open(None, radius()).await;
        let (b, _) = registry.open(None, radius()).await;

        a.set_location(LocationFix::Available(Coordinate { lat: 1.0, lng: 2.0 }))
            .await;
        a.set_radius(50).await.unwrap();
        a.notify(Notice::info("hello")).await;

        assert_eq!(b.location().await, None);
        assert_eq!(b.radius().await.km(), 5);
        assert!(b.take_notice().await.is_none());
        assert!(a.take_notice().await.is_some());
    }

    #[tokio::test]
    async fn stale_location_write_is_dropped() {
        let viewer = Viewer::new(radius());
        let version = viewer.location_version();
        viewer
            .set_location(LocationFix::Available(Coordinate { lat: 1.0, lng: 1.0 }))
            .await;

        assert!(!viewer.set_location_since(LocationFix::Unavailable, version).await);
        assert_eq!(viewer.location().await, Some(Coordinate { lat: 1.0, lng: 1.0 }));

        let version = viewer.location_version();
        assert!(viewer.set_location_since(LocationFix::Unavailable, version).await);
        assert_eq!(viewer.location().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_viewers_are_dropped_when_new_ones_arrive() {
        let registry = ViewerRegistry::new(Duration::from_secs(60));
        let (old, _) = registry.open(None, radius()).await;
        let old_id = old.id().to_string();
        drop(old);

        tokio::time::advance(Duration::from_secs(61)).await;
        registry.open(None, radius()).await;

        assert!(registry.get(&old_id).await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn ending_a_token_signs_out_only_its_holders() {
        let registry = ViewerRegistry::new(Duration::from_secs(60));
        let (a, _) = registry.open(None, radius()).await;
        let (b, _) = registry.open(None, radius()).await;
        let session = |token: &str| Session {
            user_id: "ana".to_string(),
            email: None,
            access_token: token.to_string(),
        };
        a.session.set(Some(session("t-a"))).await;
        b.session.set(Some(session("t-b"))).await;

        assert_eq!(registry.end_session("t-a").await, 1);
        assert_eq!(a.session().await, None);
        assert_eq!(b.session().await, Some(session("t-b")));
        assert_eq!(registry.end_session("unknown").await, 0);
    }
}
