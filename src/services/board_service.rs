use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::database::Backend;
use crate::error::BoardError;
use crate::models::{Coordinate, Post, Session};
use crate::services::feed_service::{self, FeedStore};
use crate::services::geo_service::{self, RadiusKm, RADIUS_OPTIONS_KM};
use crate::services::location_service::{self, LocationFix, PositionOptions, PositionSource};
use crate::services::publish_service::{self, PublishOutcome, PublishState};
use crate::services::session_service;
use crate::services::viewer_service::{Notice, Viewer, ViewerRegistry};

#[derive(Debug, Clone)]
pub struct BoardSettings {
    pub refresh_interval: Duration,
    pub ambient: PositionOptions,
    pub fresh: PositionOptions,
    pub require_session: bool,
    pub default_radius: RadiusKm,
    /// Viewers unseen for this long are forgotten.
    pub viewer_idle: Duration,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            ambient: PositionOptions::default(),
            fresh: PositionOptions::fresh(Duration::from_secs(8)),
            require_session: true,
            default_radius: RadiusKm::default(),
            viewer_idle: Duration::from_secs(24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostCardView {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub created_label: String,
    pub distance_label: Option<String>,
    pub can_delete: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadiusOptionView {
    pub km: u32,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MapView {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: f64,
    pub zoom: u8,
}

/// Position policy as handed to the browser's geolocation call.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyView {
    pub high_accuracy: bool,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

impl From<&PositionOptions> for PolicyView {
    fn from(options: &PositionOptions) -> Self {
        Self {
            high_accuracy: options.high_accuracy,
            timeout_ms: options.timeout.as_millis() as u64,
            maximum_age_ms: options.maximum_age.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub posts: Vec<PostCardView>,
    pub total_posts: usize,
    pub radius_km: u32,
    pub radius_options: Vec<RadiusOptionView>,
    pub location: Option<Coordinate>,
    pub location_debug: String,
    pub map: Option<MapView>,
    pub session_label: Option<String>,
    pub require_session: bool,
    pub draft: String,
    pub submitting: bool,
    pub notice: Option<Notice>,
    pub refresh_ms: u64,
    pub ambient_policy: PolicyView,
    pub fresh_policy: PolicyView,
}

/// The board: one shared feed over one backend, seen through many viewers.
///
/// The filtered feed is never stored; it is derived from the feed and a
/// viewer's location and radius whenever a view is built.
pub struct Board {
    backend: Arc<dyn Backend>,
    settings: BoardSettings,
    feed: Arc<FeedStore>,
    viewers: Arc<ViewerRegistry>,
    // Startup fix for new viewers; browsers report their own on top.
    ambient: Option<Arc<dyn PositionSource>>,
}

/// Background work tied to a started board. `shutdown` stops the refresh
/// timer and releases the session subscription; dropping it does the same.
pub struct BoardLifetime {
    tasks: Vec<JoinHandle<()>>,
}

impl BoardLifetime {
    pub fn shutdown(self) {
        self.abort_all();
    }

    fn abort_all(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for BoardLifetime {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl Board {
    pub fn new(
        backend: Arc<dyn Backend>,
        settings: BoardSettings,
        ambient: Option<Arc<dyn PositionSource>>,
    ) -> Arc<Self> {
        let viewers = Arc::new(ViewerRegistry::new(settings.viewer_idle));
        Arc::new(Self {
            backend,
            settings,
            feed: Arc::new(FeedStore::new()),
            viewers,
            ambient,
        })
    }

    /// Loads the feed, then starts the refresh timer and the listener that
    /// signs viewers out when the backend ends their sessions.
    pub async fn start(&self) -> BoardLifetime {
        let mut tasks = vec![session_service::spawn_session_listener(
            Arc::clone(&self.viewers),
            self.backend.subscribe_session_ends(),
        )];

        self.refresh_feed().await;
        tasks.push(feed_service::spawn_periodic_refresh(
            Arc::clone(&self.feed),
            Arc::clone(&self.backend),
            self.settings.refresh_interval,
        ));

        info!(
            "📋 Board started (refresh every {:?}, radius {} km)",
            self.settings.refresh_interval,
            self.settings.default_radius.km()
        );
        BoardLifetime { tasks }
    }

    pub fn settings(&self) -> &BoardSettings {
        &self.settings
    }

    /// The viewer behind `id`, or a new one. A new viewer gets a one-off
    /// ambient fix in the background, bounded by the ambient timeout.
    pub async fn open_view(&self, id: Option<&str>) -> Arc<Viewer> {
        let (viewer, created) = self.viewers.open(id, self.settings.default_radius).await;
        if created {
            if let Some(source) = &self.ambient {
                let source = Arc::clone(source);
                let target = Arc::clone(&viewer);
                let options = self.settings.ambient;
                let version = viewer.location_version();
                tokio::spawn(async move {
                    let fix = location_service::acquire(source.as_ref(), &options).await;
                    target.set_location_since(fix, version).await;
                });
            }
        }
        viewer
    }

    pub async fn find_view(&self, id: &str) -> Option<Arc<Viewer>> {
        self.viewers.get(id).await
    }

    /// Refreshes the feed. Failures are logged and leave the feed as it was.
    pub async fn refresh_feed(&self) -> bool {
        match self.feed.refresh(self.backend.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                error!("🔄 Feed refresh failed: {}", e);
                false
            }
        }
    }

    pub async fn posts(&self) -> Arc<Vec<Post>> {
        self.feed.snapshot().await
    }

    /// Re-checks the viewer's session with the backend; run on every full
    /// page load.
    pub async fn resume(&self, viewer: &Viewer) -> Option<Session> {
        viewer.session.revalidate(self.backend.as_ref()).await
    }

    /// Posts within the viewer's radius of the viewer's location.
    pub async fn visible_posts(&self, viewer: &Viewer) -> Vec<Post> {
        let posts = self.posts().await;
        let location = viewer.location().await;
        let radius = viewer.radius().await;
        geo_service::visible_posts(&posts, location, f64::from(radius.km()))
            .into_iter()
            .cloned()
            .collect()
    }

    /// Publishes `input` with the position `source` reports right now.
    pub async fn publish(
        &self,
        viewer: &Viewer,
        input: &str,
        source: &dyn PositionSource,
    ) -> PublishOutcome {
        let Some(text) = publish_service::normalize_text(input) else {
            return PublishOutcome::TooShort;
        };

        let session = viewer.session().await;
        if self.settings.require_session && session.is_none() {
            viewer.set_draft(input).await;
            viewer
                .notify(Notice::error("You must sign in to publish."))
                .await;
            return PublishOutcome::SignInRequired;
        }

        let Some(_submitting) = viewer.publish.try_begin() else {
            return PublishOutcome::Busy;
        };
        viewer.set_draft(input).await;

        let fix = location_service::acquire(source, &self.settings.fresh).await;
        if let LocationFix::Available(_) = fix {
            viewer.set_location(fix).await;
        }

        let post = publish_service::build_post(text, fix, session.as_ref());
        match self.backend.insert_post(session.as_ref(), &post).await {
            Ok(()) => {
                info!(
                    "📝 Published post (located: {})",
                    fix.coordinate().is_some()
                );
                viewer.clear_draft().await;
                self.refresh_feed().await;
                PublishOutcome::Published
            }
            Err(e) => {
                warn!("📝 Publish failed: {}", e);
                self.drop_rejected_session(viewer, session.as_ref(), &e).await;
                let message = e.to_string();
                viewer
                    .notify(Notice::error(format!("Could not publish: {}", message)))
                    .await;
                PublishOutcome::Failed(message)
            }
        }
    }

    /// Asks the backend to delete post `id` as the viewer's user; the backend
    /// decides if that is allowed.
    pub async fn delete(&self, viewer: &Viewer, id: i64) -> Result<(), BoardError> {
        let Some(session) = viewer.session().await else {
            viewer
                .notify(Notice::error("You must sign in to delete posts."))
                .await;
            return Err(BoardError::SignInRequired);
        };

        match self.backend.delete_post(&session, id).await {
            Ok(()) => {
                self.refresh_feed().await;
                Ok(())
            }
            Err(e) => {
                warn!("🗑️ Delete of post {} failed: {}", id, e);
                self.drop_rejected_session(viewer, Some(&session), &e).await;
                viewer
                    .notify(Notice::error(format!("Could not delete: {}", e)))
                    .await;
                Err(e)
            }
        }
    }

    pub async fn sign_in(
        &self,
        viewer: &Viewer,
        email: &str,
        password: &str,
    ) -> Result<Session, BoardError> {
        match self.backend.sign_in(email, password).await {
            Ok(session) => {
                viewer.session.set(Some(session.clone())).await;
                viewer
                    .notify(Notice::info(format!(
                        "Signed in as {}",
                        session.display_name()
                    )))
                    .await;
                Ok(session)
            }
            Err(e) => {
                warn!("🔐 Sign-in failed for {}: {}", email, e);
                viewer
                    .notify(Notice::error(format!("Sign-in failed: {}", e)))
                    .await;
                Err(e)
            }
        }
    }

    /// Signs the viewer out locally whatever the backend answers.
    pub async fn sign_out(&self, viewer: &Viewer) {
        let Some(session) = viewer.session.take().await else {
            return;
        };
        if let Err(e) = self.backend.sign_out(&session).await {
            warn!("🔐 Backend sign-out failed: {}", e);
        }
    }

    // A 401 means the backend no longer honours the token.
    async fn drop_rejected_session(
        &self,
        viewer: &Viewer,
        session: Option<&Session>,
        error: &BoardError,
    ) {
        if let (Some(session), BoardError::Backend { status: 401, .. }) = (session, error) {
            viewer.session.end_if_token(&session.access_token).await;
        }
    }

    /// View model for `viewer`'s page. Leaves any pending notice in place.
    pub async fn view(&self, viewer: &Viewer) -> BoardView {
        let posts = self.posts().await;
        let location = viewer.location().await;
        let radius = viewer.radius().await;
        let session = viewer.session().await;

        let cards = geo_service::visible_posts(&posts, location, f64::from(radius.km()))
            .into_iter()
            .map(|post| PostCardView {
                id: post.id,
                text: post.text.clone(),
                created_at: post.created_at.to_rfc3339(),
                created_label: post.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                distance_label: location
                    .zip(post.coordinate())
                    .map(|(here, there)| format!("{:.1} km", geo_service::haversine_km(here, there))),
                can_delete: session_service::can_delete(session.as_ref(), post),
            })
            .collect();

        BoardView {
            posts: cards,
            total_posts: posts.len(),
            radius_km: radius.km(),
            radius_options: RADIUS_OPTIONS_KM
                .iter()
                .map(|&km| RadiusOptionView {
                    km,
                    selected: km == radius.km(),
                })
                .collect(),
            location,
            location_debug: match location {
                Some(c) => format!("lat={} lng={}", c.lat, c.lng),
                None => "lat=null lng=null".to_string(),
            },
            map: location.map(|c| MapView {
                lat: c.lat,
                lng: c.lng,
                radius_m: radius.meters(),
                zoom: geo_service::map_zoom_for_radius(radius),
            }),
            session_label: session.as_ref().map(|s| s.display_name().to_string()),
            require_session: self.settings.require_session,
            draft: viewer.draft().await,
            submitting: viewer.publish_state() == PublishState::Submitting,
            notice: None,
            refresh_ms: self.settings.refresh_interval.as_millis() as u64,
            ambient_policy: PolicyView::from(&self.settings.ambient),
            fresh_policy: PolicyView::from(&self.settings.fresh),
        }
    }
}
