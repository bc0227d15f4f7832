use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::database::Backend;
use crate::error::BoardError;
use crate::models::Post;

/// Unfiltered posts, newest first. Only ever replaced wholesale.
#[derive(Default)]
pub struct FeedStore {
    posts: RwLock<Arc<Vec<Post>>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Arc<Vec<Post>> {
        Arc::clone(&*self.posts.read().await)
    }

    /// Re-reads every post and swaps the list in one step.
    ///
    /// On error the previous list stays in place. Concurrent refreshes are not
    /// coordinated: whichever finishes last is what the store holds.
    pub async fn refresh(&self, backend: &dyn Backend) -> Result<usize, BoardError> {
        let mut posts = backend.fetch_posts().await?;
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        let count = posts.len();
        *self.posts.write().await = Arc::new(posts);
        Ok(count)
    }
}

/// Refreshes `feed` every `period` until the returned handle is aborted.
/// The first tick comes one full period after spawning.
pub fn spawn_periodic_refresh(
    feed: Arc<FeedStore>,
    backend: Arc<dyn Backend>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match feed.refresh(backend.as_ref()).await {
                Ok(count) => debug!("🔄 Feed refreshed: {} posts", count),
                Err(e) => error!("🔄 Feed refresh failed, keeping previous posts: {}", e),
            }
        }
    })
}
