use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::{NewPost, Session};
use crate::services::location_service::LocationFix;

pub const MIN_POST_CHARS: usize = 3;

/// Trimmed post text, or `None` when it is too short to publish.
pub fn normalize_text(input: &str) -> Option<&str> {
    let text = input.trim();
    (text.chars().count() >= MIN_POST_CHARS).then_some(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishState {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Under [`MIN_POST_CHARS`] after trimming; nothing happened.
    TooShort,
    SignInRequired,
    /// Another submission is still in flight.
    Busy,
    Published,
    /// Backend rejected the insert; carries its message.
    Failed(String),
}

/// Allows a single submission in flight at a time.
#[derive(Default)]
pub struct PublishGate {
    submitting: AtomicBool,
}

impl PublishGate {
    pub fn state(&self) -> PublishState {
        if self.submitting.load(Ordering::Acquire) {
            PublishState::Submitting
        } else {
            PublishState::Idle
        }
    }

    /// Moves to `Submitting`, or `None` if already there. Dropping the guard
    /// returns to `Idle`.
    pub fn try_begin(&self) -> Option<SubmitGuard<'_>> {
        self.submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard(&self.submitting))
    }
}

pub struct SubmitGuard<'a>(&'a AtomicBool);

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub fn build_post(text: &str, fix: LocationFix, session: Option<&Session>) -> NewPost {
    let coordinate = fix.coordinate();
    NewPost {
        text: text.to_string(),
        lat: coordinate.map(|c| c.lat),
        lng: coordinate.map(|c| c.lng),
        owner: session.map(|s| s.user_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;

    #[test]
    fn short_text_is_rejected_after_trimming() {
        assert_eq!(normalize_text("ab"), None);
        assert_eq!(normalize_text("   ab   "), None);
        assert_eq!(normalize_text(""), None);
        assert_eq!(normalize_text("  abc "), Some("abc"));
        // Counted in characters, not bytes.
        assert_eq!(normalize_text("ñá"), None);
        assert_eq!(normalize_text("ñáé"), Some("ñáé"));
    }

    #[test]
    fn gate_admits_one_submission() {
        let gate = PublishGate::default();
        assert_eq!(gate.state(), PublishState::Idle);

        let guard = gate.try_begin().unwrap();
        assert_eq!(gate.state(), PublishState::Submitting);
        assert!(gate.try_begin().is_none());

        drop(guard);
        assert_eq!(gate.state(), PublishState::Idle);
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn post_carries_fix_and_owner() {
        let session = Session {
            user_id: "u-1".to_string(),
            email: None,
            access_token: "t-1".to_string(),
        };
        let post = build_post(
            "need milk",
            LocationFix::Available(Coordinate { lat: 10.0, lng: 20.0 }),
            Some(&session),
        );
        assert_eq!(
            post,
            NewPost {
                text: "need milk".to_string(),
                lat: Some(10.0),
                lng: Some(20.0),
                owner: Some("u-1".to_string()),
            }
        );

        let anonymous = build_post("need milk", LocationFix::Unavailable, None);
        assert_eq!(anonymous.lat, None);
        assert_eq!(anonymous.lng, None);
        assert_eq!(anonymous.owner, None);
    }
}
