use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use teloxide::types::UserId;

use crate::config::Config;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Gates how often a user may upload a new document.
pub trait RateLimiter: Send + Sync {
    fn can_upload(&self, user: UserId) -> bool;
    fn register_upload(&self, user: UserId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadWindow {
    pub span: Duration,
    pub max_uploads: usize,
}

/// Rolling-window limiter: an upload is allowed only if every window still
/// has room for it.
pub struct UploadLimiter {
    windows: Vec<UploadWindow>,
    history: Mutex<HashMap<UserId, Vec<Instant>>>,
}

impl UploadLimiter {
    pub fn new(windows: Vec<UploadWindow>) -> Self {
        Self {
            windows,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            UploadWindow {
                span: HOUR,
                max_uploads: config.uploads_per_hour,
            },
            UploadWindow {
                span: DAY,
                max_uploads: config.uploads_per_day,
            },
        ])
    }

    fn can_upload_at(&self, user: UserId, now: Instant) -> bool {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let uploads = history.get(&user).map(Vec::as_slice).unwrap_or_default();

        self.windows.iter().all(|window| {
            let recent = uploads
                .iter()
                .filter(|at| now.saturating_duration_since(**at) < window.span)
                .count();
            recent < window.max_uploads
        })
    }

    fn register_upload_at(&self, user: UserId, now: Instant) {
        let longest = self
            .windows
            .iter()
            .map(|window| window.span)
            .max()
            .unwrap_or_default();

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let uploads = history.entry(user).or_default();
        uploads.retain(|at| now.saturating_duration_since(*at) < longest);
        uploads.push(now);
    }
}

impl RateLimiter for UploadLimiter {
    fn can_upload(&self, user: UserId) -> bool {
        self.can_upload_at(user, Instant::now())
    }

    fn register_upload(&self, user: UserId) {
        self.register_upload_at(user, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly_and_daily() -> UploadLimiter {
        UploadLimiter::new(vec![
            UploadWindow {
                span: HOUR,
                max_uploads: 2,
            },
            UploadWindow {
                span: DAY,
                max_uploads: 5,
            },
        ])
    }

    #[test]
    fn hourly_window_blocks_third_upload() {
        let limiter = hourly_and_daily();
        let user = UserId(1);
        let start = Instant::now();

        assert!(limiter.can_upload_at(user, start));
        limiter.register_upload_at(user, start);
        limiter.register_upload_at(user, start + Duration::from_secs(60));
        assert!(!limiter.can_upload_at(user, start + Duration::from_secs(120)));

        // The first upload has aged out of the hourly window.
        assert!(limiter.can_upload_at(user, start + HOUR + Duration::from_secs(1)));
    }

    #[test]
    fn daily_window_blocks_after_five_uploads() {
        let limiter = hourly_and_daily();
        let user = UserId(7);
        let start = Instant::now();

        for i in 0..5 {
            let at = start + HOUR * (2 * i);
            assert!(limiter.can_upload_at(user, at), "upload {i} should pass");
            limiter.register_upload_at(user, at);
        }
        assert!(!limiter.can_upload_at(user, start + HOUR * 9));
        assert!(limiter.can_upload_at(user, start + DAY + Duration::from_secs(1)));
    }

    #[test]
    fn users_are_limited_independently() {
        let limiter = hourly_and_daily();
        let now = Instant::now();
        limiter.register_upload_at(UserId(1), now);
        limiter.register_upload_at(UserId(1), now);

        assert!(!limiter.can_upload_at(UserId(1), now));
        assert!(limiter.can_upload_at(UserId(2), now));
    }

    #[test]
    fn zero_quota_denies_everything() {
        let limiter = UploadLimiter::new(vec![UploadWindow {
            span: HOUR,
            max_uploads: 0,
        }]);
        assert!(!limiter.can_upload(UserId(3)));
    }
}
