//! Transient success and error messages.
//!
//! Each view has its own board. A notice stays visible for [`NOTICE_TTL`]
//! after it is posted, however many times the page is rendered in between,
//! and then disappears on its own.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// How long a notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(5);

/// The view a notice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Pos,
    Products,
    Sales,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

impl NoticeKind {
    /// CSS class used by the templates.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "notice-success",
            Self::Error => "notice-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    posted_at: Instant,
}

impl Notice {
    #[must_use]
    pub fn css_class(&self) -> &'static str {
        self.kind.css_class()
    }

    fn is_live(&self, now: Instant) -> bool {
        now.duration_since(self.posted_at) < NOTICE_TTL
    }
}

/// Notices for every view. The lock is never held across an await.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Mutex<HashMap<View, Vec<Notice>>>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, view: View, kind: NoticeKind, message: impl Into<String>) {
        let notice = Notice {
            kind,
            message: message.into(),
            posted_at: Instant::now(),
        };
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(view)
            .or_default()
            .push(notice);
    }

    pub fn success(&self, view: View, message: impl Into<String>) {
        self.post(view, NoticeKind::Success, message);
    }

    pub fn error(&self, view: View, message: impl Into<String>) {
        self.post(view, NoticeKind::Error, message);
    }

    /// Live notices for a view, oldest first. Expired ones are dropped.
    #[must_use]
    pub fn current(&self, view: View) -> Vec<Notice> {
        let now = Instant::now();
        let mut notices = self.notices.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(posted) = notices.get_mut(&view) else {
            return Vec::new();
        };
        posted.retain(|notice| notice.is_live(now));
        posted.clone()
    }

    pub fn clear(&self, view: View) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_notice_expires_after_ttl() {
        let board = NoticeBoard::new();
        board.success(View::Pos, "Sale completed successfully!");

        tokio::time::advance(Duration::from_secs(4)).await;
        let live = board.current(View::Pos);
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].message, "Sale completed successfully!");
        assert_eq!(live[0].kind, NoticeKind::Success);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(board.current(View::Pos).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_notice_has_its_own_clock() {
        let board = NoticeBoard::new();
        board.error(View::Products, "first");
        tokio::time::advance(Duration::from_secs(3)).await;
        board.error(View::Products, "second");
        tokio::time::advance(Duration::from_secs(3)).await;

        let messages: Vec<_> = board
            .current(View::Products)
            .into_iter()
            .map(|n| n.message)
            .collect();
        assert_eq!(messages, ["second"]);
    }

    #[test]
    fn test_views_are_independent() {
        let board = NoticeBoard::new();
        board.error(View::Sales, "Failed to load sales");
        assert!(board.current(View::Pos).is_empty());
        assert_eq!(board.current(View::Sales).len(), 1);

        board.clear(View::Sales);
        assert!(board.current(View::Sales).is_empty());
    }
}
