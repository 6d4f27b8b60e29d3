//! Transient user-facing notices ("toasts").
//!
//! Components never render anything themselves; they push a [`Notice`] to a
//! [`Notifier`] and the front end drains the receiving end. A notifier with
//! no receiver still logs every notice.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    /// The action completed.
    Success,
    /// Something the user should know, such as "please log in".
    Info,
    /// The action failed.
    Error,
}

/// One transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Normalized, human-readable text.
    pub message: String,
    /// When the notice was raised.
    pub at: DateTime<Utc>,
}

/// Receiving end of a [`Notifier`].
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Cheaply cloneable handle for raising notices.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    /// Create a notifier and the receiver the front end drains.
    #[must_use]
    pub fn channel() -> (Self, NoticeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that only logs.
    #[must_use]
    pub const fn silent() -> Self {
        Self { tx: None }
    }

    /// Raise a success notice.
    pub fn success(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Success, message.into());
    }

    /// Raise an informational notice.
    pub fn info(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Info, message.into());
    }

    /// Raise an error notice.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Error, message.into());
    }

    fn emit(&self, level: NoticeLevel, message: String) {
        tracing::debug!(?level, %message, "Notice");
        if let Some(tx) = &self.tx {
            // Receiver dropped means the front end is gone; nothing to show.
            let _ = tx.send(Notice {
                level,
                message,
                at: Utc::now(),
            });
        }
    }
}

/// Drain every notice currently queued on `rx`.
#[must_use]
pub fn drain(rx: &mut NoticeReceiver) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(notice) = rx.try_recv() {
        notices.push(notice);
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_delivers_in_order() {
        let (notifier, mut rx) = Notifier::channel();
        notifier.success("Added to cart");
        notifier.error("Out of stock");

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert_eq!(notices[1].message, "Out of stock");
    }

    #[test]
    fn test_silent_notifier_does_not_panic() {
        Notifier::silent().info("nobody listening");
    }
}
