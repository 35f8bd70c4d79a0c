pub const DEFAULT_NOTICE_DELAY_MS: u64 = 2_500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub shown_at: i64,
}

/// Holds at most one transient message. A newer message replaces the current
/// one; otherwise it expires `delay_ms` after it was shown.
#[derive(Debug, Clone)]
pub struct Notifier {
    delay_ms: u64,
    current: Option<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE_DELAY_MS)
    }
}

impl Notifier {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            current: None,
        }
    }

    pub fn show(&mut self, message: impl Into<String>, now: i64) {
        self.current = Some(Notice {
            message: message.into(),
            shown_at: now,
        });
    }

    pub fn current(&mut self, now: i64) -> Option<&Notice> {
        let expired = self.current.as_ref().is_some_and(|notice| {
            now.saturating_sub(notice.shown_at) >= i64::try_from(self.delay_ms).unwrap_or(i64::MAX)
        });
        if expired {
            self.current = None;
        }
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::Notifier;

    #[test]
    fn notice_expires_after_delay() {
        let mut notifier = Notifier::new(100);
        notifier.show("Task added", 1_000);

        assert_eq!(
            notifier.current(1_099).map(|n| n.message.as_str()),
            Some("Task added")
        );
        assert!(notifier.current(1_100).is_none());
        assert!(notifier.current(1_000).is_none());
    }

    #[test]
    fn newer_notice_restarts_the_timer() {
        let mut notifier = Notifier::new(100);
        notifier.show("first", 0);
        notifier.show("second", 90);

        let notice = notifier.current(150).expect("second notice still live");
        assert_eq!(notice.message, "second");
        assert!(notifier.current(190).is_none());
    }
}
