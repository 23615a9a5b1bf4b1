use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::{Notice, Notifier};

/// In-memory notifier that records every notice it accepts. Can be
/// switched into a failing mode to simulate a broken mail relay.
#[derive(Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<Notice>>,
    failing: AtomicBool,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Most recent notice addressed to `to`.
    pub fn last_to(&self, to: &str) -> Option<Notice> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| n.recipient() == to)
    }

    /// Code from the most recent verification notice sent to `to`.
    pub fn last_code(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notice::VerificationCode { to: t, code, .. } if t == to => Some(code),
            _ => None,
        })
    }

    /// Link from the most recent reset notice sent to `to`.
    pub fn last_reset_link(&self, to: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|n| match n {
            Notice::PasswordReset { to: t, link, .. } if t == to => Some(link),
            _ => None,
        })
    }
}

#[async_trait]
impl Notifier for MemoryOutbox {
    async fn send(&self, notice: &Notice) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("mail relay unavailable"));
        }
        self.sent
            .lock()
            .map_err(|e| anyhow!("Outbox lock poisoned: {}", e))?
            .push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_notice(to: &str, code: &str) -> Notice {
        Notice::VerificationCode {
            to: to.to_string(),
            name: "Ama".to_string(),
            code: code.to_string(),
        }
    }

    #[tokio::test]
    async fn records_and_finds_latest() {
        let outbox = MemoryOutbox::new();
        outbox.send(&code_notice("ama@x.com", "111111")).await.unwrap();
        outbox.send(&code_notice("kofi@x.com", "222222")).await.unwrap();
        outbox.send(&code_notice("ama@x.com", "333333")).await.unwrap();

        assert_eq!(outbox.sent().len(), 3);
        assert_eq!(outbox.last_code("ama@x.com").as_deref(), Some("333333"));
        assert_eq!(outbox.last_to("kofi@x.com"), Some(code_notice("kofi@x.com", "222222")));
        assert!(outbox.last_reset_link("ama@x.com").is_none());
    }

    #[tokio::test]
    async fn failing_mode_rejects_without_recording() {
        let outbox = MemoryOutbox::new();
        outbox.set_failing(true);
        assert!(outbox.send(&code_notice("ama@x.com", "111111")).await.is_err());
        assert!(outbox.sent().is_empty());

        outbox.set_failing(false);
        assert!(outbox.send(&code_notice("ama@x.com", "111111")).await.is_ok());
    }
}
