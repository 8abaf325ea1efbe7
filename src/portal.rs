//! Collaborator interfaces for the automated HR portal.
//!
//! The portal itself (DOM scraping, button clicking) lives outside this
//! crate and is reached over a message channel keyed by page identity. These
//! traits describe exactly what the engine needs from that side: a status
//! provider, a page locator, and a notifier. Production wires them to the
//! real browser glue; tests wire in-memory fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::estimator::AttendanceSnapshot;

/// Opaque handle to an open portal page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHandle {
    pub id: u64,
    pub url: String,
}

/// Outcome reported by the portal's own action handler.
///
/// `success: false` means the handler ran but could not perform the action
/// (e.g. the button was not on the page); transport failures surface as
/// errors instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResponse {
    pub success: bool,
    pub message: String,
}

impl PortalResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Live punch state as the portal currently displays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalStatus {
    pub clocked_in: bool,
}

/// Requests the engine can send to a portal page.
#[async_trait]
pub trait PortalClient: Send + Sync {
    async fn get_status(&self, page: &PageHandle) -> Result<PortalStatus>;
    async fn get_attendance(&self, page: &PageHandle) -> Result<AttendanceSnapshot>;
    async fn clock_in(&self, page: &PageHandle) -> Result<PortalResponse>;
    async fn clock_out_step1(&self, page: &PageHandle) -> Result<PortalResponse>;
    async fn clock_out_step2(&self, page: &PageHandle) -> Result<PortalResponse>;
}

/// Locates or opens portal pages by URL.
#[async_trait]
pub trait PageLocator: Send + Sync {
    async fn find_pages(&self, url_pattern: &str) -> Result<Vec<PageHandle>>;
    async fn open_page(&self, url: &str) -> Result<PageHandle>;
}

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub priority: u8,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Shows notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: Notification) -> Result<()>;
}

/// Source of the current time, abstracted so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
