//! Push notifications and click routing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use edge_core::NotificationConfig;
use serde::{Deserialize, Serialize};

use crate::clients::{ClientFilter, ClientRegistry};
use crate::error::WorkerError;

/// Action id that opens the storefront in a new window.
pub const ACTION_EXPLORE: &str = "explore";
/// Action id that only dismisses the notification.
pub const ACTION_CLOSE: &str = "close";

/// A button shown on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Data attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    /// Milliseconds since the epoch.
    pub date_of_arrival: i64,
    pub primary_key: u64,
}

/// A notification to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    /// Showing a request replaces any displayed notification with the same tag.
    pub tag: String,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
    pub require_interaction: bool,
}

/// A click on a displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NotificationClick {
    /// Tag of the clicked notification.
    pub tag: String,
    /// Action button id; `None` for a click on the body.
    pub action: Option<String>,
}

impl NotificationClick {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            action: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }
}

/// Where a click was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickRoute {
    /// An existing window was focused.
    Focused(String),
    /// A new window was opened at the URL.
    Opened(String),
}

/// The platform's notification display.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
    /// Display a notification.
    async fn show(&self, request: NotificationRequest) -> Result<(), WorkerError>;

    /// Close displayed notifications with `tag`. Returns how many were closed.
    async fn close(&self, tag: &str) -> Result<usize, WorkerError>;

    /// Currently displayed notifications.
    async fn displayed(&self) -> Vec<NotificationRequest>;
}

/// In-memory notification surface.
///
/// Replaces by tag, so it never holds two notifications with the same tag.
#[derive(Default)]
pub struct NotificationTray {
    shown: Mutex<Vec<NotificationRequest>>,
}

impl NotificationTray {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSurface for NotificationTray {
    async fn show(&self, request: NotificationRequest) -> Result<(), WorkerError> {
        let mut shown = self
            .shown
            .lock()
            .map_err(|_| WorkerError::Notification("tray poisoned".to_string()))?;
        shown.retain(|existing| existing.tag != request.tag);
        shown.push(request);
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<usize, WorkerError> {
        let mut shown = self
            .shown
            .lock()
            .map_err(|_| WorkerError::Notification("tray poisoned".to_string()))?;
        let before = shown.len();
        shown.retain(|existing| existing.tag != tag);
        Ok(before - shown.len())
    }

    async fn displayed(&self) -> Vec<NotificationRequest> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }
}

/// Builds notifications from push payloads and routes clicks.
pub struct NotificationDispatcher {
    config: NotificationConfig,
    surface: Arc<dyn NotificationSurface>,
    clients: Arc<dyn ClientRegistry>,
    next_key: AtomicU64,
}

impl NotificationDispatcher {
    pub fn new(
        config: NotificationConfig,
        surface: Arc<dyn NotificationSurface>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            config,
            surface,
            clients,
            next_key: AtomicU64::new(1),
        }
    }

    pub fn surface(&self) -> &Arc<dyn NotificationSurface> {
        &self.surface
    }

    /// Build a notification from a push payload.
    ///
    /// The payload is plain text used verbatim as the body. Only a missing
    /// payload gets the default body.
    pub fn build(&self, payload: Option<&str>) -> NotificationRequest {
        let body = payload.map_or_else(|| self.config.default_body.clone(), str::to_string);

        NotificationRequest {
            title: self.config.title.clone(),
            body,
            icon: self.config.icon.clone(),
            badge: self.config.badge.clone(),
            vibrate: self.config.vibrate.clone(),
            tag: self.config.tag.clone(),
            actions: vec![
                NotificationAction {
                    action: ACTION_EXPLORE.to_string(),
                    title: self.config.explore_title.clone(),
                    icon: Some(self.config.icon.clone()),
                },
                NotificationAction {
                    action: ACTION_CLOSE.to_string(),
                    title: self.config.close_title.clone(),
                    icon: Some(self.config.icon.clone()),
                },
            ],
            data: NotificationData {
                date_of_arrival: Utc::now().timestamp_millis(),
                primary_key: self.next_key.fetch_add(1, Ordering::SeqCst),
            },
            require_interaction: false,
        }
    }

    /// Show a notification, replacing any displayed one with the same tag.
    pub async fn show_notification(&self, payload: Option<&str>) -> Result<NotificationRequest, WorkerError> {
        let request = self.build(payload);

        let replaced = self.surface.close(&request.tag).await?;
        self.surface.show(request.clone()).await?;

        tracing::info!(tag = %request.tag, replaced, "notification shown");
        Ok(request)
    }

    /// Route a notification click back to a client window.
    ///
    /// `explore` always opens the root URL. Any other click focuses the first
    /// open window, or opens one if there is none.
    pub async fn on_notification_click(&self, click: &NotificationClick) -> Result<ClickRoute, WorkerError> {
        if let Err(e) = self.surface.close(&click.tag).await {
            tracing::warn!(tag = %click.tag, error = %e, "failed to close clicked notification");
        }

        let root = self.config.root_url.as_str();

        if click.action.as_deref() == Some(ACTION_EXPLORE) {
            self.clients.open_window(root).await?;
            tracing::debug!(url = %root, "opened window from notification");
            return Ok(ClickRoute::Opened(root.to_string()));
        }

        let windows = self.clients.match_all(ClientFilter::windows()).await;
        if let Some(window) = windows.first() {
            window.focus().await?;
            tracing::debug!(client = %window.id(), "focused window from notification");
            return Ok(ClickRoute::Focused(window.id().to_string()));
        }

        self.clients.open_window(root).await?;
        tracing::debug!(url = %root, "opened window from notification");
        Ok(ClickRoute::Opened(root.to_string()))
    }
}
