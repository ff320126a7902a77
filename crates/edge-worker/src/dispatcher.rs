//! Event dispatch interface.

use async_trait::async_trait;
use edge_cache::Served;
use edge_core::FetchRequest;
use edge_data::FetchError;

use crate::controller::{ActivateOutcome, InstallOutcome};
use crate::error::WorkerError;
use crate::messages::{ControlMessage, WorkerMessage};
use crate::notify::{ClickRoute, NotificationClick, NotificationRequest};
use crate::sync::{SyncOutcome, SyncTask};

/// One method per platform event.
///
/// A host adapter translates platform events into these calls; nothing in
/// the worker registers global listeners.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// The worker is being installed.
    async fn on_install(&self) -> Result<InstallOutcome, WorkerError>;

    /// The worker is taking over from the previous version.
    async fn on_activate(&self) -> Result<ActivateOutcome, WorkerError>;

    /// A request was intercepted.
    ///
    /// Only non-`GET` passthrough can fail; cached strategies always answer.
    async fn on_fetch(&self, request: FetchRequest) -> Result<Served, FetchError>;

    /// A control message arrived. Returns the reply, if the message has one.
    async fn on_message(&self, message: ControlMessage) -> Result<Option<WorkerMessage>, WorkerError>;

    /// A background sync trigger fired.
    async fn on_sync(&self, task: SyncTask) -> SyncOutcome;

    /// A push message arrived with an optional text payload.
    async fn on_push(&self, payload: Option<String>) -> Result<NotificationRequest, WorkerError>;

    /// The user clicked a notification.
    async fn on_notification_click(&self, click: NotificationClick) -> Result<ClickRoute, WorkerError>;
}
