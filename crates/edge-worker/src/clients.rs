//! Connected clients.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ClientError;
use crate::messages::WorkerMessage;

/// Kind of client context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientType {
    Window,
    Worker,
    SharedWorker,
}

/// Which clients `match_all` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClientFilter {
    /// Restrict to one kind; `None` matches every kind.
    pub client_type: Option<ClientType>,
    /// Include clients this worker does not control yet.
    pub include_uncontrolled: bool,
}

impl ClientFilter {
    /// Every client, controlled or not.
    pub fn all() -> Self {
        Self {
            client_type: None,
            include_uncontrolled: true,
        }
    }

    /// Window clients, controlled or not.
    pub fn windows() -> Self {
        Self {
            client_type: Some(ClientType::Window),
            include_uncontrolled: true,
        }
    }

    pub fn matches(&self, client_type: ClientType, controlled: bool) -> bool {
        let type_ok = self.client_type.map_or(true, |wanted| wanted == client_type);
        type_ok && (controlled || self.include_uncontrolled)
    }
}

/// A connected client context.
#[async_trait]
pub trait ClientHandle: Send + Sync {
    fn id(&self) -> &str;

    fn client_type(&self) -> ClientType;

    fn url(&self) -> &str;

    /// Deliver a message to the client.
    async fn post_message(&self, message: WorkerMessage) -> Result<(), ClientError>;

    /// Bring the client window to the front.
    async fn focus(&self) -> Result<(), ClientError>;
}

/// The platform's view of connected clients.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Clients matching `filter`, in platform order.
    async fn match_all(&self, filter: ClientFilter) -> Vec<Arc<dyn ClientHandle>>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &str) -> Result<Arc<dyn ClientHandle>, ClientError>;

    /// Take control of every connected client.
    async fn claim(&self) -> Result<(), ClientError>;
}

/// A client held by [`LocalClients`].
pub struct LocalClient {
    id: String,
    client_type: ClientType,
    url: String,
    controlled: AtomicBool,
    messages: Mutex<Vec<WorkerMessage>>,
    focus_count: AtomicUsize,
}

impl LocalClient {
    fn new(id: String, client_type: ClientType, url: &str) -> Self {
        Self {
            id,
            client_type,
            url: url.to_string(),
            controlled: AtomicBool::new(false),
            messages: Mutex::new(Vec::new()),
            focus_count: AtomicUsize::new(0),
        }
    }

    /// Messages delivered so far.
    pub fn messages(&self) -> Vec<WorkerMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }

    pub fn is_controlled(&self) -> bool {
        self.controlled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientHandle for LocalClient {
    fn id(&self) -> &str {
        &self.id
    }

    fn client_type(&self) -> ClientType {
        self.client_type
    }

    fn url(&self) -> &str {
        &self.url
    }

    async fn post_message(&self, message: WorkerMessage) -> Result<(), ClientError> {
        self.messages
            .lock()
            .map_err(|_| ClientError::Gone(self.id.clone()))?
            .push(message);
        Ok(())
    }

    async fn focus(&self) -> Result<(), ClientError> {
        if self.client_type != ClientType::Window {
            return Err(ClientError::Rejected(format!("{} is not a window", self.id)));
        }
        self.focus_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-process client registry that records what the worker does.
#[derive(Default)]
pub struct LocalClients {
    clients: Mutex<Vec<Arc<LocalClient>>>,
    opened: Mutex<Vec<String>>,
    next_id: AtomicU64,
    claims: AtomicUsize,
}

impl LocalClients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a client.
    pub fn connect(&self, client_type: ClientType, url: &str) -> Arc<LocalClient> {
        let id = format!("client-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let client = Arc::new(LocalClient::new(id, client_type, url));
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(client.clone());
        }
        client
    }

    /// Disconnect a client by id.
    pub fn disconnect(&self, id: &str) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.retain(|client| client.id != id);
        }
    }

    /// URLs passed to `open_window`, in order.
    pub fn opened_windows(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Vec<Arc<LocalClient>> {
        self.clients
            .lock()
            .map(|clients| clients.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ClientRegistry for LocalClients {
    async fn match_all(&self, filter: ClientFilter) -> Vec<Arc<dyn ClientHandle>> {
        self.snapshot()
            .into_iter()
            .filter(|client| filter.matches(client.client_type, client.is_controlled()))
            .map(|client| client as Arc<dyn ClientHandle>)
            .collect()
    }

    async fn open_window(&self, url: &str) -> Result<Arc<dyn ClientHandle>, ClientError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
        let client = self.connect(ClientType::Window, url);
        client.controlled.store(true, Ordering::SeqCst);
        Ok(client as Arc<dyn ClientHandle>)
    }

    async fn claim(&self) -> Result<(), ClientError> {
        for client in self.snapshot() {
            client.controlled.store(true, Ordering::SeqCst);
        }
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
