use crate::application::messages;
use crate::application::user_service::UserService;
use crate::domain::repository::UserRepository;
use crate::domain::user::{RegisterUser, UserSummary};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub type SharedPage = Arc<Mutex<PageState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageTone {
    Ok,
    Error,
}

/// What one client's pages display: the last status line, the full user
/// list and the result of the last search.
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub message: Option<String>,
    pub users: Vec<UserSummary>,
    pub filtered_users: Vec<UserSummary>,
}

impl PageState {
    pub fn tone(&self) -> MessageTone {
        match &self.message {
            Some(message) if messages::is_error(message) => MessageTone::Error,
            _ => MessageTone::Ok,
        }
    }

    pub async fn submit_registration<R>(&mut self, service: &UserService<R>, form: RegisterUser)
    where
        R: UserRepository + ?Sized,
    {
        self.message = Some(service.register(form).await);
    }

    pub async fn load_users<R>(&mut self, service: &UserService<R>)
    where
        R: UserRepository + ?Sized,
    {
        let (users, message) = service.list_all().await;
        self.users = users;
        self.message = Some(message);
    }

    pub async fn search_user<R>(&mut self, service: &UserService<R>, name: &str)
    where
        R: UserRepository + ?Sized,
    {
        let (found, message) = service.find_by_name(name).await;
        self.filtered_users = found;
        self.message = Some(message);
    }

    /// Deletes, then reloads the list so the page shows the new state.
    pub async fn delete_user<R>(&mut self, service: &UserService<R>, name: &str)
    where
        R: UserRepository + ?Sized,
    {
        service.delete_by_name(name).await;
        self.load_users(service).await;
    }

    pub fn snapshot(&self, session_id: Uuid) -> PageSnapshot {
        PageSnapshot {
            session_id,
            message: self.message.clone(),
            tone: self.tone(),
            users: self.users.clone(),
            filtered_users: self.filtered_users.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub session_id: Uuid,
    pub message: Option<String>,
    pub tone: MessageTone,
    pub users: Vec<UserSummary>,
    pub filtered_users: Vec<UserSummary>,
}

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct Session {
    page: SharedPage,
    last_seen: Instant,
}

/// Page states of the connected clients, one per session.
///
/// A state lives from [`open`](Self::open) to [`close`](Self::close), or until
/// it has gone unused for longer than the idle TTL. Each has its own lock, so a
/// slow event on one client does not hold up the others.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
    idle_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    pub async fn open(&self) -> (Uuid, SharedPage) {
        let id = Uuid::new_v4();
        let page = Arc::new(Mutex::new(PageState::default()));
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions);
        sessions.insert(
            id,
            Session {
                page: page.clone(),
                last_seen: Instant::now(),
            },
        );
        info!(session_id = %id, "Session opened");
        (id, page)
    }

    /// Looks up a live session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<SharedPage> {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();
        let fresh = sessions
            .get(&id)
            .map(|session| now.duration_since(session.last_seen) <= self.idle_ttl)?;
        if !fresh {
            sessions.remove(&id);
            info!(session_id = %id, "Idle session expired");
            return None;
        }
        let session = sessions.get_mut(&id)?;
        session.last_seen = now;
        Some(session.page.clone())
    }

    pub async fn close(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Session closed");
        } else {
            debug!(session_id = %id, "Close requested for unknown session");
        }
        removed
    }

    /// Drops every session idle for longer than the TTL. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions)
    }

    fn evict_expired(&self, sessions: &mut HashMap<Uuid, Session>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| now.duration_since(session.last_seen) <= self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted = evicted, remaining = sessions.len(), "Idle sessions evicted");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
