//! Signed-in session: current user, bearer token, and persistence.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::storage::{KeyValueStore, MemoryStorage};
use crate::error::{LinkError, Result};

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the JSON-encoded [`User`].
pub const USER_KEY: &str = "user";
/// Storage key holding the whole persisted [`AuthState`].
pub const AUTH_STORAGE_KEY: &str = "auth-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Advisor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Advisor => "ADVISOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Role::Student),
            "ADVISOR" => Ok(Role::Advisor),
            "ADMIN" => Ok(Role::Admin),
            other => Err(LinkError::ConfigurationError(format!(
                "Unknown role '{}'; expected STUDENT, ADVISOR or ADMIN",
                other
            ))),
        }
    }
}

/// The signed-in user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
}

impl User {
    pub fn new(id: i64, email: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            email: email.into(),
            full_name: None,
            role,
        }
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    /// Full name when known, email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// What the connection layer needs to authenticate and route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub subject_id: i64,
    /// Used to build the `/user/{email}/topic/...` destinations.
    pub subject_email: String,
}

/// Snapshot of the session published to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
}

impl AuthState {
    fn credential(&self) -> Option<Credential> {
        if !self.is_authenticated {
            return None;
        }
        match (&self.user, &self.token) {
            (Some(user), Some(token)) => Some(Credential {
                token: token.clone(),
                subject_id: user.id,
                subject_email: user.email.clone(),
            }),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedAuth {
    state: AuthState,
    #[serde(default)]
    version: u32,
}

/// Observable holder of the current session.
///
/// Cheap to clone; clones share state and storage.
///
/// # Example
///
/// ```rust
/// use docflow_link::auth::{Role, SessionStore, User};
///
/// let session = SessionStore::new();
/// session
///     .set_auth(User::new(7, "ana@uni.edu", Role::Student), "jwt-token")
///     .unwrap();
/// assert!(session.is_authenticated());
/// assert_eq!(session.credential().unwrap().subject_email, "ana@uni.edu");
/// ```
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<AuthState>>,
    storage: Arc<dyn KeyValueStore>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionStore")
            .field("user", &state.user.as_ref().map(|u| &u.email))
            .field("is_authenticated", &state.is_authenticated)
            .finish()
    }
}

impl SessionStore {
    /// Unauthenticated session backed by [`MemoryStorage`].
    pub fn new() -> Self {
        Self::with_state(Arc::new(MemoryStorage::new()), AuthState::default())
    }

    /// Session backed by `storage`, restoring whatever was persisted there.
    ///
    /// `auth-storage` wins; the separate `token` and `user` keys are the
    /// fallback. Unreadable entries are logged and treated as signed out.
    pub fn init(storage: Arc<dyn KeyValueStore>) -> Result<Self> {
        let restored = restore(storage.as_ref())?;
        if let Some(user) = &restored.user {
            log::debug!("[docflow-link] Restored session for {}", user.email);
        }
        Ok(Self::with_state(storage, restored))
    }

    fn with_state(storage: Arc<dyn KeyValueStore>, state: AuthState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self {
            state: Arc::new(tx),
            storage,
        }
    }

    /// Sign in. Observers see the new state before persistence runs; a
    /// persistence failure is returned but does not roll the state back.
    pub fn set_auth(&self, user: User, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(LinkError::AuthenticationError("Token must not be empty".to_string()));
        }
        let state = AuthState {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
        };
        self.state.send_replace(state.clone());
        self.persist(&state)
    }

    /// Sign out and forget the persisted session.
    pub fn clear_auth(&self) -> Result<()> {
        self.state.send_replace(AuthState::default());
        self.storage.remove(TOKEN_KEY)?;
        self.storage.remove(USER_KEY)?;
        self.storage.remove(AUTH_STORAGE_KEY)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.state.borrow().credential()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state
            .borrow()
            .user
            .as_ref()
            .map(|u| u.role == role)
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    fn persist(&self, state: &AuthState) -> Result<()> {
        if let Some(token) = &state.token {
            self.storage.set(TOKEN_KEY, token)?;
        }
        if let Some(user) = &state.user {
            self.storage.set(USER_KEY, &serde_json::to_string(user)?)?;
        }
        let envelope = PersistedAuth {
            state: state.clone(),
            version: 0,
        };
        self.storage.set(AUTH_STORAGE_KEY, &serde_json::to_string(&envelope)?)
    }
}

fn restore(storage: &dyn KeyValueStore) -> Result<AuthState> {
    if let Some(raw) = storage.get(AUTH_STORAGE_KEY)? {
        match serde_json::from_str::<PersistedAuth>(&raw) {
            Ok(persisted) if persisted.state.credential().is_some() => return Ok(persisted.state),
            Ok(_) => {},
            Err(e) => log::warn!("[docflow-link] Ignoring unreadable {}: {}", AUTH_STORAGE_KEY, e),
        }
    }

    let token = storage.get(TOKEN_KEY)?.filter(|t| !t.trim().is_empty());
    let user = match storage.get(USER_KEY)? {
        Some(raw) => match serde_json::from_str::<User>(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("[docflow-link] Ignoring unreadable {}: {}", USER_KEY, e);
                None
            },
        },
        None => None,
    };

    Ok(match (user, token) {
        (Some(user), Some(token)) => AuthState {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
        },
        _ => AuthState::default(),
    })
}
