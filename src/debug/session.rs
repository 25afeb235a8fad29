//! Debug session lifecycle.
//!
//! Sessions that created their container register a cleanup observer keyed by
//! session id. Every termination event is offered to every observer; an
//! observer fires only when the event carries the container name it watches,
//! and it is unregistered before the removal runs so it fires at most once.

use std::{
    fmt,
    sync::{Arc, Weak},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ResolvedDebugConfiguration, resolve_debug_configuration};
use crate::{
    error::{DocktaskError, Result},
    runtime::ContainerRuntime,
    task::{DebugConfiguration, TaskDefinition, WorkspaceFolder},
};

/// Unique identifier for a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Resolving,
    Active(ResolvedDebugConfiguration),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Active(_) => write!(f, "active"),
        }
    }
}

/// Raised by the host when a debug session ends.
#[derive(Debug, Clone)]
pub struct SessionTerminated {
    pub session_id: SessionId,
    pub configuration: ResolvedDebugConfiguration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOutcome {
    pub session_id: SessionId,
    pub container_name: String,
    pub removed: bool,
}

#[derive(Debug)]
struct CleanupObserver {
    container_name: String,
}

type Registry = Mutex<IndexMap<SessionId, CleanupObserver>>;

/// Handle to a registered cleanup observer.
#[derive(Debug)]
pub struct Subscription {
    session_id: SessionId,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Unregisters the observer without removing anything. Returns whether it
    /// was still registered.
    pub async fn cancel(&self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let removed = registry.lock().await.shift_remove(&self.session_id);
        removed.is_some()
    }
}

#[derive(Debug)]
pub struct DebugSession {
    pub id: SessionId,
    pub name: String,
    state: SessionState,
    subscription: Option<Subscription>,
}

impl DebugSession {
    /// A session whose configuration is still being resolved.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SessionId::generate(),
            name: name.into(),
            state: SessionState::Resolving,
            subscription: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn configuration(&self) -> Option<&ResolvedDebugConfiguration> {
        match &self.state {
            SessionState::Active(configuration) => Some(configuration),
            SessionState::Resolving => None,
        }
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// The event the host raises when this session ends. A session that
    /// never became active has nothing to report.
    pub fn terminated(&self) -> Option<SessionTerminated> {
        self.configuration().map(|configuration| SessionTerminated {
            session_id: self.id,
            configuration: configuration.clone(),
        })
    }
}

pub struct DebugSessionManager<R: ContainerRuntime + ?Sized> {
    runtime: Arc<R>,
    observers: Arc<Registry>,
}

impl<R: ContainerRuntime + ?Sized> DebugSessionManager<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self {
            runtime,
            observers: Arc::new(Mutex::new(IndexMap::new())),
        }
    }

    /// Resolves `configuration` and, when the session owns its container,
    /// arms cleanup for it. A resolution error ends the session while it is
    /// still resolving.
    pub async fn start_session(
        &self,
        folder: &WorkspaceFolder,
        configuration: &DebugConfiguration,
        tasks: &[TaskDefinition],
        cancel: &CancellationToken,
    ) -> Result<DebugSession> {
        let mut session = DebugSession::new(&configuration.name);
        debug!("Session {} for '{}' is {}", session.id, session.name, session.state());

        let resolved = resolve_debug_configuration(folder, configuration, tasks, cancel).await?;
        self.activate(&mut session, resolved).await?;
        Ok(session)
    }

    /// Moves a resolving session to `Active`.
    pub async fn activate(
        &self,
        session: &mut DebugSession,
        configuration: ResolvedDebugConfiguration,
    ) -> Result<()> {
        if matches!(session.state, SessionState::Active(_)) {
            return Err(DocktaskError::Configuration(format!(
                "Session {} for '{}' is already active",
                session.id, session.name
            )));
        }

        let id = session.id;
        session.subscription = match configuration.container_name_to_kill.as_deref() {
            Some(name) if configuration.removes_container() => {
                self.observers.lock().await.insert(
                    id,
                    CleanupObserver {
                        container_name: name.to_string(),
                    },
                );
                info!("Session {} will remove container '{}' when it ends", id, name);
                Some(Subscription {
                    session_id: id,
                    registry: Arc::downgrade(&self.observers),
                })
            }
            _ => None,
        };
        session.state = SessionState::Active(configuration);
        debug!("Session {} is {}", id, session.state());
        Ok(())
    }

    /// Offers `event` to every registered observer and removes the containers
    /// of those that match. Removal failures are logged, never returned.
    pub async fn session_terminated(&self, event: &SessionTerminated) -> Vec<CleanupOutcome> {
        let Some(target) = event
            .configuration
            .container_name_to_kill
            .as_deref()
            .filter(|name| !name.is_empty())
        else {
            debug!("Session {} ended without a container to remove", event.session_id);
            return Vec::new();
        };

        let fired: Vec<(SessionId, CleanupObserver)> = {
            let mut observers = self.observers.lock().await;
            let matching: Vec<SessionId> = observers
                .iter()
                .filter(|(_, observer)| observer.container_name == target)
                .map(|(id, _)| *id)
                .collect();
            matching
                .into_iter()
                .filter_map(|id| observers.shift_remove(&id).map(|observer| (id, observer)))
                .collect()
        };

        let mut outcomes = Vec::with_capacity(fired.len());
        for (session_id, observer) in fired {
            let removed = match self
                .runtime
                .remove_container(&observer.container_name, true)
                .await
            {
                Ok(()) => {
                    info!("Removed container '{}'", observer.container_name);
                    true
                }
                Err(e) => {
                    warn!(
                        "Failed to remove container '{}': {}",
                        observer.container_name, e
                    );
                    false
                }
            };
            outcomes.push(CleanupOutcome {
                session_id,
                container_name: observer.container_name,
                removed,
            });
        }

        outcomes
    }

    pub async fn active_subscriptions(&self) -> usize {
        self.observers.lock().await.len()
    }
}
