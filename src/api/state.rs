use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agents::{AgentVariant, CaptureSession, OperationRegistry};
use crate::config::Config;
use crate::domain::capture::CaptureResult;
use crate::domain::repositories::RecordRepository;

/// Everything a persona needs to start sessions
pub struct AgentRuntime {
    pub registry: Arc<OperationRegistry>,
    pub repository: Arc<dyn RecordRepository>,
}

/// Shared state of the HTTP service
///
/// Each session sits behind its own mutex, so operations on one
/// conversation never wait on another.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    agents: Arc<HashMap<AgentVariant, AgentRuntime>>,
    sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<CaptureSession>>>>>,
}

impl AppState {
    /// Builds every persona with repositories under the configured data dir
    pub fn new(config: Config) -> CaptureResult<Self> {
        let data_dir = config.data_dir.clone();
        Self::with_repositories(config, |variant| variant.repository(&data_dir))
    }

    /// Builds every persona with repositories from `repository`
    pub fn with_repositories(
        config: Config,
        repository: impl Fn(AgentVariant) -> CaptureResult<Arc<dyn RecordRepository>>,
    ) -> CaptureResult<Self> {
        let mut agents = HashMap::new();
        for variant in AgentVariant::ALL {
            let runtime = AgentRuntime {
                registry: Arc::new(variant.registry()?),
                repository: repository(variant)?,
            };
            agents.insert(variant, runtime);
        }

        Ok(Self {
            config: Arc::new(config),
            agents: Arc::new(agents),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn agent(&self, variant: AgentVariant) -> Option<&AgentRuntime> {
        self.agents.get(&variant)
    }

    /// Starts and stores a new session for `variant`
    pub async fn start_session(&self, variant: AgentVariant) -> Option<Arc<Mutex<CaptureSession>>> {
        let runtime = self.agent(variant)?;
        let session = CaptureSession::new(Arc::clone(&runtime.registry), Arc::clone(&runtime.repository))
            .with_persist_timeout(self.config.persist_timeout);
        let id = session.id();
        let session = Arc::new(Mutex::new(session));

        self.sessions.write().await.insert(id, Arc::clone(&session));
        tracing::info!(session_id = %id, agent = %variant, "Session started");
        Some(session)
    }

    /// Looks up a session and marks it as active
    pub async fn session(&self, id: Uuid) -> Option<Arc<Mutex<CaptureSession>>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.lock().await.touch();
        Some(session)
    }

    pub async fn remove_session(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle for at least the configured timeout
    ///
    /// Sessions locked by an in-flight request are kept. Returns the number
    /// of sessions removed.
    pub async fn prune_idle(&self) -> usize {
        let timeout = self.config.session_idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, session| match session.try_lock() {
            Ok(session) if session.idle_for() >= timeout => {
                tracing::info!(session_id = %id, "Session expired");
                false
            }
            _ => true,
        });

        before - sessions.len()
    }

    /// Runs `prune_idle` every `every` until the runtime shuts down
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let pruned = state.prune_idle().await;
                if pruned > 0 {
                    tracing::debug!(pruned, "Idle sessions swept");
                }
            }
        })
    }
}
