use crate::config::{ConfigError, ParticipantConfig};
use crate::container::{
    ContainerError, ContainerManager, ContainerProvider, OsProcessLauncher, ProcessLauncher,
};
use crate::messaging::{
    AsyncCallbackService, CallbackHandle, CallbackRegistration, CallbackRegistry, HandlerResult,
    MessageDispatcher, RouteError,
};
use crate::model::{Message, NotificationContext, SessionProvider, StaticSession};
use crate::statemachine::online_offline::online_offline;
use crate::statemachine::{
    DefinitionError, StateModelDefinition, StateTransitionEngine, StateTransitionService,
    TransitionObserver,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("Actor task failed")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// A running cluster participant.
///
/// `Participant` is responsible for:
/// - **Wiring**: one callback registry, one transition engine and one container
///   manager, all reachable through a single [`MessageDispatcher`]
/// - **Lifecycle**: spawning the container manager task and tearing it down
///
/// # Example
///
/// ```ignore
/// let participant = ParticipantBuilder::new(ParticipantConfig::from_file("participant.yaml")?)
///     .start()?;
///
/// participant.deliver(message).await?;
/// participant.containers().create("node_7", "container").await?;
///
/// participant.shutdown().await?;
/// ```
pub struct Participant {
    config: ParticipantConfig,
    context: NotificationContext,
    callbacks: Arc<CallbackRegistry>,
    async_service: Arc<AsyncCallbackService>,
    engine: Arc<StateTransitionEngine>,
    dispatcher: MessageDispatcher,
    containers: ContainerProvider,
    handles: Vec<JoinHandle<()>>,
}

impl Participant {
    pub fn builder(config: ParticipantConfig) -> ParticipantBuilder {
        ParticipantBuilder::new(config)
    }

    /// Routes an inbound message to the component registered for its type.
    pub async fn deliver(&self, message: Message) -> Result<HandlerResult, RouteError> {
        self.dispatcher.dispatch(message, &self.context).await
    }

    pub fn register_callback(
        &self,
        correlation_id: impl Into<String>,
        registration: CallbackRegistration,
    ) -> Arc<CallbackHandle> {
        self.async_service
            .register_async_callback(correlation_id, registration)
    }

    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    pub fn context(&self) -> &NotificationContext {
        &self.context
    }

    pub fn callbacks(&self) -> &Arc<CallbackRegistry> {
        &self.callbacks
    }

    pub fn engine(&self) -> &Arc<StateTransitionEngine> {
        &self.engine
    }

    pub fn dispatcher(&self) -> &MessageDispatcher {
        &self.dispatcher
    }

    pub fn containers(&self) -> &ContainerProvider {
        &self.containers
    }

    /// Destroys every container, then stops the manager task.
    ///
    /// Teardown failures are logged and ignored. The manager task exits once the last
    /// [`ContainerClient`](crate::container::ContainerClient) is dropped, so clients
    /// cloned out of this participant must be dropped first.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!(instance = %self.config.instance_name, "Shutting down participant...");

        match self.containers.destroy_all().await {
            Ok(destroyed) => info!(destroyed, "Containers destroyed"),
            Err(e) => warn!(error = %e, "Container teardown failed"),
        }
        let pending = self.callbacks.len();
        if pending > 0 {
            warn!(pending, "Callbacks still pending at shutdown");
        }

        drop(self.containers);
        drop(self.dispatcher);

        for handle in self.handles {
            handle.await?;
        }
        info!("Participant shut down successfully");
        Ok(())
    }
}

pub struct ParticipantBuilder {
    config: ParticipantConfig,
    session: Option<Arc<dyn SessionProvider>>,
    launcher: Option<Arc<dyn ProcessLauncher>>,
    observer: Option<Arc<dyn TransitionObserver>>,
    state_models: Vec<StateModelDefinition>,
}

impl ParticipantBuilder {
    pub fn new(config: ParticipantConfig) -> Self {
        Self {
            config,
            session: None,
            launcher: None,
            observer: None,
            state_models: Vec::new(),
        }
    }

    /// Session identity. Defaults to a fresh random session id for the configured instance.
    pub fn session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Process launcher. Defaults to [`OsProcessLauncher`].
    pub fn launcher(mut self, launcher: Arc<dyn ProcessLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Adds a state model. The built-in `OnlineOffline` model is always present and
    /// is replaced by a model registered under the same name.
    pub fn state_model(mut self, definition: StateModelDefinition) -> Self {
        self.state_models.push(definition);
        self
    }

    /// Wires every component and spawns the container manager. Must run inside a
    /// Tokio runtime.
    pub fn start(self) -> Result<Participant, LifecycleError> {
        let config = self.config;
        config.validate()?;

        let session = self.session.unwrap_or_else(|| {
            Arc::new(StaticSession::new(
                Uuid::new_v4().to_string(),
                config.instance_name.clone(),
            ))
        });
        let context = NotificationContext::new(session);

        let mut callbacks = CallbackRegistry::new();
        if let Some(timeout) = config.default_callback_timeout() {
            callbacks = callbacks.with_default_timeout(timeout);
        }
        let callbacks = Arc::new(callbacks);
        let async_service = Arc::new(AsyncCallbackService::new(callbacks.clone()));

        let mut engine = StateTransitionEngine::new().with_definition(online_offline()?);
        if let Some(observer) = self.observer {
            engine = engine.with_observer(observer);
        }
        for definition in self.state_models {
            engine = engine.with_definition(definition);
        }
        let engine = Arc::new(engine);

        let dispatcher = MessageDispatcher::builder()
            .register(async_service.clone())
            .register(Arc::new(StateTransitionService::new(engine.clone())))
            .build();

        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(OsProcessLauncher));
        let (manager, client) = ContainerManager::new(
            config.container.buffer_size,
            launcher,
            config.container.required_kind.clone(),
            config.container.termination,
        );
        let manager_handle = tokio::spawn(manager.run());
        let containers = ContainerProvider::from_config(client, &config);

        info!(
            cluster = %config.cluster_name,
            instance = %config.instance_name,
            session = %context.session_id(),
            message_types = ?dispatcher.message_types(),
            "Participant started"
        );

        Ok(Participant {
            config,
            context,
            callbacks,
            async_service,
            engine,
            dispatcher,
            containers,
            handles: vec![manager_handle],
        })
    }
}
