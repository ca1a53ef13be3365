//! # State Transition Engine
//!
//! Executes `STATE_TRANSITION` messages against per-partition state model instances.
//!
//! Instances are keyed by `(resource, partition)` and created lazily at the initial
//! state of their definition. Each instance sits behind its own async mutex, held
//! for the whole of a transition including the user handler, so transitions on one
//! partition are serialized while different partitions proceed in parallel.
//!
//! Checks run in this order, and the first failure wins:
//!
//! 1. required message fields, then the state model name;
//! 2. the instance must not be dropped;
//! 3. `fromState` must equal the current state, unless it is `*` and the target is
//!    `DROPPED`, which drops the instance from whatever state it is in;
//! 4. `(fromState, toState)` must be declared, except that `DROPPED` is always legal;
//! 5. the handler must succeed. Only then does the current state change.

use super::definition::{StateModelDefinition, ANY_STATE, DROPPED};
use super::error::TransitionError;
use super::observer::{LoggingObserver, TransitionObserver, TransitionOutcome, TransitionRecord};
use crate::model::{Message, NotificationContext};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub resource: String,
    pub partition: String,
}

impl PartitionKey {
    pub fn new(resource: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            partition: partition.into(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.partition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateModelInstance {
    pub state_model: String,
    pub current_state: String,
}

impl StateModelInstance {
    pub fn is_dropped(&self) -> bool {
        self.current_state == DROPPED
    }
}

pub struct StateTransitionEngine {
    definitions: HashMap<String, Arc<StateModelDefinition>>,
    instances: DashMap<PartitionKey, Arc<Mutex<StateModelInstance>>>,
    observer: Arc<dyn TransitionObserver>,
}

impl Default for StateTransitionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTransitionEngine {
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            instances: DashMap::new(),
            observer: Arc::new(LoggingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TransitionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Registers `definition` under its name, replacing any earlier one.
    pub fn with_definition(mut self, definition: StateModelDefinition) -> Self {
        self.definitions
            .insert(definition.name().to_string(), Arc::new(definition));
        self
    }

    pub fn definition(&self, name: &str) -> Option<&Arc<StateModelDefinition>> {
        self.definitions.get(name)
    }

    /// Applies the transition described by `message`.
    #[instrument(skip_all, fields(message_id = %message.id()))]
    pub async fn execute(
        &self,
        message: &Message,
        context: &NotificationContext,
    ) -> Result<(), TransitionError> {
        let resource = required(message, message.resource_name(), "resourceName")?;
        let partition = required(message, message.partition_name(), "partitionName")?;
        let from = required(message, message.from_state(), "fromState")?;
        let to = required(message, message.to_state(), "toState")?;
        let model = required(message, message.state_model_def(), "stateModelDef")?;

        let report = |outcome: TransitionOutcome| {
            self.observer.record(&TransitionRecord {
                resource: resource.to_string(),
                partition: partition.to_string(),
                state_model: model.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                outcome,
            });
        };

        let Some(definition) = self.definitions.get(model) else {
            report(TransitionOutcome::Illegal);
            return Err(TransitionError::UnknownStateModel(model.to_string()));
        };

        let key = PartitionKey::new(resource, partition);
        let slot = self
            .instances
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(%key, state = definition.initial_state(), "Creating state model instance");
                Arc::new(Mutex::new(StateModelInstance {
                    state_model: model.to_string(),
                    current_state: definition.initial_state().to_string(),
                }))
            })
            .value()
            .clone();
        let mut instance = slot.lock().await;

        if instance.state_model != model {
            report(TransitionOutcome::Illegal);
            return Err(TransitionError::StateModelMismatch {
                resource: resource.to_string(),
                partition: partition.to_string(),
                existing: instance.state_model.clone(),
                requested: model.to_string(),
            });
        }

        if instance.is_dropped() {
            report(TransitionOutcome::Dropped);
            return Err(TransitionError::InstanceDropped {
                resource: resource.to_string(),
                partition: partition.to_string(),
            });
        }

        let from = if from == ANY_STATE && to == DROPPED {
            instance.current_state.clone()
        } else {
            from.to_string()
        };
        if instance.current_state != from {
            report(TransitionOutcome::Stale);
            return Err(TransitionError::StaleTransition {
                resource: resource.to_string(),
                partition: partition.to_string(),
                current: instance.current_state.clone(),
                from,
            });
        }

        let Some(handler) = definition.handler(&from, to) else {
            report(TransitionOutcome::Illegal);
            return Err(TransitionError::IllegalTransition {
                from,
                to: to.to_string(),
            });
        };

        match handler.on_transition(message, context).await {
            Ok(()) => {
                instance.current_state = to.to_string();
                report(TransitionOutcome::Succeeded);
                Ok(())
            }
            Err(source) => {
                report(TransitionOutcome::HandlerFailed(source.to_string()));
                Err(TransitionError::Handler {
                    resource: resource.to_string(),
                    partition: partition.to_string(),
                    from,
                    to: to.to_string(),
                    source,
                })
            }
        }
    }

    /// Current state of a partition, if it has ever received a transition.
    pub async fn current_state(&self, resource: &str, partition: &str) -> Option<String> {
        let slot = self
            .instances
            .get(&PartitionKey::new(resource, partition))?
            .value()
            .clone();
        let instance = slot.lock().await;
        Some(instance.current_state.clone())
    }

    /// Snapshot of every known instance, sorted by key.
    pub async fn instances(&self) -> Vec<(PartitionKey, StateModelInstance)> {
        let slots: Vec<_> = self
            .instances
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let mut snapshot = Vec::with_capacity(slots.len());
        for (key, slot) in slots {
            snapshot.push((key, slot.lock().await.clone()));
        }
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}

impl fmt::Debug for StateTransitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateTransitionEngine")
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .field("instances", &self.instances.len())
            .finish()
    }
}

fn required<'a>(
    message: &Message,
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, TransitionError> {
    value.ok_or(TransitionError::InvalidMessage {
        message_id: message.id(),
        field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MessageType, StaticSession};
    use crate::statemachine::online_offline::{online_offline, OFFLINE, ONLINE, ONLINE_OFFLINE};
    use parking_lot::Mutex as SyncMutex;
    use std::error::Error as _;

    #[derive(Default)]
    struct Recorder(SyncMutex<Vec<TransitionRecord>>);

    impl TransitionObserver for Recorder {
        fn record(&self, record: &TransitionRecord) {
            self.0.lock().push(record.clone());
        }
    }

    fn context() -> NotificationContext {
        NotificationContext::new(Arc::new(StaticSession::new("s1", "localhost_12918")))
    }

    fn transition(partition: &str, from: &str, to: &str) -> Message {
        Message::builder(MessageType::StateTransition)
            .resource("TestDB")
            .partition(partition)
            .state_model(ONLINE_OFFLINE)
            .transition(from, to)
            .build()
    }

    fn engine() -> StateTransitionEngine {
        StateTransitionEngine::new().with_definition(online_offline().unwrap())
    }

    #[tokio::test]
    async fn test_online_offline_round_trip() {
        let engine = engine();
        let ctx = context();

        engine.execute(&transition("TestDB_0", OFFLINE, ONLINE), &ctx).await.unwrap();
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(ONLINE));

        engine.execute(&transition("TestDB_0", ONLINE, OFFLINE), &ctx).await.unwrap();
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(OFFLINE));
    }

    #[tokio::test]
    async fn test_stale_from_state_is_rejected() {
        let engine = engine();
        let err = engine
            .execute(&transition("TestDB_0", ONLINE, OFFLINE), &context())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransitionError::StaleTransition { ref current, ref from, .. } if current == OFFLINE && from == ONLINE
        ));
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(OFFLINE));
    }

    #[tokio::test]
    async fn test_undeclared_transition_is_illegal() {
        let engine = engine();
        let err = engine
            .execute(&transition("TestDB_0", OFFLINE, OFFLINE), &context())
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_dropped_is_reachable_and_terminal() {
        let engine = engine();
        let ctx = context();

        engine.execute(&transition("TestDB_0", OFFLINE, ONLINE), &ctx).await.unwrap();
        // ONLINE -> DROPPED is not declared but dropping is always legal.
        engine.execute(&transition("TestDB_0", ONLINE, DROPPED), &ctx).await.unwrap();
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(DROPPED));

        for (from, to) in [(DROPPED, OFFLINE), (OFFLINE, ONLINE), (DROPPED, DROPPED)] {
            let err = engine
                .execute(&transition("TestDB_0", from, to), &ctx)
                .await
                .unwrap_err();
            assert!(matches!(err, TransitionError::InstanceDropped { .. }));
        }
    }

    #[tokio::test]
    async fn test_wildcard_drop_from_any_state() {
        let dropped_from = Arc::new(SyncMutex::new(Vec::new()));
        let seen = dropped_from.clone();
        let model = StateModelDefinition::builder(ONLINE_OFFLINE)
            .initial_state(OFFLINE)
            .states([ONLINE])
            .transition_fn(OFFLINE, ONLINE, |_, _| Ok(()))
            .transition_fn(ONLINE, OFFLINE, |_, _| Ok(()))
            .transition_fn(OFFLINE, DROPPED, move |msg, _| {
                seen.lock().push(msg.partition_name().map(str::to_string));
                Ok(())
            })
            .build()
            .unwrap();
        let engine = StateTransitionEngine::new().with_definition(model);
        let ctx = context();

        // Fresh instance: drops from the initial state through the declared handler.
        engine.execute(&transition("TestDB_0", ANY_STATE, DROPPED), &ctx).await.unwrap();
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(DROPPED));
        assert_eq!(dropped_from.lock().len(), 1);

        // From ONLINE, where no drop handler is declared.
        engine.execute(&transition("TestDB_1", OFFLINE, ONLINE), &ctx).await.unwrap();
        engine.execute(&transition("TestDB_1", ANY_STATE, DROPPED), &ctx).await.unwrap();
        assert_eq!(engine.current_state("TestDB", "TestDB_1").await.as_deref(), Some(DROPPED));
        assert_eq!(dropped_from.lock().len(), 1);

        // The wildcard only applies to drops.
        let err = engine
            .execute(&transition("TestDB_2", ANY_STATE, ONLINE), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::StaleTransition { .. }));

        let err = engine
            .execute(&transition("TestDB_0", ANY_STATE, DROPPED), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransitionError::InstanceDropped { .. }));
    }

    #[tokio::test]
    async fn test_handler_failure_leaves_state_unchanged() {
        let failing = StateModelDefinition::builder(ONLINE_OFFLINE)
            .initial_state(OFFLINE)
            .states([ONLINE])
            .transition_fn(OFFLINE, ONLINE, |_, _| Err("disk full".into()))
            .transition_fn(ONLINE, OFFLINE, |_, _| Ok(()))
            .build()
            .unwrap();
        let engine = StateTransitionEngine::new().with_definition(failing);

        let err = engine
            .execute(&transition("TestDB_0", OFFLINE, ONLINE), &context())
            .await
            .unwrap_err();

        assert!(matches!(err, TransitionError::Handler { .. }));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk full"));
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(OFFLINE));
    }

    #[tokio::test]
    async fn test_missing_fields_and_unknown_model() {
        let engine = engine();
        let no_partition = Message::builder(MessageType::StateTransition)
            .resource("TestDB")
            .state_model(ONLINE_OFFLINE)
            .transition(OFFLINE, ONLINE)
            .build();
        let err = engine.execute(&no_partition, &context()).await.unwrap_err();
        assert!(matches!(
            err,
            TransitionError::InvalidMessage { message_id, field: "partitionName" } if message_id == no_partition.id()
        ));

        let unknown = Message::builder(MessageType::StateTransition)
            .resource("TestDB")
            .partition("TestDB_0")
            .state_model("MasterSlave")
            .transition(OFFLINE, ONLINE)
            .build();
        let err = engine.execute(&unknown, &context()).await.unwrap_err();
        assert!(matches!(err, TransitionError::UnknownStateModel(ref name) if name == "MasterSlave"));
        assert!(engine.instances().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_state_model_is_observed() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine().with_observer(recorder.clone());
        let unknown = Message::builder(MessageType::StateTransition)
            .resource("TestDB")
            .partition("TestDB_0")
            .state_model("MasterSlave")
            .transition(OFFLINE, ONLINE)
            .build();

        let _ = engine.execute(&unknown, &context()).await.unwrap_err();

        let records = recorder.0.lock().clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, TransitionOutcome::Illegal);
        assert_eq!(records[0].state_model, "MasterSlave");
        assert_eq!((records[0].from.as_str(), records[0].to.as_str()), (OFFLINE, ONLINE));
    }

    #[tokio::test]
    async fn test_every_attempt_is_observed() {
        let recorder = Arc::new(Recorder::default());
        let engine = StateTransitionEngine::new()
            .with_definition(online_offline().unwrap())
            .with_observer(recorder.clone());
        let ctx = context();

        engine.execute(&transition("TestDB_0", OFFLINE, ONLINE), &ctx).await.unwrap();
        let _ = engine.execute(&transition("TestDB_0", OFFLINE, ONLINE), &ctx).await;
        engine.execute(&transition("TestDB_1", OFFLINE, ONLINE), &ctx).await.unwrap();

        let records = recorder.0.lock().clone();
        let outcomes: Vec<_> = records.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(
            outcomes,
            vec![
                TransitionOutcome::Succeeded,
                TransitionOutcome::Stale,
                TransitionOutcome::Succeeded
            ]
        );
        assert_eq!(records[2].partition, "TestDB_1");
        assert_eq!(records[2].state_model, ONLINE_OFFLINE);

        let instances = engine.instances().await;
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].0, PartitionKey::new("TestDB", "TestDB_0"));
        assert_eq!(instances[1].1.current_state, ONLINE);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_partition_transitions_are_serialized() {
        let engine = Arc::new(engine());
        let ctx = context();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    engine.execute(&transition("TestDB_0", OFFLINE, ONLINE), &ctx).await
                })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => succeeded += 1,
                Err(TransitionError::StaleTransition { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(engine.current_state("TestDB", "TestDB_0").await.as_deref(), Some(ONLINE));
    }
}
