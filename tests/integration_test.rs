use parking_lot::Mutex;
use participant_core::config::ParticipantConfig;
use participant_core::container::mock::MockLauncher;
use participant_core::container::{ContainerError, TerminationPolicy};
use participant_core::lifecycle::Participant;
use participant_core::messaging::{AsyncCallback, CallbackRegistration, RouteError};
use participant_core::model::{Message, MessageType, StaticSession};
use participant_core::statemachine::online_offline::{OFFLINE, ONLINE, ONLINE_OFFLINE};
use participant_core::statemachine::{
    StateModelDefinition, TransitionError, TransitionObserver, TransitionOutcome, TransitionRecord,
    DROPPED,
};
use std::sync::Arc;

#[derive(Default)]
struct Replies(Mutex<Vec<Message>>);

impl AsyncCallback for Replies {
    fn on_reply_message(&self, reply: &Message) {
        self.0.lock().push(reply.clone());
    }
}

#[derive(Default)]
struct Records(Mutex<Vec<TransitionRecord>>);

impl TransitionObserver for Records {
    fn record(&self, record: &TransitionRecord) {
        self.0.lock().push(record.clone());
    }
}

fn config() -> ParticipantConfig {
    let mut config = ParticipantConfig::new("riemann-cluster", "localhost_12918");
    config.coordination_address = "zk-1:2181".into();
    config.container.command = "./start-node.sh".into();
    config
}

fn transition(partition: &str, from: &str, to: &str) -> Message {
    Message::builder(MessageType::StateTransition)
        .target_session("s-1")
        .resource("TestDB")
        .partition(partition)
        .state_model(ONLINE_OFFLINE)
        .transition(from, to)
        .build()
}

/// Full participant with a mock launcher: replies, transitions and containers.
#[tokio::test]
async fn test_full_participant_integration() {
    let launcher = MockLauncher::new();
    let records = Arc::new(Records::default());
    let participant = Participant::builder(config())
        .session(Arc::new(StaticSession::new("s-1", "localhost_12918")))
        .launcher(Arc::new(launcher.clone()))
        .observer(records.clone())
        .start()
        .expect("Failed to start participant");

    // Reply correlation through the dispatcher.
    let replies = Arc::new(Replies::default());
    let handle = participant.register_callback(
        "corr-1",
        CallbackRegistration::new(replies.clone()).with_messages_sent(vec![Message::new("Test")]),
    );
    let reply = Message::builder(MessageType::TaskReply)
        .target_session("*")
        .correlation_id("corr-1")
        .build();
    let result = participant.deliver(reply.clone()).await.expect("Reply rejected");
    assert_eq!(result.result.get("completed").map(String::as_str), Some("true"));
    assert!(handle.is_done());
    assert_eq!(replies.0.lock()[0].id(), reply.id());
    assert!(participant.callbacks().is_empty());

    // State transitions through the dispatcher.
    participant
        .deliver(transition("TestDB_0", OFFLINE, ONLINE))
        .await
        .expect("OFFLINE -> ONLINE failed");
    let err = participant
        .deliver(transition("TestDB_0", OFFLINE, ONLINE))
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::Transition(TransitionError::StaleTransition { .. })));
    participant
        .deliver(transition("TestDB_0", ONLINE, OFFLINE))
        .await
        .expect("ONLINE -> OFFLINE failed");
    assert_eq!(
        participant.engine().current_state("TestDB", "TestDB_0").await.as_deref(),
        Some(OFFLINE)
    );
    let outcomes: Vec<_> = records.0.lock().iter().map(|r| r.outcome.clone()).collect();
    assert_eq!(
        outcomes,
        vec![
            TransitionOutcome::Succeeded,
            TransitionOutcome::Stale,
            TransitionOutcome::Succeeded
        ]
    );

    // Unknown message types are rejected.
    let err = participant.deliver(Message::new("RandomType")).await.unwrap_err();
    assert!(matches!(err, RouteError::UnregisteredType { .. }));

    // Containers.
    let containers = participant.containers();
    let info = containers.create("node_1", "container").await.expect("Failed to create container");
    assert_eq!(info.owner, "localhost_12918");
    containers.create("node_2", "container").await.expect("Failed to create container");
    assert!(matches!(
        containers.create("node_1", "container").await,
        Err(ContainerError::AlreadyExists(_))
    ));
    assert!(matches!(
        containers.create("node_3", "vm").await,
        Err(ContainerError::UnsupportedType(_))
    ));
    assert_eq!(
        launcher.launched()[0].args,
        vec!["./start-node.sh", "zk-1:2181", "riemann-cluster", "node_1"]
    );

    // Shutdown destroys the remaining containers.
    participant.shutdown().await.expect("Shutdown failed");
    assert!(launcher.running().is_empty());
    assert_eq!(
        launcher.terminated(),
        vec![
            ("node_1".to_string(), TerminationPolicy::Graceful),
            ("node_2".to_string(), TerminationPolicy::Graceful)
        ]
    );
}

#[tokio::test]
async fn test_shutdown_ignores_teardown_failures() {
    let launcher = MockLauncher::new();
    launcher.fail_terminate_for("node_2");
    let participant = Participant::builder(config())
        .launcher(Arc::new(launcher.clone()))
        .start()
        .unwrap();

    for id in ["node_1", "node_2", "node_3"] {
        participant.containers().create(id, "container").await.unwrap();
    }
    let client = participant.containers().client().clone();
    assert_eq!(client.list().await.unwrap().len(), 3);
    drop(client);

    participant.shutdown().await.expect("Shutdown must not fail on teardown errors");
    assert_eq!(launcher.running(), vec!["node_2".to_string()]);
}

#[tokio::test]
async fn test_custom_state_model_and_drop() {
    let model = StateModelDefinition::builder("MasterSlave")
        .initial_state("OFFLINE")
        .states(["SLAVE", "MASTER"])
        .transition_fn("OFFLINE", "SLAVE", |_, _| Ok(()))
        .transition_fn("SLAVE", "MASTER", |_, _| Ok(()))
        .transition_fn("MASTER", "SLAVE", |_, _| Ok(()))
        .transition_fn("SLAVE", "OFFLINE", |_, _| Ok(()))
        .build()
        .unwrap();
    let participant = Participant::builder(config())
        .session(Arc::new(StaticSession::new("s-1", "localhost_12918")))
        .launcher(Arc::new(MockLauncher::new()))
        .state_model(model)
        .start()
        .unwrap();

    let step = |from: &str, to: &str| {
        Message::builder(MessageType::StateTransition)
            .resource("Orders")
            .partition("Orders_3")
            .state_model("MasterSlave")
            .transition(from, to)
            .build()
    };
    participant.deliver(step("OFFLINE", "SLAVE")).await.unwrap();
    participant.deliver(step("SLAVE", "MASTER")).await.unwrap();

    let err = participant.deliver(step("MASTER", "OFFLINE")).await.unwrap_err();
    assert!(matches!(err, RouteError::Transition(TransitionError::IllegalTransition { .. })));

    participant.deliver(step("MASTER", DROPPED)).await.unwrap();
    let err = participant.deliver(step(DROPPED, "OFFLINE")).await.unwrap_err();
    assert!(matches!(err, RouteError::Transition(TransitionError::InstanceDropped { .. })));

    // The built-in model is still available next to the custom one.
    participant.deliver(transition("TestDB_0", OFFLINE, ONLINE)).await.unwrap();
    let instances = participant.engine().instances().await;
    assert_eq!(instances.len(), 2);

    participant.shutdown().await.unwrap();
}

/// Real `/bin/sh` container that runs until it is terminated.
#[cfg(unix)]
#[tokio::test]
async fn test_shell_container_lifecycle() {
    let script = std::env::temp_dir().join(format!("participant-core-{}.sh", uuid::Uuid::new_v4()));
    std::fs::write(&script, "#!/bin/sh\n# args: coordination_address cluster_name id\nexec sleep 30\n")
        .expect("Failed to write script");

    let mut config = config();
    config.container.command = script.display().to_string();
    let participant = Participant::builder(config).start().unwrap();

    let info = participant
        .containers()
        .create("shell_1", "container")
        .await
        .expect("Failed to spawn shell container");
    assert!(info.pid.is_some());

    participant.containers().destroy("shell_1").await.expect("Failed to terminate");
    assert!(matches!(
        participant.containers().destroy("shell_1").await,
        Err(ContainerError::NotFound(_))
    ));

    participant.shutdown().await.unwrap();
    let _ = std::fs::remove_file(script);
}
