//! Event fan-out and command routing through a live session
//!
//! Run with: cargo test -p integration-tests --test dispatch_tests

use std::time::Duration;

use anyhow::bail;
use chat_core::{Intents, Message};
use chat_gateway::dispatch::{CommandContext, EventContext, HandlerResult};
use chat_gateway::{GatewaySession, Module, Registration, RegistrationCollector, SessionState};
use integration_tests::*;
use serde_json::json;
use tokio::sync::mpsc;

type Labels = mpsc::UnboundedReceiver<String>;

/// Handlers report what ran by sending a label
#[derive(Clone)]
struct Recorder(mpsc::UnboundedSender<String>);

impl Recorder {
    fn record(&self, label: impl Into<String>) -> HandlerResult {
        self.0.send(label.into())?;
        Ok(())
    }
}

/// Registers the `MARKER` event every test uses to know dispatch caught up
struct Marker(Recorder);

impl Module for Marker {
    fn register(&self, collector: &mut RegistrationCollector) {
        let recorder = self.0.clone();
        collector.event("MARKER", move || {
            let recorder = recorder.clone();
            async move { recorder.record("marker") }
        });
    }
}

fn recorder() -> (Recorder, Labels) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder(tx), rx)
}

/// Start a session over `registration` and walk it to Connected
async fn connected(registration: &Registration) -> (GatewaySession, ServerSide) {
    let (connector, mut server) = MockConnector::new();
    let session = GatewaySession::with_connector(test_config(), registration.registry.clone(), connector);
    session.start(TEST_TOKEN, Intents::default()).await.unwrap();
    let conn = connect_ready(&mut server, &session, "abc").await;
    (session, conn)
}

/// Send a marker and collect every label recorded before it
async fn labels_until_marker(conn: &ServerSide, labels: &mut Labels, seq: u64) -> Vec<String> {
    conn.send(dispatch("MARKER", seq, json!({})));
    let mut seen = Vec::new();
    loop {
        let label = tokio::time::timeout(Duration::from_secs(5), labels.recv())
            .await
            .expect("timed out waiting for handlers")
            .expect("recorder dropped");
        if label == "marker" {
            return seen;
        }
        seen.push(label);
    }
}

#[tokio::test(start_paused = true)]
async fn test_event_fan_out_in_registration_order() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));

    let first = rec.clone();
    collector.event_raw("MESSAGE_CREATE", move |ctx: EventContext| {
        let first = first.clone();
        async move { first.record(format!("raw:{}", ctx.sequence.unwrap_or_default())) }
    });
    let second = rec.clone();
    collector.event_typed("MESSAGE_CREATE", move |message: Message| {
        let second = second.clone();
        async move { second.record(format!("typed:{}", message.content)) }
    });
    let third = rec.clone();
    collector.event("MESSAGE_CREATE", move || {
        let third = third.clone();
        async move { third.record("bare") }
    });
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("MESSAGE_CREATE", 2, message("hello", false)));

    assert_eq!(
        labels_until_marker(&conn, &mut labels, 3).await,
        vec!["raw:2", "typed:hello", "bare"]
    );
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_slash_command_routes_without_fan_out() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));

    let events = rec.clone();
    collector.event("INTERACTION_CREATE", move || {
        let events = events.clone();
        async move { events.record("event") }
    });
    let commands = rec.clone();
    collector.command_fn("Ping", move |ctx: CommandContext| {
        let commands = commands.clone();
        async move {
            let who = ctx.invoker().map(|user| user.username.clone()).unwrap_or_default();
            commands.record(format!("{}:{who}", ctx.name))
        }
    });
    let registration = collector.finish();
    assert_eq!(registration.command_names(), vec!["ping"]);

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("INTERACTION_CREATE", 2, slash_command("ping")));

    assert_eq!(labels_until_marker(&conn, &mut labels, 3).await, vec!["ping:alice"]);
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_registered_later_replaces_earlier() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));

    let v1 = rec.clone();
    collector.command_fn("ping", move |_ctx: CommandContext| {
        let v1 = v1.clone();
        async move { v1.record("v1") }
    });
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("INTERACTION_CREATE", 2, slash_command("ping")));
    assert_eq!(labels_until_marker(&conn, &mut labels, 3).await, vec!["v1"]);

    let v2 = rec.clone();
    registration.router.command_fn("PING", move |_ctx: CommandContext| {
        let v2 = v2.clone();
        async move { v2.record("v2") }
    });
    assert_eq!(registration.router.len(), 1);

    conn.send(dispatch("INTERACTION_CREATE", 4, slash_command("ping")));
    assert_eq!(labels_until_marker(&conn, &mut labels, 5).await, vec!["v2"]);
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_is_ignored() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("INTERACTION_CREATE", 2, slash_command("missing")));

    assert!(labels_until_marker(&conn, &mut labels, 3).await.is_empty());
    assert_eq!(session.state(), SessionState::Connected);
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_prefix_commands() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new().with_prefix("!");
    collector.module(&Marker(rec.clone()));

    let commands = rec.clone();
    collector.command_fn("echo", move |ctx: CommandContext| {
        let commands = commands.clone();
        async move { commands.record(format!("echo:{}", ctx.args.join(" "))) }
    });
    let events = rec.clone();
    collector.event("MESSAGE_CREATE", move || {
        let events = events.clone();
        async move { events.record("message") }
    });
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;

    // Prefixed messages route, then still reach event handlers
    conn.send(dispatch("MESSAGE_CREATE", 2, message("!echo hi there", false)));
    assert_eq!(
        labels_until_marker(&conn, &mut labels, 3).await,
        vec!["echo:hi there", "message"]
    );

    // Bots never trigger commands
    conn.send(dispatch("MESSAGE_CREATE", 4, message("!echo loop", true)));
    assert_eq!(labels_until_marker(&conn, &mut labels, 5).await, vec!["message"]);

    // Plain chatter is only an event
    conn.send(dispatch("MESSAGE_CREATE", 6, message("echo without prefix", false)));
    assert_eq!(labels_until_marker(&conn, &mut labels, 7).await, vec!["message"]);

    session.stop().await;
}

async fn explode() -> HandlerResult {
    panic!("handler exploded")
}

async fn fail() -> HandlerResult {
    bail!("handler failed")
}

async fn crash(_ctx: CommandContext) -> HandlerResult {
    panic!("command exploded")
}

#[tokio::test(start_paused = true)]
async fn test_failing_handlers_do_not_stop_the_session() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));

    collector.event("BOOM", explode);
    collector.event("BOOM", fail);
    let after = rec.clone();
    collector.event("BOOM", move || {
        let after = after.clone();
        async move { after.record("after") }
    });
    collector.command_fn("crash", crash);
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("BOOM", 2, json!({})));
    assert_eq!(labels_until_marker(&conn, &mut labels, 3).await, vec!["after"]);

    conn.send(dispatch("INTERACTION_CREATE", 4, slash_command("crash")));
    assert!(labels_until_marker(&conn, &mut labels, 5).await.is_empty());

    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(session.sequence(), Some(5));
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_typed_handler_decode_failure_is_contained() {
    let (rec, mut labels) = recorder();
    let mut collector = RegistrationCollector::new();
    collector.module(&Marker(rec.clone()));

    let typed = rec.clone();
    collector.event_typed("MESSAGE_CREATE", move |message: Message| {
        let typed = typed.clone();
        async move { typed.record(message.content) }
    });
    let raw = rec.clone();
    collector.event_raw("MESSAGE_CREATE", move |_ctx: EventContext| {
        let raw = raw.clone();
        async move { raw.record("raw") }
    });
    let registration = collector.finish();

    let (session, conn) = connected(&registration).await;
    conn.send(dispatch("MESSAGE_CREATE", 2, json!({"content": 7})));

    assert_eq!(labels_until_marker(&conn, &mut labels, 3).await, vec!["raw"]);
    session.stop().await;
}
