use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures_util::{SinkExt, StreamExt};
use httpmock::prelude::*;
use runbot_commands::{render_rerun_not_found, LanguageTable};
use runbot_core::current_unix_timestamp;
use runbot_events::{
    verify_event_signature, Event, EventSigner, Filter, Secp256k1SchnorrSigner, Tag,
    UnsignedEvent, KIND_TEXT_NOTE,
};
use runbot_piston::{CodeExecutor, PistonClient, PistonConfig, RetryPolicy};
use runbot_relay::{
    resolve_source_run_event, Relay, RelayClient, RelayPublisher, RelaySource, Subscription,
    SubscriptionMessage,
};
use runbot_runtime::{BotRuntime, BotRuntimeConfig};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

/// Minimal in-process relay: stores published events, answers queries with
/// stored matches plus EOSE and forwards new events to open live queries.
struct LoopbackRelay {
    url: String,
    stored: Arc<Mutex<Vec<Event>>>,
    live_queries: Arc<AtomicUsize>,
    server: JoinHandle<()>,
}

impl Drop for LoopbackRelay {
    fn drop(&mut self) {
        self.server.abort();
    }
}

impl LoopbackRelay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback relay");
        let url = format!("ws://{}", listener.local_addr().expect("relay addr"));
        let stored = Arc::new(Mutex::new(Vec::new()));
        let live_queries = Arc::new(AtomicUsize::new(0));
        let (live_tx, _) = broadcast::channel::<Event>(64);

        let server_stored = stored.clone();
        let server_live_queries = live_queries.clone();
        let server = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(serve_connection(
                    stream,
                    server_stored.clone(),
                    server_live_queries.clone(),
                    live_tx.clone(),
                ));
            }
        });

        Self {
            url,
            stored,
            live_queries,
            server,
        }
    }

    fn store(&self, event: &Event) {
        self.stored.lock().expect("stored lock").push(event.clone());
    }

    async fn wait_for_live_queries(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.live_queries.load(Ordering::SeqCst) < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("bot should subscribe to the command feed");
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    stored: Arc<Mutex<Vec<Event>>>,
    live_queries: Arc<AtomicUsize>,
    live_tx: broadcast::Sender<Event>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let mut live_rx = live_tx.subscribe();
    let mut queries: HashMap<String, Vec<Filter>> = HashMap::new();

    loop {
        let outgoing = tokio::select! {
            frame = source.next() => {
                let Some(Ok(WsMessage::Text(text))) = frame else {
                    return;
                };
                let frame: Vec<Value> = serde_json::from_str(&text).expect("client frame");
                handle_client_frame(&frame, &stored, &live_queries, &live_tx, &mut queries)
            }
            live = live_rx.recv() => {
                let Ok(event) = live else {
                    continue;
                };
                queries
                    .iter()
                    .filter(|(_, filters)| filters.iter().any(|filter| filter.matches(&event)))
                    .map(|(id, _)| json!(["EVENT", id, event]).to_string())
                    .collect()
            }
        };
        for text in outgoing {
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                return;
            }
        }
    }
}

fn handle_client_frame(
    frame: &[Value],
    stored: &Mutex<Vec<Event>>,
    live_queries: &AtomicUsize,
    live_tx: &broadcast::Sender<Event>,
    queries: &mut HashMap<String, Vec<Filter>>,
) -> Vec<String> {
    match frame[0].as_str() {
        Some("REQ") => {
            let id = frame[1].as_str().expect("subscription id").to_string();
            let filters = frame[2..]
                .iter()
                .map(|value| serde_json::from_value::<Filter>(value.clone()).expect("filter"))
                .collect::<Vec<_>>();
            let mut outgoing = stored
                .lock()
                .expect("stored lock")
                .iter()
                .filter(|event| filters.iter().any(|filter| filter.matches(event)))
                .map(|event| json!(["EVENT", id, event]).to_string())
                .collect::<Vec<_>>();
            outgoing.push(json!(["EOSE", id]).to_string());
            if filters.iter().all(|filter| filter.ids.is_empty()) {
                live_queries.fetch_add(1, Ordering::SeqCst);
            }
            queries.insert(id, filters);
            outgoing
        }
        Some("CLOSE") => {
            if let Some(id) = frame[1].as_str() {
                queries.remove(id);
            }
            Vec::new()
        }
        Some("EVENT") => {
            let event =
                serde_json::from_value::<Event>(frame[1].clone()).expect("published event");
            stored.lock().expect("stored lock").push(event.clone());
            let _ = live_tx.send(event.clone());
            vec![json!(["OK", event.id, true, ""]).to_string()]
        }
        _ => Vec::new(),
    }
}

fn user() -> Secp256k1SchnorrSigner {
    Secp256k1SchnorrSigner::from_bytes(&[3; 32]).expect("signer")
}

fn note(author: &Secp256k1SchnorrSigner, content: &str, tags: Vec<Tag>) -> Event {
    author
        .sign(UnsignedEvent {
            created_at: current_unix_timestamp(),
            kind: KIND_TEXT_NOTE,
            tags,
            content: content.to_string(),
        })
        .expect("sign note")
}

async fn next_event(subscription: &mut Subscription) -> Event {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match subscription.recv().await {
                Some(SubscriptionMessage::Event(event)) => return event,
                Some(SubscriptionMessage::EndOfStoredEvents) => continue,
                other => panic!("unexpected subscription message: {other:?}"),
            }
        }
    })
    .await
    .expect("reply should arrive")
}

async fn publish_and_await_reply(user_client: &RelayClient, command: &Event) -> Event {
    let mut replies = user_client
        .subscribe(vec![Filter {
            kinds: vec![KIND_TEXT_NOTE],
            event_refs: vec![command.id.clone()],
            ..Filter::default()
        }])
        .await
        .expect("subscribe to replies");
    user_client.publish(command).await.expect("publish command");
    let reply = next_event(&mut replies).await;
    replies.close();
    reply
}

fn piston_for(server: &MockServer) -> PistonClient {
    PistonClient::new(PistonConfig {
        api_base: format!("{}/api/v2/piston", server.base_url()),
        request_timeout_ms: 5_000,
        retry: RetryPolicy::no_retries(),
    })
    .expect("piston client")
}

#[tokio::test]
async fn integration_run_and_rerun_roundtrip_over_websocket_relay() {
    let backend = MockServer::start();
    let runtimes_mock = backend.mock(|when, then| {
        when.method(GET).path("/api/v2/piston/runtimes");
        then.status(200).json_body(json!([
            {"language": "python", "version": "3.10.0", "aliases": ["py"]}
        ]));
    });
    let run_mock = backend.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/piston/execute")
            .json_body_includes(json!({"language": "python", "stdin": ""}).to_string());
        then.status(200).json_body(json!({
            "run": {"stdout": "first run\n", "stderr": "", "output": "first run\n", "code": 0, "signal": null}
        }));
    });
    let rerun_mock = backend.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/piston/execute")
            .json_body_includes(json!({"args": ["again"], "stdin": "world"}).to_string());
        then.status(200).json_body(json!({
            "run": {"stdout": "second run\n", "stderr": "", "output": "second run\n", "code": 0, "signal": null}
        }));
    });

    let executor = piston_for(&backend);
    let languages = LanguageTable::from_runtimes(&executor.runtimes().await.expect("runtimes"));
    runtimes_mock.assert();

    let relay = LoopbackRelay::start().await;
    let bot_signer = Arc::new(Secp256k1SchnorrSigner::from_bytes(&[5; 32]).expect("signer"));
    let runtime = BotRuntime::new(
        Arc::new(executor),
        bot_signer.clone(),
        Arc::new(languages),
        BotRuntimeConfig::default(),
    );
    let bot_relay: Arc<dyn Relay> = Arc::new(
        RelayClient::connect(&relay.url)
            .await
            .expect("bot connects"),
    );
    let bot_task = tokio::spawn(async move { runtime.run(bot_relay).await });
    relay.wait_for_live_queries(1).await;

    let author = user();
    let user_client = RelayClient::connect(&relay.url)
        .await
        .expect("user connects");

    let run = note(&author, "/run py\nprint(input() or 'first run')", vec![]);
    let reply = publish_and_await_reply(&user_client, &run).await;
    assert_eq!(reply.content, "first run\n");
    assert_eq!(reply.pubkey, bot_signer.public_key_hex());
    assert_eq!(reply.last_event_reference(), Some(run.id.as_str()));
    assert_eq!(reply.pubkey_references(), vec![author.public_key_hex()]);
    verify_event_signature(&reply).expect("reply signature verifies");
    run_mock.assert();

    let rerun = note(
        &author,
        "/rerun\nagain\n---\nworld",
        vec![Tag::event(&reply.id)],
    );
    let rerun_reply = publish_and_await_reply(&user_client, &rerun).await;
    assert_eq!(rerun_reply.content, "second run\n");
    assert_eq!(rerun_reply.last_event_reference(), Some(rerun.id.as_str()));
    rerun_mock.assert();

    let orphan = note(&author, "/rerun\n---\nignored", vec![]);
    let orphan_reply = publish_and_await_reply(&user_client, &orphan).await;
    assert_eq!(orphan_reply.content, render_rerun_not_found());

    bot_task.abort();
}

#[tokio::test]
async fn integration_resolver_walks_stored_chain_over_websocket_relay() {
    let relay = LoopbackRelay::start().await;
    let author = user();
    let run = note(&author, "/run py\nprint(1)", vec![]);
    let middle = note(&author, "thanks!", vec![Tag::event(&run.id)]);
    let rerun = note(&author, "/rerun", vec![Tag::event(&run.id), Tag::event(&middle.id)]);
    relay.store(&run);
    relay.store(&middle);

    let client = RelayClient::connect(&relay.url)
        .await
        .expect("client connects");

    let found = resolve_source_run_event(&client, &rerun, 4, None)
        .await
        .expect("resolve");
    assert_eq!(found, Some(run.clone()));

    let too_short = resolve_source_run_event(&client, &rerun, 1, None)
        .await
        .expect("resolve");
    assert_eq!(too_short, None);
}
