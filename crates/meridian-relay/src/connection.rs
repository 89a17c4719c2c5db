use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use meridian_types::channel::Channel;
use meridian_types::events::{RelayCommand, RelayEvent};

use crate::auth::ChannelSigner;
use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Per-socket subscription state, owned by the read side.
struct Subscriptions {
    socket_id: Uuid,
    users: HashSet<Uuid>,
    public: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<RelayEvent>,
}

/// Serve one relay socket until either side closes it.
///
/// The socket is anonymous until it subscribes: private channels require a
/// signature for this socket's id, obtained from the channel authorization
/// endpoint with a session token.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, signer: ChannelSigner) {
    let socket_id = Uuid::new_v4();
    let (mut sender, receiver) = socket.split();

    if send_event(&mut sender, &RelayEvent::Connected { socket_id }).await.is_err() {
        return;
    }
    debug!("Relay socket {} connected", socket_id);

    run_connection_loop(sender, receiver, dispatcher, signer, socket_id).await;

    debug!("Relay socket {} disconnected", socket_id);
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    signer: ChannelSigner,
    socket_id: Uuid,
) {
    let (tx, mut user_rx) = mpsc::unbounded_channel::<RelayEvent>();
    let mut broadcast_rx = dispatcher.subscribe_public();

    let public = Arc::new(AtomicBool::new(false));
    let public_send = public.clone();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward routed + public events to the client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Public channel receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if !public_send.load(Ordering::Acquire) {
                        continue;
                    }
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let Some(event) = result else { break };
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping socket {}", missed_heartbeats, socket_id);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut subs = Subscriptions {
            socket_id,
            users: HashSet::new(),
            public,
            tx,
        };
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<RelayCommand>(&text) {
                    Ok(cmd) => handle_command(&dispatcher_recv, &signer, &mut subs, cmd).await,
                    Err(e) => {
                        warn!(
                            "Relay socket {} bad command: {} -- raw: {}",
                            socket_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister_socket(socket_id).await;
}

async fn handle_command(
    dispatcher: &Dispatcher,
    signer: &ChannelSigner,
    subs: &mut Subscriptions,
    cmd: RelayCommand,
) {
    let reply = match cmd {
        RelayCommand::Subscribe { channel, auth } => {
            match subscribe(dispatcher, signer, subs, &channel, auth.as_deref()).await {
                Ok(()) => RelayEvent::Subscribed { channel },
                Err(reason) => {
                    warn!("Relay socket {} refused {}: {}", subs.socket_id, channel, reason);
                    RelayEvent::SubscriptionError { channel, reason }
                }
            }
        }
        RelayCommand::Unsubscribe { channel } => {
            match channel.parse::<Channel>() {
                Ok(Channel::Public) => subs.public.store(false, Ordering::Release),
                Ok(Channel::User(user_id)) => {
                    if subs.users.remove(&user_id) {
                        dispatcher.unregister(user_id, subs.socket_id).await;
                    }
                }
                Err(_) => {}
            }
            return;
        }
    };
    let _ = subs.tx.send(reply);
}

async fn subscribe(
    dispatcher: &Dispatcher,
    signer: &ChannelSigner,
    subs: &mut Subscriptions,
    channel_name: &str,
    auth: Option<&str>,
) -> Result<(), String> {
    let channel: Channel = channel_name.parse().map_err(|e| format!("{}", e))?;
    match channel {
        Channel::Public => {
            subs.public.store(true, Ordering::Release);
        }
        Channel::User(user_id) => {
            let auth = auth.ok_or_else(|| "private channel requires auth".to_string())?;
            if !signer.verify(&subs.socket_id.to_string(), channel_name, auth) {
                return Err("invalid channel signature".into());
            }
            if subs.users.insert(user_id) {
                dispatcher.register(user_id, subs.socket_id, subs.tx.clone()).await;
                info!("Relay socket {} subscribed to {}", subs.socket_id, channel_name);
            }
        }
    }
    Ok(())
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &RelayEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode relay event {}: {}", event.name(), e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
