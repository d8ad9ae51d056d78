use crate::error::{AppError, AppResult};
use crate::events::ChangeEvent;
use crate::models::{
    Chain, Notification, PaymentMethod, ProjectKind, Severity, Transaction, TransactionFilter,
};
use crate::services::{ActionOutcome, DailyCredit, FarmingRun, Purchase};
use crate::AppState;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Channels a client may subscribe to
pub const CHANNELS: [&str; 4] = ["credits", "notifications", "farming", "user"];

/// Commands sent by clients
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    GetBalance,
    Spend {
        amount: u64,
        action: String,
    },
    TopUp {
        package: String,
        #[serde(default)]
        referral_code: Option<String>,
        method: PaymentMethod,
    },
    ClaimDaily,
    PerformAction {
        kind: ProjectKind,
        project: String,
    },
    ListTransactions {
        #[serde(default)]
        filter: TransactionFilter,
    },
    ListNotifications {
        #[serde(default)]
        limit: Option<usize>,
    },
    AddNotification {
        title: String,
        message: String,
        #[serde(default)]
        severity: Severity,
    },
    MarkRead {
        id: String,
    },
    MarkAllRead,
    ClearNotifications,
    StartFarming {
        chain: Chain,
        wallet_address: String,
    },
    FarmingStatus,
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
}

/// Responses and pushed events sent to clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        client_id: Uuid,
        message: String,
    },
    Balance {
        balance: u64,
    },
    Spent {
        success: bool,
        balance: u64,
    },
    ToppedUp {
        purchase: Purchase,
    },
    ActionPerformed {
        outcome: ActionOutcome,
    },
    DailyClaim {
        granted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        balance: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_claim_at: Option<DateTime<Utc>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        remaining_secs: Option<i64>,
    },
    Transactions {
        transactions: Vec<Transaction>,
    },
    Notifications {
        notifications: Vec<Notification>,
        unread: usize,
    },
    NotificationAdded {
        /// `None` when suppressed as a duplicate
        notification: Option<Notification>,
    },
    MarkedRead {
        notification: Notification,
    },
    MarkedAllRead {
        count: usize,
    },
    NotificationsCleared,
    FarmingStarted {
        run_id: Uuid,
    },
    FarmingStatus {
        run: Option<FarmingRun>,
    },
    Subscribed {
        channel: String,
    },
    Unsubscribed {
        channel: String,
    },
    Event {
        channel: String,
        payload: ChangeEvent,
    },
    Error {
        code: u16,
        message: String,
    },
}

impl From<AppError> for ServerMessage {
    fn from(e: AppError) -> Self {
        Self::Error {
            code: e.status_code(),
            message: e.to_string(),
        }
    }
}

impl From<DailyCredit> for ServerMessage {
    fn from(claim: DailyCredit) -> Self {
        match claim {
            DailyCredit::Granted {
                balance,
                next_claim_at,
            } => Self::DailyClaim {
                granted: true,
                balance: Some(balance),
                next_claim_at: Some(next_claim_at),
                remaining_secs: None,
            },
            DailyCredit::NotYet { remaining } => Self::DailyClaim {
                granted: false,
                balance: None,
                next_claim_at: None,
                remaining_secs: Some(remaining.num_seconds()),
            },
        }
    }
}

/// WebSocket gateway over the application services
#[derive(Clone)]
pub struct WebSocketServer {
    state: AppState,
    /// Active subscriptions: channel -> client IDs
    subscriptions: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
    /// Client subscriptions: client_id -> channels
    client_channels: Arc<RwLock<HashMap<Uuid, Vec<String>>>>,
}

impl WebSocketServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            client_channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe a client to a channel
    pub async fn subscribe(&self, client_id: Uuid, channel: &str) -> AppResult<()> {
        if !CHANNELS.contains(&channel) {
            return Err(AppError::Validation(format!(
                "Unknown channel: {}. Must be one of: {:?}",
                channel, CHANNELS
            )));
        }

        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        let subscribers = subscriptions.entry(channel.to_string()).or_default();
        if !subscribers.contains(&client_id) {
            subscribers.push(client_id);
            client_channels
                .entry(client_id)
                .or_default()
                .push(channel.to_string());
        }

        info!("Client {} subscribed to {}", client_id, channel);
        Ok(())
    }

    /// Unsubscribe a client from a channel
    pub async fn unsubscribe(&self, client_id: Uuid, channel: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        let mut client_channels = self.client_channels.write().await;

        if let Some(subscribers) = subscriptions.get_mut(channel) {
            subscribers.retain(|&id| id != client_id);
        }
        let now_empty = match client_channels.get_mut(&client_id) {
            Some(channels) => {
                channels.retain(|c| c != channel);
                channels.is_empty()
            }
            None => false,
        };
        if now_empty {
            client_channels.remove(&client_id);
        }

        info!("Client {} unsubscribed from {}", client_id, channel);
    }

    /// Get all channels a client is subscribed to
    pub async fn get_client_channels(&self, client_id: Uuid) -> Vec<String> {
        let client_channels = self.client_channels.read().await;
        client_channels.get(&client_id).cloned().unwrap_or_default()
    }

    pub async fn is_client_subscribed(&self, client_id: Uuid, channel: &str) -> bool {
        let subscriptions = self.subscriptions.read().await;
        subscriptions
            .get(channel)
            .is_some_and(|subscribers| subscribers.contains(&client_id))
    }

    /// Execute one client command. Failures become `ServerMessage::Error`.
    pub async fn handle_command(&self, client_id: Uuid, command: ClientMessage) -> ServerMessage {
        match self.dispatch(client_id, command).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Command from client {} failed: {}", client_id, e);
                e.into()
            }
        }
    }

    async fn dispatch(&self, client_id: Uuid, command: ClientMessage) -> AppResult<ServerMessage> {
        let state = &self.state;

        let response: ServerMessage = match command {
            ClientMessage::GetBalance => ServerMessage::Balance {
                balance: state.ledger.balance()?,
            },
            ClientMessage::Spend { amount, action } => {
                let (success, balance) = state.ledger.spend_with_balance(amount, &action)?;
                ServerMessage::Spent { success, balance }
            }
            ClientMessage::TopUp {
                package,
                referral_code,
                method,
            } => ServerMessage::ToppedUp {
                purchase: state
                    .top_up
                    .purchase(&package, referral_code.as_deref(), method)?,
            },
            ClientMessage::ClaimDaily => state.ledger.claim_daily_credit()?.into(),
            ClientMessage::PerformAction { kind, project } => ServerMessage::ActionPerformed {
                outcome: state.actions.perform(kind, &project)?,
            },
            ClientMessage::ListTransactions { filter } => ServerMessage::Transactions {
                transactions: state.ledger.transactions(filter)?,
            },
            ClientMessage::ListNotifications { limit } => ServerMessage::Notifications {
                notifications: state.notifications.list(limit)?,
                unread: state.notifications.unread_count()?,
            },
            ClientMessage::AddNotification {
                title,
                message,
                severity,
            } => ServerMessage::NotificationAdded {
                notification: state.notifications.add(&title, &message, severity)?,
            },
            ClientMessage::MarkRead { id } => ServerMessage::MarkedRead {
                notification: state.notifications.mark_read(&id)?,
            },
            ClientMessage::MarkAllRead => ServerMessage::MarkedAllRead {
                count: state.notifications.mark_all_read()?,
            },
            ClientMessage::ClearNotifications => {
                state.notifications.clear()?;
                ServerMessage::NotificationsCleared
            }
            ClientMessage::StartFarming {
                chain,
                wallet_address,
            } => {
                // The run keeps going after this returns; progress arrives on "farming"
                let handle = state.farming.start(chain, &wallet_address).await?;
                ServerMessage::FarmingStarted {
                    run_id: handle.run_id,
                }
            }
            ClientMessage::FarmingStatus => ServerMessage::FarmingStatus {
                run: state.farming.snapshot().await,
            },
            ClientMessage::Subscribe { channel } => {
                self.subscribe(client_id, &channel).await?;
                ServerMessage::Subscribed { channel }
            }
            ClientMessage::Unsubscribe { channel } => {
                self.unsubscribe(client_id, &channel).await;
                ServerMessage::Unsubscribed { channel }
            }
        };

        Ok(response)
    }

    /// Handle a new WebSocket connection
    pub async fn handle_connection(&self, stream: tokio::net::TcpStream) -> AppResult<()> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| AppError::Message(format!("WebSocket handshake failed: {}", e)))?;

        let (ws_sender, mut ws_receiver) = ws_stream.split();
        let mut rx = self.state.bus.subscribe();
        let client_id = Uuid::new_v4();

        info!("New WebSocket connection: {}", client_id);

        let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

        let welcome = ServerMessage::Connected {
            client_id,
            message: "Connected to Scryptex WebSocket server".to_string(),
        };
        if let Err(e) = send_json(ws_sender.as_ref(), &welcome).await {
            warn!("Failed to send welcome message: {}", e);
        }

        // Forward change events for the channels this client subscribed to
        let ws_server = self.clone();
        let ws_sender_for_events = ws_sender.clone();
        let forwarder = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Client {} lagged, {} events dropped", client_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let channel = event.channel();
                if !ws_server.is_client_subscribed(client_id, channel).await {
                    continue;
                }

                let message = ServerMessage::Event {
                    channel: channel.to_string(),
                    payload: event,
                };
                if let Err(e) = send_json(ws_sender_for_events.as_ref(), &message).await {
                    error!("Failed to send event to client {}: {}", client_id, e);
                    break;
                }
            }
        });

        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let response = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(command) => {
                            debug!("Client {} sent {:?}", client_id, command);
                            self.handle_command(client_id, command).await
                        }
                        Err(e) => {
                            warn!("Failed to parse message from client {}: {}", client_id, text);
                            ServerMessage::Error {
                                code: 400,
                                message: format!("Invalid message format: {}", e),
                            }
                        }
                    };

                    if let Err(e) = send_json(ws_sender.as_ref(), &response).await {
                        warn!("Failed to send response to client {}: {}", client_id, e);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket connection closed: {}", client_id);
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        // Clean up all subscriptions for this client
        forwarder.abort();
        for channel in self.get_client_channels(client_id).await {
            self.unsubscribe(client_id, &channel).await;
        }

        Ok(())
    }
}

async fn send_json<S>(sender: &tokio::sync::Mutex<S>, message: &ServerMessage) -> AppResult<()>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let json = serde_json::to_string(message)?;
    let mut sender = sender.lock().await;
    sender
        .send(Message::Text(json))
        .await
        .map_err(|e| AppError::Message(format!("WebSocket send failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::JsonStore;
    use crate::AppConfig;

    fn server() -> WebSocketServer {
        let state = AppState::new(
            &AppConfig::default(),
            JsonStore::in_memory(),
            Arc::new(SystemClock),
        );
        WebSocketServer::new(state)
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"spend","amount":4,"action":"Analysis"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Spend { amount: 4, .. }));

        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"start_farming","chain":"scroll","wallet_address":"0xabc"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::StartFarming {
                chain: Chain::Scroll,
                ..
            }
        ));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"list_transactions"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::ListTransactions {
                filter: TransactionFilter::All
            }
        ));
    }

    #[tokio::test]
    async fn test_spend_command() {
        let ws = server();
        let client = Uuid::new_v4();

        let response = ws
            .handle_command(
                client,
                ClientMessage::Spend {
                    amount: 10,
                    action: "Deep analysis".to_string(),
                },
            )
            .await;
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "spent");
        assert_eq!(json["success"], false);
        assert_eq!(json["balance"], 6);

        let response = ws
            .handle_command(
                client,
                ClientMessage::Spend {
                    amount: 2,
                    action: "Deep analysis".to_string(),
                },
            )
            .await;
        assert!(matches!(
            response,
            ServerMessage::Spent {
                success: true,
                balance: 4
            }
        ));
    }

    #[tokio::test]
    async fn test_perform_action_command() {
        let ws = server();
        let client = Uuid::new_v4();
        let command: ClientMessage =
            serde_json::from_str(r#"{"type":"perform_action","kind":"analyzed","project":"Zora"}"#)
                .unwrap();

        let response = ws.handle_command(client, command.clone()).await;
        assert!(matches!(response, ServerMessage::Error { code: 401, .. }));

        ws.state.users.signup("ada@example.com", "Ada").unwrap();
        let json = serde_json::to_value(ws.handle_command(client, command).await).unwrap();
        assert_eq!(json["type"], "action_performed");
        assert_eq!(json["outcome"]["balance"], 5);
        assert_eq!(json["outcome"]["kind"], "analyzed");
    }

    #[tokio::test]
    async fn test_errors_carry_status_code() {
        let ws = server();
        let response = ws
            .handle_command(
                Uuid::new_v4(),
                ClientMessage::MarkRead {
                    id: "missing".to_string(),
                },
            )
            .await;
        assert!(matches!(response, ServerMessage::Error { code: 404, .. }));
    }

    #[tokio::test]
    async fn test_subscription_tracking() {
        let ws = server();
        let client = Uuid::new_v4();

        ws.subscribe(client, "credits").await.unwrap();
        ws.subscribe(client, "credits").await.unwrap();
        assert_eq!(ws.get_client_channels(client).await, vec!["credits"]);
        assert!(ws.is_client_subscribed(client, "credits").await);

        assert!(ws.subscribe(client, "event:123").await.is_err());

        ws.unsubscribe(client, "credits").await;
        assert!(!ws.is_client_subscribed(client, "credits").await);
        assert!(ws.get_client_channels(client).await.is_empty());
    }
}
