//! Player: registers with the League Manager, then responds to the
//! inbound surface driven by referees and the LM — invitations,
//! parity calls, game-over notifications, and informational pushes.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::league::config::PlayerConfig;
use crate::league::envelope::{Envelope, MessagePayload, Parity};
use crate::league::error::{ErrorCode, ProtocolError};
use crate::league::game::{strategy_by_name, HistoryEntry, Strategy};
use crate::league::server::MessageHandler;
use crate::league::transport::RemoteAgentClient;

struct MatchContext {
    match_id: String,
    round_num: u32,
    opponent_id: String,
}

struct Inner {
    player_id: Option<String>,
    auth_token: Option<String>,
    current_match: Option<MatchContext>,
    history: Vec<HistoryEntry>,
}

pub struct PlayerState {
    config: PlayerConfig,
    strategy: Box<dyn Strategy>,
    inner: RwLock<Inner>,
}

impl PlayerState {
    pub fn new(config: PlayerConfig) -> Self {
        let strategy = strategy_by_name(&config.strategy);
        Self {
            config,
            strategy,
            inner: RwLock::new(Inner {
                player_id: None,
                auth_token: None,
                current_match: None,
                history: Vec::new(),
            }),
        }
    }

    pub async fn register_with_league_manager(&self) -> Result<(), ProtocolError> {
        let client = RemoteAgentClient::new(
            self.config.league_manager_endpoint.clone(),
            self.config.transport_timeout,
        );
        let envelope = Envelope::new(
            format!("player:{}", self.config.player_id),
            MessagePayload::LeagueRegisterRequest {
                name: self.config.player_id.clone(),
                version: "1.0".to_string(),
                endpoint: self.config.endpoint(),
                strategy: Some(self.strategy.name().to_string()),
            },
        );

        let response = client.send(&envelope).await.map_err(|e| {
            ProtocolError::new(ErrorCode::PlayerNotRegistered, format!("registration failed: {}", e))
        })?;

        let reply: Envelope = serde_json::from_value(
            response
                .get("result")
                .cloned()
                .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidMessageFormat, "missing result"))?,
        )
        .map_err(|e| ProtocolError::new(ErrorCode::InvalidMessageFormat, e.to_string()))?;

        match reply.payload {
            MessagePayload::LeagueRegisterResponse {
                player_id,
                auth_token,
                ..
            } => {
                log::info!("registered with league manager as {}", player_id);
                let mut inner = self.inner.write().await;
                inner.player_id = Some(player_id);
                inner.auth_token = Some(auth_token);
                Ok(())
            }
            MessagePayload::LeagueError { error_code, error_description, .. } => {
                Err(ProtocolError::new(
                    ErrorCode::PlayerNotRegistered,
                    format!("league manager rejected registration: {} {}", error_code, error_description),
                ))
            }
            other => Err(ProtocolError::new(
                ErrorCode::InvalidMessageFormat,
                format!("unexpected reply to registration: {}", other.message_type()),
            )),
        }
    }

    fn sender(&self) -> String {
        format!("player:{}", self.config.player_id)
    }
}

#[async_trait]
impl MessageHandler for PlayerState {
    async fn handle(&self, envelope: Envelope) -> Result<MessagePayload, ProtocolError> {
        match envelope.payload {
            MessagePayload::RoundAnnouncement { round_num, .. } => {
                log::debug!("round {} announced", round_num);
                Ok(MessagePayload::Ack { received: true })
            }
            MessagePayload::GameInvitation {
                match_id,
                round_num,
                opponent_id,
                ..
            } => {
                let mut inner = self.inner.write().await;
                inner.current_match = Some(MatchContext {
                    match_id: match_id.clone(),
                    round_num,
                    opponent_id,
                });
                Ok(MessagePayload::GameJoinAck { match_id, accept: true })
            }
            MessagePayload::ChooseParityCall { match_id, opponent_id, .. } => {
                let history_snapshot = self.inner.read().await.history.clone();
                let choice = self.strategy.choose_parity(&opponent_id, &history_snapshot);
                Ok(MessagePayload::ChooseParityResponse { match_id, choice })
            }
            MessagePayload::GameOver {
                match_id,
                round_num,
                opponent_id,
                choices,
                outcome,
                ..
            } => {
                let mut inner = self.inner.write().await;
                let opponent_choice = choices.get(&opponent_id).cloned().unwrap_or(Parity::Even);
                inner.history.push(HistoryEntry {
                    opponent_id,
                    opponent_choice,
                    match_id,
                    round_num,
                    outcome,
                });
                inner.current_match = None;
                Ok(MessagePayload::Ack { received: true })
            }
            MessagePayload::LeagueStandingsUpdate { standings, .. } => {
                log::info!("standings update: {} entries", standings.len());
                Ok(MessagePayload::Ack { received: true })
            }
            MessagePayload::RoundCompleted { round_num, .. } => {
                log::info!("round {} completed", round_num);
                Ok(MessagePayload::Ack { received: true })
            }
            MessagePayload::LeagueCompleted { .. } => {
                log::info!("league completed");
                Ok(MessagePayload::Ack { received: true })
            }
            other => Err(ProtocolError::new(
                ErrorCode::InvalidMessageFormat,
                format!("player does not accept `{}`", other.message_type()),
            )
            .with_original_type(other.message_type())),
        }
    }

    fn sender(&self) -> String {
        self.sender()
    }
}
