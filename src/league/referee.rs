//! Referee: registers with the League Manager, then for each match
//! assigned to it in a `ROUND_ANNOUNCEMENT`, drives the match
//! micro-protocol end to end (invite, choose, adjudicate, report).
//!
//! [`run_match`] always removes its match id from the active-match set
//! before returning, regardless of which path `run_match_inner` took
//! to get there (success or an early abandon), so a referee's capacity
//! is never leaked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::league::config::RefereeConfig;
use crate::league::envelope::{Envelope, MatchRole, MessagePayload, Outcome, Parity, ScheduledMatch};
use crate::league::error::{ErrorCode, ProtocolError};
use crate::league::game::{self, PlayerSlot};
use crate::league::server::MessageHandler;
use crate::league::transport::RemoteAgentClient;

#[derive(Debug, Clone)]
struct RefereeIdentity {
    referee_id: String,
    auth_token: String,
}

pub struct RefereeState {
    config: RefereeConfig,
    identity: RwLock<Option<RefereeIdentity>>,
    active_matches: Arc<Mutex<HashSet<String>>>,
}

impl RefereeState {
    pub fn new(config: RefereeConfig) -> Self {
        Self {
            config,
            identity: RwLock::new(None),
            active_matches: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn register_with_league_manager(&self) -> Result<(), ProtocolError> {
        let client = RemoteAgentClient::new(
            self.config.league_manager_endpoint.clone(),
            self.config.transport_timeout,
        );
        let envelope = Envelope::new(
            format!("referee:{}", self.config.referee_id),
            MessagePayload::RefereeRegisterRequest {
                name: self.config.referee_id.clone(),
                version: "1.0".to_string(),
                endpoint: self.endpoint(),
            },
        );

        let response = client.send(&envelope).await.map_err(|e| {
            ProtocolError::new(ErrorCode::RefereeNotRegistered, format!("registration failed: {}", e))
        })?;

        let reply: Envelope = serde_json::from_value(
            response
                .get("result")
                .cloned()
                .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidMessageFormat, "missing result"))?,
        )
        .map_err(|e| ProtocolError::new(ErrorCode::InvalidMessageFormat, e.to_string()))?;

        match reply.payload {
            MessagePayload::RefereeRegisterResponse {
                referee_id,
                auth_token,
                ..
            } => {
                log::info!("registered with league manager as {}", referee_id);
                *self.identity.write().await = Some(RefereeIdentity {
                    referee_id,
                    auth_token,
                });
                Ok(())
            }
            MessagePayload::LeagueError { error_code, error_description, .. } => {
                Err(ProtocolError::new(
                    ErrorCode::RefereeNotRegistered,
                    format!("league manager rejected registration: {} {}", error_code, error_description),
                ))
            }
            other => Err(ProtocolError::new(
                ErrorCode::InvalidMessageFormat,
                format!("unexpected reply to registration: {}", other.message_type()),
            )),
        }
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    fn sender(&self) -> String {
        format!("referee:{}", self.config.referee_id)
    }

    async fn handle_round_announcement(
        &self,
        round_num: u32,
        matches: Vec<ScheduledMatch>,
    ) -> Result<MessagePayload, ProtocolError> {
        let own_endpoint = self.endpoint();
        let mine: Vec<ScheduledMatch> = matches
            .into_iter()
            .filter(|m| m.referee_endpoint == own_endpoint)
            .collect();

        let identity = self.identity.read().await.clone().ok_or_else(|| {
            ProtocolError::new(ErrorCode::RefereeNotRegistered, "referee has not registered yet")
        })?;

        for m in mine {
            let mut active = self.active_matches.lock().await;
            if active.len() >= self.config.max_concurrent_matches {
                log::warn!(
                    "at capacity ({} active), skipping match {} this round",
                    self.config.max_concurrent_matches,
                    m.match_id
                );
                continue;
            }
            active.insert(m.match_id.clone());
            drop(active);

            let active_matches = Arc::clone(&self.active_matches);
            let league_manager_endpoint = self.config.league_manager_endpoint.clone();
            let league_id = self.config.league_id.clone();
            let auth_token = identity.auth_token.clone();
            let transport_timeout = self.config.transport_timeout;
            let choose_parity_deadline = self.config.choose_parity_deadline;
            let sender = self.sender();

            tokio::spawn(async move {
                run_match(
                    m,
                    round_num,
                    sender,
                    league_id,
                    auth_token,
                    league_manager_endpoint,
                    transport_timeout,
                    choose_parity_deadline,
                    active_matches,
                )
                .await;
            });
        }

        Ok(MessagePayload::Ack { received: true })
    }
}

#[async_trait]
impl MessageHandler for RefereeState {
    async fn handle(&self, envelope: Envelope) -> Result<MessagePayload, ProtocolError> {
        match envelope.payload {
            MessagePayload::RoundAnnouncement { round_num, matches, .. } => {
                self.handle_round_announcement(round_num, matches).await
            }
            MessagePayload::LeagueCompleted { .. } => {
                log::info!("league completed, referee {} shutting down match intake", self.config.referee_id);
                Ok(MessagePayload::Ack { received: true })
            }
            other => Err(ProtocolError::new(
                ErrorCode::InvalidMessageFormat,
                format!("referee does not accept `{}`", other.message_type()),
            )
            .with_original_type(other.message_type())),
        }
    }

    fn sender(&self) -> String {
        self.sender()
    }
}

/// Drives one match through `Inviting -> Choosing -> Adjudicating ->
/// Reporting -> Done` (or aborts to an implicit `Abandoned` terminal
/// state). The active-match-id entry made by the caller is always
/// released before this function returns, on every path.
async fn run_match(
    m: ScheduledMatch,
    round_num: u32,
    sender: String,
    league_id: String,
    auth_token: String,
    league_manager_endpoint: String,
    transport_timeout: Duration,
    choose_parity_deadline: Duration,
    active_matches: Arc<Mutex<HashSet<String>>>,
) {
    let result = run_match_inner(
        &m,
        round_num,
        &sender,
        &league_id,
        &auth_token,
        &league_manager_endpoint,
        transport_timeout,
        choose_parity_deadline,
    )
    .await;
    if let Err(reason) = result {
        log::warn!("match {} abandoned: {}", m.match_id, reason);
    }
    active_matches.lock().await.remove(&m.match_id);
}

async fn run_match_inner(
    m: &ScheduledMatch,
    round_num: u32,
    sender: &str,
    league_id: &str,
    auth_token: &str,
    league_manager_endpoint: &str,
    transport_timeout: Duration,
    choose_parity_deadline: Duration,
) -> Result<(), String> {
    let client_a = RemoteAgentClient::new(m.player_a_endpoint.clone(), transport_timeout);
    let client_b = RemoteAgentClient::new(m.player_b_endpoint.clone(), transport_timeout);

    // Step 1: invite
    let invite_a = Envelope::new(
        sender.to_string(),
        MessagePayload::GameInvitation {
            league_id: league_id.to_string(),
            match_id: m.match_id.clone(),
            round_num,
            game_type: "even_odd".to_string(),
            role_in_match: MatchRole::PlayerA,
            opponent_id: m.player_b.clone(),
            referee_endpoint: m.referee_endpoint.clone(),
        },
    );
    let invite_b = Envelope::new(
        sender.to_string(),
        MessagePayload::GameInvitation {
            league_id: league_id.to_string(),
            match_id: m.match_id.clone(),
            round_num,
            game_type: "even_odd".to_string(),
            role_in_match: MatchRole::PlayerB,
            opponent_id: m.player_a.clone(),
            referee_endpoint: m.referee_endpoint.clone(),
        },
    );

    let ack_a = client_a.send(&invite_a).await.map_err(|e| e.to_string())?;
    let ack_b = client_b.send(&invite_b).await.map_err(|e| e.to_string())?;
    require_accept(&ack_a)?;
    require_accept(&ack_b)?;

    // Step 2: choose, with an application-level deadline independent of
    // the per-call transport timeout.
    let deadline = deadline_string(choose_parity_deadline);
    let call_a = Envelope::new(
        sender.to_string(),
        MessagePayload::ChooseParityCall {
            match_id: m.match_id.clone(),
            player_id: m.player_a.clone(),
            opponent_id: m.player_b.clone(),
            round_num,
            deadline: deadline.clone(),
        },
    );
    let call_b = Envelope::new(
        sender.to_string(),
        MessagePayload::ChooseParityCall {
            match_id: m.match_id.clone(),
            player_id: m.player_b.clone(),
            opponent_id: m.player_a.clone(),
            round_num,
            deadline,
        },
    );

    let (choice_a, choice_b) = tokio::time::timeout(choose_parity_deadline, async {
        let response_a = client_a.send(&call_a).await.map_err(|e| e.to_string())?;
        let response_b = client_b.send(&call_b).await.map_err(|e| e.to_string())?;
        let choice_a = extract_choice(&response_a)?;
        let choice_b = extract_choice(&response_b)?;
        Ok::<(Parity, Parity), String>((choice_a, choice_b))
    })
    .await
    .map_err(|_| "choose-parity deadline exceeded".to_string())??;

    // Step 3: adjudicate
    let game_result = game::play_round(&choice_a, &choice_b);
    let outcome_a = game::outcome_for(PlayerSlot::A, &game_result);
    let outcome_b = game::outcome_for(PlayerSlot::B, &game_result);

    let mut choices = HashMap::new();
    choices.insert(m.player_a.clone(), choice_a);
    choices.insert(m.player_b.clone(), choice_b);

    let over_a = Envelope::new(
        sender.to_string(),
        MessagePayload::GameOver {
            match_id: m.match_id.clone(),
            round_num,
            opponent_id: m.player_b.clone(),
            choices: choices.clone(),
            drawn_number: game_result.drawn_number,
            drawn_parity: game_result.drawn_parity.clone(),
            outcome: outcome_a.clone(),
        },
    );
    let over_b = Envelope::new(
        sender.to_string(),
        MessagePayload::GameOver {
            match_id: m.match_id.clone(),
            round_num,
            opponent_id: m.player_a.clone(),
            choices,
            drawn_number: game_result.drawn_number,
            drawn_parity: game_result.drawn_parity,
            outcome: outcome_b,
        },
    );
    if let Err(e) = client_a.send(&over_a).await {
        log::warn!("failed delivering GAME_OVER to player_a for {}: {}", m.match_id, e);
    }
    if let Err(e) = client_b.send(&over_b).await {
        log::warn!("failed delivering GAME_OVER to player_b for {}: {}", m.match_id, e);
    }

    // Step 5 (step 4 was adjudication above): report to the LM
    let winner = match outcome_a {
        Outcome::Win => Some(m.player_a.clone()),
        _ if outcome_b == Outcome::Win => Some(m.player_b.clone()),
        _ => None,
    };
    let mut score = HashMap::new();
    score.insert(
        m.player_a.clone(),
        match outcome_a {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        },
    );
    score.insert(
        m.player_b.clone(),
        match outcome_b {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        },
    );
    let report = Envelope::new(
        sender.to_string(),
        MessagePayload::MatchResultReport {
            league_id: league_id.to_string(),
            auth_token: auth_token.to_string(),
            match_id: m.match_id.clone(),
            round_num,
            player_a: m.player_a.clone(),
            player_b: m.player_b.clone(),
            winner,
            score,
            status: crate::league::envelope::MatchStatus::Completed,
        },
    );
    let lm_client = RemoteAgentClient::new(league_manager_endpoint.to_string(), transport_timeout);
    lm_client.send(&report).await.map_err(|e| e.to_string())?;

    Ok(())
}

/// The wire-level deadline stamped on `CHOOSE_PARITY_CALL`: now plus
/// the configured choose-parity window, in the same UTC `Z`-suffixed
/// form every envelope timestamp uses.
fn deadline_string(choose_parity_deadline: Duration) -> String {
    let deadline = chrono::Utc::now()
        + chrono::Duration::from_std(choose_parity_deadline).unwrap_or(chrono::Duration::seconds(30));
    deadline.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

fn require_accept(response: &serde_json::Value) -> Result<(), String> {
    let result = response.get("result").ok_or("missing result")?;
    let accept = result.get("accept").and_then(|v| v.as_bool()).unwrap_or(false);
    if accept {
        Ok(())
    } else {
        Err("player declined the invitation".to_string())
    }
}

fn extract_choice(response: &serde_json::Value) -> Result<Parity, String> {
    let result = response.get("result").ok_or("missing result")?;
    let choice = result.get("choice").ok_or("missing choice")?;
    serde_json::from_value(choice.clone()).map_err(|e| e.to_string())
}
