//! League Manager: registry, auth issuance, schedule generation, round
//! announcement fan-out, match-result ingestion, standings, and round
//! progression. See the match result ingestion steps in the protocol
//! design for the exact ordering this module follows.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::league::auth::TokenAuthority;
use crate::league::config::LeagueManagerConfig;
use crate::league::envelope::{
    Envelope, MatchStatus, MessagePayload, Outcome, Parity, QueryKind, ScheduledMatch,
    StandingView,
};
use crate::league::error::{ErrorCode, ProtocolError};
use crate::league::repository::{
    FileHistoryRepository, FileMatchRepository, FileStandingsRepository, HistoryRecord,
    HistoryRepository, MatchRepository, MatchResult, StandingsRepository,
};
use crate::league::scheduler::{generate_schedule, generate_schedule_corrected};
use crate::league::server::MessageHandler;
use crate::league::transport::RemoteAgentClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeagueStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone)]
struct AgentRecord {
    id: String,
    endpoint: String,
}

struct Inner {
    status: LeagueStatus,
    referees: HashMap<String, AgentRecord>,
    players: HashMap<String, AgentRecord>,
    /// Player ids in registration order — the pair enumeration for
    /// scheduling must follow this sequence, not a lexicographic sort,
    /// since the two only coincide up to 9 players.
    player_registration_order: Vec<String>,
    next_referee_seq: u32,
    next_player_seq: u32,
    current_round: u32,
    total_rounds: u32,
    matches_by_round: HashMap<u32, Vec<ScheduledMatch>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            status: LeagueStatus::NotStarted,
            referees: HashMap::new(),
            players: HashMap::new(),
            player_registration_order: Vec::new(),
            next_referee_seq: 1,
            next_player_seq: 1,
            current_round: 0,
            total_rounds: 0,
            matches_by_round: HashMap::new(),
        }
    }
}

pub struct LeagueManagerState {
    config: LeagueManagerConfig,
    authority: TokenAuthority,
    inner: tokio::sync::Mutex<Inner>,
    standings_repo: Arc<dyn StandingsRepository>,
    match_repo: Arc<dyn MatchRepository>,
    history_repo: Arc<dyn HistoryRepository>,
}

impl LeagueManagerState {
    pub fn new(config: LeagueManagerConfig) -> Self {
        let standings_repo = Arc::new(FileStandingsRepository::new(&config.data_dir));
        let match_repo = Arc::new(FileMatchRepository::new(&config.data_dir));
        let history_repo = Arc::new(FileHistoryRepository::new(&config.data_dir));
        Self {
            authority: TokenAuthority::generate(),
            inner: tokio::sync::Mutex::new(Inner::new()),
            standings_repo,
            match_repo,
            history_repo,
            config,
        }
    }

    fn sender(&self) -> String {
        "league_manager:LM".to_string()
    }

    pub async fn register_referee(
        &self,
        name: &str,
        endpoint: &str,
    ) -> Result<(String, String), ProtocolError> {
        let mut inner = self.inner.lock().await;
        if inner.status != LeagueStatus::NotStarted {
            return Err(ProtocolError::new(
                ErrorCode::LeagueAlreadyStarted,
                "cannot register after the league has started",
            ));
        }
        let id = format!("REF{:02}", inner.next_referee_seq);
        inner.next_referee_seq += 1;
        let token = self.authority.issue(&id, &self.config.league_id);
        inner.referees.insert(
            id.clone(),
            AgentRecord {
                id: id.clone(),
                endpoint: endpoint.to_string(),
            },
        );
        log::info!("registered referee {} ({}) at {}", id, name, endpoint);
        Ok((id, token))
    }

    pub async fn register_player(
        &self,
        name: &str,
        endpoint: &str,
    ) -> Result<(String, String), ProtocolError> {
        let mut inner = self.inner.lock().await;
        if inner.status != LeagueStatus::NotStarted {
            return Err(ProtocolError::new(
                ErrorCode::LeagueAlreadyStarted,
                "cannot register after the league has started",
            ));
        }
        let id = format!("P{:02}", inner.next_player_seq);
        inner.next_player_seq += 1;
        let token = self.authority.issue(&id, &self.config.league_id);
        inner.players.insert(
            id.clone(),
            AgentRecord {
                id: id.clone(),
                endpoint: endpoint.to_string(),
            },
        );
        inner.player_registration_order.push(id.clone());
        self.standings_repo.initialize_player(&id).await;
        log::info!("registered player {} ({}) at {}", id, name, endpoint);
        Ok((id, token))
    }

    /// `START_LEAGUE`: build the schedule, assign referees round-robin,
    /// initialize standings, and return the round-1 match list for the
    /// caller to fan out.
    pub async fn start_league(&self) -> Result<Vec<ScheduledMatch>, ProtocolError> {
        let mut inner = self.inner.lock().await;
        if inner.status != LeagueStatus::NotStarted {
            return Err(ProtocolError::new(
                ErrorCode::LeagueAlreadyStarted,
                "league has already started",
            ));
        }
        if inner.players.len() < 2 {
            return Err(ProtocolError::new(
                ErrorCode::NotEnoughPlayers,
                "at least 2 players must be registered to start a league",
            ));
        }

        let player_ids: Vec<String> = inner.player_registration_order.clone();

        let planned = if self.config.use_corrected_schedule {
            generate_schedule_corrected(&player_ids)
        } else {
            generate_schedule(&player_ids)
        };

        let referee_ids: Vec<String> = {
            let mut ids: Vec<String> = inner.referees.keys().cloned().collect();
            ids.sort();
            ids
        };

        let mut matches_by_round: HashMap<u32, Vec<ScheduledMatch>> = HashMap::new();
        let mut total_rounds = 0u32;
        for (i, m) in planned.iter().enumerate() {
            total_rounds = total_rounds.max(m.round_num);
            let referee_idx = if referee_ids.is_empty() { 0 } else { i % referee_ids.len() };
            let referee_id = referee_ids.get(referee_idx).cloned().unwrap_or_default();
            let referee_endpoint = inner
                .referees
                .get(&referee_id)
                .map(|r| r.endpoint.clone())
                .unwrap_or_default();
            let player_a_endpoint = inner
                .players
                .get(&m.player_a)
                .map(|p| p.endpoint.clone())
                .unwrap_or_default();
            let player_b_endpoint = inner
                .players
                .get(&m.player_b)
                .map(|p| p.endpoint.clone())
                .unwrap_or_default();
            matches_by_round.entry(m.round_num).or_default().push(ScheduledMatch {
                match_id: format!("R{}M{}", m.round_num, m.match_num),
                player_a: m.player_a.clone(),
                player_a_endpoint,
                player_b: m.player_b.clone(),
                player_b_endpoint,
                referee_id,
                referee_endpoint,
            });
        }

        inner.matches_by_round = matches_by_round;
        inner.total_rounds = total_rounds;
        inner.current_round = 1;
        inner.status = LeagueStatus::InProgress;

        let round_one = inner
            .matches_by_round
            .get(&1)
            .cloned()
            .unwrap_or_default();
        log::info!(
            "league {} started: {} players, {} rounds",
            self.config.league_id,
            player_ids.len(),
            total_rounds
        );
        Ok(round_one)
    }

    /// Fan out `ROUND_ANNOUNCEMENT` for `round_num` to every registered
    /// referee and player.
    pub async fn announce_round(&self, round_num: u32) {
        let (matches, recipients) = {
            let inner = self.inner.lock().await;
            let matches = inner.matches_by_round.get(&round_num).cloned().unwrap_or_default();
            let mut recipients: Vec<String> = inner.referees.values().map(|r| r.endpoint.clone()).collect();
            recipients.extend(inner.players.values().map(|p| p.endpoint.clone()));
            (matches, recipients)
        };

        let payload = MessagePayload::RoundAnnouncement {
            league_id: self.config.league_id.clone(),
            round_num,
            matches,
        };
        let envelope = Envelope::new(self.sender(), payload);

        for endpoint in recipients {
            let envelope = envelope.clone();
            let client = RemoteAgentClient::new(endpoint.clone(), self.config.transport_timeout);
            tokio::spawn(async move {
                if let Err(e) = client.send(&envelope).await {
                    log::warn!("failed to deliver ROUND_ANNOUNCEMENT to {}: {}", endpoint, e);
                }
            });
        }
    }

    async fn push_standings_update(&self) {
        let standings = self.standings_repo.get_standings().await;
        let views: Vec<StandingView> = standings
            .into_iter()
            .map(|s| StandingView {
                player_id: s.player_id,
                wins: s.wins,
                losses: s.losses,
                draws: s.draws,
                points: s.points,
                rank: s.rank,
            })
            .collect();

        let recipients: Vec<String> = {
            let inner = self.inner.lock().await;
            inner.players.values().map(|p| p.endpoint.clone()).collect()
        };
        let payload = MessagePayload::LeagueStandingsUpdate {
            league_id: self.config.league_id.clone(),
            standings: views,
        };
        let envelope = Envelope::new(self.sender(), payload);
        for endpoint in recipients {
            let envelope = envelope.clone();
            let client = RemoteAgentClient::new(endpoint.clone(), self.config.transport_timeout);
            tokio::spawn(async move {
                let _ = client.send(&envelope).await;
            });
        }
    }

    /// `MATCH_RESULT_REPORT` ingestion, steps 1-7 of the protocol
    /// design. Returns the ack payload to send back to the reporting
    /// referee.
    pub async fn ingest_match_result(
        &self,
        auth_token: &str,
        match_id: &str,
        round_num: u32,
        player_a: &str,
        player_b: &str,
        winner: Option<&str>,
        score: &HashMap<String, i64>,
    ) -> Result<MessagePayload, ProtocolError> {
        let referee_id_for_auth = {
            let inner = self.inner.lock().await;
            inner
                .matches_by_round
                .get(&round_num)
                .and_then(|matches| matches.iter().find(|m| m.match_id == match_id))
                .map(|m| m.referee_id.clone())
        };
        let referee_id = referee_id_for_auth.ok_or_else(|| {
            ProtocolError::new(ErrorCode::MatchNotFound, format!("no such match `{}`", match_id))
        })?;

        if !self
            .authority
            .validate(&referee_id, &self.config.league_id, auth_token)
        {
            return Err(ProtocolError::new(
                ErrorCode::AuthTokenInvalid,
                "auth token does not match the referee assigned to this match",
            ));
        }

        let applied = self
            .standings_repo
            .update_match_result(match_id, player_a, player_b, winner, score)
            .await;

        if applied {
            self.match_repo
                .save_match(MatchResult {
                    match_id: match_id.to_string(),
                    round_num,
                    player_a: player_a.to_string(),
                    player_b: player_b.to_string(),
                    winner: winner.map(|w| w.to_string()),
                    score: score.clone(),
                })
                .await;

            for (self_id, opponent_id) in [(player_a, player_b), (player_b, player_a)] {
                let outcome = match winner {
                    None => Outcome::Draw,
                    Some(w) if w == self_id => Outcome::Win,
                    Some(_) => Outcome::Loss,
                };
                self.history_repo
                    .append(HistoryRecord {
                        player_id: self_id.to_string(),
                        opponent_id: opponent_id.to_string(),
                        match_id: match_id.to_string(),
                        round_num,
                        outcome: format!("{:?}", outcome),
                    })
                    .await;
            }

            self.push_standings_update().await;
            self.maybe_advance_round(round_num).await;
        }

        Ok(MessagePayload::Ack { received: true })
    }

    /// A round is complete exactly when every one of its scheduled
    /// matches has a recorded result (Invariant 6) — checked directly
    /// against the match repository, which is the source of truth for
    /// "has this match reported".
    async fn maybe_advance_round(&self, round_num: u32) {
        let (total_in_round, match_ids): (usize, Vec<String>) = {
            let inner = self.inner.lock().await;
            let matches = inner.matches_by_round.get(&round_num).cloned().unwrap_or_default();
            (matches.len(), matches.into_iter().map(|m| m.match_id).collect())
        };

        let mut done = 0;
        for id in &match_ids {
            if self.match_repo.has_match(id).await {
                done += 1;
            }
        }

        if done < total_in_round {
            return; // round not complete yet
        }

        let (is_final_round, next_round, total_rounds) = {
            let mut inner = self.inner.lock().await;
            let is_final = round_num >= inner.total_rounds;
            if !is_final {
                inner.current_round = round_num + 1;
            } else {
                inner.status = LeagueStatus::Completed;
            }
            (is_final, inner.current_round, inner.total_rounds)
        };
        let _ = total_rounds;

        let recipients: Vec<String> = {
            let inner = self.inner.lock().await;
            let mut r: Vec<String> = inner.referees.values().map(|x| x.endpoint.clone()).collect();
            r.extend(inner.players.values().map(|x| x.endpoint.clone()));
            r
        };

        if is_final_round {
            let standings = self.standings_repo.get_standings().await;
            let views: Vec<StandingView> = standings
                .into_iter()
                .map(|s| StandingView {
                    player_id: s.player_id,
                    wins: s.wins,
                    losses: s.losses,
                    draws: s.draws,
                    points: s.points,
                    rank: s.rank,
                })
                .collect();
            let payload = MessagePayload::LeagueCompleted {
                league_id: self.config.league_id.clone(),
                final_standings: views,
            };
            let envelope = Envelope::new(self.sender(), payload);
            log::info!("league {} completed", self.config.league_id);
            for endpoint in recipients {
                let envelope = envelope.clone();
                let client = RemoteAgentClient::new(endpoint.clone(), self.config.transport_timeout);
                tokio::spawn(async move {
                    let _ = client.send(&envelope).await;
                });
            }
        } else {
            let payload = MessagePayload::RoundCompleted {
                league_id: self.config.league_id.clone(),
                round_num,
            };
            let envelope = Envelope::new(self.sender(), payload);
            for endpoint in recipients {
                let envelope = envelope.clone();
                let client = RemoteAgentClient::new(endpoint.clone(), self.config.transport_timeout);
                tokio::spawn(async move {
                    let _ = client.send(&envelope).await;
                });
            }
            log::info!("round {} completed, announcing round {}", round_num, next_round);
            self.announce_round(next_round).await;
        }
    }

    /// Validates `auth_token` against `agent_id` (the `sender` id
    /// portion) before a `LEAGUE_QUERY` is dispatched — queries are
    /// read-only but still require a valid token (Testable Scenario 3).
    pub async fn authorize_query(&self, agent_id: &str, auth_token: &str) -> Result<(), ProtocolError> {
        if self.authority.validate(agent_id, &self.config.league_id, auth_token) {
            Ok(())
        } else {
            Err(ProtocolError::new(
                ErrorCode::AuthTokenInvalid,
                "auth token does not match the querying agent",
            ))
        }
    }

    pub async fn handle_query(&self, query: QueryKind) -> serde_json::Value {
        match query {
            QueryKind::Standings => {
                let standings = self.standings_repo.get_standings().await;
                json!(standings)
            }
            QueryKind::Schedule => {
                let inner = self.inner.lock().await;
                json!(inner.matches_by_round)
            }
            QueryKind::Status => {
                let inner = self.inner.lock().await;
                json!({
                    "status": inner.status,
                    "current_round": inner.current_round,
                    "total_rounds": inner.total_rounds,
                })
            }
        }
    }
}

#[async_trait]
impl MessageHandler for LeagueManagerState {
    async fn handle(&self, envelope: Envelope) -> Result<MessagePayload, ProtocolError> {
        let sender_id = envelope.sender_id().to_string();
        match envelope.payload {
            MessagePayload::RefereeRegisterRequest { name, endpoint, .. } => {
                let (referee_id, auth_token) = self.register_referee(&name, &endpoint).await?;
                Ok(MessagePayload::RefereeRegisterResponse {
                    referee_id,
                    auth_token,
                    league_id: self.config.league_id.clone(),
                    status: "ACCEPTED".to_string(),
                })
            }
            MessagePayload::LeagueRegisterRequest { name, endpoint, .. } => {
                let (player_id, auth_token) = self.register_player(&name, &endpoint).await?;
                Ok(MessagePayload::LeagueRegisterResponse {
                    player_id,
                    auth_token,
                    league_id: self.config.league_id.clone(),
                    status: "ACCEPTED".to_string(),
                })
            }
            MessagePayload::StartLeague { .. } => {
                let round_one = self.start_league().await?;
                self.announce_round(1).await;
                Ok(MessagePayload::RoundAnnouncement {
                    league_id: self.config.league_id.clone(),
                    round_num: 1,
                    matches: round_one,
                })
            }
            MessagePayload::MatchResultReport {
                auth_token,
                match_id,
                round_num,
                player_a,
                player_b,
                winner,
                score,
                ..
            } => {
                self.ingest_match_result(
                    &auth_token,
                    &match_id,
                    round_num,
                    &player_a,
                    &player_b,
                    winner.as_deref(),
                    &score,
                )
                .await
            }
            MessagePayload::LeagueQuery { auth_token, query, .. } => {
                self.authorize_query(&sender_id, &auth_token).await?;
                let result = self.handle_query(query.clone()).await;
                Ok(MessagePayload::LeagueQueryResponse {
                    league_id: self.config.league_id.clone(),
                    query,
                    result,
                })
            }
            other => Err(ProtocolError::new(
                ErrorCode::InvalidMessageFormat,
                format!("league manager does not accept `{}`", other.message_type()),
            )
            .with_original_type(other.message_type())),
        }
    }

    fn sender(&self) -> String {
        self.sender()
    }
}

// The Status query's wire vocabulary (`NOT_STARTED`/`IN_PROGRESS`/
// `COMPLETED`), distinct from the Rust-side variant names.
impl serde::Serialize for LeagueStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(match self {
            LeagueStatus::NotStarted => "NOT_STARTED",
            LeagueStatus::InProgress => "IN_PROGRESS",
            LeagueStatus::Completed => "COMPLETED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> LeagueManagerConfig {
        LeagueManagerConfig {
            league_id: "L1".to_string(),
            port: 0,
            data_dir: std::env::temp_dir()
                .join(format!("league-test-{}", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .to_string(),
            log_dir: "./logs".to_string(),
            transport_timeout: Duration::from_secs(1),
            use_corrected_schedule: false,
        }
    }

    #[tokio::test]
    async fn start_league_rejects_fewer_than_two_players() {
        let lm = LeagueManagerState::new(config());
        lm.register_player("solo", "http://127.0.0.1:1").await.unwrap();
        let err = lm.start_league().await.unwrap_err();
        assert_eq!(err.error_code.code(), "E005");
    }

    #[tokio::test]
    async fn start_league_generates_one_round_for_two_players() {
        let lm = LeagueManagerState::new(config());
        lm.register_player("p1", "http://127.0.0.1:1").await.unwrap();
        lm.register_player("p2", "http://127.0.0.1:2").await.unwrap();
        let round_one = lm.start_league().await.unwrap();
        assert_eq!(round_one.len(), 1);
    }

    #[tokio::test]
    async fn registration_after_start_is_rejected() {
        let lm = LeagueManagerState::new(config());
        lm.register_player("p1", "http://127.0.0.1:1").await.unwrap();
        lm.register_player("p2", "http://127.0.0.1:2").await.unwrap();
        lm.start_league().await.unwrap();
        let err = lm.register_player("p3", "http://127.0.0.1:3").await.unwrap_err();
        assert_eq!(err.error_code.code(), "E021");
    }

    #[tokio::test]
    async fn duplicate_match_result_is_idempotent() {
        let lm = LeagueManagerState::new(config());
        let (_, ref_token) = lm.register_referee("ref", "http://127.0.0.1:9").await.unwrap();
        lm.register_player("p1", "http://127.0.0.1:1").await.unwrap();
        lm.register_player("p2", "http://127.0.0.1:2").await.unwrap();
        lm.start_league().await.unwrap();

        let matches = {
            let inner = lm.inner.lock().await;
            inner.matches_by_round.get(&1).cloned().unwrap()
        };
        let m = &matches[0];

        lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
            .await
            .unwrap();
        let first = lm.standings_repo.get_standings().await;

        lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
            .await
            .unwrap();
        let second = lm.standings_repo.get_standings().await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn wrong_auth_token_is_rejected_without_mutating_standings() {
        let lm = LeagueManagerState::new(config());
        lm.register_referee("ref", "http://127.0.0.1:9").await.unwrap();
        lm.register_player("p1", "http://127.0.0.1:1").await.unwrap();
        lm.register_player("p2", "http://127.0.0.1:2").await.unwrap();
        lm.start_league().await.unwrap();

        let matches = {
            let inner = lm.inner.lock().await;
            inner.matches_by_round.get(&1).cloned().unwrap()
        };
        let m = &matches[0];
        let before = lm.standings_repo.get_standings().await;

        let err = lm
            .ingest_match_result("wrong-token", &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.error_code.code(), "E012");

        let after = lm.standings_repo.get_standings().await;
        assert_eq!(before, after);
    }
}
