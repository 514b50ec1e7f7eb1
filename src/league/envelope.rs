//! The `league.v2` message envelope and the tagged sum type of message
//! payloads it carries.
//!
//! Every wire message shares one envelope (protocol version, sender,
//! timestamp, conversation id) wrapping exactly one [`MessagePayload`]
//! variant, discriminated by its own `message_type` tag rather than a
//! dynamically-typed attribute bag.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::league::error::{ErrorCode, ProtocolError};

pub const PROTOCOL_VERSION: &str = "league.v2";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(n: u32) -> Parity {
        if n % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Completed,
    TechnicalLoss,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Standings,
    Schedule,
    Status,
}

/// Which side of a match a player was assigned, carried on
/// `GAME_INVITATION` so the player learns its role without guessing it
/// from the opponent id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchRole {
    PlayerA,
    PlayerB,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledMatch {
    pub match_id: String,
    pub player_a: String,
    pub player_a_endpoint: String,
    pub player_b: String,
    pub player_b_endpoint: String,
    pub referee_id: String,
    pub referee_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandingView {
    pub player_id: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: u32,
    pub rank: u32,
}

/// The envelope shared by every message, wrapping one tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub protocol: String,
    pub sender: String,
    pub timestamp: String,
    pub conversation_id: String,
    #[serde(flatten)]
    pub payload: MessagePayload,
}

impl Envelope {
    pub fn new(sender: impl Into<String>, payload: MessagePayload) -> Self {
        Self {
            protocol: PROTOCOL_VERSION.to_string(),
            sender: sender.into(),
            timestamp: crate::league::now_utc_string(),
            conversation_id: uuid::Uuid::new_v4().to_string(),
            payload,
        }
    }

    /// The id portion of `sender`, i.e. everything after the last `:`.
    /// `sender` is always `"<kind>:<id>"` (e.g. `"player:P01"`).
    pub fn sender_id(&self) -> &str {
        self.sender.rsplit(':').next().unwrap_or(&self.sender)
    }

    pub fn message_type(&self) -> &'static str {
        self.payload.message_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "message_type")]
pub enum MessagePayload {
    #[serde(rename = "REFEREE_REGISTER_REQUEST")]
    RefereeRegisterRequest {
        name: String,
        version: String,
        endpoint: String,
    },
    #[serde(rename = "REFEREE_REGISTER_RESPONSE")]
    RefereeRegisterResponse {
        referee_id: String,
        auth_token: String,
        league_id: String,
        status: String,
    },
    #[serde(rename = "LEAGUE_REGISTER_REQUEST")]
    LeagueRegisterRequest {
        name: String,
        version: String,
        endpoint: String,
        #[serde(default)]
        strategy: Option<String>,
    },
    #[serde(rename = "LEAGUE_REGISTER_RESPONSE")]
    LeagueRegisterResponse {
        player_id: String,
        auth_token: String,
        league_id: String,
        status: String,
    },
    #[serde(rename = "START_LEAGUE")]
    StartLeague { league_id: String },
    #[serde(rename = "ROUND_ANNOUNCEMENT")]
    RoundAnnouncement {
        league_id: String,
        round_num: u32,
        matches: Vec<ScheduledMatch>,
    },
    #[serde(rename = "GAME_INVITATION")]
    GameInvitation {
        league_id: String,
        match_id: String,
        round_num: u32,
        game_type: String,
        role_in_match: MatchRole,
        opponent_id: String,
        referee_endpoint: String,
    },
    #[serde(rename = "GAME_JOIN_ACK")]
    GameJoinAck { match_id: String, accept: bool },
    #[serde(rename = "CHOOSE_PARITY_CALL")]
    ChooseParityCall {
        match_id: String,
        player_id: String,
        opponent_id: String,
        round_num: u32,
        /// Application-level deadline (ISO-8601 UTC), independent of the
        /// transport-layer call timeout.
        deadline: String,
    },
    #[serde(rename = "CHOOSE_PARITY_RESPONSE")]
    ChooseParityResponse { match_id: String, choice: Parity },
    #[serde(rename = "GAME_OVER")]
    GameOver {
        match_id: String,
        round_num: u32,
        opponent_id: String,
        /// Both players' picks, keyed by player id. Identical on the
        /// copy sent to each player; a recipient derives "my choice" and
        /// "opponent's choice" by indexing with the ids it already knows.
        choices: HashMap<String, Parity>,
        drawn_number: u32,
        drawn_parity: Parity,
        outcome: Outcome,
    },
    #[serde(rename = "MATCH_RESULT_REPORT")]
    MatchResultReport {
        league_id: String,
        auth_token: String,
        match_id: String,
        round_num: u32,
        player_a: String,
        player_b: String,
        winner: Option<String>,
        /// Points the referee is awarding each player for this match,
        /// keyed by player id. The standings layer sums these rather
        /// than assuming a fixed win/draw/loss point value.
        score: HashMap<String, i64>,
        status: MatchStatus,
    },
    #[serde(rename = "LEAGUE_STANDINGS_UPDATE")]
    LeagueStandingsUpdate {
        league_id: String,
        standings: Vec<StandingView>,
    },
    #[serde(rename = "ROUND_COMPLETED")]
    RoundCompleted { league_id: String, round_num: u32 },
    #[serde(rename = "LEAGUE_COMPLETED")]
    LeagueCompleted {
        league_id: String,
        final_standings: Vec<StandingView>,
    },
    #[serde(rename = "LEAGUE_QUERY")]
    LeagueQuery {
        league_id: String,
        auth_token: String,
        query: QueryKind,
    },
    #[serde(rename = "LEAGUE_QUERY_RESPONSE")]
    LeagueQueryResponse {
        league_id: String,
        query: QueryKind,
        result: Value,
    },
    #[serde(rename = "LEAGUE_ERROR")]
    LeagueError {
        error_code: String,
        error_description: String,
        original_message_type: Option<String>,
        context: Option<Value>,
    },
    #[serde(rename = "ACK")]
    Ack { received: bool },
}

impl MessagePayload {
    pub fn message_type(&self) -> &'static str {
        match self {
            MessagePayload::RefereeRegisterRequest { .. } => "REFEREE_REGISTER_REQUEST",
            MessagePayload::RefereeRegisterResponse { .. } => "REFEREE_REGISTER_RESPONSE",
            MessagePayload::LeagueRegisterRequest { .. } => "LEAGUE_REGISTER_REQUEST",
            MessagePayload::LeagueRegisterResponse { .. } => "LEAGUE_REGISTER_RESPONSE",
            MessagePayload::StartLeague { .. } => "START_LEAGUE",
            MessagePayload::RoundAnnouncement { .. } => "ROUND_ANNOUNCEMENT",
            MessagePayload::GameInvitation { .. } => "GAME_INVITATION",
            MessagePayload::GameJoinAck { .. } => "GAME_JOIN_ACK",
            MessagePayload::ChooseParityCall { .. } => "CHOOSE_PARITY_CALL",
            MessagePayload::ChooseParityResponse { .. } => "CHOOSE_PARITY_RESPONSE",
            MessagePayload::GameOver { .. } => "GAME_OVER",
            MessagePayload::MatchResultReport { .. } => "MATCH_RESULT_REPORT",
            MessagePayload::LeagueStandingsUpdate { .. } => "LEAGUE_STANDINGS_UPDATE",
            MessagePayload::RoundCompleted { .. } => "ROUND_COMPLETED",
            MessagePayload::LeagueCompleted { .. } => "LEAGUE_COMPLETED",
            MessagePayload::LeagueQuery { .. } => "LEAGUE_QUERY",
            MessagePayload::LeagueQueryResponse { .. } => "LEAGUE_QUERY_RESPONSE",
            MessagePayload::LeagueError { .. } => "LEAGUE_ERROR",
            MessagePayload::Ack { .. } => "ACK",
        }
    }

    pub fn error(err: &ProtocolError) -> MessagePayload {
        MessagePayload::LeagueError {
            error_code: err.error_code.code().to_string(),
            error_description: err.error_code.description().to_string(),
            original_message_type: err.original_message_type.clone(),
            context: err.context.clone(),
        }
    }
}

/// Structural validation of the shared envelope fields, performed
/// against the raw JSON *before* attempting the fully-typed parse into
/// [`Envelope`] — this is what lets us distinguish "missing field"
/// (E003) from "unsupported protocol version" (E002) from "not even an
/// object" (E001) rather than collapsing them into one generic serde
/// error.
pub fn validate_envelope_shape(raw: &Value) -> Result<(), ProtocolError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidMessageFormat, "message is not a JSON object"))?;

    const REQUIRED: [&str; 5] = [
        "protocol",
        "message_type",
        "sender",
        "timestamp",
        "conversation_id",
    ];
    for field in REQUIRED {
        if !obj.contains_key(field) {
            return Err(ProtocolError::new(
                ErrorCode::MissingRequiredField,
                format!("missing required field `{}`", field),
            ));
        }
    }

    let protocol = obj["protocol"]
        .as_str()
        .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidMessageFormat, "`protocol` must be a string"))?;
    if protocol != PROTOCOL_VERSION {
        return Err(ProtocolError::new(
            ErrorCode::UnsupportedProtocolVersion,
            format!("unsupported protocol version `{}`", protocol),
        ));
    }

    let timestamp = obj["timestamp"]
        .as_str()
        .ok_or_else(|| ProtocolError::new(ErrorCode::InvalidMessageFormat, "`timestamp` must be a string"))?;
    if !(timestamp.ends_with('Z') || timestamp.contains("+00:00")) {
        return Err(ProtocolError::new(
            ErrorCode::InvalidFieldValue,
            "`timestamp` must be UTC (end in `Z` or `+00:00`)",
        ));
    }

    Ok(())
}

/// Validate the envelope shape, then fully parse. This is the single
/// entry point transport handlers should use on any inbound body.
pub fn parse_envelope(raw: Value) -> Result<Envelope, ProtocolError> {
    validate_envelope_shape(&raw)?;
    serde_json::from_value(raw)
        .map_err(|e| ProtocolError::new(ErrorCode::InvalidMessageFormat, format!("malformed payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_raw() -> Value {
        json!({
            "protocol": "league.v2",
            "message_type": "START_LEAGUE",
            "sender": "league_manager:LM",
            "timestamp": "2026-01-01T00:00:00Z",
            "conversation_id": "abc-123",
            "league_id": "L1",
        })
    }

    #[test]
    fn accepts_well_formed_envelope() {
        assert!(validate_envelope_shape(&valid_raw()).is_ok());
    }

    #[test]
    fn rejects_non_object() {
        let err = validate_envelope_shape(&json!("not an object")).unwrap_err();
        assert_eq!(err.error_code.code(), "E001");
    }

    #[test]
    fn rejects_missing_field() {
        let mut raw = valid_raw();
        raw.as_object_mut().unwrap().remove("conversation_id");
        let err = validate_envelope_shape(&raw).unwrap_err();
        assert_eq!(err.error_code.code(), "E003");
    }

    #[test]
    fn rejects_wrong_protocol_version() {
        let mut raw = valid_raw();
        raw["protocol"] = json!("league.v1");
        let err = validate_envelope_shape(&raw).unwrap_err();
        assert_eq!(err.error_code.code(), "E002");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let mut raw = valid_raw();
        raw["timestamp"] = json!("2026-01-01T00:00:00");
        let err = validate_envelope_shape(&raw).unwrap_err();
        assert_eq!(err.error_code.code(), "E004");
    }

    #[test]
    fn round_trips_through_typed_parse() {
        let env = parse_envelope(valid_raw()).unwrap();
        assert_eq!(env.message_type(), "START_LEAGUE");
        assert_eq!(env.sender_id(), "LM");
        let reserialized = serde_json::to_value(&env).unwrap();
        let reparsed = parse_envelope(reserialized).unwrap();
        assert_eq!(reparsed.message_type(), env.message_type());
    }
}
