//! Error codes and error types for the `league.v2` protocol.

use std::fmt;

/// Machine-readable error codes carried on `LEAGUE_ERROR` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // General / format errors (E001-E004)
    InvalidMessageFormat,
    UnsupportedProtocolVersion,
    MissingRequiredField,
    InvalidFieldValue,
    // Registration errors (E005-E007)
    NotEnoughPlayers,
    DuplicateRegistration,
    InvalidAgentMetadata,
    // Validation errors (E008-E011)
    InvalidPlayerId,
    InvalidRefereeId,
    InvalidLeagueId,
    InvalidMatchId,
    // Authentication errors (E012-E014)
    AuthTokenInvalid,
    AuthTokenExpired,
    AuthTokenMissing,
    // Game errors (E015-E018)
    GameAlreadyStarted,
    PlayerNotRegistered,
    RefereeNotRegistered,
    MatchNotFound,
    // Timeout errors (E019-E020)
    ChoiceTimeout,
    JoinTimeout,
    // League errors (E021-E023)
    LeagueAlreadyStarted,
    LeagueNotStarted,
    RoundNotFound,
}

impl ErrorCode {
    /// The stable `E0xx` code string as it appears on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMessageFormat => "E001",
            ErrorCode::UnsupportedProtocolVersion => "E002",
            ErrorCode::MissingRequiredField => "E003",
            ErrorCode::InvalidFieldValue => "E004",
            ErrorCode::NotEnoughPlayers => "E005",
            ErrorCode::DuplicateRegistration => "E006",
            ErrorCode::InvalidAgentMetadata => "E007",
            ErrorCode::InvalidPlayerId => "E008",
            ErrorCode::InvalidRefereeId => "E009",
            ErrorCode::InvalidLeagueId => "E010",
            ErrorCode::InvalidMatchId => "E011",
            ErrorCode::AuthTokenInvalid => "E012",
            ErrorCode::AuthTokenExpired => "E013",
            ErrorCode::AuthTokenMissing => "E014",
            ErrorCode::GameAlreadyStarted => "E015",
            ErrorCode::PlayerNotRegistered => "E016",
            ErrorCode::RefereeNotRegistered => "E017",
            ErrorCode::MatchNotFound => "E018",
            ErrorCode::ChoiceTimeout => "E019",
            ErrorCode::JoinTimeout => "E020",
            ErrorCode::LeagueAlreadyStarted => "E021",
            ErrorCode::LeagueNotStarted => "E022",
            ErrorCode::RoundNotFound => "E023",
        }
    }

    /// The stable machine-readable description (the name used in the
    /// original error table, e.g. `AUTH_TOKEN_INVALID`).
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidMessageFormat => "INVALID_MESSAGE_FORMAT",
            ErrorCode::UnsupportedProtocolVersion => "UNSUPPORTED_PROTOCOL_VERSION",
            ErrorCode::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            ErrorCode::DuplicateRegistration => "DUPLICATE_REGISTRATION",
            ErrorCode::InvalidAgentMetadata => "INVALID_AGENT_METADATA",
            ErrorCode::InvalidPlayerId => "INVALID_PLAYER_ID",
            ErrorCode::InvalidRefereeId => "INVALID_REFEREE_ID",
            ErrorCode::InvalidLeagueId => "INVALID_LEAGUE_ID",
            ErrorCode::InvalidMatchId => "INVALID_MATCH_ID",
            ErrorCode::AuthTokenInvalid => "AUTH_TOKEN_INVALID",
            ErrorCode::AuthTokenExpired => "AUTH_TOKEN_EXPIRED",
            ErrorCode::AuthTokenMissing => "AUTH_TOKEN_MISSING",
            ErrorCode::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            ErrorCode::PlayerNotRegistered => "PLAYER_NOT_REGISTERED",
            ErrorCode::RefereeNotRegistered => "REFEREE_NOT_REGISTERED",
            ErrorCode::MatchNotFound => "MATCH_NOT_FOUND",
            ErrorCode::ChoiceTimeout => "CHOICE_TIMEOUT",
            ErrorCode::JoinTimeout => "JOIN_TIMEOUT",
            ErrorCode::LeagueAlreadyStarted => "LEAGUE_ALREADY_STARTED",
            ErrorCode::LeagueNotStarted => "LEAGUE_NOT_STARTED",
            ErrorCode::RoundNotFound => "ROUND_NOT_FOUND",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.description())
    }
}

/// A protocol-level rejection: malformed envelope, bad auth, unknown
/// agent/match/round, or an illegal league-state transition. Carries
/// everything needed to build a `LEAGUE_ERROR` message.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    pub error_code: ErrorCode,
    pub message: String,
    pub original_message_type: Option<String>,
    pub context: Option<serde_json::Value>,
}

impl ProtocolError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code,
            message: message.into(),
            original_message_type: None,
            context: None,
        }
    }

    pub fn with_original_type(mut self, message_type: impl Into<String>) -> Self {
        self.original_message_type = Some(message_type.into());
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_code, self.message)
    }
}

impl std::error::Error for ProtocolError {}

/// A transport-layer fault: connection refused, request timed out, or
/// the peer sent back something that wasn't a well-formed JSON-RPC
/// envelope. Never crosses the wire itself; it's the local `Result`
/// type for the outbound-call layer (see `transport.rs`).
#[derive(Debug)]
pub enum TransportError {
    Timeout,
    ConnectionFailed(String),
    MalformedResponse(String),
    RetriesExhausted { attempts: u32, last_error: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "transport call timed out"),
            TransportError::ConnectionFailed(reason) => {
                write!(f, "connection failed: {}", reason)
            }
            TransportError::MalformedResponse(reason) => {
                write!(f, "malformed response: {}", reason)
            }
            TransportError::RetriesExhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "gave up after {} attempts, last error: {}",
                attempts, last_error
            ),
        }
    }
}

impl std::error::Error for TransportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_strings_match_registry() {
        assert_eq!(ErrorCode::InvalidMessageFormat.code(), "E001");
        assert_eq!(ErrorCode::AuthTokenInvalid.code(), "E012");
        assert_eq!(ErrorCode::LeagueAlreadyStarted.code(), "E021");
        assert_eq!(ErrorCode::RoundNotFound.code(), "E023");
    }

    #[test]
    fn protocol_error_display_includes_code_and_message() {
        let err = ProtocolError::new(ErrorCode::MatchNotFound, "no such match");
        let rendered = err.to_string();
        assert!(rendered.contains("E018"));
        assert!(rendered.contains("no such match"));
    }
}
