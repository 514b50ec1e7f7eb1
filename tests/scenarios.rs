//! End-to-end scenario tests driving `LeagueManagerState` directly
//! in-process, without a real HTTP listener — the axum/reqwest layer
//! has its own adapter-level tests under `src/league/server.rs`.

use std::collections::HashMap;
use std::time::Duration;

use league_runtime::league::config::LeagueManagerConfig;
use league_runtime::league::league_manager::LeagueManagerState;

fn config(league_id: &str) -> LeagueManagerConfig {
    LeagueManagerConfig {
        league_id: league_id.to_string(),
        port: 0,
        data_dir: std::env::temp_dir()
            .join(format!("league-scenario-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string(),
        log_dir: "./logs".to_string(),
        transport_timeout: Duration::from_secs(1),
        use_corrected_schedule: false,
    }
}

/// Scenario 1: two-player happy path. After the single match reports a
/// decisive winner, standings show the winner ranked first with a full
/// win on the books, the loser ranked second, and the league completed.
#[tokio::test]
async fn two_player_happy_path() {
    let lm = LeagueManagerState::new(config("L1"));
    let (ref_id, ref_token) = lm.register_referee("ref", "http://127.0.0.1:9100").await.unwrap();
    lm.register_player("alice", "http://127.0.0.1:9200").await.unwrap();
    lm.register_player("bob", "http://127.0.0.1:9201").await.unwrap();

    let round_one = lm.start_league().await.unwrap();
    assert_eq!(round_one.len(), 1);
    let m = &round_one[0];
    assert_eq!(m.referee_id, ref_id);

    lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
        .await
        .unwrap();

    assert_eq!(m.match_id, "R1M1");

    let standings = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;
    let standings: Vec<serde_json::Value> = serde_json::from_value(standings).unwrap();
    assert_eq!(standings.len(), 2);

    let winner = standings.iter().find(|s| s["player_id"] == m.player_a).unwrap();
    assert_eq!(winner["wins"], 1);
    assert_eq!(winner["losses"], 0);
    assert_eq!(winner["points"], 3);
    assert_eq!(winner["rank"], 1);

    let loser = standings.iter().find(|s| s["player_id"] == m.player_b).unwrap();
    assert_eq!(loser["wins"], 0);
    assert_eq!(loser["losses"], 1);
    assert_eq!(loser["points"], 0);
    assert_eq!(loser["rank"], 2);

    let status = lm.handle_query(league_runtime::league::envelope::QueryKind::Status).await;
    assert_eq!(status["status"], "COMPLETED");
}

/// Scenario 2: a draw leaves both players tied on every numeric field;
/// the 4-key tiebreak falls back to `player_id` for a deterministic
/// rank assignment.
#[tokio::test]
async fn draw_breaks_tie_by_player_id() {
    let lm = LeagueManagerState::new(config("L2"));
    let (_, ref_token) = lm.register_referee("ref", "http://127.0.0.1:9100").await.unwrap();
    lm.register_player("alice", "http://127.0.0.1:9200").await.unwrap();
    lm.register_player("bob", "http://127.0.0.1:9201").await.unwrap();

    let round_one = lm.start_league().await.unwrap();
    let m = &round_one[0];

    lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, None, &HashMap::new())
        .await
        .unwrap();

    let standings = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;
    let standings: Vec<serde_json::Value> = serde_json::from_value(standings).unwrap();

    for s in &standings {
        assert_eq!(s["draws"], 1);
        assert_eq!(s["points"], 1);
    }
    let ids: Vec<String> = standings
        .iter()
        .map(|s| s["player_id"].as_str().unwrap().to_string())
        .collect();
    let mut sorted_ids = ids.clone();
    sorted_ids.sort();
    assert_eq!(ids, sorted_ids, "rank order should fall back to player_id");
}

/// Scenario 3: a `MATCH_RESULT_REPORT` with a wrong auth token is
/// rejected with E012 and leaves standings untouched.
#[tokio::test]
async fn auth_rejection_leaves_standings_unchanged() {
    let lm = LeagueManagerState::new(config("L3"));
    lm.register_referee("ref", "http://127.0.0.1:9100").await.unwrap();
    lm.register_player("alice", "http://127.0.0.1:9200").await.unwrap();
    lm.register_player("bob", "http://127.0.0.1:9201").await.unwrap();
    let round_one = lm.start_league().await.unwrap();
    let m = &round_one[0];

    let before = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;

    let err = lm
        .ingest_match_result("definitely-not-the-token", &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code.code(), "E012");

    let after = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;
    assert_eq!(before, after);
}

/// Scenario 4: starting a league with fewer than 2 players is
/// rejected and the league stays `NOT_STARTED`.
#[tokio::test]
async fn insufficient_players_keeps_league_not_started() {
    let lm = LeagueManagerState::new(config("L4"));
    lm.register_player("alice", "http://127.0.0.1:9200").await.unwrap();

    let err = lm.start_league().await.unwrap_err();
    assert_eq!(err.error_code.code(), "E005");

    let status = lm.handle_query(league_runtime::league::envelope::QueryKind::Status).await;
    assert_eq!(status["status"], "NOT_STARTED");
}

/// Scenario 5: submitting the same `MATCH_RESULT_REPORT` twice yields
/// identical standings to submitting it once.
#[tokio::test]
async fn duplicate_result_report_is_idempotent() {
    let lm = LeagueManagerState::new(config("L5"));
    let (_, ref_token) = lm.register_referee("ref", "http://127.0.0.1:9100").await.unwrap();
    lm.register_player("alice", "http://127.0.0.1:9200").await.unwrap();
    lm.register_player("bob", "http://127.0.0.1:9201").await.unwrap();
    let round_one = lm.start_league().await.unwrap();
    let m = &round_one[0];

    lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
        .await
        .unwrap();
    let once = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;

    lm.ingest_match_result(&ref_token, &m.match_id, 1, &m.player_a, &m.player_b, Some(&m.player_a), &HashMap::new())
        .await
        .unwrap();
    let twice = lm.handle_query(league_runtime::league::envelope::QueryKind::Standings).await;

    assert_eq!(once, twice);
}

/// Scenario 6: round advancement. With 3 players (3 rounds of 1 match
/// each under the reference packing), reporting the sole match of
/// round 1 fires round completion and leaves the league in progress;
/// reporting the final round's match completes the league.
#[tokio::test]
async fn round_advancement_through_to_league_completion() {
    let lm = LeagueManagerState::new(config("L6"));
    let (_, ref_token) = lm.register_referee("ref", "http://127.0.0.1:9100").await.unwrap();
    lm.register_player("p1", "http://127.0.0.1:9200").await.unwrap();
    lm.register_player("p2", "http://127.0.0.1:9201").await.unwrap();
    lm.register_player("p3", "http://127.0.0.1:9202").await.unwrap();

    let round_one = lm.start_league().await.unwrap();
    assert_eq!(round_one.len(), 1);
    let m1 = round_one[0].clone();

    lm.ingest_match_result(&ref_token, &m1.match_id, 1, &m1.player_a, &m1.player_b, Some(&m1.player_a), &HashMap::new())
        .await
        .unwrap();

    let status = lm.handle_query(league_runtime::league::envelope::QueryKind::Status).await;
    assert_eq!(status["current_round"], 2);
    assert_eq!(status["status"], "IN_PROGRESS");

    // Drain the remaining two rounds to completion.
    let schedule = lm.handle_query(league_runtime::league::envelope::QueryKind::Schedule).await;
    let schedule: std::collections::HashMap<String, Vec<serde_json::Value>> =
        serde_json::from_value(schedule).unwrap();

    for round in ["2", "3"] {
        if let Some(matches) = schedule.get(round) {
            for m in matches {
                let match_id = m["match_id"].as_str().unwrap();
                let player_a = m["player_a"].as_str().unwrap();
                let player_b = m["player_b"].as_str().unwrap();
                lm.ingest_match_result(&ref_token, match_id, round.parse().unwrap(), player_a, player_b, Some(player_a), &HashMap::new())
                    .await
                    .unwrap();
            }
        }
    }

    let status = lm.handle_query(league_runtime::league::envelope::QueryKind::Status).await;
    assert_eq!(status["status"], "COMPLETED");
}
