//! Abstract persistence boundaries for standings, match records, and
//! per-player history, plus one concrete file-backed (JSON-per-file)
//! implementation of each.
//!
//! Swapping the backing store for a league run means implementing
//! these traits; none of the protocol code above this layer knows or
//! cares how a [`Standing`] got to disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStanding {
    pub player_id: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub points: u32,
    pub rank: u32,
}

impl PlayerStanding {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            wins: 0,
            losses: 0,
            draws: 0,
            points: 0,
            rank: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub round_num: u32,
    pub player_a: String,
    pub player_b: String,
    pub winner: Option<String>,
    /// Points awarded to each player for this match, keyed by player id,
    /// as reported by the referee.
    pub score: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub player_id: String,
    pub opponent_id: String,
    pub match_id: String,
    pub round_num: u32,
    pub outcome: String,
}

/// Standings ranking, per the total order over
/// `(-points, -wins, losses, player_id)` — a strictly stronger (and
/// total) tiebreak than ranking by numeric fields alone, guaranteeing a
/// unique rank even among players tied on every counted statistic.
fn sort_key(s: &PlayerStanding) -> (i64, i64, u32, String) {
    (-(s.points as i64), -(s.wins as i64), s.losses, s.player_id.clone())
}

pub fn rerank(standings: &mut [PlayerStanding]) {
    standings.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    for (i, s) in standings.iter_mut().enumerate() {
        s.rank = (i + 1) as u32;
    }
}

#[async_trait]
pub trait StandingsRepository: Send + Sync {
    async fn initialize_player(&self, player_id: &str);
    async fn update_match_result(
        &self,
        match_id: &str,
        player_a: &str,
        player_b: &str,
        winner: Option<&str>,
        score: &HashMap<String, i64>,
    ) -> bool; // returns false if match_id was already applied (idempotent no-op)
    async fn get_standings(&self) -> Vec<PlayerStanding>;
    async fn get_player_standing(&self, player_id: &str) -> Option<PlayerStanding>;
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn save_match(&self, result: MatchResult);
    async fn get_match(&self, match_id: &str) -> Option<MatchResult>;
    async fn has_match(&self, match_id: &str) -> bool;
}

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn append(&self, record: HistoryRecord);
    async fn get_history(&self, player_id: &str) -> Vec<HistoryRecord>;
}

/// File-backed `StandingsRepository`: one JSON file holding the whole
/// standings table, rewritten on every mutation. The in-memory table
/// (behind an `RwLock`, per the shared-resource policy in §5) is the
/// source of truth within a process; the file is just a durability
/// snapshot.
pub struct FileStandingsRepository {
    path: PathBuf,
    applied_match_ids: RwLock<std::collections::HashSet<String>>,
    standings: RwLock<HashMap<String, PlayerStanding>>,
}

impl FileStandingsRepository {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let path = data_dir.as_ref().join("standings.json");
        Self {
            path,
            applied_match_ids: RwLock::new(std::collections::HashSet::new()),
            standings: RwLock::new(HashMap::new()),
        }
    }

    fn flush(&self) {
        let standings = self.standings.read().unwrap();
        let list: Vec<&PlayerStanding> = standings.values().collect();
        if let Ok(json) = serde_json::to_string_pretty(&list) {
            let _ = std::fs::create_dir_all(self.path.parent().unwrap_or(Path::new(".")));
            let _ = std::fs::write(&self.path, json);
        }
    }
}

#[async_trait]
impl StandingsRepository for FileStandingsRepository {
    async fn initialize_player(&self, player_id: &str) {
        let mut standings = self.standings.write().unwrap();
        standings
            .entry(player_id.to_string())
            .or_insert_with(|| PlayerStanding::new(player_id));
        drop(standings);
        self.flush();
    }

    async fn update_match_result(
        &self,
        match_id: &str,
        player_a: &str,
        player_b: &str,
        winner: Option<&str>,
        score: &HashMap<String, i64>,
    ) -> bool {
        {
            let mut applied = self.applied_match_ids.write().unwrap();
            if !applied.insert(match_id.to_string()) {
                return false; // already applied; idempotent no-op (Invariant 4)
            }
        }

        // Points are driven by the referee-reported `score` map, not a
        // fixed 3/1/0 table — the defaults below only apply when a
        // player's id is absent from `score`.
        let points_for = |player_id: &str, default: i64| -> u32 {
            score.get(player_id).copied().unwrap_or(default).max(0) as u32
        };

        {
            let mut standings = self.standings.write().unwrap();
            standings
                .entry(player_a.to_string())
                .or_insert_with(|| PlayerStanding::new(player_a));
            standings
                .entry(player_b.to_string())
                .or_insert_with(|| PlayerStanding::new(player_b));

            match winner {
                Some(winner_id) => {
                    let loser_id = if winner_id == player_a { player_b } else { player_a };
                    if let Some(w) = standings.get_mut(winner_id) {
                        w.wins += 1;
                        w.points += points_for(winner_id, 3);
                    }
                    if let Some(l) = standings.get_mut(loser_id) {
                        l.losses += 1;
                        l.points += points_for(loser_id, 0);
                    }
                }
                None => {
                    for id in [player_a, player_b] {
                        if let Some(s) = standings.get_mut(id) {
                            s.draws += 1;
                            s.points += points_for(id, 1);
                        }
                    }
                }
            }

            let mut list: Vec<PlayerStanding> = standings.values().cloned().collect();
            rerank(&mut list);
            for s in list {
                standings.insert(s.player_id.clone(), s);
            }
        }

        self.flush();
        true
    }

    async fn get_standings(&self) -> Vec<PlayerStanding> {
        let standings = self.standings.read().unwrap();
        let mut list: Vec<PlayerStanding> = standings.values().cloned().collect();
        rerank(&mut list);
        list
    }

    async fn get_player_standing(&self, player_id: &str) -> Option<PlayerStanding> {
        self.standings.read().unwrap().get(player_id).cloned()
    }
}

/// File-backed `MatchRepository`: one JSON file per match id, mirroring
/// the reference layout.
pub struct FileMatchRepository {
    dir: PathBuf,
    cache: RwLock<HashMap<String, MatchResult>>,
}

impl FileMatchRepository {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref().join("matches");
        let _ = std::fs::create_dir_all(&dir);
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MatchRepository for FileMatchRepository {
    async fn save_match(&self, result: MatchResult) {
        let path = self.dir.join(format!("{}.json", result.match_id));
        if let Ok(json) = serde_json::to_string_pretty(&result) {
            let _ = std::fs::write(&path, json);
        }
        self.cache
            .write()
            .unwrap()
            .insert(result.match_id.clone(), result);
    }

    async fn get_match(&self, match_id: &str) -> Option<MatchResult> {
        self.cache.read().unwrap().get(match_id).cloned()
    }

    async fn has_match(&self, match_id: &str) -> bool {
        self.cache.read().unwrap().contains_key(match_id)
    }
}

/// File-backed `HistoryRepository`: an append-only JSON array per
/// player.
pub struct FileHistoryRepository {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<HistoryRecord>>>,
}

impl FileHistoryRepository {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let dir = data_dir.as_ref().join("history");
        let _ = std::fs::create_dir_all(&dir);
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn flush(&self, player_id: &str) {
        let cache = self.cache.read().unwrap();
        if let Some(records) = cache.get(player_id) {
            let path = self.dir.join(format!("{}.json", player_id));
            if let Ok(json) = serde_json::to_string_pretty(records) {
                let _ = std::fs::write(&path, json);
            }
        }
    }
}

#[async_trait]
impl HistoryRepository for FileHistoryRepository {
    async fn append(&self, record: HistoryRecord) {
        let player_id = record.player_id.clone();
        self.cache
            .write()
            .unwrap()
            .entry(player_id.clone())
            .or_default()
            .push(record);
        self.flush(&player_id);
    }

    async fn get_history(&self, player_id: &str) -> Vec<HistoryRecord> {
        self.cache
            .read()
            .unwrap()
            .get(player_id)
            .cloned()
            .unwrap_or_default()
    }
}
