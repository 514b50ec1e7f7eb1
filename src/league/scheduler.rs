//! Round-robin schedule generation.
//!
//! [`generate_schedule`] reproduces the reference packing algorithm
//! bit-for-bit, chunking bugs and all: it does **not** guarantee every
//! player gets exactly one match per round once `n >= 4`. That's a
//! deliberate compatibility choice (see the design notes on scheduling),
//! not an oversight — [`generate_schedule_corrected`] is the fixed
//! circle-method packing, available as an explicit opt-in.

#[derive(Debug, Clone)]
pub struct PlannedMatch {
    pub match_num: u32,
    pub round_num: u32,
    pub player_a: String,
    pub player_b: String,
}

fn all_pairs(players: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for i in 0..players.len() {
        for j in (i + 1)..players.len() {
            pairs.push((players[i].clone(), players[j].clone()));
        }
    }
    pairs
}

/// The reference packing: all unordered pairs in combination order,
/// chunked into groups of `n/2` (even `n`) or `(n-1)/2` (odd `n`)
/// consecutive pairs per round. `match_num` is monotonically assigned
/// across the whole schedule; `round_num` only advances for non-empty
/// chunks.
pub fn generate_schedule(players: &[String]) -> Vec<PlannedMatch> {
    let pairs = all_pairs(players);
    if pairs.is_empty() {
        return Vec::new();
    }

    let n = players.len();
    let matches_per_round = if n % 2 == 0 { n / 2 } else { (n - 1) / 2 }.max(1);

    let mut schedule = Vec::with_capacity(pairs.len());
    let mut match_num = 1u32;
    let mut round_num = 0u32;

    for chunk in pairs.chunks(matches_per_round) {
        if chunk.is_empty() {
            continue;
        }
        round_num += 1;
        for (player_a, player_b) in chunk {
            schedule.push(PlannedMatch {
                match_num,
                round_num,
                player_a: player_a.clone(),
                player_b: player_b.clone(),
            });
            match_num += 1;
        }
    }

    schedule
}

/// A corrected round-robin using the standard circle method: one
/// player sits out on a bye round for odd `n`, and every other player
/// appears in exactly one match per round. Never used unless an agent
/// explicitly opts in via configuration.
pub fn generate_schedule_corrected(players: &[String]) -> Vec<PlannedMatch> {
    if players.len() < 2 {
        return Vec::new();
    }

    let mut roster: Vec<Option<String>> = players.iter().cloned().map(Some).collect();
    if roster.len() % 2 != 0 {
        roster.push(None); // bye slot
    }
    let n = roster.len();
    let rounds = n - 1;
    let half = n / 2;

    let mut schedule = Vec::new();
    let mut match_num = 1u32;

    for round in 0..rounds {
        let round_num = (round + 1) as u32;
        for i in 0..half {
            let a = &roster[i];
            let b = &roster[n - 1 - i];
            if let (Some(a), Some(b)) = (a, b) {
                schedule.push(PlannedMatch {
                    match_num,
                    round_num,
                    player_a: a.clone(),
                    player_b: b.clone(),
                });
                match_num += 1;
            }
        }
        // rotate all but the first fixed element
        let fixed = roster.remove(0);
        let last = roster.pop().unwrap();
        roster.insert(0, fixed);
        roster.insert(1, last);
    }

    schedule
}

pub fn total_rounds(schedule: &[PlannedMatch]) -> u32 {
    schedule.iter().map(|m| m.round_num).max().unwrap_or(0)
}
