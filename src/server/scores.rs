//! The scoreboard: walk every game the server has hosted, aggregate per
//! display name, emit CSV.

use std::collections::BTreeMap;
use std::fmt;

use super::Server;

pub const HEADER: &str = "Player Name,Total Tokens,Total Points";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRow {
    pub name: String,
    pub tokens: u32,
    pub points: u32,
}

impl fmt::Display for ScoreRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.name, self.tokens, self.points)
    }
}

/// Group players by display name across all games, finished and live,
/// summing score and whole-wallet token counts. Points descending, ties
/// by tokens ascending; aggregation through a name-ordered map plus a
/// stable sort leaves residual ties alphabetical.
pub fn aggregate(server: &Server) -> Vec<ScoreRow> {
    let mut totals: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    {
        let registry = server.registry.lock().unwrap();
        for game in &registry.games {
            let core = game.core.lock().unwrap();
            for player in core.players() {
                let entry = totals.entry(player.name.clone()).or_default();
                entry.0 += player.total_tokens();
                entry.1 += player.score;
            }
        }
    }
    let mut rows: Vec<ScoreRow> = totals
        .into_iter()
        .map(|(name, (tokens, points))| ScoreRow { name, tokens, points })
        .collect();
    rows.sort_by(|a, b| b.points.cmp(&a.points).then(a.tokens.cmp(&b.tokens)));
    rows
}

pub fn render(server: &Server) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for row in aggregate(server) {
        out.push_str(&row.to_string());
        out.push('\n');
    }
    out
}
