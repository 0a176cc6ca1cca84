//! Replay Documents
//!
//! Everything needed to re-run a match offline: the scheme, the settings,
//! the base seed, and one packed input byte per roster player per tick. The
//! document is accumulated while the match runs and persisted once at match
//! end.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::scheme::{ItemType, Scheme, Theme};
use crate::game::world::PlayerId;
use crate::room::room::{RoomSettings, RosterPlayer};

/// Carryover reward rolled for a match winner.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldCarryover {
    /// Winning player's token.
    pub winner_token: PlayerId,
    /// Item granted at each round start of their next match.
    pub item: ItemType,
}

/// How one round ended.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    /// Wall-clock end time.
    pub ended_at: DateTime<Utc>,
    /// Winning player token or team, if any.
    pub winner_key: Option<String>,
    /// Players still alive when the round ended.
    pub alive_tokens: Vec<PlayerId>,
}

/// One round's recording.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplayRound {
    /// Round seed (base seed XOR round index).
    pub seed: u32,
    /// One packed input byte per roster player per tick, in match-start
    /// player order.
    pub frames: Vec<Vec<u8>>,
    /// Filled in when the round ends.
    pub result: Option<RoundResult>,
}

/// How the match ended.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Wall-clock end time.
    pub ended_at: DateTime<Utc>,
    /// Winning player token or team.
    pub winner_key: Option<String>,
    /// Final win counts.
    pub wins: BTreeMap<String, u32>,
}

/// A complete persisted replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayDoc {
    /// Document id, also the file name stem.
    pub id: String,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Recorded from a ranked room.
    pub ranked: bool,
    /// Map the match was played on.
    pub scheme: Scheme,
    /// Visual theme.
    pub theme: Theme,
    /// Settings the match ran under.
    pub settings: RoomSettings,
    /// Match seed; round seeds derive from it.
    pub base_seed: u32,
    /// Roster in fixed match order.
    pub players: Vec<RosterPlayer>,
    /// Carryover applied during this match, if any.
    pub gold_carryover: Option<GoldCarryover>,
    /// One entry per round played.
    pub rounds: Vec<ReplayRound>,
    /// Filled in when the match ends.
    pub match_result: Option<MatchResult>,
}

impl ReplayDoc {
    /// Fresh document for a match that is about to start.
    pub fn new(
        ranked: bool,
        scheme: Scheme,
        theme: Theme,
        settings: RoomSettings,
        base_seed: u32,
        players: Vec<RosterPlayer>,
        gold_carryover: Option<GoldCarryover>,
    ) -> ReplayDoc {
        let now = Utc::now();
        ReplayDoc {
            id: format!(
                "rep_{}_{}",
                now.timestamp_millis(),
                hex::encode(rand::random::<[u8; 4]>())
            ),
            created_at: now,
            ranked,
            scheme,
            theme,
            settings,
            base_seed,
            players,
            gold_carryover,
            rounds: Vec::new(),
            match_result: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::scheme::{default_scheme, get_theme};
    use crate::room::room::RoomSettings;

    #[test]
    fn test_replay_doc_round_trips_through_json() {
        let mut doc = ReplayDoc::new(
            false,
            default_scheme(),
            get_theme("green-acres"),
            RoomSettings::default(),
            0xDEAD_BEEF,
            vec![],
            None,
        );
        doc.rounds.push(ReplayRound {
            seed: 0xDEAD_BEEE,
            frames: vec![vec![0b0001, 0b1000], vec![0, 0]],
            result: None,
        });

        let json = serde_json::to_string(&doc).unwrap();
        let back: ReplayDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, doc.id);
        assert_eq!(back.base_seed, 0xDEAD_BEEF);
        assert_eq!(back.rounds[0].frames, doc.rounds[0].frames);
    }

    #[test]
    fn test_replay_ids_are_unique() {
        let settings = RoomSettings::default();
        let a = ReplayDoc::new(
            false,
            default_scheme(),
            get_theme("green-acres"),
            settings.clone(),
            1,
            vec![],
            None,
        );
        let b = ReplayDoc::new(
            false,
            default_scheme(),
            get_theme("green-acres"),
            settings,
            1,
            vec![],
            None,
        );
        assert!(a.id.starts_with("rep_"));
        assert_ne!(a.id, b.id);
    }
}
