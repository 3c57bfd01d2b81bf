//! Participant identity resolution.
//!
//! Participants may post from several raw identifiers (alternate accounts);
//! the roster maps every raw id onto one canonical id so counters never
//! fragment, and looks up team affiliation and display names. Resolution is
//! a static, total mapping: an unmapped id resolves to itself and is
//! teamless.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw or canonical participant identifier.
pub type ParticipantId = String;

/// Identifier of a tracked counting channel.
pub type ChannelId = String;

/// Name of a team owning participants and attempt history.
pub type TeamName = String;

/// Roster section of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Team name -> canonical participant ids.
    #[serde(default)]
    pub teams: HashMap<TeamName, Vec<ParticipantId>>,

    /// Alternate id -> canonical id.
    #[serde(default)]
    pub aliases: HashMap<ParticipantId, ParticipantId>,

    /// Canonical id -> display name.
    #[serde(default)]
    pub nicknames: HashMap<ParticipantId, String>,
}

/// Resolved identity lookup built from [`RosterConfig`].
#[derive(Debug, Clone, Default)]
pub struct Roster {
    aliases: HashMap<ParticipantId, ParticipantId>,
    nicknames: HashMap<ParticipantId, String>,
    team_by_participant: HashMap<ParticipantId, TeamName>,
}

impl Roster {
    /// Build the lookup tables, inverting the team -> members map.
    pub fn new(config: RosterConfig) -> Self {
        let mut team_by_participant = HashMap::new();
        for (team, members) in &config.teams {
            for member in members {
                team_by_participant.insert(member.clone(), team.clone());
            }
        }
        Self {
            aliases: config.aliases,
            nicknames: config.nicknames,
            team_by_participant,
        }
    }

    /// Map a raw id to its canonical id. Identity when unmapped.
    pub fn resolve(&self, raw: &str) -> ParticipantId {
        self.aliases
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    /// Team affiliation of a canonical participant, if any.
    pub fn team_of(&self, canonical: &str) -> Option<&TeamName> {
        self.team_by_participant.get(canonical)
    }

    /// Display name of a canonical participant. Falls back to the id itself.
    pub fn display_name(&self, canonical: &str) -> String {
        self.nicknames
            .get(canonical)
            .cloned()
            .unwrap_or_else(|| canonical.to_string())
    }
}
