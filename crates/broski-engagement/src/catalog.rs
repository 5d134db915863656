//! # Challenge Catalog
//!
//! The ordered, immutable table of daily challenges. Loaded once at process
//! start, either from the built-in table or from a YAML file, and shared
//! read-only behind an `Arc` for the lifetime of the process.
//!
//! ## Durable Ids
//!
//! Entries carry their own `id`. A user's `current_challenge_id` refers to
//! that id, not to an array position, so reordering or growing the catalog
//! never silently points a user at a different challenge. Rotation walks the
//! catalog in file order starting from the position of the current id.
//!
//! Ids that are no longer present (catalog shrank, corrupt record) fall back
//! to a positional successor `(raw + 1) mod N`, which keeps the behaviour of
//! catalogs whose ids are exactly `0..N`.
//!
//! ## File Format
//!
//! ```yaml
//! version: 2
//! challenges:
//!   - id: 0
//!     prompt: Compliment a stranger's style today.
//!     xp_reward: 15
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// XP awarded when the current challenge id has no catalog entry.
pub const DEFAULT_CHALLENGE_REWARD: u32 = 10;

/// One daily challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    /// Durable identifier, stable across catalog versions.
    pub id: u32,
    /// Text shown to the user.
    pub prompt: String,
    /// XP awarded on completion.
    pub xp_reward: u32,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    version: u32,
    challenges: Vec<ChallengeDefinition>,
}

/// Ordered, immutable challenge table.
#[derive(Debug, Clone)]
pub struct ChallengeCatalog {
    version: u32,
    entries: Vec<ChallengeDefinition>,
    positions: HashMap<u32, usize>,
}

impl ChallengeCatalog {
    /// Build a catalog from ordered entries.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateId`] if two entries share an id.
    pub fn new(version: u32, entries: Vec<ChallengeDefinition>) -> Result<Self, CatalogError> {
        let mut positions = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            if positions.insert(entry.id, pos).is_some() {
                return Err(CatalogError::DuplicateId(entry.id));
            }
        }
        if entries.is_empty() {
            tracing::warn!(version, "challenge catalog is empty; rotation is pinned to slot 0");
        }
        Ok(Self {
            version,
            entries,
            positions,
        })
    }

    /// Parse a catalog from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(text)?;
        Self::new(file.version, file.challenges)
    }

    /// Load a catalog from a YAML file on disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            version = catalog.version,
            challenges = catalog.len(),
            "loaded challenge catalog"
        );
        Ok(catalog)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .enumerate()
            .map(|(id, (prompt, xp_reward))| ChallengeDefinition {
                id: id as u32,
                prompt: (*prompt).to_string(),
                xp_reward: *xp_reward,
            })
            .collect::<Vec<_>>();
        let positions = entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.id, pos))
            .collect();
        Self {
            version: 1,
            entries,
            positions,
        }
    }

    /// Catalog version as declared in its source.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of challenges (`DAILY_CHALLENGE_COUNT`).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in rotation order.
    pub fn entries(&self) -> &[ChallengeDefinition] {
        &self.entries
    }

    /// Look up a challenge by id.
    pub fn get(&self, id: i64) -> Option<&ChallengeDefinition> {
        let id = u32::try_from(id).ok()?;
        self.positions.get(&id).map(|&pos| &self.entries[pos])
    }

    /// Whether `id` names an assignable challenge.
    ///
    /// An empty catalog has a single degenerate slot, `0`.
    pub fn is_valid(&self, id: Option<i64>) -> bool {
        match id {
            None => false,
            Some(id) if self.entries.is_empty() => id == 0,
            Some(id) => self.get(id).is_some(),
        }
    }

    /// The id of the first challenge in rotation order, or `0` when empty.
    pub fn first_id(&self) -> i64 {
        self.entries.first().map(|e| i64::from(e.id)).unwrap_or(0)
    }

    /// The id assigned after `current` in rotation order.
    pub fn successor(&self, current: Option<i64>) -> i64 {
        let n = self.entries.len();
        if n == 0 {
            return 0;
        }
        let next_pos = match current {
            None => 0,
            Some(raw) => match u32::try_from(raw).ok().and_then(|id| self.positions.get(&id)) {
                Some(&pos) => (pos + 1) % n,
                None => {
                    let n = n as i64;
                    (raw.rem_euclid(n) + 1).rem_euclid(n) as usize
                }
            },
        };
        i64::from(self.entries[next_pos].id)
    }

    /// XP awarded for completing `id`, falling back to [`DEFAULT_CHALLENGE_REWARD`].
    pub fn reward_for(&self, id: Option<i64>) -> u32 {
        id.and_then(|id| self.get(id))
            .map(|e| e.xp_reward)
            .unwrap_or(DEFAULT_CHALLENGE_REWARD)
    }
}

impl Default for ChallengeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const BUILTIN: &[(&str, u32)] = &[
    ("Start a conversation with someone new and ask one open-ended question.", 20),
    ("Give a genuine compliment about something a person chose, not their looks.", 15),
    ("Hold eye contact and smile at three people today.", 10),
    ("Send a message to a match that references something specific in their profile.", 20),
    ("Tell a short story about your week to a friend and practice the punchline.", 15),
    ("Ask someone for a recommendation: a book, a coffee spot, a playlist.", 15),
    ("Rewrite your bio opener and ask a friend which version they prefer.", 25),
    ("Practice a confident introduction out loud five times.", 10),
    ("Follow up on a conversation from earlier this week.", 20),
    ("Suggest a specific plan with a time and place instead of 'we should hang out'.", 30),
    ("Write down three things you did well socially this week.", 10),
    ("Laugh at yourself once today when something goes sideways.", 15),
];
