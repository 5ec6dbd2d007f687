use crate::Database;
use crate::models::{MatchRow, ProfileRow};
use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use ember_types::models::{ChatMessage, Decision, MessageKind, Mode, UserProfile};
use rusqlite::Connection;
use tracing::warn;
use uuid::Uuid;

/// Fixed-width timestamp format so lexicographic order matches time order.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .map(|ndt| ndt.and_utc())
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", s, e);
            DateTime::default()
        })
}

/// Canonical key for the unordered (a, b) pair. Both swipe directions map to
/// the same key, which is what the UNIQUE constraint on matches hangs off.
fn pair_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

/// Result of recording a swipe.
pub enum SwipeOutcome {
    /// Decision stored, no reciprocal like (or a pass).
    Recorded,
    /// Both directions are LIKE. `newly_created` is false when the match row
    /// already existed — the racing-writer no-op path.
    Matched { row: MatchRow, newly_created: bool },
}

impl Database {
    // -- Profiles --
    //
    // Profile CRUD is owned by the profile collaborator; this is its write
    // interface into the shared store plus the read side the core needs.

    pub fn insert_profile(&self, p: &UserProfile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, age, mode, goals, interests, drinks, smokes, bio, lat, lon, cell)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    p.id.to_string(),
                    p.display_name,
                    p.age as i64,
                    p.mode.as_str(),
                    serde_json::to_string(&p.goals)?,
                    serde_json::to_string(&p.interests)?,
                    p.drinks,
                    p.smokes,
                    p.bio,
                    p.lat,
                    p.lon,
                    p.cell,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let row = query_profile(conn, "WHERE id = ?1", rusqlite::params![id.to_string()])?;
            row.map(profile_from_row).transpose()
        })
    }

    /// Store a new position and the cell derived from it. The two always
    /// change together — a stored cell is never stale relative to (lat, lon).
    pub fn update_position(&self, id: Uuid, lat: f64, lon: f64, cell: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET lat = ?2, lon = ?3, cell = ?4 WHERE id = ?1",
                rusqlite::params![id.to_string(), lat, lon, cell],
            )?;
            Ok(changed > 0)
        })
    }

    /// All profiles in one cell for one mode. Requester-specific filtering
    /// (self, already-swiped) happens in the feed assembler, not here, so the
    /// result is cacheable per (cell, mode).
    pub fn profiles_in_cell(&self, cell: &str, mode: Mode) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, display_name, age, mode, goals, interests, drinks, smokes, bio, lat, lon, cell
                 FROM users WHERE cell = ?1 AND mode = ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![cell, mode.as_str()], map_profile_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(profile_from_row).collect()
        })
    }

    /// Ids this actor has already decided on (either direction of decision).
    pub fn swiped_target_ids(&self, actor: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT target_id FROM swipes WHERE actor_id = ?1")?;
            let ids = stmt
                .query_map([actor.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids.iter().filter_map(|s| s.parse().ok()).collect())
        })
    }

    // -- Swipes + matches --

    /// Upsert the swipe and, on a LIKE with a reciprocal LIKE, create the
    /// match for the unordered pair. Runs in one transaction: the swipe and
    /// the match commit together or not at all.
    ///
    /// Match creation is insert-or-fetch on the unique pair key — two racing
    /// reciprocal likes both land here, one inserts, the other detects the
    /// existing row and no-ops.
    pub fn record_swipe(&self, actor: Uuid, target: Uuid, decision: Decision) -> Result<SwipeOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = fmt_ts(Utc::now());

            tx.execute(
                "INSERT INTO swipes (actor_id, target_id, decision, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(actor_id, target_id)
                 DO UPDATE SET decision = excluded.decision, created_at = excluded.created_at",
                rusqlite::params![actor.to_string(), target.to_string(), decision.as_str(), now],
            )?;

            let mut outcome = SwipeOutcome::Recorded;

            if decision == Decision::Like {
                let reciprocal: Option<String> = tx
                    .query_row(
                        "SELECT decision FROM swipes WHERE actor_id = ?1 AND target_id = ?2",
                        rusqlite::params![target.to_string(), actor.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;

                if reciprocal.as_deref() == Some(Decision::Like.as_str()) {
                    let key = pair_key(actor, target);
                    let inserted = tx.execute(
                        "INSERT INTO matches (id, user_a, user_b, pair_key, channel_id, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(pair_key) DO NOTHING",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            actor.to_string(),
                            target.to_string(),
                            key,
                            Uuid::new_v4().to_string(),
                            now,
                        ],
                    )?;

                    let row = tx
                        .query_row(
                            "SELECT id, user_a, user_b, channel_id, created_at
                             FROM matches WHERE pair_key = ?1",
                            [&key],
                            map_match_row,
                        )?;

                    outcome = SwipeOutcome::Matched {
                        row,
                        newly_created: inserted > 0,
                    };
                }
            }

            tx.commit()?;
            Ok(outcome)
        })
    }

    pub fn get_match(&self, id: Uuid) -> Result<Option<MatchRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_a, user_b, channel_id, created_at FROM matches WHERE id = ?1",
                [id.to_string()],
                map_match_row,
            )
            .optional()
        })
    }

    /// Unmatch: removes the match, both swipe rows and all chat state for its
    /// channel in one transaction. The only path that retroactively removes
    /// state.
    pub fn delete_match(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let row = tx
                .query_row(
                    "SELECT id, user_a, user_b, channel_id, created_at FROM matches WHERE id = ?1",
                    [id.to_string()],
                    map_match_row,
                )
                .optional()?;

            let Some(row) = row else {
                return Ok(false);
            };

            tx.execute("DELETE FROM messages WHERE match_id = ?1", [&row.id])?;
            tx.execute("DELETE FROM chat_log WHERE channel_id = ?1", [&row.channel_id])?;
            tx.execute(
                "DELETE FROM swipes
                 WHERE (actor_id = ?1 AND target_id = ?2) OR (actor_id = ?2 AND target_id = ?1)",
                rusqlite::params![row.user_a, row.user_b],
            )?;
            tx.execute("DELETE FROM matches WHERE id = ?1", [&row.id])?;

            tx.commit()?;
            Ok(true)
        })
    }

    // -- Chat storage --

    /// Append to the fast per-channel log. Failure here is not tolerated by
    /// the caller — the fast log backs live history.
    pub fn append_chat_log(&self, m: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_log (channel_id, message_id, sender_id, body, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    m.channel_id.to_string(),
                    m.id.to_string(),
                    m.sender_id.to_string(),
                    m.body,
                    m.kind.as_str(),
                    fmt_ts(m.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Most recent `limit` messages from the fast log, ascending by time.
    pub fn chat_history(&self, channel_id: Uuid, limit: u32) -> Result<Vec<ChatMessage>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT channel_id, message_id, sender_id, body, kind, created_at
                 FROM chat_log
                 WHERE channel_id = ?1
                 ORDER BY created_at DESC, message_id DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt
                .query_map(rusqlite::params![channel_id.to_string(), limit], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .into_iter()
                .map(|(channel, id, sender, body, kind, created_at)| {
                    chat_message_from_parts(&channel, &id, &sender, body, &kind, &created_at)
                })
                .collect::<Vec<_>>();
            rows.reverse();
            Ok(rows)
        })
    }

    /// Best-effort durable cross-channel copy.
    pub fn insert_durable_message(&self, match_id: Uuid, m: &ChatMessage) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, match_id, sender_id, body, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    m.id.to_string(),
                    match_id.to_string(),
                    m.sender_id.to_string(),
                    m.body,
                    m.kind.as_str(),
                    fmt_ts(m.created_at),
                ],
            )?;
            Ok(())
        })
    }
}

fn map_profile_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        display_name: row.get(1)?,
        age: row.get(2)?,
        mode: row.get(3)?,
        goals: row.get(4)?,
        interests: row.get(5)?,
        drinks: row.get(6)?,
        smokes: row.get(7)?,
        bio: row.get(8)?,
        lat: row.get(9)?,
        lon: row.get(10)?,
        cell: row.get(11)?,
    })
}

fn map_match_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        id: row.get(0)?,
        user_a: row.get(1)?,
        user_b: row.get(2)?,
        channel_id: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_profile(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Option<ProfileRow>> {
    let sql = format!(
        "SELECT id, display_name, age, mode, goals, interests, drinks, smokes, bio, lat, lon, cell
         FROM users {}",
        where_clause
    );
    conn.query_row(&sql, params, map_profile_row).optional()
}

fn profile_from_row(row: ProfileRow) -> Result<UserProfile> {
    let mode = Mode::parse(&row.mode)
        .ok_or_else(|| anyhow::anyhow!("Unknown mode '{}' on user {}", row.mode, row.id))?;
    Ok(UserProfile {
        id: row.id.parse()?,
        display_name: row.display_name,
        age: row.age.clamp(0, u8::MAX as i64) as u8,
        mode,
        goals: serde_json::from_str(&row.goals)?,
        interests: serde_json::from_str(&row.interests)?,
        drinks: row.drinks,
        smokes: row.smokes,
        bio: row.bio,
        lat: row.lat,
        lon: row.lon,
        cell: row.cell,
    })
}

fn chat_message_from_parts(
    channel: &str,
    id: &str,
    sender: &str,
    body: String,
    kind: &str,
    created_at: &str,
) -> ChatMessage {
    ChatMessage {
        id: id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", id, e);
            Uuid::default()
        }),
        channel_id: channel.parse().unwrap_or_default(),
        sender_id: sender.parse().unwrap_or_default(),
        body,
        kind: MessageKind::parse(kind).unwrap_or(MessageKind::Text),
        created_at: parse_ts(created_at),
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
