/// Database row types — these map directly to SQLite rows.
/// Distinct from ember-types API models to keep the DB layer independent.

pub struct ProfileRow {
    pub id: String,
    pub display_name: String,
    pub age: i64,
    pub mode: String,
    pub goals: String,
    pub interests: String,
    pub drinks: bool,
    pub smokes: bool,
    pub bio: String,
    pub lat: f64,
    pub lon: f64,
    pub cell: String,
}

pub struct MatchRow {
    pub id: String,
    pub user_a: String,
    pub user_b: String,
    pub channel_id: String,
    pub created_at: String,
}

pub struct ChatLogRow {
    pub channel_id: String,
    pub message_id: String,
    pub sender_id: String,
    pub body: String,
    pub kind: String,
    pub created_at: String,
}
