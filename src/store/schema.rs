//! Schema for the sqlite cache backend.

pub const SCHEMA: &str = r#"
-- Primary entity records (serialized JSON)
CREATE TABLE IF NOT EXISTS records (
    kind TEXT NOT NULL,
    key TEXT NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (kind, key)
);

-- Set-valued relations (emails:<uid>, members:<gid>, contributors:<pid>...)
CREATE TABLE IF NOT EXISTS relation_sets (
    name TEXT NOT NULL,
    member TEXT NOT NULL,
    PRIMARY KEY (name, member)
);

-- Ordered commit timelines scored by timestamp; seq preserves insertion
-- order for tie-breaking
CREATE TABLE IF NOT EXISTS timelines (
    name TEXT NOT NULL,
    member TEXT NOT NULL,
    score INTEGER NOT NULL,
    seq INTEGER NOT NULL,
    PRIMARY KEY (name, member)
);

CREATE INDEX IF NOT EXISTS idx_timelines_range
    ON timelines(name, score, seq);
"#;
