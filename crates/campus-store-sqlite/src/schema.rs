//! SQL schema for the campus SQLite store.
//!
//! Executed once at connection startup. Migrations are gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,  -- stored lowercased
    role          TEXT NOT NULL,         -- 'student' | 'faculty' | 'admin'
    password_hash TEXT NOT NULL,         -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- There is no 'rejected' approval state: rejected clubs are deleted.
CREATE TABLE IF NOT EXISTS clubs (
    club_id     TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category    TEXT NOT NULL DEFAULT 'general',
    creator_id  TEXT NOT NULL,
    approval    TEXT NOT NULL,           -- 'pending' | 'approved'
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS club_members (
    club_id   TEXT NOT NULL REFERENCES clubs(club_id) ON DELETE CASCADE,
    user_id   TEXT NOT NULL,
    joined_at TEXT NOT NULL,
    PRIMARY KEY (club_id, user_id)
);

CREATE TABLE IF NOT EXISTS polls (
    poll_id      TEXT PRIMARY KEY,
    question     TEXT NOT NULL,
    options_json TEXT NOT NULL,          -- JSON array of option texts
    end_date     TEXT NOT NULL,
    creator_id   TEXT NOT NULL,
    approval     TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

-- One row per voter; the primary key is the one-vote-per-user rule.
CREATE TABLE IF NOT EXISTS poll_votes (
    poll_id      TEXT NOT NULL REFERENCES polls(poll_id) ON DELETE CASCADE,
    user_id      TEXT NOT NULL,
    option_index INTEGER NOT NULL,
    voted_at     TEXT NOT NULL,
    PRIMARY KEY (poll_id, user_id)
);

CREATE TABLE IF NOT EXISTS lost_items (
    item_id            TEXT PRIMARY KEY,
    title              TEXT NOT NULL,
    description        TEXT NOT NULL DEFAULT '',
    location           TEXT,
    reporter_id        TEXT NOT NULL,
    status             TEXT NOT NULL,    -- 'active' | 'pending-approval' | 'resolved'
    claimant_id        TEXT,
    claim_requested_at TEXT,
    resolved_by        TEXT,
    resolved_at        TEXT,
    rejection_reason   TEXT,
    created_at         TEXT NOT NULL,
    revision           INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS clubs_approval_idx     ON clubs(approval);
CREATE INDEX IF NOT EXISTS polls_approval_idx     ON polls(approval);
CREATE INDEX IF NOT EXISTS lost_items_status_idx  ON lost_items(status);

PRAGMA user_version = 2;
";

/// Version 1 stores predate the lost-item `revision` column.
pub const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE lost_items ADD COLUMN revision INTEGER NOT NULL DEFAULT 0;
PRAGMA user_version = 2;
";
