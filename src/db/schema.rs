//! Database schema and migrations for feedkeeper.
//!
//! Migrations are applied in order when the database is opened; the
//! `schema_version` table records which ones have already run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: feeds and articles
    r#"
CREATE TABLE feeds (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    title               TEXT NOT NULL,
    url                 TEXT NOT NULL UNIQUE,
    refresh_interval    INTEGER NOT NULL DEFAULT 0,   -- 0 global, -1 intelligent, -2 never, n>0 minutes
    last_updated        TEXT,
    last_update_status  TEXT NOT NULL DEFAULT 'pending',  -- 'pending', 'success', 'failed'
    last_error          TEXT,
    articles_per_month  REAL NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE articles (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id        INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    guid           TEXT NOT NULL,
    title          TEXT NOT NULL,
    url            TEXT,
    content        TEXT,
    published_at   TEXT NOT NULL,
    is_read        INTEGER NOT NULL DEFAULT 0,
    is_favorite    INTEGER NOT NULL DEFAULT 0,
    is_read_later  INTEGER NOT NULL DEFAULT 0,
    fetched_at     TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(feed_id, guid)
);

CREATE INDEX idx_articles_feed_id ON articles(feed_id);
CREATE INDEX idx_articles_published_at ON articles(published_at);
"#,
    // v2: runtime settings
    r#"
CREATE TABLE settings (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
"#,
    // v3: retention queries filter on protection flags before ordering by age
    r#"
CREATE INDEX idx_articles_retention ON articles(is_favorite, is_read_later, is_read, published_at);
"#,
];
