//! SQL schema for the Trove SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per record. The body is the full JSON document, including its id.
-- There are no foreign keys; referential integrity is the cascade's job.
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,   -- 'account' | 'collection' | 'item' | ...
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL    -- RFC 3339 UTC, fixed microsecond width
);

CREATE INDEX IF NOT EXISTS documents_kind_idx
    ON documents(kind, created_at);

-- Foreign-key lookups used by the cascade and the per-parent listings.
CREATE INDEX IF NOT EXISTS documents_owner_idx
    ON documents(kind, json_extract(body, '$.owner'));
CREATE INDEX IF NOT EXISTS documents_collection_idx
    ON documents(kind, json_extract(body, '$.collection'));
CREATE INDEX IF NOT EXISTS documents_item_idx
    ON documents(kind, json_extract(body, '$.item'));

PRAGMA user_version = 1;
";
