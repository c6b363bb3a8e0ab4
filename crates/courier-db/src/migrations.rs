use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                name        TEXT NOT NULL,
                lastname    TEXT NOT NULL,
                bio         TEXT,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_users_name ON users(name, lastname);

            CREATE TABLE friendships (
                requester_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status        TEXT NOT NULL DEFAULT 'pending'
                              CHECK (status IN ('pending', 'accepted')),
                created_at    TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (requester_id, target_id),
                CHECK (requester_id <> target_id)
            );

            -- One row per unordered pair, whichever side asked first
            CREATE UNIQUE INDEX idx_friendships_pair
                ON friendships(min(requester_id, target_id), max(requester_id, target_id));

            CREATE INDEX idx_friendships_target ON friendships(target_id);

            CREATE TABLE chats (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                is_private  INTEGER NOT NULL DEFAULT 1,
                name        TEXT,
                status      TEXT NOT NULL DEFAULT 'opened'
                            CHECK (status IN ('opened', 'closed')),
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE chat_members (
                chat_id    INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                user_id    INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role       TEXT NOT NULL DEFAULT 'member'
                           CHECK (role IN ('owner', 'admin', 'member')),
                joined_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (chat_id, user_id)
            );

            CREATE INDEX idx_chat_members_user ON chat_members(user_id);

            CREATE UNIQUE INDEX idx_chat_members_owner
                ON chat_members(chat_id) WHERE role = 'owner';

            CREATE TABLE messages (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id  INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                user_id  INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text     TEXT NOT NULL,
                sent_at  INTEGER NOT NULL
            );

            CREATE INDEX idx_messages_chat_sent ON messages(chat_id, sent_at);

            CREATE TABLE attachments (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id    INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                filename      TEXT NOT NULL,
                stored_path   TEXT NOT NULL,
                content_type  TEXT NOT NULL,
                size          INTEGER NOT NULL,
                sha256        TEXT NOT NULL
            );

            CREATE INDEX idx_attachments_message ON attachments(message_id);

            CREATE TABLE pictures (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id      INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                filename      TEXT NOT NULL,
                stored_path   TEXT NOT NULL,
                content_type  TEXT NOT NULL,
                size          INTEGER NOT NULL,
                placement     TEXT NOT NULL CHECK (placement IN ('avatar', 'wall')),
                created_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_pictures_owner ON pictures(owner_id, placement);

            CREATE UNIQUE INDEX idx_pictures_avatar
                ON pictures(owner_id) WHERE placement = 'avatar';

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
