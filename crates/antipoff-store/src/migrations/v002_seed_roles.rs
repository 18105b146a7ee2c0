//! v002 -- Seed the static roles.
//!
//! `users.role_id` defaults to 1, so the `user` role has to exist before the
//! first registration.

use rusqlite::Connection;

const UP_SQL: &str = r#"
INSERT OR IGNORE INTO roles (id, name) VALUES (1, 'user');
INSERT OR IGNORE INTO roles (id, name) VALUES (2, 'admin');
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
