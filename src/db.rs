use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::AppError;
use crate::parser::Substitution;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn init(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS substitutions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                lesson_num      TEXT NOT NULL,
                lesson_name     TEXT NOT NULL,
                substitute      TEXT NOT NULL,
                room            TEXT NOT NULL,
                additional_info TEXT NOT NULL,
                teacher         TEXT NOT NULL,
                day             TEXT NOT NULL,
                crawled_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(lesson_num, lesson_name, substitute, room, additional_info, teacher, day)
            );
            ",
        )?;

        Ok(Self { conn })
    }

    /// Insert a substitution. Returns true if it was actually new.
    ///
    /// The UNIQUE constraint folds the existence check and the insert into
    /// one statement, so the same announcement can never land twice.
    pub fn insert_if_new(&self, sub: &Substitution) -> Result<bool, AppError> {
        let now = Utc::now().to_rfc3339();

        let affected = self.conn.execute(
            "INSERT OR IGNORE INTO substitutions
             (lesson_num, lesson_name, substitute, room, additional_info, teacher, day, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                sub.lesson_num,
                sub.lesson_name,
                sub.substitute,
                sub.room,
                sub.additional_info,
                sub.teacher,
                sub.day,
                now,
            ],
        )?;

        Ok(affected > 0)
    }

    /// Exact-match lookup over the full announcement tuple (used in tests).
    #[allow(dead_code)]
    pub fn contains(&self, sub: &Substitution) -> Result<bool, AppError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM substitutions
             WHERE lesson_num = ?1 AND lesson_name = ?2 AND substitute = ?3
               AND room = ?4 AND additional_info = ?5 AND teacher = ?6 AND day = ?7",
            params![
                sub.lesson_num,
                sub.lesson_name,
                sub.substitute,
                sub.room,
                sub.additional_info,
                sub.teacher,
                sub.day,
            ],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }
}
