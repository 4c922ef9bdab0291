use rusqlite::{params, Connection, Result};
const SCHEMA_VERSION: i32 = 2;

pub struct Migrator {
    conn: Connection,
}

impl Migrator {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn run_migrations(&mut self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        let current_version = self.current_version()?;
        log::debug!("Current database schema version: {}", current_version);

        if current_version < SCHEMA_VERSION {
            log::info!("Migrating database from version {} to {}", current_version, SCHEMA_VERSION);
            self.migrate_from(current_version)?;
        }

        Ok(())
    }

    pub fn current_version(&self) -> Result<i32> {
        let version: Option<i32> = self.conn.query_row(
            "SELECT MAX(version) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        Ok(version.unwrap_or(0))
    }

    fn migrate_from(&mut self, from_version: i32) -> Result<()> {
        let tx = self.conn.transaction()?;

        for version in (from_version + 1)..=SCHEMA_VERSION {
            log::debug!("Applying migration to version {}", version);
            match version {
                1 => Self::migrate_to_v1_impl(&tx)?,
                2 => Self::migrate_to_v2_impl(&tx)?,
                _ => return Err(rusqlite::Error::InvalidQuery),
            }

            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![version],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn migrate_to_v1_impl(tx: &rusqlite::Transaction) -> Result<()> {
        tx.execute(
            "CREATE TABLE IF NOT EXISTS jobs (
                job_id TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                groups TEXT NOT NULL DEFAULT '',
                analysis_config TEXT NOT NULL DEFAULT '{}',
                analysis_limits TEXT NOT NULL DEFAULT '{}',
                datafeed_config TEXT NOT NULL DEFAULT '{}',
                custom_settings TEXT NOT NULL DEFAULT '{}',
                last_updated TEXT NOT NULL
            )",
            [],
        )?;

        tx.execute(
            "CREATE TABLE IF NOT EXISTS job_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                groups TEXT NOT NULL DEFAULT '',
                analysis_config TEXT NOT NULL DEFAULT '{}',
                analysis_limits TEXT NOT NULL DEFAULT '{}',
                datafeed_config TEXT NOT NULL DEFAULT '{}',
                custom_settings TEXT NOT NULL DEFAULT '{}',
                timestamp TEXT NOT NULL,
                FOREIGN KEY (job_id) REFERENCES jobs(job_id)
            )",
            [],
        )?;

        Ok(())
    }

    fn migrate_to_v2_impl(tx: &rusqlite::Transaction) -> Result<()> {
        // One version number per job; also the lookup path for max(version)
        tx.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_job_versions_job_version
             ON job_versions(job_id, version)",
            [],
        )?;

        tx.execute(
            "CREATE INDEX IF NOT EXISTS idx_job_versions_job_timestamp
             ON job_versions(job_id, timestamp)",
            [],
        )?;

        tx.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_last_updated ON jobs(last_updated)",
            [],
        )?;

        Ok(())
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}
