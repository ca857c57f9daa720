mod account;
mod token;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

pub use account::{Account, AccountStore, NewAccount};
pub use token::{RefreshTokenRecord, RefreshTokenStore};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Get the current schema version.
    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    /// Set the schema version within a transaction.
    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Accounts table. Usernames arrive lower-cased; the NOCASE
                // collation makes lookups and uniqueness case-insensitive.
                "CREATE TABLE accounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT UNIQUE NOT NULL,
                    username TEXT UNIQUE NOT NULL COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    salutation TEXT NOT NULL DEFAULT 'Mr',
                    full_name TEXT NOT NULL,
                    dob TEXT NOT NULL,
                    gender TEXT NOT NULL,
                    phone TEXT UNIQUE,
                    address TEXT NOT NULL,
                    location TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                    last_login TEXT
                )",
                "CREATE INDEX idx_accounts_uuid ON accounts(uuid)",
                "CREATE INDEX idx_accounts_username ON accounts(username)",
                // Refresh tokens. Rows are soft-revoked via is_blacklisted,
                // never deleted in normal operation.
                "CREATE TABLE refresh_tokens (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
                    token TEXT UNIQUE NOT NULL,
                    issued_at INTEGER NOT NULL,
                    expires_at INTEGER NOT NULL,
                    is_blacklisted INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )",
                "CREATE INDEX idx_refresh_tokens_token ON refresh_tokens(token)",
                "CREATE INDEX idx_refresh_tokens_account_id ON refresh_tokens(account_id)",
            ],
        )
        .await
    }

    /// Get the account store.
    pub fn accounts(&self) -> AccountStore {
        AccountStore::new(self.pool.clone())
    }

    /// Get the refresh token store.
    pub fn tokens(&self) -> RefreshTokenStore {
        RefreshTokenStore::new(self.pool.clone())
    }

    /// Get the underlying connection pool (for tests that need raw SQL access).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_account(username: &str, uuid: &str) -> NewAccount<'static> {
        NewAccount {
            uuid: uuid.to_string().leak(),
            username: username.to_string().leak(),
            password_hash: "$argon2id$fake",
            salutation: "Mr",
            full_name: "Test Person",
            dob: "1990-01-01",
            gender: "M",
            phone: None,
            address: "1 Test Street",
            location: "Testville",
        }
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.accounts().create(&test_account("alice", "uuid-123")).await.unwrap();

        let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.uuid, "uuid-123");
        assert_eq!(account.username, "alice");
        assert!(account.is_active);
        assert!(account.last_login.is_none());

        let account = db.accounts().get_by_uuid("uuid-123").await.unwrap().unwrap();
        assert_eq!(account.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.accounts().create(&test_account("alice", "uuid-1")).await.unwrap();
        let result = db.accounts().create(&test_account("alice", "uuid-2")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_username_case_insensitive() {
        let db = Database::open(":memory:").await.unwrap();

        db.accounts().create(&test_account("alice", "uuid-1")).await.unwrap();
        assert!(db.accounts().username_exists("ALICE").await.unwrap());
        let result = db.accounts().create(&test_account("Alice", "uuid-2")).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deactivate_account() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.accounts().create(&test_account("alice", "uuid-123")).await.unwrap();
        db.accounts().set_active(id, false).await.unwrap();

        let account = db.accounts().get_by_username("alice").await.unwrap().unwrap();
        assert!(!account.is_active);

        // Active-only lookup must not find it
        assert!(
            db.accounts()
                .get_active_by_uuid("uuid-123")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_refresh_token_roundtrip() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db.accounts().create(&test_account("alice", "uuid-123")).await.unwrap();
        db.tokens().create(id, "tok-1", 1000, 2000).await.unwrap();

        let record = db.tokens().get_by_token("tok-1").await.unwrap().unwrap();
        assert_eq!(record.account_id, id);
        assert_eq!(record.issued_at, 1000);
        assert_eq!(record.expires_at, 2000);
        assert!(!record.is_blacklisted);

        assert!(db.tokens().get_by_token("tok-2").await.unwrap().is_none());
    }
}
