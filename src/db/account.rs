use sqlx::sqlite::SqlitePool;

/// A user account. `password_hash` is an argon2 PHC string; plaintext is
/// never stored.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub password_hash: String,
    pub salutation: String,
    pub full_name: String,
    pub dob: String,
    pub gender: String,
    pub phone: Option<String>,
    pub address: String,
    pub location: String,
    pub is_active: bool,
    pub last_login: Option<String>,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    uuid: String,
    username: String,
    password_hash: String,
    salutation: String,
    full_name: String,
    dob: String,
    gender: String,
    phone: Option<String>,
    address: String,
    location: String,
    is_active: i32,
    last_login: Option<String>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            password_hash: row.password_hash,
            salutation: row.salutation,
            full_name: row.full_name,
            dob: row.dob,
            gender: row.gender,
            phone: row.phone,
            address: row.address,
            location: row.location,
            is_active: row.is_active != 0,
            last_login: row.last_login,
        }
    }
}

/// Field set for inserting a new account.
#[derive(Debug)]
pub struct NewAccount<'a> {
    pub uuid: &'a str,
    /// Already case-normalized by the caller
    pub username: &'a str,
    pub password_hash: &'a str,
    pub salutation: &'a str,
    pub full_name: &'a str,
    pub dob: &'a str,
    pub gender: &'a str,
    pub phone: Option<&'a str>,
    pub address: &'a str,
    pub location: &'a str,
}

const ACCOUNT_COLUMNS: &str = "id, uuid, username, password_hash, salutation, full_name, dob, \
     gender, phone, address, location, is_active, last_login";

#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new account (active by default). Returns the row ID.
    /// Username/phone uniqueness is enforced by the table constraints.
    pub async fn create(&self, account: &NewAccount<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO accounts (uuid, username, password_hash, salutation, full_name, dob, \
             gender, phone, address, location) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(account.uuid)
        .bind(account.username)
        .bind(account.password_hash)
        .bind(account.salutation)
        .bind(account.full_name)
        .bind(account.dob)
        .bind(account.gender)
        .bind(account.phone)
        .bind(account.address)
        .bind(account.location)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get an account by username, active or not. Login needs the inactive
    /// ones too so it can report a deactivated account distinctly.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE username = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE uuid = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by UUID, filtered to active ones. Token verification
    /// resolves subjects through this so disabled accounts fail closed.
    pub async fn get_active_by_uuid(&self, uuid: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM accounts WHERE uuid = ? AND is_active = 1",
            ACCOUNT_COLUMNS
        ))
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Account::from))
    }

    /// Check whether a username is already taken (NOCASE column, so this is
    /// case-insensitive).
    pub async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Check whether a phone number is already taken.
    pub async fn phone_exists(&self, phone: &str) -> Result<bool, sqlx::Error> {
        let count: (i32,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE phone = ?")
            .bind(phone)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Stamp the last successful login.
    pub async fn update_last_login(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE accounts SET last_login = datetime('now') WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replace the password hash.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE accounts SET password_hash = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Enable or disable an account.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET is_active = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(active as i32)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
