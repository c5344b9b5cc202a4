use super::{BlockRow, BlockStore, StoreError};
use crate::cache::types::ProofType;
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tracing::{debug, info};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS blocks (
    height      INTEGER PRIMARY KEY,
    hash        BLOB    NOT NULL,
    prev_hash   BLOB,
    size        INTEGER NOT NULL,
    weight      INTEGER NOT NULL,
    proof_type  TEXT    NOT NULL,
    time        INTEGER NOT NULL,
    median_time INTEGER NOT NULL,
    tx_count    INTEGER NOT NULL,
    synced      INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_blocks_synced ON blocks (synced, height);

CREATE TABLE IF NOT EXISTS transactions (
    txid         BLOB    PRIMARY KEY,
    block_height INTEGER NOT NULL,
    tx_index     INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_height ON transactions (block_height);

CREATE TABLE IF NOT EXISTS rawtxs (
    txid BLOB PRIMARY KEY,
    data BLOB NOT NULL
);
";

/// `SQLite` implementation of [`BlockStore`].
pub struct SqliteBlockStore {
    pool: Pool<Sqlite>,
}

fn to_i64(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|e| StoreError::Decode(format!("column '{column}' value {value} out of range: {e}")))
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, StoreError> {
    hex::decode(value).map_err(|source| StoreError::InvalidHex { field, source })
}

impl SqliteBlockStore {
    /// Connects to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().max_connections(4).connect(database_url).await?;
        info!("connected to block store");
        Ok(Self { pool })
    }

    /// Private in-memory database on a single pooled connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Creates the schema if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("block store schema ready");
        Ok(())
    }

    /// Extracts a non-nullable field from a database row.
    fn get_required<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get::<T, _>(column)
            .map_err(|e| StoreError::Decode(format!("column '{column}': {e}")))
    }

    fn get_u64(row: &SqliteRow, column: &str) -> Result<u64, StoreError> {
        let value: i64 = Self::get_required(row, column)?;
        u64::try_from(value).map_err(|e| {
            StoreError::Decode(format!("column '{column}' value {value} is negative: {e}"))
        })
    }

    fn row_to_block(row: &SqliteRow) -> Result<BlockRow, StoreError> {
        let hash: Vec<u8> = Self::get_required(row, "hash")?;
        let prev_hash: Option<Vec<u8>> = Self::get_required(row, "prev_hash")?;
        let proof_type: String = Self::get_required(row, "proof_type")?;
        let tx_count = Self::get_u64(row, "tx_count")?;

        Ok(BlockRow {
            height: Self::get_u64(row, "height")?,
            hash: hex::encode(hash),
            previous_hash: prev_hash.map(hex::encode),
            size: Self::get_u64(row, "size")?,
            weight: Self::get_u64(row, "weight")?,
            proof_type: ProofType::from_label(&proof_type),
            time: Self::get_required(row, "time")?,
            median_time: Self::get_required(row, "median_time")?,
            tx_count: u32::try_from(tx_count)
                .map_err(|e| StoreError::Decode(format!("column 'tx_count': {e}")))?,
            synced: Self::get_required(row, "synced")?,
        })
    }

    /// Encoded column values shared by insert and update.
    fn encode_row(row: &BlockRow) -> Result<EncodedRow, StoreError> {
        Ok(EncodedRow {
            height: to_i64(row.height, "height")?,
            hash: decode_hex("hash", &row.hash)?,
            prev_hash: row.previous_hash.as_deref().map(|h| decode_hex("prev_hash", h)).transpose()?,
            size: to_i64(row.size, "size")?,
            weight: to_i64(row.weight, "weight")?,
            tx_count: i64::from(row.tx_count),
        })
    }

    /// Number of stored transaction rows for `height`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn transaction_count(&self, height: u64) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM transactions WHERE block_height = ?")
            .bind(to_i64(height, "block_height")?)
            .fetch_one(&self.pool)
            .await?;
        Self::get_u64(&row, "n")
    }

    /// Heights of all fully synced blocks, ascending.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the query fails.
    pub async fn synced_heights(&self) -> Result<Vec<u64>, StoreError> {
        let rows = sqlx::query("SELECT height FROM blocks WHERE synced = 1 ORDER BY height")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| Self::get_u64(row, "height")).collect()
    }
}

struct EncodedRow {
    height: i64,
    hash: Vec<u8>,
    prev_hash: Option<Vec<u8>>,
    size: i64,
    weight: i64,
    tx_count: i64,
}

const BLOCK_COLUMNS: &str =
    "height, hash, prev_hash, size, weight, proof_type, time, median_time, tx_count, synced";

#[async_trait]
impl BlockStore for SqliteBlockStore {
    async fn get_latest_block(&self, only_synced: bool) -> Result<Option<BlockRow>, StoreError> {
        let sql = if only_synced {
            format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE synced = 1 ORDER BY height DESC LIMIT 1")
        } else {
            format!("SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY height DESC LIMIT 1")
        };
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_block).transpose()
    }

    async fn get_block(&self, height: u64) -> Result<Option<BlockRow>, StoreError> {
        let sql = format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE height = ?");
        let row = sqlx::query(&sql)
            .bind(to_i64(height, "height")?)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_block).transpose()
    }

    async fn insert_block(&self, row: &BlockRow) -> Result<(), StoreError> {
        let encoded = Self::encode_row(row)?;
        sqlx::query(
            r"
            INSERT INTO blocks (height, hash, prev_hash, size, weight, proof_type, time,
                                median_time, tx_count, synced)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(encoded.height)
        .bind(encoded.hash)
        .bind(encoded.prev_hash)
        .bind(encoded.size)
        .bind(encoded.weight)
        .bind(row.proof_type.as_str())
        .bind(row.time)
        .bind(row.median_time)
        .bind(encoded.tx_count)
        .bind(row.synced)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_sync_state(&self, height: u64, synced: bool) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE blocks SET synced = ? WHERE height = ?")
            .bind(synced)
            .bind(to_i64(height, "height")?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(height));
        }
        Ok(())
    }

    async fn insert_transactions(&self, height: u64, txids: &[String]) -> Result<(), StoreError> {
        let block_height = to_i64(height, "block_height")?;
        let mut tx = self.pool.begin().await?;
        for (index, txid) in txids.iter().enumerate() {
            sqlx::query(
                r"
                INSERT INTO transactions (txid, block_height, tx_index) VALUES (?, ?, ?)
                ON CONFLICT(txid) DO UPDATE SET
                    block_height = excluded.block_height,
                    tx_index = excluded.tx_index
                ",
            )
            .bind(decode_hex("txid", txid)?)
            .bind(block_height)
            .bind(to_i64(index as u64, "tx_index")?)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn update_block(&self, row: &BlockRow, txids: &[String]) -> Result<(), StoreError> {
        let encoded = Self::encode_row(row)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE blocks
            SET hash = ?, prev_hash = ?, size = ?, weight = ?, proof_type = ?, time = ?,
                median_time = ?, tx_count = ?, synced = ?
            WHERE height = ?
            ",
        )
        .bind(encoded.hash)
        .bind(encoded.prev_hash)
        .bind(encoded.size)
        .bind(encoded.weight)
        .bind(row.proof_type.as_str())
        .bind(row.time)
        .bind(row.median_time)
        .bind(encoded.tx_count)
        .bind(row.synced)
        .bind(encoded.height)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(row.height));
        }

        sqlx::query("DELETE FROM transactions WHERE block_height = ?")
            .bind(encoded.height)
            .execute(&mut *tx)
            .await?;

        for (index, txid) in txids.iter().enumerate() {
            sqlx::query(
                "INSERT OR REPLACE INTO transactions (txid, block_height, tx_index) VALUES (?, ?, ?)",
            )
            .bind(decode_hex("txid", txid)?)
            .bind(encoded.height)
            .bind(to_i64(index as u64, "tx_index")?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_raw_tx(&self, txid: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT data FROM rawtxs WHERE txid = ?")
            .bind(decode_hex("txid", txid)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Self::get_required::<Vec<u8>>(&row, "data").map(hex::encode)).transpose()
    }

    async fn get_raw_txs(&self, txids: &[String]) -> Result<Vec<(String, String)>, StoreError> {
        if txids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; txids.len()].join(", ");
        let sql = format!("SELECT txid, data FROM rawtxs WHERE txid IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for txid in txids {
            query = query.bind(decode_hex("txid", txid)?);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let txid: Vec<u8> = Self::get_required(row, "txid")?;
                let data: Vec<u8> = Self::get_required(row, "data")?;
                Ok((hex::encode(txid), hex::encode(data)))
            })
            .collect()
    }

    async fn insert_raw_tx(&self, txid: &str, hex: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO rawtxs (txid, data) VALUES (?, ?)")
            .bind(decode_hex("txid", txid)?)
            .bind(decode_hex("data", hex)?)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
