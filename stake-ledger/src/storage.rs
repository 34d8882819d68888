//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `wallets` - Wallet accounts (key: wallet address)
//! - `aggregate` - The global aggregate row (key: `global`)
//! - `activity` - Append-only activity log (key: timestamp_be || event_id)
//! - `config` - Reward rate record and accepted admin signature digests

use crate::{
    error::{Error, Result},
    types::{ActivityEvent, GlobalAggregate, RewardRateRecord, WalletAccount, WalletAddress,
        GLOBAL_AGGREGATE_ID},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB,
};
use std::sync::Arc;

/// Column family names
const CF_WALLETS: &str = "wallets";
const CF_AGGREGATE: &str = "aggregate";
const CF_ACTIVITY: &str = "activity";
const CF_CONFIG: &str = "config";

const KEY_REWARD_RATE: &[u8] = b"reward_rate";
const PREFIX_SIGNATURE: &[u8] = b"sig:";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_WALLETS, Self::cf_options_wallets()),
            ColumnFamilyDescriptor::new(CF_AGGREGATE, Options::default()),
            ColumnFamilyDescriptor::new(CF_ACTIVITY, Self::cf_options_activity()),
            ColumnFamilyDescriptor::new(CF_CONFIG, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_wallets() -> Options {
        let mut opts = Options::default();
        // Point lookups by address on every request
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    fn cf_options_activity() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Wallet operations

    /// Get wallet account, `None` if never observed
    pub fn get_wallet(&self, wallet: &WalletAddress) -> Result<Option<WalletAccount>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        match self.db.get_cf(cf, wallet.as_str().as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Put a wallet account alone (snapshot path, aggregate untouched)
    pub fn put_wallet(&self, account: &WalletAccount) -> Result<()> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let value = bincode::serialize(account)?;
        self.db
            .put_cf(cf, account.wallet_address.as_str().as_bytes(), &value)?;
        Ok(())
    }

    /// All wallet accounts
    pub fn list_wallets(&self) -> Result<Vec<WalletAccount>> {
        let cf = self.cf_handle(CF_WALLETS)?;
        let mut wallets = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            wallets.push(bincode::deserialize(&value)?);
        }
        Ok(wallets)
    }

    // Aggregate operations

    /// Get the global aggregate, `None` before the first wallet
    pub fn get_aggregate(&self) -> Result<Option<GlobalAggregate>> {
        let cf = self.cf_handle(CF_AGGREGATE)?;
        match self.db.get_cf(cf, GLOBAL_AGGREGATE_ID.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    // Batch operations (atomic)

    /// Write a wallet row and the aggregate row together (atomic)
    pub fn put_wallet_and_aggregate(
        &self,
        account: &WalletAccount,
        aggregate: &GlobalAggregate,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_wallets = self.cf_handle(CF_WALLETS)?;
        batch.put_cf(
            cf_wallets,
            account.wallet_address.as_str().as_bytes(),
            bincode::serialize(account)?,
        );

        let cf_aggregate = self.cf_handle(CF_AGGREGATE)?;
        batch.put_cf(
            cf_aggregate,
            GLOBAL_AGGREGATE_ID.as_bytes(),
            bincode::serialize(aggregate)?,
        );

        self.db.write(batch)?;
        Ok(())
    }

    // Activity operations

    /// Append activity events (atomic, all or none)
    pub fn append_events(&self, events: &[ActivityEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let cf = self.cf_handle(CF_ACTIVITY)?;
        let mut batch = WriteBatch::default();
        for event in events {
            batch.put_cf(cf, Self::activity_key(event), bincode::serialize(event)?);
        }
        self.db.write(batch)?;

        tracing::debug!(count = events.len(), "Activity events appended");
        Ok(())
    }

    /// Activity events with `start <= timestamp <= end`, in time order
    pub fn events_between(&self, start: i64, end: i64) -> Result<Vec<ActivityEvent>> {
        let cf = self.cf_handle(CF_ACTIVITY)?;
        let start_key = Self::timestamp_prefix(start);
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start_key[..], Direction::Forward));

        let mut events = Vec::new();
        for item in iter {
            let (_, value) = item?;
            let event: ActivityEvent = bincode::deserialize(&value)?;
            if event.timestamp > end {
                break;
            }
            events.push(event);
        }
        Ok(events)
    }

    // Key helpers

    fn timestamp_prefix(timestamp: i64) -> [u8; 8] {
        (timestamp.max(0) as u64).to_be_bytes()
    }

    fn activity_key(event: &ActivityEvent) -> Vec<u8> {
        let mut key = Self::timestamp_prefix(event.timestamp).to_vec();
        key.extend_from_slice(event.event_id.as_bytes());
        key
    }

    fn signature_key(digest: &[u8; 32]) -> Vec<u8> {
        let mut key = PREFIX_SIGNATURE.to_vec();
        key.extend_from_slice(digest);
        key
    }

    // Config operations

    /// Get the persisted reward rate, `None` before the first admin update
    pub fn get_reward_rate(&self) -> Result<Option<RewardRateRecord>> {
        let cf = self.cf_handle(CF_CONFIG)?;
        match self.db.get_cf(cf, KEY_REWARD_RATE)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Persist the reward rate, optionally remembering the signature digest (atomic)
    pub fn put_reward_rate(
        &self,
        record: &RewardRateRecord,
        signature_digest: Option<&[u8; 32]>,
    ) -> Result<()> {
        let cf = self.cf_handle(CF_CONFIG)?;
        let mut batch = WriteBatch::default();
        batch.put_cf(cf, KEY_REWARD_RATE, bincode::serialize(record)?);
        if let Some(digest) = signature_digest {
            batch.put_cf(cf, Self::signature_key(digest), record.version.to_be_bytes());
        }
        self.db.write(batch)?;

        tracing::info!(
            rate = %record.rate,
            version = record.version,
            "Reward rate persisted"
        );
        Ok(())
    }

    /// Whether an admin signature digest was already accepted
    pub fn has_signature_digest(&self, digest: &[u8; 32]) -> Result<bool> {
        let cf = self.cf_handle(CF_CONFIG)?;
        Ok(self.db.get_cf(cf, Self::signature_key(digest))?.is_some())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            approximate_wallets: self.approximate_count(self.cf_handle(CF_WALLETS)?)?,
            approximate_events: self.approximate_count(self.cf_handle(CF_ACTIVITY)?)?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Estimated number of wallet rows
    pub approximate_wallets: u64,
    /// Estimated number of activity events
    pub approximate_events: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn addr(s: &str) -> WalletAddress {
        WalletAddress::parse(s).unwrap()
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        assert!(storage.db.cf_handle(CF_WALLETS).is_some());
        assert!(storage.db.cf_handle(CF_ACTIVITY).is_some());
        assert!(storage.get_aggregate().unwrap().is_none());
    }

    #[test]
    fn test_wallet_and_aggregate_atomic_write() {
        let (storage, _temp) = test_storage();

        let mut account = WalletAccount::new(addr("wallet-a"), 100);
        account.staked_balance = 42;
        let mut aggregate = GlobalAggregate::empty(100);
        aggregate.total_users = 1;
        aggregate.total_staked = 42;

        storage.put_wallet_and_aggregate(&account, &aggregate).unwrap();

        assert_eq!(storage.get_wallet(&addr("wallet-a")).unwrap(), Some(account));
        assert_eq!(storage.get_aggregate().unwrap(), Some(aggregate));
        assert!(storage.get_wallet(&addr("wallet-b")).unwrap().is_none());
    }

    #[test]
    fn test_events_between_is_ordered_and_bounded() {
        let (storage, _temp) = test_storage();

        let events: Vec<_> = [300, 100, 200, 400]
            .iter()
            .map(|ts| ActivityEvent::new(addr("wallet-a"), 1, ActivityKind::Stake, *ts))
            .collect();
        storage.append_events(&events).unwrap();

        let found = storage.events_between(150, 350).unwrap();
        let stamps: Vec<_> = found.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![200, 300]);
    }

    #[test]
    fn test_reward_rate_and_signature_digest() {
        let (storage, _temp) = test_storage();
        assert!(storage.get_reward_rate().unwrap().is_none());

        let record = RewardRateRecord {
            rate: Decimal::new(125, 1),
            version: 1,
            updated_at: Some(10),
            updated_by: Some("admin".to_string()),
        };
        let digest = [7u8; 32];
        storage.put_reward_rate(&record, Some(&digest)).unwrap();

        assert_eq!(storage.get_reward_rate().unwrap(), Some(record));
        assert!(storage.has_signature_digest(&digest).unwrap());
        assert!(!storage.has_signature_digest(&[8u8; 32]).unwrap());
    }

    #[test]
    fn test_list_wallets() {
        let (storage, _temp) = test_storage();
        storage.put_wallet(&WalletAccount::new(addr("wallet-a"), 1)).unwrap();
        storage.put_wallet(&WalletAccount::new(addr("wallet-b"), 2)).unwrap();
        assert_eq!(storage.list_wallets().unwrap().len(), 2);
    }
}
