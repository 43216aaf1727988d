//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Balance records (key: participant)
//! - `queue` - Pending-withdrawal queue slots (key: big-endian slot index)
//! - `registry` - Active-staker set (key: participant, empty value)
//! - `events` - Append-only event log (key: event_id)
//! - `indices` - Secondary index participant -> events
//! - `meta` - Queue length and other single-key metadata
//!
//! Every ledger operation lands as a single `WriteBatch`, so the three
//! coupled structures can never be persisted out of sync with each other.

use crate::{
    error::{Error, Result},
    queue::WithdrawalQueue,
    registry::StakerRegistry,
    state::{LedgerState, Plan, StateOp},
    types::{AccountRecord, ParticipantId, StakingEvent},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Options, WriteBatch, DB};
use std::collections::HashMap;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_QUEUE: &str = "queue";
const CF_REGISTRY: &str = "registry";
const CF_EVENTS: &str = "events";
const CF_INDICES: &str = "indices";
const CF_META: &str = "meta";

/// Metadata keys
const META_QUEUE_LEN: &[u8] = b"queue_len";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        // Database options
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );

        // Universal compaction for write-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        // Column family descriptors
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_QUEUE, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_REGISTRY, Self::cf_options_state()),
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db })
    }

    // Column family options

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // Hot state is frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        // Indices benefit from bloom filters
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // State loading

    /// Rebuild the full ledger state at open.
    ///
    /// Verifies queue density (every slot below the stored length present)
    /// and the coupling invariants before handing the state to the actor.
    pub fn load_state(&self) -> Result<LedgerState> {
        // Accounts
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = HashMap::new();
        for item in self.db.iterator_cf(cf_accounts, rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let participant = Self::participant_from_bytes(&key)?;
            let record: AccountRecord = bincode::deserialize(&value)?;
            accounts.insert(participant, record);
        }

        // Queue slots
        let queue_len = self.read_queue_len()?;
        let cf_queue = self.cf_handle(CF_QUEUE)?;
        let mut slots = Vec::with_capacity(queue_len as usize);
        for slot in 0..queue_len {
            let value = self
                .db
                .get_cf(cf_queue, slot.to_be_bytes())?
                .ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "queue slot {} missing below stored length {}",
                        slot, queue_len
                    ))
                })?;
            slots.push(Self::participant_from_bytes(&value)?);
        }
        let queue = WithdrawalQueue::from_slots(slots)?;

        // Registry
        let cf_registry = self.cf_handle(CF_REGISTRY)?;
        let mut members = Vec::new();
        for item in self.db.iterator_cf(cf_registry, rocksdb::IteratorMode::Start) {
            let (key, _) = item?;
            members.push(Self::participant_from_bytes(&key)?);
        }

        let state =
            LedgerState::from_parts(accounts, queue, StakerRegistry::from_members(members));
        state.check_invariants()?;

        tracing::info!(
            queued = state.queue().len(),
            stakers = state.registry().len(),
            "Ledger state loaded"
        );

        Ok(state)
    }

    // Commit path

    /// Persist a plan's effect set as one atomic write.
    pub fn commit(&self, plan: &Plan) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_queue = self.cf_handle(CF_QUEUE)?;
        let cf_registry = self.cf_handle(CF_REGISTRY)?;
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;
        let cf_meta = self.cf_handle(CF_META)?;

        let mut batch = WriteBatch::default();

        for op in &plan.ops {
            match op {
                StateOp::PutAccount {
                    participant,
                    record,
                } => {
                    // Zeroed records are kept; the participant simply drops
                    // out of the queue and registry
                    let value = bincode::serialize(record)?;
                    batch.put_cf(cf_accounts, participant.as_str().as_bytes(), &value);
                }
                StateOp::Enqueue { participant, slot } => {
                    batch.put_cf(
                        cf_queue,
                        (*slot as u64).to_be_bytes(),
                        participant.as_str().as_bytes(),
                    );
                    batch.put_cf(cf_meta, META_QUEUE_LEN, (*slot as u64 + 1).to_be_bytes());
                }
                StateOp::DequeueSlot {
                    slot,
                    moved,
                    new_len,
                } => {
                    if let Some(moved) = moved {
                        batch.put_cf(
                            cf_queue,
                            (*slot as u64).to_be_bytes(),
                            moved.as_str().as_bytes(),
                        );
                    }
                    batch.delete_cf(cf_queue, (*new_len as u64).to_be_bytes());
                    batch.put_cf(cf_meta, META_QUEUE_LEN, (*new_len as u64).to_be_bytes());
                }
                StateOp::ClearQueue { old_len } => {
                    batch.delete_range_cf(
                        cf_queue,
                        0u64.to_be_bytes(),
                        (*old_len as u64).to_be_bytes(),
                    );
                    batch.put_cf(cf_meta, META_QUEUE_LEN, 0u64.to_be_bytes());
                }
                StateOp::AddStaker { participant } => {
                    batch.put_cf(cf_registry, participant.as_str().as_bytes(), []);
                }
                StateOp::RemoveStaker { participant } => {
                    batch.delete_cf(cf_registry, participant.as_str().as_bytes());
                }
            }
        }

        for event in &plan.events {
            let value = bincode::serialize(event)?;
            batch.put_cf(cf_events, event.event_id.as_bytes(), &value);
            batch.put_cf(
                cf_indices,
                Self::index_key_participant_event(&event.participant, event.event_id),
                [],
            );
        }

        // Atomic commit
        self.db.write(batch)?;

        Ok(())
    }

    // Event reads

    /// Get event by ID
    pub fn event(&self, event_id: Uuid) -> Result<Option<StakingEvent>> {
        let cf = self.cf_handle(CF_EVENTS)?;

        match self.db.get_cf(cf, event_id.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Get a participant's events in chronological order (via index)
    pub fn events_for(&self, participant: &ParticipantId) -> Result<Vec<StakingEvent>> {
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut prefix = participant.as_str().as_bytes().to_vec();
        prefix.push(b'|');

        let iter = self.db.prefix_iterator_cf(cf_indices, &prefix);

        let mut events = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }

            // Extract event_id from the key tail (16 bytes)
            if key.len() < prefix.len() + 16 {
                continue;
            }
            let event_id_bytes: [u8; 16] =
                key[key.len() - 16..].try_into().map_err(|_| {
                    Error::Storage("malformed participant/event index key".to_string())
                })?;
            let event_id = Uuid::from_bytes(event_id_bytes);

            let event = self.event(event_id)?.ok_or_else(|| {
                Error::InvariantViolation(format!("event {} indexed but missing", event_id))
            })?;
            events.push(event);
        }

        // UUIDv7 keys are only millisecond-ordered; sort on the recorded
        // timestamp for a stable chronological history
        events.sort_by_key(|event| (event.recorded_at, event.event_id));

        Ok(events)
    }

    // Key helpers

    fn index_key_participant_event(participant: &ParticipantId, event_id: Uuid) -> Vec<u8> {
        let mut key = participant.as_str().as_bytes().to_vec();
        key.push(b'|'); // Separator
        key.extend_from_slice(event_id.as_bytes());
        key
    }

    fn participant_from_bytes(bytes: &[u8]) -> Result<ParticipantId> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| Error::Storage(format!("non-UTF8 participant key: {}", e)))?;
        Ok(ParticipantId::new(s))
    }

    fn read_queue_len(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_META)?;
        match self.db.get_cf(cf, META_QUEUE_LEN)? {
            Some(value) => {
                let bytes: [u8; 8] = value.as_slice().try_into().map_err(|_| {
                    Error::Storage("malformed queue length metadata".to_string())
                })?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }

    // Statistics

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let cf_events = self.cf_handle(CF_EVENTS)?;
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;

        Ok(StorageStats {
            total_events: self.approximate_count(cf_events)?,
            total_accounts: self.approximate_count(cf_accounts)?,
            queued_withdrawals: self.read_queue_len()?,
        })
    }

    fn approximate_count(&self, cf: &ColumnFamily) -> Result<u64> {
        // RocksDB property for approximate count
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
    /// Approximate number of events in the log
    pub total_events: u64,
    /// Approximate number of account records (including zeroed ones)
    pub total_accounts: u64,
    /// Exact number of queued withdrawal requests
    pub queued_withdrawals: u64,
}
