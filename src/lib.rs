//! # AeternusDB
//!
//! An embedded, persistent, ordered key-value storage engine built on a
//! **Log-Structured Merge Tree (LSM-tree)** architecture: point writes
//! land in a write-ahead log and an in-memory table, and are drained by
//! a background worker into immutable, sorted on-disk table files that
//! are periodically merged.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                        Engine                          │
//! │  ┌────────────┐   rotate   ┌──────────────┐            │
//! │  │  Active    │───────────▶│  Immutable   │            │
//! │  │  Memtable  │            │  Memtable    │            │
//! │  │  + WAL     │            │  (≤ 1 slot)  │            │
//! │  └────────────┘            └──────┬───────┘            │
//! │                                   │ flush              │
//! │                                   ▼                    │
//! │                  ┌─────────────────────────────────┐   │
//! │                  │   Version Set (levels 0..N-1)   │   │
//! │                  │   level 0 → compaction → level 1 │  │
//! │                  └─────────────────────────────────┘   │
//! │                                   ▲                    │
//! │                    block cache ───┘ open-table cache   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no persistent manifest: the version set is rebuilt on open
//! by scanning the data directory and reading each table file's own
//! footer and index.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Database façade — open, put, delete, get, flush, compact_range |
//! | [`memtable`] | Ordered in-memory write buffer |
//! | [`wal`] | Append-only, checksummed write-ahead log and crash-tolerant reader |
//! | [`sstable`] | Immutable sorted table file: data blocks, sparse index, Bloom filter, footer |
//! | [`version`] | In-memory catalog of live table files, partitioned by level |
//! | [`compaction`] | Background worker, flush job, compaction job, and k-way merger |
//! | [`cache`] | Bounded block LRU and open-table caches |
//! | [`encoding`] | Varint and fixed-width coding, FNV-1a hashing |
//!
//! ## Key Features
//!
//! - **Write-ahead logging** — every mutation is framed, checksummed,
//!   and appended to the WAL before being applied to the memtable.
//! - **Crash-tolerant recovery** — WAL replay stops at the first
//!   malformed or truncated frame instead of failing `open` outright;
//!   everything decoded up to that point is retained.
//! - **Bloom filter point lookups** — every table file carries a filter
//!   consulted before any data block is read.
//! - **Leveled compaction** — a single background worker drains flush
//!   and compaction jobs so foreground writes never block on them.
//!
//! ## Non-goals
//!
//! Multi-key transactions, snapshot isolation, a full-keyspace scan or
//! iterator as a public API, secondary indexes, compression,
//! encryption, and replication are out of scope for this engine.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aeternusdb::engine::{Engine, EngineConfig, ReadOptions, WriteOptions};
//!
//! let engine = Engine::open(EngineConfig::default(), "/tmp/my_db").unwrap();
//!
//! // Write
//! engine.put(WriteOptions::default(), b"hello", b"world").unwrap();
//!
//! // Read
//! assert_eq!(
//!     engine.get(ReadOptions::default(), b"hello").unwrap(),
//!     b"world".to_vec()
//! );
//!
//! // Delete
//! engine.delete(WriteOptions::default(), b"hello").unwrap();
//! assert!(engine.get(ReadOptions::default(), b"hello").is_err());
//!
//! // Force a flush of whatever is currently buffered in memory.
//! engine.flush().unwrap();
//! ```

#![allow(dead_code)]

pub mod cache;
pub mod compaction;
pub mod encoding;
pub mod engine;
pub mod memtable;
pub mod sstable;
pub mod version;
pub mod wal;
