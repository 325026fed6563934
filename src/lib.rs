// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A hopscotch hash table that serializes into a flat, remote-readable image.
//!
//! ##### About
//!
//! This crate exports a [`HopscotchTable`] over fixed-length keys, built by
//! a single writer and then frozen into an [`Image`]: one fixed-size record
//! per bucket, laid out so that the record of bucket `i` lives at
//! `i * record_size`.
//!
//! Clients never need the server to compute anything. A lookup hashes the
//! key locally, fetches the key's neighborhood window (at most `H` records
//! starting at the home bucket) with one byte-range read, and scans only the
//! records the home's hop bitmap points at. The read itself goes through a
//! [`Transport`](remote::Transport), which models one-sided remote memory
//! reads (for example RDMA); an in-process [`MemoryTransport`](remote::MemoryTransport)
//! and a file-backed [`ImageFile`] are provided.
//!
//! Hopscotch hashing keeps every entry within `H - 1` buckets of its home,
//! so the window size is bounded no matter how full the table is. Inserts
//! that cannot find room within the neighborhood report
//! [`Error::CapacityExhausted`] and leave the table unchanged, after which
//! the table can be grown with [`HopscotchTable::resize`].
//!
//! # Example usage
//!
//! ```
//! use hopscotch_image::{Config, Image, remote::{MemoryTransport, RemoteTable}};
//!
//! // Build phase
//! let mut table = Config::new(8, 16).exponent(10).build()?;
//! table.insert(*b"user0001", "my_value")?;
//! table.insert(*b"user0002", "other_value")?;
//!
//! // Freeze & publish
//! let image = Image::from_table(&table)?;
//! drop(table);
//!
//! let transport = MemoryTransport::new();
//! let handshake = transport.publish(&image);
//!
//! // Serve phase, no server-side compute
//! let client = RemoteTable::connect(&transport, &handshake)?;
//! assert_eq!(Some("my_value".into()), client.get(b"user0001")?);
//! assert_eq!(None, client.get(b"user0003")?);
//! #
//! # Ok::<(), hopscotch_image::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[doc(hidden)]
pub mod checksum;

#[doc(hidden)]
pub mod coding;

/// Configuration
pub mod config;

mod error;

#[doc(hidden)]
pub mod file;

mod format_version;

/// Hashing of fixed-length keys
pub mod hash;

/// Table images
pub mod image;

/// Remote lookups
pub mod remote;

mod slice;

#[doc(hidden)]
pub mod table;

pub mod trace;

/// User defined key
pub type UserKey = Slice;

/// User defined data (blob of bytes)
pub type UserValue = Slice;

pub use {
    checksum::Checksum,
    coding::{Decode, Encode},
    config::Config,
    error::{Error, Result},
    format_version::FormatVersion,
    image::{Image, ImageFile, TableDescriptor},
    slice::Slice,
    table::HopscotchTable,
};
