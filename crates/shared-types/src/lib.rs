//! # Shared Types Crate
//!
//! Core entities and the byte-level wire codec shared by every relay
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-subsystem types (hashes, outpoints,
//!   transactions, subblocks, peer identity) are defined here and nowhere
//!   else.
//! - **Explicit wire layouts**: every message and sketch that crosses the
//!   network is encoded by hand through [`wire::ByteWriter`] /
//!   [`wire::ByteReader`]. Fixed-width integers travel big-endian;
//!   variable-length counts use the compact-size encoding.
//! - **No I/O**: this crate is pure data. Networking, storage and pools
//!   live behind ports in the subsystem crates.

pub mod entities;
pub mod wire;

pub use entities::{
    short_hex, Hash, OutPoint, PeerId, SubBlock, SubBlockHeader, Transaction, TransactionRef,
    TxInput, TxKind,
};
pub use wire::{ByteReader, ByteWriter, WireDecode, WireEncode, WireError};
