//! # Blifmerge_r
//!
//! `blifmerge_r` is a library to reassemble the output of the ABC
//! `pif` partitioner.  The partitioner writes a directory of BLIF
//! fragments, each one a small boolean sub-network.  Before those
//! fragments are usable downstream, three passes run over them,
//! in order:
//!
//! * *resolve* -- fragments made independently may reuse an internal
//!   signal name for unrelated nets.  Later definitions are renamed so
//!   every defined name is unique across the whole set.
//! * *normalize* -- each fragment is rewritten with a canonical
//!   `.model` / `.inputs` / `.outputs` header.
//! * *aggregate* -- the fragments of each directory are folded into
//!   `merged<N>.blif` shards, each capped by a statement-count
//!   threshold.
//!
//! Fragment files are rewritten in place; shards are written next to
//! them.  All writes go through a temporary file and a rename.
pub mod blif;
pub mod error;
pub mod fsio;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod shard;

pub use error::{MergeError, Result};
pub use pipeline::{merge_directory, run, MergeConfig, MergeReport, PartitionerConfig};
