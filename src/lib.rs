#![deny(missing_docs)]
//! # seqrec
//!
//! `seqrec` prepares sequential user-item interaction logs for training
//! sequence-based recommenders: given the items a user has interacted with,
//! it cuts the user's history into fixed-length input windows paired with
//! the items that follow them, holds out one window per user for testing,
//! and serves the windows in shuffled minibatches with negative samples.
//!
//! ## Example
//!
//! ```rust
//! # extern crate seqrec;
//! use seqrec::data::RawInteraction;
//! use seqrec::{batch, split};
//!
//! let interactions: Vec<RawInteraction<u32, u32>> = (0..40)
//!     .map(|idx| RawInteraction::new(idx % 2, idx, i64::from(idx)))
//!     .collect();
//!
//! let data = split::Parameters::new()
//!     .seq_counts(5)
//!     .target_counts(3)
//!     .save(false)
//!     .create_train_test(&interactions)
//!     .unwrap();
//!
//! let all_items = data.metadata.all_items();
//! let mut batches = batch::Parameters::new()
//!     .batch_size(4)
//!     .num_negatives(2)
//!     .build(data.train.clone(), &all_items, data.metadata.user_items());
//!
//! for batch in batches.by_ref() {
//!     let batch = batch.unwrap();
//!     assert_eq!(batch.user_ids.len(), batch.negatives.len());
//! }
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate csv;
extern crate rand;
extern crate serde;
extern crate serde_json;

pub mod batch;
pub mod data;
pub mod persistence;
pub mod split;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;
/// Alias for timestamps.
pub type Timestamp = i64;

/// Errors raised when input records do not have the expected shape.
#[derive(Debug, Fail)]
pub enum SchemaError {
    /// A required field is not present in the input.
    #[fail(display = "Required field '{}' is missing from the input.", field)]
    MissingField {
        /// Name of the missing field.
        field: String,
    },
}

/// Errors raised while assembling a minibatch.
#[derive(Debug, Fail, PartialEq, Eq)]
pub enum BatchError {
    /// A user in the batch has no entry in the item history mapping.
    #[fail(display = "User {} has no item history.", user_id)]
    MissingHistory {
        /// The user without history.
        user_id: UserId,
    },
    /// Not enough items outside the user's history to draw negatives from.
    #[fail(
        display = "Cannot draw {} negatives for user {}: only {} candidate items.",
        requested, user_id, available
    )]
    InsufficientNegatives {
        /// The user being sampled for.
        user_id: UserId,
        /// Number of items not in the user's history.
        available: usize,
        /// Number of negatives requested.
        requested: usize,
    },
}
