//! Shuffled minibatches of windowed examples with negative samples.
//!
//! A [`BatchIterator`](struct.BatchIterator.html) walks its table of
//! examples `batch_size` rows at a time. Once the table is exhausted the
//! iterator returns `None`, rewinds to the first row and (when shuffling)
//! permutes the table, so the next call starts a fresh epoch:
//!
//! ```rust
//! # extern crate seqrec;
//! # use std::collections::BTreeMap;
//! # use seqrec::batch::Parameters;
//! # use seqrec::split::{Example, Examples};
//! let examples = Examples::from(vec![
//!     Example::new(0, &[1, 2], &[3]),
//!     Example::new(1, &[4, 5], &[6]),
//! ]);
//! let all_items: Vec<usize> = (0..10).collect();
//! let mut user_items = BTreeMap::new();
//! user_items.insert(0, vec![1, 2, 3]);
//! user_items.insert(1, vec![4, 5, 6]);
//!
//! let mut batches = Parameters::new()
//!     .batch_size(1)
//!     .build(examples, &all_items, &user_items);
//!
//! for _ in 0..2 {
//!     assert_eq!(batches.by_ref().count(), 2);
//! }
//! ```
use std::collections::{BTreeMap, HashSet};

use rand;
use rand::prng::XorShiftRng;
use rand::SeedableRng;

use super::split::{Example, Examples};
use super::{BatchError, ItemId, UserId};

/// Parameters of a batch iterator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameters {
    batch_size: usize,
    max_sequence_length: usize,
    num_negatives: usize,
    shuffle: bool,
    seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            batch_size: 128,
            max_sequence_length: 5,
            num_negatives: 1,
            shuffle: true,
            seed: 0,
        }
    }
}

impl Parameters {
    /// Build parameters with the default values: batches of 128 rows,
    /// one negative per row, shuffling between epochs.
    pub fn new() -> Self {
        Parameters::default()
    }

    /// Set the number of rows per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the nominal maximum sequence length.
    ///
    /// This is informational: sequences are passed through as they are, and
    /// callers needing fixed-width inputs must pad or truncate them.
    pub fn max_sequence_length(mut self, max_sequence_length: usize) -> Self {
        self.max_sequence_length = max_sequence_length;
        self
    }

    /// Set the number of negative items drawn per row.
    pub fn num_negatives(mut self, num_negatives: usize) -> Self {
        self.num_negatives = num_negatives;
        self
    }

    /// Set whether the table is reshuffled between epochs.
    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the base seed of the random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build an iterator over `examples`.
    ///
    /// Negatives are drawn from `all_items`, excluding every item in the
    /// row's user's entry in `user_items`. The iterator takes ownership of
    /// `examples`, so iterators over the same table do not affect each
    /// other's ordering.
    pub fn build<'a>(
        self,
        examples: Examples,
        all_items: &[ItemId],
        user_items: &'a BTreeMap<UserId, Vec<ItemId>>,
    ) -> BatchIterator<'a> {
        BatchIterator::new(self, examples, all_items, user_items)
    }
}

/// A minibatch of examples.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    /// The user of each row.
    pub user_ids: Vec<UserId>,
    /// Target items of each row.
    pub targets: Vec<Vec<ItemId>>,
    /// Input sequence of each row.
    pub sequences: Vec<Vec<ItemId>>,
    /// Length of each input sequence.
    pub sequence_lengths: Vec<usize>,
    /// Negative items of each row, none of which the row's user has seen.
    pub negatives: Vec<Vec<ItemId>>,
}

impl Batch {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.user_ids.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.user_ids.is_empty()
    }
}

fn seeded_rng(seed: u64, epoch: u64) -> XorShiftRng {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&epoch.to_le_bytes());

    XorShiftRng::from_seed(bytes)
}

/// Iterator over minibatches of a table of examples.
///
/// Yields `Err` when a batch cannot be assembled. A failed batch ends the
/// epoch: the following call returns `None` and resets the iterator, so
/// callers that skip errors still terminate.
#[derive(Clone, Debug)]
pub struct BatchIterator<'a> {
    examples: Examples,
    all_items: Vec<ItemId>,
    user_items: &'a BTreeMap<UserId, Vec<ItemId>>,
    parameters: Parameters,
    idx: usize,
    epoch: u64,
    rng: XorShiftRng,
}

impl<'a> BatchIterator<'a> {
    fn new(
        parameters: Parameters,
        examples: Examples,
        all_items: &[ItemId],
        user_items: &'a BTreeMap<UserId, Vec<ItemId>>,
    ) -> Self {
        // Sorted and deduplicated so that sampling depends only on the seed.
        let mut all_items = all_items.to_owned();
        all_items.sort();
        all_items.dedup();

        let rng = seeded_rng(parameters.seed, 0);

        BatchIterator {
            examples,
            all_items,
            user_items,
            parameters,
            idx: 0,
            epoch: 0,
            rng,
        }
    }

    /// Number of rows in the table.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Number of batches served per epoch, counting a final short batch.
    pub fn num_batches(&self) -> usize {
        if self.parameters.batch_size == 0 {
            return 0;
        }

        (self.examples.len() + self.parameters.batch_size - 1) / self.parameters.batch_size
    }

    /// Number of completed epochs.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The nominal maximum sequence length.
    pub fn max_sequence_length(&self) -> usize {
        self.parameters.max_sequence_length
    }

    /// The table in its current order.
    pub fn examples(&self) -> &Examples {
        &self.examples
    }

    fn reset(&mut self) {
        self.idx = 0;
        self.epoch += 1;

        // Each epoch's permutation is a function of (seed, epoch) only.
        if self.parameters.shuffle {
            self.rng = seeded_rng(self.parameters.seed, self.epoch);
            self.examples.shuffle(&mut self.rng);
        }

        debug!(
            "Finished epoch {} over {} examples",
            self.epoch,
            self.examples.len()
        );
    }

    fn sample_negatives(&mut self, user_id: UserId) -> Result<Vec<ItemId>, BatchError> {
        let history: HashSet<ItemId> = self
            .user_items
            .get(&user_id)
            .ok_or(BatchError::MissingHistory { user_id })?
            .iter()
            .cloned()
            .collect();

        let candidates = self
            .all_items
            .iter()
            .filter(|item| !history.contains(*item))
            .cloned();

        let requested = self.parameters.num_negatives;

        rand::seq::sample_iter(&mut self.rng, candidates, requested).map_err(|available| {
            BatchError::InsufficientNegatives {
                user_id,
                available: available.len(),
                requested,
            }
        })
    }

    fn build_batch(&mut self, start: usize, stop: usize) -> Result<Batch, BatchError> {
        let rows: Vec<Example> = self.examples.data()[start..stop].to_owned();

        let mut negatives = Vec::with_capacity(rows.len());
        for row in &rows {
            negatives.push(self.sample_negatives(row.user)?);
        }

        let mut batch = Batch {
            user_ids: Vec::with_capacity(rows.len()),
            targets: Vec::with_capacity(rows.len()),
            sequences: Vec::with_capacity(rows.len()),
            sequence_lengths: Vec::with_capacity(rows.len()),
            negatives: Vec::with_capacity(rows.len()),
        };

        for (row, row_negatives) in izip!(rows, negatives) {
            batch.user_ids.push(row.user);
            batch.targets.push(row.target);
            batch.sequence_lengths.push(row.seq.len());
            batch.sequences.push(row.seq);
            batch.negatives.push(row_negatives);
        }

        Ok(batch)
    }
}

impl<'a> Iterator for BatchIterator<'a> {
    type Item = Result<Batch, BatchError>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.examples.len() || self.parameters.batch_size == 0 {
            self.reset();
            return None;
        }

        let start = self.idx;
        let stop = (self.idx + self.parameters.batch_size).min(self.examples.len());

        let batch = match self.build_batch(start, stop) {
            Ok(batch) => batch,
            Err(error) => {
                self.idx = self.examples.len();
                return Some(Err(error));
            }
        };

        // Advance by the stride, not by the number of rows served.
        self.idx += self.parameters.batch_size;

        Some(Ok(batch))
    }
}
