//! Sliding-window train/test splits.
//!
//! Every user's time-ordered session of length `L` is cut into training
//! examples: for each `i` in `seq_counts..L - target_counts` the
//! `seq_counts` items before `i` form the input and the `target_counts`
//! items from `i` onwards form the target. Users with
//! `L > seq_counts + target_counts` also contribute one test example made
//! of the final `target_counts` items and the `seq_counts` items preceding
//! them.
use std::collections::BTreeMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use failure;
use rand::Rng;
use serde::Serialize;

use super::data::{IdMap, Interactions, RawInteraction};
use super::persistence;
use super::{ItemId, UserId};

/// Parameters of the split.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameters {
    seq_counts: usize,
    target_counts: usize,
    save_dir: PathBuf,
    save: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            seq_counts: 5,
            target_counts: 3,
            save_dir: PathBuf::from("processed_data"),
            save: true,
        }
    }
}

impl Parameters {
    /// Build parameters with the default values: input windows of 5 items,
    /// targets of 3 items, saving to `processed_data`.
    pub fn new() -> Self {
        Parameters::default()
    }

    /// Set the length of input sequences.
    pub fn seq_counts(mut self, seq_counts: usize) -> Self {
        self.seq_counts = seq_counts;
        self
    }

    /// Set the number of items to predict.
    pub fn target_counts(mut self, target_counts: usize) -> Self {
        self.target_counts = target_counts;
        self
    }

    /// Set the directory the split is persisted to.
    pub fn save_dir<P: AsRef<Path>>(mut self, save_dir: P) -> Self {
        self.save_dir = save_dir.as_ref().to_owned();
        self
    }

    /// Set whether the split is persisted.
    pub fn save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    /// Length of input sequences.
    pub fn get_seq_counts(&self) -> usize {
        self.seq_counts
    }

    /// Number of items to predict.
    pub fn get_target_counts(&self) -> usize {
        self.target_counts
    }

    /// Directory the split is persisted to.
    pub fn get_save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Build the train/test split of `interactions`.
    ///
    /// When saving is enabled the result is also written to the save
    /// directory; it is returned either way.
    pub fn create_train_test<U, I>(
        &self,
        interactions: &[RawInteraction<U, I>],
    ) -> Result<Split<U, I>, failure::Error>
    where
        U: Hash + Eq + Clone + Serialize,
        I: Hash + Eq + Clone + Serialize,
    {
        let split = self.split(interactions);

        if self.save {
            persistence::save_split(&split, &self.save_dir)?;
            info!(
                "Train and test datasets saved in '{}'",
                self.save_dir.display()
            );
        }

        Ok(split)
    }

    fn split<U, I>(&self, interactions: &[RawInteraction<U, I>]) -> Split<U, I>
    where
        U: Hash + Eq + Clone,
        I: Hash + Eq + Clone,
    {
        let (interactions, user_map, item_map) = Interactions::from_raw(interactions);
        let sessions = interactions.to_sessions();

        let mut user_items = BTreeMap::new();
        let mut train = Vec::new();
        let mut test = Vec::new();

        for session in sessions {
            let user_id = session.user_id;
            let items = &session.item_ids;

            train.extend(
                train_windows(items, self.seq_counts, self.target_counts)
                    .map(|(seq, target)| Example::new(user_id, seq, target)),
            );

            if let Some((seq, target)) = test_window(items, self.seq_counts, self.target_counts) {
                test.push(Example::new(user_id, seq, target));
            }

            user_items.insert(user_id, session.item_ids);
        }

        debug!(
            "Split {} interactions from {} users into {} train and {} test examples",
            interactions.len(),
            user_map.len(),
            train.len(),
            test.len()
        );

        Split {
            train: Examples::from(train),
            test: Examples::from(test),
            metadata: Metadata {
                user_items,
                num_users: user_map.len(),
                num_items: item_map.len(),
                user_map,
                item_map,
            },
        }
    }
}

/// Input/target windows for every valid start position of a session.
fn train_windows<'a>(
    items: &'a [ItemId],
    seq_counts: usize,
    target_counts: usize,
) -> impl Iterator<Item = (&'a [ItemId], &'a [ItemId])> + 'a {
    let stop = items.len().saturating_sub(target_counts);

    (seq_counts..stop).map(move |idx| {
        (
            &items[idx - seq_counts..idx],
            &items[idx..idx + target_counts],
        )
    })
}

/// The held-out window at the tail of a session, if it is long enough.
fn test_window(
    items: &[ItemId],
    seq_counts: usize,
    target_counts: usize,
) -> Option<(&[ItemId], &[ItemId])> {
    if items.len() <= seq_counts + target_counts {
        return None;
    }

    let target_start = items.len() - target_counts;

    Some((
        &items[target_start - seq_counts..target_start],
        &items[target_start..],
    ))
}

/// A single windowed example.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Example {
    /// The user the window was taken from.
    pub user: UserId,
    /// Input sequence.
    pub seq: Vec<ItemId>,
    /// Items following the input sequence.
    pub target: Vec<ItemId>,
}

impl Example {
    /// Build a new example.
    pub fn new(user: UserId, seq: &[ItemId], target: &[ItemId]) -> Self {
        Example {
            user,
            seq: seq.to_owned(),
            target: target.to_owned(),
        }
    }
}

/// A table of windowed examples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Examples {
    examples: Vec<Example>,
}

impl Examples {
    /// The examples.
    pub fn data(&self) -> &[Example] {
        &self.examples
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Randomly permute the examples.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        rng.shuffle(&mut self.examples);
    }
}

impl From<Vec<Example>> for Examples {
    fn from(examples: Vec<Example>) -> Examples {
        Examples { examples }
    }
}

/// Information about the whole log, independent of the train/test split.
#[derive(Clone, Debug)]
pub struct Metadata<U, I> {
    pub(crate) user_items: BTreeMap<UserId, Vec<ItemId>>,
    pub(crate) num_users: usize,
    pub(crate) num_items: usize,
    pub(crate) user_map: IdMap<U>,
    pub(crate) item_map: IdMap<I>,
}

impl<U, I> Metadata<U, I> {
    /// The full, time-ordered item history of every user.
    pub fn user_items(&self) -> &BTreeMap<UserId, Vec<ItemId>> {
        &self.user_items
    }

    /// Number of distinct users.
    pub fn num_users(&self) -> usize {
        self.num_users
    }

    /// Number of distinct items.
    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Every item index.
    pub fn all_items(&self) -> Vec<ItemId> {
        (0..self.num_items).collect()
    }

    /// Raw to dense user identifiers.
    pub fn user_map(&self) -> &IdMap<U> {
        &self.user_map
    }

    /// Raw to dense item identifiers.
    pub fn item_map(&self) -> &IdMap<I> {
        &self.item_map
    }
}

/// The result of splitting an interaction log.
#[derive(Clone, Debug)]
pub struct Split<U, I> {
    /// Training examples.
    pub train: Examples,
    /// One held-out example per eligible user.
    pub test: Examples,
    /// Histories, counts and identifier maps.
    pub metadata: Metadata<U, I>,
}
