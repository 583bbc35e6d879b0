//! Interaction records, identifier remapping and per-user sessions.
//!
//! Raw logs carry arbitrary user and item identifiers. These are mapped
//! onto dense, zero-based indices (in order of first appearance) before
//! the log is grouped into time-ordered per-user sessions.
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::Read;
use std::path::Path;

use csv;
use failure;
use itertools::Itertools;
use serde::de::DeserializeOwned;

use super::{ItemId, SchemaError, Timestamp, UserId};

/// Columns every interaction log must provide.
pub const REQUIRED_FIELDS: [&str; 3] = ["userID", "itemID", "timestamp"];

/// A single interaction as it appears in the input log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RawInteraction<U = String, I = String> {
    /// Raw user identifier.
    #[serde(rename = "userID")]
    pub user_id: U,
    /// Raw item identifier.
    #[serde(rename = "itemID")]
    pub item_id: I,
    /// Time of the interaction.
    pub timestamp: Timestamp,
}

impl<U, I> RawInteraction<U, I> {
    /// Build a new raw interaction.
    pub fn new(user_id: U, item_id: I, timestamp: Timestamp) -> Self {
        RawInteraction {
            user_id,
            item_id,
            timestamp,
        }
    }
}

/// Read an interaction log in CSV form.
///
/// The header must contain `userID`, `itemID` and `timestamp`; any other
/// columns are ignored. A missing column fails with
/// [`SchemaError::MissingField`](../enum.SchemaError.html). Timestamps must
/// be integers (negative values are accepted); fractional timestamps fail
/// to deserialize and should be scaled to integer units beforehand.
pub fn read_interactions<U, I, R>(reader: R) -> Result<Vec<RawInteraction<U, I>>, failure::Error>
where
    U: DeserializeOwned,
    I: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::Reader::from_reader(reader);

    {
        let headers = reader.headers()?;
        for &field in REQUIRED_FIELDS.iter() {
            if !headers.iter().any(|header| header == field) {
                return Err(SchemaError::MissingField {
                    field: field.to_owned(),
                }
                .into());
            }
        }
    }

    let interactions = reader.deserialize().collect::<Result<Vec<_>, _>>()?;

    Ok(interactions)
}

/// Read an interaction log from a CSV file.
pub fn read_interactions_from_path<U, I, P>(
    path: P,
) -> Result<Vec<RawInteraction<U, I>>, failure::Error>
where
    U: DeserializeOwned,
    I: DeserializeOwned,
    P: AsRef<Path>,
{
    read_interactions(File::open(path)?)
}

/// Bijection between raw identifiers and dense indices.
///
/// Indices are handed out in order of first appearance, so the same input
/// ordering always produces the same map.
#[derive(Clone, Debug)]
pub struct IdMap<K> {
    ids: Vec<K>,
    index: HashMap<K, usize>,
}

impl<K: Hash + Eq + Clone> IdMap<K> {
    /// Build an empty map.
    pub fn new() -> Self {
        IdMap {
            ids: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Return the dense index of `id`, assigning the next free one if
    /// `id` has not been seen before.
    pub fn insert(&mut self, id: &K) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }

        let idx = self.ids.len();
        self.ids.push(id.clone());
        self.index.insert(id.clone(), idx);

        idx
    }

    /// Dense index of a raw identifier.
    pub fn get(&self, id: &K) -> Option<usize> {
        self.index.get(id).cloned()
    }

    /// Raw identifier behind a dense index.
    pub fn original(&self, idx: usize) -> Option<&K> {
        self.ids.get(idx)
    }

    /// Raw identifiers, ordered by their dense index.
    pub fn ids(&self) -> &[K] {
        &self.ids
    }

    /// Number of distinct identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no identifier has been mapped.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate over `(raw identifier, dense index)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
        self.ids.iter().enumerate().map(|(idx, id)| (id, idx))
    }
}

impl<K: Hash + Eq + Clone> Default for IdMap<K> {
    fn default() -> Self {
        IdMap::new()
    }
}

impl<K: Hash + Eq + Clone> From<Vec<K>> for IdMap<K> {
    fn from(ids: Vec<K>) -> Self {
        let mut map = IdMap::new();
        for id in &ids {
            map.insert(id);
        }

        map
    }
}

/// An interaction between a dense user index and a dense item index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    timestamp: Timestamp,
}

impl Interaction {
    /// Build a new interaction.
    pub fn new(user_id: UserId, item_id: ItemId, timestamp: Timestamp) -> Self {
        Interaction {
            user_id,
            item_id,
            timestamp,
        }
    }

    /// The user index.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The item index.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The interaction timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// A log of remapped interactions, in input order.
#[derive(Clone, Debug)]
pub struct Interactions {
    interactions: Vec<Interaction>,
}

impl Interactions {
    /// Remap a raw log onto dense indices.
    ///
    /// Returns the remapped log together with the user and item maps.
    pub fn from_raw<U, I>(raw: &[RawInteraction<U, I>]) -> (Self, IdMap<U>, IdMap<I>)
    where
        U: Hash + Eq + Clone,
        I: Hash + Eq + Clone,
    {
        let mut user_map = IdMap::new();
        let mut item_map = IdMap::new();

        let interactions = raw
            .iter()
            .map(|x| {
                Interaction::new(
                    user_map.insert(&x.user_id),
                    item_map.insert(&x.item_id),
                    x.timestamp,
                )
            })
            .collect();

        (Interactions { interactions }, user_map, item_map)
    }

    /// Number of interactions.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Group the log into per-user sessions, in ascending user order.
    pub fn to_sessions(&self) -> Vec<Session> {
        let mut data: Vec<&Interaction> = self.interactions.iter().collect();

        // Stable, so interactions sharing a timestamp keep their input order.
        data.sort_by(|x, y| cmp_timestamp(x, y));

        let grouped = data.into_iter().group_by(|x| x.user_id());

        let mut sessions = Vec::new();
        for (user_id, group) in &grouped {
            sessions.push(Session {
                user_id,
                item_ids: group.map(|x| x.item_id()).collect(),
            });
        }

        sessions
    }
}

fn cmp_timestamp(x: &Interaction, y: &Interaction) -> Ordering {
    let uid_comparison = x.user_id().cmp(&y.user_id());

    if uid_comparison == Ordering::Equal {
        x.timestamp().cmp(&y.timestamp())
    } else {
        uid_comparison
    }
}

/// One user's items, ordered by time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// The user.
    pub user_id: UserId,
    /// Items the user interacted with.
    pub item_ids: Vec<ItemId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data: &[(&str, &str, Timestamp)]) -> Vec<RawInteraction> {
        data.iter()
            .map(|&(user, item, timestamp)| {
                RawInteraction::new(user.to_owned(), item.to_owned(), timestamp)
            })
            .collect()
    }

    #[test]
    fn maps_follow_first_appearance() {
        let data = raw(&[("u2", "b", 3), ("u1", "a", 1), ("u2", "c", 2), ("u1", "b", 5)]);

        let (interactions, user_map, item_map) = Interactions::from_raw(&data);

        assert_eq!(user_map.ids(), &["u2".to_owned(), "u1".to_owned()]);
        assert_eq!(item_map.ids(), &["b".to_owned(), "a".to_owned(), "c".to_owned()]);
        assert_eq!(interactions.len(), 4);

        for (id, idx) in item_map.iter() {
            assert_eq!(item_map.get(id), Some(idx));
            assert_eq!(item_map.original(idx), Some(id));
        }

        let (_, again, _) = Interactions::from_raw(&data);
        assert_eq!(again.ids(), user_map.ids());
    }

    #[test]
    fn sessions_are_time_ordered() {
        let data = raw(&[
            ("u1", "a", 4),
            ("u2", "x", -1),
            ("u1", "b", 2),
            ("u1", "c", 4),
            ("u1", "d", -3),
        ]);

        let (interactions, _, item_map) = Interactions::from_raw(&data);
        let sessions = interactions.to_sessions();

        let users: Vec<UserId> = sessions.iter().map(|session| session.user_id).collect();
        let items: Vec<Vec<&str>> = sessions
            .iter()
            .map(|session| {
                session
                    .item_ids
                    .iter()
                    .map(|&idx| item_map.original(idx).unwrap().as_str())
                    .collect()
            })
            .collect();

        assert_eq!(users, vec![0, 1]);
        // Ties on timestamp keep input order: "a" before "c".
        assert_eq!(items, vec![vec!["d", "b", "a", "c"], vec!["x"]]);
    }

    #[test]
    fn reads_csv_ignoring_extra_columns() {
        let csv = "userID,itemID,rating,timestamp\n7,10,5,100\n7,11,3,90\n8,10,1,-50\n";

        let data: Vec<RawInteraction<u64, u64>> = read_interactions(csv.as_bytes()).unwrap();

        assert_eq!(
            data,
            vec![
                RawInteraction::new(7, 10, 100),
                RawInteraction::new(7, 11, 90),
                RawInteraction::new(8, 10, -50),
            ]
        );
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let csv = "userID,timestamp\n1,2\n";

        let err = read_interactions::<String, String, _>(csv.as_bytes()).unwrap_err();

        match err.downcast_ref::<SchemaError>() {
            Some(SchemaError::MissingField { field }) => assert_eq!(field, "itemID"),
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}
