//! Reading and writing splits.
//!
//! A split is stored as three files in one directory:
//!
//! - `train.csv` and `test.csv`, with columns `user`, `seq` and `target`;
//!   sequences are written as `[1, 2, 3]`.
//! - `info.json`, holding the user histories, the user and item counts and
//!   the user and item identifier maps, in that order. Identifier maps are
//!   stored as lists of raw identifiers ordered by dense index.
use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::hash::Hash;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use csv;
use failure;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json;

use super::data::IdMap;
use super::split::{Example, Examples, Metadata, Split};
use super::{ItemId, UserId};

/// File name of the training table.
pub const TRAIN_FILE: &str = "train.csv";
/// File name of the test table.
pub const TEST_FILE: &str = "test.csv";
/// File name of the metadata bundle.
pub const INFO_FILE: &str = "info.json";

#[derive(Serialize, Deserialize)]
struct ExampleRecord {
    user: UserId,
    seq: String,
    target: String,
}

#[derive(Serialize, Deserialize)]
struct MetadataRecord<U, I> {
    user_items: BTreeMap<UserId, Vec<ItemId>>,
    num_users: usize,
    num_items: usize,
    user_map: Vec<U>,
    item_map: Vec<I>,
}

fn format_items(items: &[ItemId]) -> String {
    format!("[{}]", items.iter().join(", "))
}

fn parse_items(value: &str) -> Result<Vec<ItemId>, failure::Error> {
    let inner = value
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|item| {
            item.trim()
                .parse()
                .map_err(|_| format_err!("Invalid item '{}' in sequence '{}'", item.trim(), value))
        })
        .collect()
}

/// Write a table of examples as CSV.
pub fn write_examples<P: AsRef<Path>>(examples: &Examples, path: P) -> Result<(), failure::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    // Written by hand so that empty tables still carry a header.
    writer.write_record(&["user", "seq", "target"])?;

    for example in examples.data() {
        writer.serialize(ExampleRecord {
            user: example.user,
            seq: format_items(&example.seq),
            target: format_items(&example.target),
        })?;
    }

    writer.flush()?;

    Ok(())
}

/// Read a table of examples written by [`write_examples`](fn.write_examples.html).
pub fn read_examples<P: AsRef<Path>>(path: P) -> Result<Examples, failure::Error> {
    let mut reader = csv::Reader::from_path(path)?;

    let mut examples = Vec::new();
    for record in reader.deserialize() {
        let record: ExampleRecord = record?;
        examples.push(Example {
            user: record.user,
            seq: parse_items(&record.seq)?,
            target: parse_items(&record.target)?,
        });
    }

    Ok(Examples::from(examples))
}

/// Write a split to `dir`, creating the directory if needed.
pub fn save_split<U, I, P>(split: &Split<U, I>, dir: P) -> Result<(), failure::Error>
where
    U: Hash + Eq + Clone + Serialize,
    I: Hash + Eq + Clone + Serialize,
    P: AsRef<Path>,
{
    let dir = dir.as_ref();

    if !dir.exists() {
        create_dir_all(dir)?;
    }

    write_examples(&split.train, dir.join(TRAIN_FILE))?;
    write_examples(&split.test, dir.join(TEST_FILE))?;

    let metadata = &split.metadata;
    let record = MetadataRecord {
        user_items: metadata.user_items.clone(),
        num_users: metadata.num_users,
        num_items: metadata.num_items,
        user_map: metadata.user_map.ids().to_owned(),
        item_map: metadata.item_map.ids().to_owned(),
    };

    let mut writer = BufWriter::new(File::create(dir.join(INFO_FILE))?);
    serde_json::to_writer(&mut writer, &record)?;
    writer.flush()?;

    debug!(
        "Wrote {} train and {} test examples to {}",
        split.train.len(),
        split.test.len(),
        dir.display()
    );

    Ok(())
}

/// Read a split written by [`save_split`](fn.save_split.html).
pub fn load_split<U, I, P>(dir: P) -> Result<Split<U, I>, failure::Error>
where
    U: Hash + Eq + Clone + DeserializeOwned,
    I: Hash + Eq + Clone + DeserializeOwned,
    P: AsRef<Path>,
{
    let dir = dir.as_ref();

    let train = read_examples(dir.join(TRAIN_FILE))?;
    let test = read_examples(dir.join(TEST_FILE))?;

    let reader = BufReader::new(File::open(dir.join(INFO_FILE))?);
    let record: MetadataRecord<U, I> = serde_json::from_reader(reader)?;

    let user_map = IdMap::from(record.user_map);
    let item_map = IdMap::from(record.item_map);

    if user_map.len() != record.num_users || item_map.len() != record.num_items {
        bail!(
            "Identifier maps hold {} users and {} items, expected {} and {}",
            user_map.len(),
            item_map.len(),
            record.num_users,
            record.num_items
        );
    }

    Ok(Split {
        train,
        test,
        metadata: Metadata {
            user_items: record.user_items,
            num_users: record.num_users,
            num_items: record.num_items,
            user_map,
            item_map,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawInteraction;
    use crate::split::Parameters;

    #[test]
    fn parses_sequences() {
        assert_eq!(parse_items("[3, 1, 2]").unwrap(), vec![3, 1, 2]);
        assert_eq!(parse_items("[]").unwrap(), Vec::<ItemId>::new());
        assert_eq!(format_items(&[4, 5]), "[4, 5]");
        assert!(parse_items("[1, x]").is_err());
    }

    #[test]
    fn saved_split_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("processed_data");

        let interactions: Vec<RawInteraction> = (0..30)
            .map(|idx| {
                RawInteraction::new(
                    format!("user_{}", idx % 3),
                    format!("item_{}", idx % 11),
                    30 - idx,
                )
            })
            .collect();

        let split = Parameters::new()
            .seq_counts(3)
            .target_counts(2)
            .save_dir(&save_dir)
            .create_train_test(&interactions)
            .unwrap();

        assert!(save_dir.join(TRAIN_FILE).exists());
        assert!(save_dir.join(TEST_FILE).exists());
        assert!(save_dir.join(INFO_FILE).exists());

        let loaded: Split<String, String> = load_split(&save_dir).unwrap();

        assert_eq!(loaded.train, split.train);
        assert_eq!(loaded.test, split.test);
        assert_eq!(loaded.metadata.user_items(), split.metadata.user_items());
        assert_eq!(loaded.metadata.num_users(), 3);
        assert_eq!(loaded.metadata.num_items(), 11);
        assert_eq!(loaded.metadata.user_map().ids(), split.metadata.user_map().ids());
        assert_eq!(
            loaded.metadata.item_map().get(&"item_7".to_owned()),
            split.metadata.item_map().get(&"item_7".to_owned())
        );
    }

    #[test]
    fn unsaved_split_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let save_dir = dir.path().join("out");

        let interactions = vec![RawInteraction::new(1u8, 2u8, 0)];

        let split = Parameters::new()
            .save_dir(&save_dir)
            .save(false)
            .create_train_test(&interactions)
            .unwrap();

        assert!(!save_dir.exists());
        assert_eq!(split.metadata.user_items()[&0], vec![0]);
    }
}
