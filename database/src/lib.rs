use std::sync::Arc;

use anyhow::Result;
use im::OrdMap;
use log::debug;
use parking_lot::Mutex;
use snap::raw::{Decoder, Encoder};

/// Ordered key-value store with snappy-compressed values.
///
/// Writes are all-or-nothing: a batch is applied to a copy of the map and swapped in, so readers
/// never observe part of a batch. `OrdMap` makes the copy cheap.
#[derive(Default)]
pub struct Database {
    // Values are stored compressed. Keys and values are `Arc<[u8]>` because `OrdMap` clones
    // elements when splitting and copying.
    map: Mutex<OrdMap<Arc<[u8]>, Arc<[u8]>>>,
}

impl Database {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        self.map
            .lock()
            .get(key.as_ref())
            .map(|compressed| decompress(compressed))
            .transpose()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    /// Applies every put and delete in `batch` atomically.
    ///
    /// Deletes are applied after puts, so a key that is both put and deleted ends up absent.
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        let WriteBatch { puts, deletes } = batch;

        // Compress before taking the lock. A compression failure leaves the map untouched.
        let compressed = puts
            .into_iter()
            .map(|(key, value)| Ok((Arc::from(key), Arc::from(compress(&value)?))))
            .collect::<Result<Vec<(Arc<[u8]>, Arc<[u8]>)>>>()?;

        debug!(
            "writing batch to database (puts: {}, deletes: {})",
            compressed.len(),
            deletes.len(),
        );

        let mut map = self.map.lock();
        let mut new_map = map.clone();

        for (key, value) in compressed {
            new_map.insert(key, value);
        }

        for key in deletes {
            new_map.remove(key.as_slice());
        }

        *map = new_map;

        Ok(())
    }

    /// Returns all pairs whose keys start with `prefix` in ascending order.
    ///
    /// The pairs are read from a snapshot taken when this is called.
    pub fn iterator_with_prefix(
        &self,
        prefix: impl AsRef<[u8]>,
    ) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.as_ref().to_vec();

        self.snapshot_from(&prefix).take_while(move |result| {
            result
                .as_ref()
                .map_or(true, |(key, _)| key.starts_with(&prefix))
        })
    }

    /// Returns the first key-value pair whose key is less than or equal to `key`.
    ///
    /// Behaves like [`im::OrdMap::get_prev`].
    pub fn prev(&self, key: impl AsRef<[u8]>) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.map
            .lock()
            .get_prev(key.as_ref())
            .map(|(key, value)| Ok((key.to_vec(), decompress(value)?)))
            .transpose()
    }

    fn snapshot_from(&self, start: &[u8]) -> impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {
        let snapshot = self.map.lock().clone();
        let (_, start_value, above) = snapshot.split_lookup(start);

        start_value
            .map(|value| (Arc::from(start), value))
            .into_iter()
            .chain(above)
            .map(|(key, value)| Ok((key.to_vec(), decompress(&value)?)))
    }
}

/// A storage key type whose `Display` output starts with [`PrefixableKey::PREFIX`].
///
/// Prefixes of different key types must not be prefixes of each other, otherwise
/// [`Database::iterator_with_prefix`] returns entries of the wrong type.
pub trait PrefixableKey {
    const PREFIX: &'static str;

    fn has_prefix(bytes: &[u8]) -> bool {
        bytes.starts_with(Self::PREFIX.as_bytes())
    }
}

/// Puts and deletes to be applied together by [`Database::write`].
#[derive(Default, Debug)]
pub struct WriteBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        self.puts
            .push((key.as_ref().to_vec(), value.as_ref().to_vec()));
    }

    pub fn delete(&mut self, key: impl AsRef<[u8]>) {
        self.deletes.push(key.as_ref().to_vec());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new().decompress_vec(data).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_get() -> Result<()> {
        let database = build_database()?;

        assert_eq!(database.get("B")?, Some(to_bytes("2")));
        assert_eq!(database.get("D")?, None);

        Ok(())
    }

    #[test_case("", &[("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")])]
    #[test_case("B", &[("B", "2")])]
    #[test_case("D", &[])]
    fn test_iterator_with_prefix(prefix: &str, expected: &[(&str, &str)]) -> Result<()> {
        let database = build_database()?;

        assert_pairs_eq(
            database.iterator_with_prefix(prefix),
            expected.iter().copied(),
        )
    }

    #[test]
    fn iterator_with_prefix_stops_at_first_other_key() -> Result<()> {
        let database = Database::in_memory();
        let mut batch = WriteBatch::default();

        batch.put("a1", "1");
        batch.put("b1", "2");
        batch.put("b2", "3");
        batch.put("c1", "4");

        database.write(batch)?;

        assert_pairs_eq(
            database.iterator_with_prefix("b"),
            [("b1", "2"), ("b2", "3")],
        )
    }

    #[test_case("D", Some(("C", "3")))]
    #[test_case("C", Some(("C", "3")))]
    #[test_case("F", Some(("E", "5")))]
    #[test_case("0", None)]
    fn test_prev(key: &str, expected: Option<(&str, &str)>) -> Result<()> {
        let database = build_database()?;

        assert_eq!(database.prev(key)?, expected.map(to_bytes_pair));

        Ok(())
    }

    #[test]
    fn write_applies_puts_and_deletes_together() -> Result<()> {
        let database = build_database()?;
        let mut batch = WriteBatch::default();

        batch.put("D", "4");
        batch.delete("A");
        batch.put("F", "6");
        batch.delete("F");

        database.write(batch)?;

        assert_pairs_eq(
            database.iterator_with_prefix(""),
            [("B", "2"), ("C", "3"), ("D", "4"), ("E", "5")],
        )
    }

    #[test]
    fn iterator_reads_from_snapshot() -> Result<()> {
        let database = build_database()?;
        let iterator = database.iterator_with_prefix("");
        let mut batch = WriteBatch::default();

        batch.put("B", "changed");
        batch.delete("E");

        database.write(batch)?;

        assert_pairs_eq(iterator, [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")])
    }

    #[test]
    fn new_database_is_empty() {
        assert!(Database::in_memory().is_empty());
        assert!(WriteBatch::default().is_empty());
    }

    fn build_database() -> Result<Database> {
        let database = Database::in_memory();
        let mut batch = WriteBatch::default();

        for (key, value) in [("A", "1"), ("B", "2"), ("C", "3"), ("E", "5")] {
            batch.put(key, value);
        }

        database.write(batch)?;

        Ok(database)
    }

    fn assert_pairs_eq<'strings>(
        actual_pairs: impl IntoIterator<Item = Result<(Vec<u8>, Vec<u8>)>>,
        expected_pairs: impl IntoIterator<Item = (&'strings str, &'strings str)>,
    ) -> Result<()> {
        let actual_pairs = actual_pairs.into_iter().collect::<Result<Vec<_>>>()?;
        let expected_pairs = expected_pairs
            .into_iter()
            .map(to_bytes_pair)
            .collect::<Vec<_>>();

        assert_eq!(actual_pairs, expected_pairs);

        Ok(())
    }

    fn to_bytes_pair((key, value): (&str, &str)) -> (Vec<u8>, Vec<u8>) {
        (to_bytes(key), to_bytes(value))
    }

    fn to_bytes(string: &str) -> Vec<u8> {
        string.as_bytes().to_vec()
    }
}
