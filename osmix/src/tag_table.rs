//! CSR storage of (key-id, value-id) pairs per entity.

use crate::column::Column;
use crate::error::Result;
use crate::string_table::StringTable;
use std::collections::BTreeMap;

/// Per-entity tag CSR: `tag_start`/`tag_count` index into shared
/// `tag_keys`/`tag_vals` string-table-id arrays.
#[derive(Debug, Default)]
pub struct TagTable {
    tag_start: Column<u32>,
    tag_count: Column<u8>,
    tag_keys: Column<u32>,
    tag_vals: Column<u32>,
}

impl TagTable {
    pub fn new() -> Self {
        TagTable::default()
    }

    /// Interns every (key, value) pair into `strings` and appends a new CSR
    /// row. `tags` iterates in the order that should be preserved as
    /// "insertion order" per entity.
    pub fn add_tags<'a, I>(&mut self, strings: &mut StringTable, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let start = self.tag_keys.len() as u32;
        let mut n: u8 = 0;
        for (k, v) in tags {
            let k_id = strings.add(k)?;
            let v_id = strings.add(v)?;
            self.tag_keys.push(k_id);
            self.tag_vals.push(v_id);
            n = n.saturating_add(1);
        }
        self.tag_start.push(start);
        self.tag_count.push(n);
        Ok(())
    }

    pub fn has_tags(&self, index: usize) -> Result<bool> {
        Ok(self.tag_count.at(index)? > 0)
    }

    pub fn tag_count(&self, index: usize) -> Result<u8> {
        self.tag_count.at(index)
    }

    /// Resolves entity `index`'s tags into a `key -> value` map via `strings`.
    pub fn get_tags(&self, index: usize, strings: &StringTable) -> Result<BTreeMap<String, String>> {
        let start = self.tag_start.at(index)? as usize;
        let count = self.tag_count.at(index)? as usize;
        let mut out = BTreeMap::new();
        for i in start..start + count {
            let k = strings.get(self.tag_keys.at(i)?)?.to_string();
            let v = strings.get(self.tag_vals.at(i)?)?.to_string();
            out.insert(k, v);
        }
        Ok(out)
    }

    /// Returns the raw (key_id, value_id) slice for entity `index`, without
    /// resolving through the string table.
    pub fn tag_ids(&self, index: usize) -> Result<Vec<(u32, u32)>> {
        let start = self.tag_start.at(index)? as usize;
        let count = self.tag_count.at(index)? as usize;
        let mut out = Vec::with_capacity(count);
        for i in start..start + count {
            out.push((self.tag_keys.at(i)?, self.tag_vals.at(i)?));
        }
        Ok(out)
    }

    /// Looks up a single tag value by key without materializing the full map.
    pub fn get_tag(&self, index: usize, key: &str, strings: &StringTable) -> Result<Option<String>> {
        let start = self.tag_start.at(index)? as usize;
        let count = self.tag_count.at(index)? as usize;
        for i in start..start + count {
            if strings.get(self.tag_keys.at(i)?)? == key {
                return Ok(Some(strings.get(self.tag_vals.at(i)?)?.to_string()));
            }
        }
        Ok(None)
    }

    pub fn len(&self) -> usize {
        self.tag_start.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tag_start.is_empty()
    }

    pub fn compact(&mut self) {
        self.tag_start.compact();
        self.tag_count.compact();
        self.tag_keys.compact();
        self.tag_vals.compact();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tags_in_insertion_order() {
        let mut strings = StringTable::new();
        let mut tags = TagTable::new();
        tags.add_tags(&mut strings, [("highway", "residential"), ("name", "Main St")])
            .unwrap();
        assert!(tags.has_tags(0).unwrap());
        let map = tags.get_tags(0, &strings).unwrap();
        assert_eq!(map.get("highway").unwrap(), "residential");
        assert_eq!(map.get("name").unwrap(), "Main St");
    }

    #[test]
    fn entity_with_no_tags_has_zero_count() {
        let mut strings = StringTable::new();
        let mut tags = TagTable::new();
        tags.add_tags(&mut strings, std::iter::empty()).unwrap();
        assert!(!tags.has_tags(0).unwrap());
        assert_eq!(tags.tag_count(0).unwrap(), 0);
    }

    #[test]
    fn get_tag_looks_up_single_key() {
        let mut strings = StringTable::new();
        let mut tags = TagTable::new();
        tags.add_tags(&mut strings, [("highway", "primary")]).unwrap();
        assert_eq!(tags.get_tag(0, "highway", &strings).unwrap(), Some("primary".to_string()));
        assert_eq!(tags.get_tag(0, "missing", &strings).unwrap(), None);
    }
}
