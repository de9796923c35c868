//! Id+tag+member columns for relations.

use crate::column::Column;
use crate::error::{OsmError, Result};
use crate::id_index::IdIndex;
use crate::string_table::StringTable;
use crate::tag_table::TagTable;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node = 0,
    Way = 1,
    Relation = 2,
}

impl MemberType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(MemberType::Node),
            1 => Ok(MemberType::Way),
            2 => Ok(MemberType::Relation),
            _ => Err(OsmError::MalformedPbf(format!("invalid member type byte {v}"))),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            MemberType::Node => "node",
            MemberType::Way => "way",
            MemberType::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub member_type: MemberType,
    /// OSM id, not a local index: relations may forward-reference entities
    /// not yet ingested.
    pub member_ref: i64,
    pub role: String,
}

/// Relation table. Member refs are stored as OSM ids rather than resolved
/// local indexes, since relations may reference other relations or
/// entities that appear later in ingest order; resolution to indexes is
/// left to consumers.
pub struct RelationTable {
    id: Column<i64>,
    member_start: Column<u32>,
    member_count: Column<u16>,
    member_refs: Column<i64>,
    member_types: Column<u8>,
    member_roles: Column<u32>,
    tags: TagTable,
    ids_sorted_so_far: bool,
    last_id: i64,
    frozen: bool,
    id_index: Option<IdIndex>,
}

impl Default for RelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationTable {
    pub fn new() -> Self {
        RelationTable {
            id: Column::new(),
            member_start: Column::new(),
            member_count: Column::new(),
            member_refs: Column::new(),
            member_types: Column::new(),
            member_roles: Column::new(),
            tags: TagTable::new(),
            ids_sorted_so_far: true,
            last_id: i64::MIN,
            frozen: false,
            id_index: None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_relation<'a, I, M>(
        &mut self,
        strings: &mut StringTable,
        id: i64,
        members: M,
        tags: I,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
        M: IntoIterator<Item = (MemberType, i64, &'a str)>,
    {
        if self.frozen {
            return Err(OsmError::Frozen);
        }
        let index = self.id.len();
        if id < self.last_id {
            self.ids_sorted_so_far = false;
        }
        self.last_id = id;
        self.id.push(id);
        self.member_start.push(self.member_refs.len() as u32);
        let mut n: u16 = 0;
        for (mtype, mref, role) in members {
            let role_id = strings.add(role)?;
            self.member_refs.push(mref);
            self.member_types.push(mtype.as_u8());
            self.member_roles.push(role_id);
            n = n.saturating_add(1);
        }
        self.member_count.push(n);
        self.tags.add_tags(strings, tags)?;
        Ok(index)
    }

    pub fn finish(&mut self) {
        if self.frozen {
            return;
        }
        self.id.compact();
        self.member_start.compact();
        self.member_count.compact();
        self.member_refs.compact();
        self.member_types.compact();
        self.member_roles.compact();
        self.tags.compact();
        self.id_index = Some(IdIndex::build(self.id.as_slice(), self.ids_sorted_so_far));
        self.frozen = true;
    }

    pub fn id_of(&self, index: usize) -> Result<i64> {
        self.id.at(index)
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.id_index.as_ref()?.index_of(id)
    }

    pub fn get_members(&self, index: usize, strings: &StringTable) -> Result<Vec<Member>> {
        let start = self.member_start.at(index)? as usize;
        let count = self.member_count.at(index)? as usize;
        let mut out = Vec::with_capacity(count);
        for i in start..start + count {
            out.push(Member {
                member_type: MemberType::from_u8(self.member_types.at(i)?)?,
                member_ref: self.member_refs.at(i)?,
                role: strings.get(self.member_roles.at(i)?)?.to_string(),
            });
        }
        Ok(out)
    }

    /// Linear scan (member count <= 65 535) for a specific member.
    /// `role` of `None` matches any role.
    pub fn includes_member(
        &self,
        index: usize,
        member_ref: i64,
        member_type: MemberType,
        role: Option<&str>,
        strings: &StringTable,
    ) -> Result<bool> {
        let start = self.member_start.at(index)? as usize;
        let count = self.member_count.at(index)? as usize;
        for i in start..start + count {
            if self.member_refs.at(i)? != member_ref {
                continue;
            }
            if MemberType::from_u8(self.member_types.at(i)?)? != member_type {
                continue;
            }
            if let Some(want_role) = role {
                if strings.get(self.member_roles.at(i)?)? != want_role {
                    continue;
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    pub fn tags_of(&self, index: usize, strings: &StringTable) -> Result<BTreeMap<String, String>> {
        self.tags.get_tags(index, strings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_members_and_preserves_forward_refs() {
        let mut strings = StringTable::new();
        let mut relations = RelationTable::new();
        relations
            .add_relation(
                &mut strings,
                1,
                [
                    (MemberType::Way, 100, "outer"),
                    (MemberType::Relation, 2, ""), // forward ref to relation 2, not yet ingested
                ],
                [("type", "multipolygon")],
            )
            .unwrap();
        relations.finish();
        let members = relations.get_members(0, &strings).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].member_ref, 100);
        assert_eq!(members[0].role, "outer");
        assert_eq!(members[1].member_type, MemberType::Relation);
        assert_eq!(members[1].member_ref, 2);
    }

    #[test]
    fn includes_member_scans_linearly() {
        let mut strings = StringTable::new();
        let mut relations = RelationTable::new();
        relations
            .add_relation(&mut strings, 1, [(MemberType::Node, 42, "stop")], std::iter::empty())
            .unwrap();
        relations.finish();
        assert!(relations
            .includes_member(0, 42, MemberType::Node, Some("stop"), &strings)
            .unwrap());
        assert!(!relations
            .includes_member(0, 42, MemberType::Way, None, &strings)
            .unwrap());
        assert!(!relations
            .includes_member(0, 7, MemberType::Node, None, &strings)
            .unwrap());
    }
}
