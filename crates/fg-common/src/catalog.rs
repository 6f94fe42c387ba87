use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category codes of the static data export that matter for fittings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Ship,
    Module,
    Charge,
    Subsystem,
}

impl Category {
    pub const SHIP_CODE: i32 = 6;
    pub const MODULE_CODE: i32 = 7;
    pub const CHARGE_CODE: i32 = 8;
    pub const SUBSYSTEM_CODE: i32 = 32;

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            Self::SHIP_CODE => Some(Category::Ship),
            Self::MODULE_CODE => Some(Category::Module),
            Self::CHARGE_CODE => Some(Category::Charge),
            Self::SUBSYSTEM_CODE => Some(Category::Subsystem),
            _ => None,
        }
    }

    /// Result type reported by catalog search.
    pub fn search_kind(&self) -> SearchKind {
        match self {
            Category::Ship => SearchKind::Ship,
            Category::Module | Category::Charge | Category::Subsystem => SearchKind::Item,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticGroup {
    pub id: i32,
    pub name: String,
    pub category_code: i32,
}

impl StaticGroup {
    pub fn category(&self) -> Option<Category> {
        Category::from_code(self.category_code)
    }

    pub fn is_charge(&self) -> bool {
        self.category() == Some(Category::Charge)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticItem {
    pub id: i32,
    pub name: String,
    pub lower: String,
    pub group_id: i32,
}

impl StaticItem {
    pub fn new(id: i32, name: &str, group_id: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            lower: name.to_lowercase(),
            group_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Ship,
    Item,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub name: String,
    pub id: i32,
}

pub const MIN_SEARCH_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse dataset: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to decode catalog snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Immutable item/group reference data. Built once, then shared by reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    items: HashMap<i32, StaticItem>,
    groups: HashMap<i32, StaticGroup>,
}

#[derive(Debug, Deserialize)]
struct GroupRecord {
    #[serde(rename = "categoryID", default)]
    category_id: i32,
    #[serde(default)]
    name: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct TypeRecord {
    #[serde(rename = "groupID", default)]
    group_id: i32,
    #[serde(default)]
    name: HashMap<String, String>,
}

fn english(name: &HashMap<String, String>) -> String {
    name.get("en").cloned().unwrap_or_default()
}

impl Catalog {
    /// Build a catalog keeping only groups whose category is relevant to fitting,
    /// and only items belonging to a kept group.
    pub fn from_parts(
        groups: impl IntoIterator<Item = StaticGroup>,
        items: impl IntoIterator<Item = StaticItem>,
    ) -> Self {
        let groups: HashMap<i32, StaticGroup> = groups
            .into_iter()
            .filter(|group| group.category().is_some())
            .map(|group| (group.id, group))
            .collect();

        let items = items
            .into_iter()
            .filter(|item| groups.contains_key(&item.group_id))
            .map(|item| (item.id, item))
            .collect();

        Self { items, groups }
    }

    /// Parse the `groupIDs.yaml` and `typeIDs.yaml` static data exports.
    pub fn from_yaml_readers<G: Read, T: Read>(groups: G, types: T) -> Result<Self, CatalogError> {
        let group_records: HashMap<i32, GroupRecord> = serde_yaml::from_reader(groups)?;
        let type_records: HashMap<i32, TypeRecord> = serde_yaml::from_reader(types)?;

        let groups = group_records.into_iter().map(|(id, record)| StaticGroup {
            id,
            name: english(&record.name),
            category_code: record.category_id,
        });
        let items = type_records
            .into_iter()
            .map(|(id, record)| StaticItem::new(id, &english(&record.name), record.group_id));

        Ok(Self::from_parts(groups, items))
    }

    pub fn item(&self, id: i32) -> Option<&StaticItem> {
        self.items.get(&id)
    }

    pub fn group(&self, id: i32) -> Option<&StaticGroup> {
        self.groups.get(&id)
    }

    pub fn group_of(&self, item: &StaticItem) -> Option<&StaticGroup> {
        self.groups.get(&item.group_id)
    }

    pub fn is_charge(&self, item_id: i32) -> bool {
        self.item(item_id)
            .and_then(|item| self.group_of(item))
            .map(StaticGroup::is_charge)
            .unwrap_or(false)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Case-insensitive substring search over item names. Terms shorter than
    /// [`MIN_SEARCH_LEN`] characters yield nothing.
    pub fn search(&self, term: &str) -> Vec<SearchHit> {
        let needle = term.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .items
            .values()
            .filter(|item| item.lower.contains(&needle))
            .filter_map(|item| {
                let category = self.group_of(item)?.category()?;
                Some(SearchHit {
                    kind: category.search_kind(),
                    name: item.name.clone(),
                    id: item.id,
                })
            })
            .collect();

        hits.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        hits
    }

    pub fn to_snapshot(&self) -> Result<serde_json::Value, CatalogError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_snapshot(value: serde_json::Value) -> Result<Self, CatalogError> {
        Ok(serde_json::from_value(value)?)
    }
}
