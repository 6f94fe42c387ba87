use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, StaticItem};
use crate::killmail::Killmail;
use crate::slot::{SLOTS_PER_FAMILY, Slot, SlotFamily};

/// Item reference as exposed in fit layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i32,
    pub name: String,
}

impl From<&StaticItem> for Item {
    fn from(item: &StaticItem) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
        }
    }
}

/// One slot position: the fitted module and whatever charge it held.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<Item>,
}

impl SlotCell {
    fn primary_id(&self) -> i32 {
        self.item.as_ref().map(|item| item.id).unwrap_or(0)
    }
}

pub type SlotRow = [SlotCell; SLOTS_PER_FAMILY];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitLayout {
    pub hi: SlotRow,
    pub med: SlotRow,
    pub low: SlotRow,
    pub rig: SlotRow,
    pub sub: SlotRow,
}

impl FitLayout {
    pub fn row(&self, family: SlotFamily) -> &SlotRow {
        match family {
            SlotFamily::High => &self.hi,
            SlotFamily::Medium => &self.med,
            SlotFamily::Low => &self.low,
            SlotFamily::Rig => &self.rig,
            SlotFamily::Subsystem => &self.sub,
        }
    }

    fn row_mut(&mut self, family: SlotFamily) -> &mut SlotRow {
        match family {
            SlotFamily::High => &mut self.hi,
            SlotFamily::Medium => &mut self.med,
            SlotFamily::Low => &mut self.low,
            SlotFamily::Rig => &mut self.rig,
            SlotFamily::Subsystem => &mut self.sub,
        }
    }

    /// Number of high slots holding a module.
    pub fn high_count(&self) -> usize {
        self.hi.iter().filter(|cell| cell.item.is_some()).count()
    }

    /// Only fits with something in a high slot are worth keeping; this drops
    /// drone-only and empty hulls.
    pub fn is_interesting(&self) -> bool {
        self.high_count() > 0
    }

    /// Primary type ids per position, `0` where empty.
    pub fn primary_ids(&self, family: SlotFamily) -> Vec<i32> {
        self.row(family).iter().map(SlotCell::primary_id).collect()
    }

    /// Every fitted type id, modules and charges, sorted and unique.
    pub fn all_item_ids(&self) -> Vec<i32> {
        let ids: BTreeSet<i32> = SlotFamily::ALL
            .into_iter()
            .flat_map(|family| self.row(family).iter())
            .flat_map(|cell| [cell.item.as_ref(), cell.charge.as_ref()])
            .flatten()
            .map(|item| item.id)
            .collect();
        ids.into_iter().collect()
    }
}

/// Place each (flag, type id) pair into its slot. Non-fitting flags and items
/// unknown to the catalog are skipped. Charges attach to the cell's `charge`
/// and never displace the module.
///
/// Pairs are applied in sorted order so the layout does not depend on the
/// order the killmail listed them in.
pub fn extract_layout(pairs: &[(i32, i32)], catalog: &Catalog) -> FitLayout {
    let mut sorted = pairs.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut layout = FitLayout::default();
    for (flag, item_id) in sorted {
        let Some(slot) = Slot::from_flag(flag) else {
            continue;
        };
        let Some(item) = catalog.item(item_id) else {
            continue;
        };
        let is_charge = catalog
            .group_of(item)
            .map(|group| group.is_charge())
            .unwrap_or(false);

        let cell = &mut layout.row_mut(slot.family)[slot.position];
        if is_charge {
            cell.charge = Some(Item::from(item));
        } else {
            cell.item = Some(Item::from(item));
        }
    }

    layout
}

/// Row of the `fit` relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRecord {
    pub killmail_id: i64,
    pub ship_id: i32,
    pub solar_system_id: i32,
    pub cost: Option<i64>,
    pub hi: Vec<i32>,
    pub med: Vec<i32>,
    pub low: Vec<i32>,
    pub rig: Vec<i32>,
    pub sub: Vec<i32>,
    pub all_items: Vec<i32>,
}

impl FitRecord {
    pub fn from_layout(killmail: &Killmail, layout: &FitLayout, cost: Option<i64>) -> Self {
        Self {
            killmail_id: killmail.killmail_id,
            ship_id: killmail.victim.ship_type_id,
            solar_system_id: killmail.solar_system_id,
            cost,
            hi: layout.primary_ids(SlotFamily::High),
            med: layout.primary_ids(SlotFamily::Medium),
            low: layout.primary_ids(SlotFamily::Low),
            rig: layout.primary_ids(SlotFamily::Rig),
            sub: layout.primary_ids(SlotFamily::Subsystem),
            all_items: layout.all_item_ids(),
        }
    }
}

/// Extract the fit record of a killmail, or `None` for boring fits.
pub fn extract_fit(killmail: &Killmail, catalog: &Catalog, cost: Option<i64>) -> Option<FitRecord> {
    let layout = extract_layout(&killmail.item_pairs(), catalog);
    layout
        .is_interesting()
        .then(|| FitRecord::from_layout(killmail, &layout, cost))
}
