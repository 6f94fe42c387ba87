use serde::{Deserialize, Serialize};

/// Positions per slot family.
pub const SLOTS_PER_FAMILY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotFamily {
    High,
    Medium,
    Low,
    Rig,
    Subsystem,
}

impl SlotFamily {
    pub const ALL: [SlotFamily; 5] = [
        SlotFamily::High,
        SlotFamily::Medium,
        SlotFamily::Low,
        SlotFamily::Rig,
        SlotFamily::Subsystem,
    ];

    /// First inventory flag of the family.
    pub const fn base(self) -> i32 {
        match self {
            SlotFamily::Low => 11,
            SlotFamily::Medium => 19,
            SlotFamily::High => 27,
            SlotFamily::Rig => 92,
            SlotFamily::Subsystem => 125,
        }
    }

    pub const fn last(self) -> i32 {
        self.base() + SLOTS_PER_FAMILY as i32 - 1
    }

    pub fn contains(self, flag: i32) -> bool {
        (self.base()..=self.last()).contains(&flag)
    }
}

/// An inventory flag that falls into one of the fitting slot ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub family: SlotFamily,
    pub position: usize,
}

impl Slot {
    /// Classify a raw flag; `None` for cargo, drone bay and every other
    /// non-fitting location.
    pub fn from_flag(flag: i32) -> Option<Self> {
        let family = SlotFamily::ALL
            .into_iter()
            .find(|family| family.contains(flag))?;
        let position = usize::try_from(flag - family.base()).ok()?;
        Some(Self { family, position })
    }

    pub fn flag(self) -> i32 {
        self.family.base() + self.position as i32
    }
}

pub fn is_fitting(flag: i32) -> bool {
    Slot::from_flag(flag).is_some()
}
