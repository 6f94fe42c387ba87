use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Killmail document as served by the ESI detail endpoint and embedded in
/// feed packages. Unknown fields are ignored; missing ones take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Killmail {
    pub killmail_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killmail_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub solar_system_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moon_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub war_id: Option<i32>,
    #[serde(default)]
    pub victim: Victim,
    #[serde(default)]
    pub attackers: Vec<Attacker>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    #[serde(default)]
    pub ship_type_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alliance_id: Option<i64>,
    #[serde(default)]
    pub damage_taken: i64,
    #[serde(default)]
    pub items: Vec<VictimItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VictimItem {
    pub flag: i32,
    pub item_type_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_dropped: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_destroyed: Option<i64>,
    #[serde(default)]
    pub singleton: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attacker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corporation_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alliance_id: Option<i64>,
    #[serde(default)]
    pub damage_done: i64,
    #[serde(default)]
    pub final_blow: bool,
    #[serde(default)]
    pub security_status: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_type_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon_type_id: Option<i32>,
}

impl Killmail {
    /// (flag, type id) pairs of everything the victim carried.
    pub fn item_pairs(&self) -> Vec<(i32, i32)> {
        self.victim
            .items
            .iter()
            .map(|item| (item.flag, item.item_type_id))
            .collect()
    }
}

/// Valuation block attached to feed packages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    #[serde(rename = "locationID", default)]
    pub location_id: i64,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub fitted_value: f64,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub npc: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub awox: bool,
    #[serde(default)]
    pub href: String,
}

impl Valuation {
    /// Fitted value as a whole-ISK cost; `None` when the feed reported nothing.
    pub fn cost(&self) -> Option<i64> {
        if self.fitted_value.is_finite() && self.fitted_value > 0.0 {
            Some(self.fitted_value as i64)
        } else {
            None
        }
    }
}

/// Long-poll response body: `{"package": null}` when the queue is drained.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedEnvelope {
    #[serde(default)]
    pub package: Option<FeedPackage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedPackage {
    #[serde(rename = "killID")]
    pub kill_id: i64,
    pub killmail: Killmail,
    #[serde(default)]
    pub zkb: Valuation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_feed_envelope_with_package() {
        let body = r#"{
            "package": {
                "killID": 100,
                "killmail": {
                    "killmail_id": 100,
                    "killmail_time": "2024-01-01T12:00:00Z",
                    "solar_system_id": 30000142,
                    "victim": {
                        "ship_type_id": 587,
                        "damage_taken": 1200,
                        "items": [
                            {"flag": 27, "item_type_id": 2873, "singleton": 0, "quantity_destroyed": 1}
                        ],
                        "position": {"x": 1.0, "y": 2.0, "z": 3.0}
                    },
                    "attackers": [{"final_blow": true, "damage_done": 1200, "security_status": -2.5}]
                },
                "zkb": {"locationID": 40009082, "hash": "abc", "fittedValue": 500000.4, "totalValue": 900000, "npc": false}
            }
        }"#;

        let envelope: FeedEnvelope = serde_json::from_str(body).unwrap();
        let package = envelope.package.unwrap();
        assert_eq!(package.kill_id, 100);
        assert_eq!(package.killmail.item_pairs(), vec![(27, 2873)]);
        assert_eq!(package.zkb.hash, "abc");
        assert_eq!(package.zkb.cost(), Some(500000));
    }

    #[test]
    fn null_package_is_empty() {
        let envelope: FeedEnvelope = serde_json::from_str(r#"{"package": null}"#).unwrap();
        assert!(envelope.package.is_none());

        let envelope: FeedEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.package.is_none());
    }

    #[test]
    fn zero_or_missing_fitted_value_has_no_cost() {
        assert_eq!(Valuation::default().cost(), None);
        let valuation: Valuation = serde_json::from_str(r#"{"fittedValue": 0}"#).unwrap();
        assert_eq!(valuation.cost(), None);
    }

    #[test]
    fn killmail_without_id_is_rejected() {
        let result = serde_json::from_str::<Killmail>(r#"{"victim": {}}"#);
        assert!(result.is_err());
    }
}
