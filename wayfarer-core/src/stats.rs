//! Attribute aggregation across an equipped set of items, owned
//! collectibles, and manual overrides.

use crate::catalog::{Catalog, Collectible, Item};
use crate::character::Character;
use std::collections::{HashMap, HashSet};

/// Canonical attribute keys used in catalog stat blocks.
pub mod attr {
    pub const BONUS_XP_ADD: &str = "bonus_xp_add";
    pub const BONUS_XP_PERCENT: &str = "bonus_xp_percent";
    pub const CHEST_FINDING: &str = "chest_finding";
    pub const DOUBLE_ACTION: &str = "double_action";
    pub const DOUBLE_REWARDS: &str = "double_rewards";
    pub const FIND_BIRD_NESTS: &str = "find_bird_nests";
    pub const FIND_COLLECTIBLES: &str = "find_collectibles";
    pub const FIND_GEMS: &str = "find_gems";
    pub const FINE_MATERIAL_FINDING: &str = "fine_material_finding";
    pub const INVENTORY_SPACE: &str = "inventory_space";
    pub const ITEM_FINDING: &str = "item_finding";
    pub const NO_MATERIALS_CONSUMED: &str = "no_materials_consumed";
    pub const QUALITY_OUTCOME: &str = "quality_outcome";
    pub const STEPS_ADD: &str = "steps_add";
    pub const STEPS_PERCENT: &str = "steps_percent";
    pub const WORK_EFFICIENCY: &str = "work_efficiency";
}

/// Display metadata for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub internal_name: &'static str,
    pub abbreviation: &'static str,
    pub display_name: &'static str,
    pub is_percentage: bool,
}

/// Every attribute items can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    BonusXpAdd,
    BonusXpPercent,
    ChestFinding,
    DoubleAction,
    DoubleRewards,
    FindBirdNests,
    FindCollectibles,
    FindGems,
    FineMaterialFinding,
    InventorySpace,
    ItemFinding,
    NoMaterialsConsumed,
    QualityOutcome,
    StepsAdd,
    StepsPercent,
    WorkEfficiency,
}

impl Attribute {
    pub const ALL: [Attribute; 16] = [
        Attribute::BonusXpAdd,
        Attribute::BonusXpPercent,
        Attribute::ChestFinding,
        Attribute::DoubleAction,
        Attribute::DoubleRewards,
        Attribute::FindBirdNests,
        Attribute::FindCollectibles,
        Attribute::FindGems,
        Attribute::FineMaterialFinding,
        Attribute::InventorySpace,
        Attribute::ItemFinding,
        Attribute::NoMaterialsConsumed,
        Attribute::QualityOutcome,
        Attribute::StepsAdd,
        Attribute::StepsPercent,
        Attribute::WorkEfficiency,
    ];

    pub fn info(self) -> AttributeInfo {
        match self {
            Attribute::BonusXpAdd => AttributeInfo {
                internal_name: attr::BONUS_XP_ADD,
                abbreviation: "XP",
                display_name: "Bonus Experience (Flat)",
                is_percentage: false,
            },
            Attribute::BonusXpPercent => AttributeInfo {
                internal_name: attr::BONUS_XP_PERCENT,
                abbreviation: "XP%",
                display_name: "Bonus Experience (%)",
                is_percentage: true,
            },
            Attribute::ChestFinding => AttributeInfo {
                internal_name: attr::CHEST_FINDING,
                abbreviation: "CF",
                display_name: "Chest Finding",
                is_percentage: true,
            },
            Attribute::DoubleAction => AttributeInfo {
                internal_name: attr::DOUBLE_ACTION,
                abbreviation: "DA",
                display_name: "Double Action",
                is_percentage: true,
            },
            Attribute::DoubleRewards => AttributeInfo {
                internal_name: attr::DOUBLE_REWARDS,
                abbreviation: "DR",
                display_name: "Double Rewards",
                is_percentage: true,
            },
            Attribute::FindBirdNests => AttributeInfo {
                internal_name: attr::FIND_BIRD_NESTS,
                abbreviation: "FBN",
                display_name: "Find Bird Nests",
                is_percentage: true,
            },
            Attribute::FindCollectibles => AttributeInfo {
                internal_name: attr::FIND_COLLECTIBLES,
                abbreviation: "FC",
                display_name: "Find Collectibles",
                is_percentage: true,
            },
            Attribute::FindGems => AttributeInfo {
                internal_name: attr::FIND_GEMS,
                abbreviation: "FG",
                display_name: "Find Gems",
                is_percentage: true,
            },
            Attribute::FineMaterialFinding => AttributeInfo {
                internal_name: attr::FINE_MATERIAL_FINDING,
                abbreviation: "FMF",
                display_name: "Fine Material Finding",
                is_percentage: true,
            },
            Attribute::InventorySpace => AttributeInfo {
                internal_name: attr::INVENTORY_SPACE,
                abbreviation: "INV",
                display_name: "Inventory Space",
                is_percentage: false,
            },
            Attribute::ItemFinding => AttributeInfo {
                internal_name: attr::ITEM_FINDING,
                abbreviation: "IF",
                display_name: "Item Finding",
                is_percentage: true,
            },
            Attribute::NoMaterialsConsumed => AttributeInfo {
                internal_name: attr::NO_MATERIALS_CONSUMED,
                abbreviation: "NMC",
                display_name: "No Materials Consumed",
                is_percentage: true,
            },
            Attribute::QualityOutcome => AttributeInfo {
                internal_name: attr::QUALITY_OUTCOME,
                abbreviation: "QO",
                display_name: "Quality Outcome",
                is_percentage: false,
            },
            Attribute::StepsAdd => AttributeInfo {
                internal_name: attr::STEPS_ADD,
                abbreviation: "Flat",
                display_name: "Steps Required (Flat)",
                is_percentage: false,
            },
            Attribute::StepsPercent => AttributeInfo {
                internal_name: attr::STEPS_PERCENT,
                abbreviation: "Pct",
                display_name: "Steps Required (%)",
                is_percentage: true,
            },
            Attribute::WorkEfficiency => AttributeInfo {
                internal_name: attr::WORK_EFFICIENCY,
                abbreviation: "WE",
                display_name: "Work Efficiency",
                is_percentage: true,
            },
        }
    }

    pub fn from_internal_name(name: &str) -> Option<Attribute> {
        Attribute::ALL
            .iter()
            .copied()
            .find(|a| a.info().internal_name == name)
    }
}

/// Summed attribute values for one skill and location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatTotals(pub HashMap<String, f64>);

impl StatTotals {
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn add(&mut self, name: &str, value: f64) {
        *self.0.entry(name.to_string()).or_insert(0.0) += value;
    }

    /// Add every value from `other` into this total.
    pub fn extend(&mut self, other: &StatTotals) {
        for (name, value) in &other.0 {
            self.add(name, *value);
        }
    }

    pub fn work_efficiency(&self) -> f64 {
        self.get(attr::WORK_EFFICIENCY)
    }

    pub fn double_action(&self) -> f64 {
        self.get(attr::DOUBLE_ACTION)
    }

    pub fn double_rewards(&self) -> f64 {
        self.get(attr::DOUBLE_REWARDS)
    }

    pub fn no_materials_consumed(&self) -> f64 {
        self.get(attr::NO_MATERIALS_CONSUMED)
    }

    /// Value of `attribute`, using its canonical key.
    pub fn attribute(&self, attribute: Attribute) -> f64 {
        self.get(attribute.info().internal_name)
    }

    pub fn quality_outcome(&self) -> f64 {
        self.get(attr::QUALITY_OUTCOME)
    }

    pub fn bonus_xp_percent(&self) -> f64 {
        self.get(attr::BONUS_XP_PERCENT)
    }

    pub fn bonus_xp_add(&self) -> f64 {
        self.get(attr::BONUS_XP_ADD)
    }

    pub fn steps_percent(&self) -> f64 {
        self.get(attr::STEPS_PERCENT)
    }

    pub fn steps_add(&self) -> f64 {
        self.get(attr::STEPS_ADD)
    }

    pub fn chest_finding(&self) -> f64 {
        self.get(attr::CHEST_FINDING)
    }
}

/// Count unique equipped items per keyword. Two ring slots holding the
/// same item count as one piece toward a set.
pub fn set_piece_counts(items: &[&Item]) -> HashMap<String, u32> {
    let mut uuids_by_keyword: HashMap<String, HashSet<&str>> = HashMap::new();
    for item in items {
        for keyword in &item.keywords {
            uuids_by_keyword
                .entry(keyword.to_lowercase())
                .or_default()
                .insert(item.uuid.as_str());
        }
    }
    uuids_by_keyword
        .into_iter()
        .map(|(keyword, uuids)| (keyword, uuids.len() as u32))
        .collect()
}

/// Sum attribute values across equipped items for a skill at a location.
pub fn aggregate(items: &[&Item], skill: &str, location: Option<&str>) -> StatTotals {
    let pieces = set_piece_counts(items);
    let mut totals = StatTotals::default();
    for item in items {
        for (name, value) in item.stats_for_skill(skill, location, &pieces) {
            totals.add(&name, value);
        }
    }
    totals
}

/// Sum stat bonuses granted by owned collectibles.
pub fn collectible_stats(
    collectibles: &[&Collectible],
    skill: &str,
    location: Option<&str>,
) -> StatTotals {
    let mut totals = StatTotals::default();
    for collectible in collectibles {
        for (name, value) in collectible.stats_for_skill(skill, location) {
            totals.add(&name, value);
        }
    }
    totals
}

/// Character-wide bonuses that apply on top of equipped gear:
/// collectible stats plus the export's manual stat overrides.
pub fn character_stats(
    character: &Character,
    catalog: &Catalog,
    skill: &str,
    location: Option<&str>,
) -> StatTotals {
    let mut totals = collectible_stats(&character.owned_collectibles(catalog), skill, location);
    if let Some(overrides) = &character.custom_stats {
        for (name, value) in overrides {
            totals.add(name, *value);
        }
    }
    totals
}

/// Aggregate with the over-level bonus applied.
///
/// Each skill level above the activity's level grants 1.25% work
/// efficiency (capped at 20 levels) and 1 quality outcome (uncapped).
pub fn aggregate_with_level_bonus(
    items: &[&Item],
    skill: &str,
    location: Option<&str>,
    skill_level: u32,
    activity_level: u32,
) -> StatTotals {
    let mut totals = aggregate(items, skill, location);
    if skill_level > activity_level {
        let levels_above = skill_level - activity_level;
        totals.add(
            attr::WORK_EFFICIENCY,
            levels_above.min(20) as f64 * 0.0125,
        );
        totals.add(attr::QUALITY_OUTCOME, levels_above as f64);
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, ItemSlot, ScopedStats};
    use std::collections::HashMap;

    fn item(uuid: &str, keywords: &[&str], stats: &[(&str, f64)]) -> Item {
        Item {
            uuid: uuid.to_string(),
            name: uuid.to_string(),
            slot: ItemSlot::Head,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            value: 0,
            stats: vec![ScopedStats {
                stats: stats
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<HashMap<_, _>>(),
                ..Default::default()
            }],
            requirements: Default::default(),
        }
    }

    #[test]
    fn test_attribute_names_roundtrip() {
        for attribute in Attribute::ALL {
            let info = attribute.info();
            assert_eq!(Attribute::from_internal_name(info.internal_name), Some(attribute));
        }
        assert_eq!(Attribute::from_internal_name("step_count"), None);
        assert!(Attribute::WorkEfficiency.info().is_percentage);
        assert!(!Attribute::QualityOutcome.info().is_percentage);
    }

    #[test]
    fn test_set_piece_counts_deduplicates_uuids() {
        let a = item("u1", &["Lumberjack"], &[]);
        let a_again = item("u1", &["Lumberjack"], &[]);
        let b = item("u2", &["Lumberjack", "Tool"], &[]);

        let counts = set_piece_counts(&[&a, &a_again, &b]);
        assert_eq!(counts.get("lumberjack"), Some(&2));
        assert_eq!(counts.get("tool"), Some(&1));
    }

    #[test]
    fn test_aggregate_sums_across_items() {
        let a = item("u1", &[], &[(attr::WORK_EFFICIENCY, 0.05)]);
        let b = item(
            "u2",
            &[],
            &[(attr::WORK_EFFICIENCY, 0.10), (attr::DOUBLE_ACTION, 0.02)],
        );

        let totals = aggregate(&[&a, &b], "mining", None);
        assert!((totals.work_efficiency() - 0.15).abs() < 1e-9);
        assert!((totals.double_action() - 0.02).abs() < 1e-9);
        assert_eq!(totals.double_rewards(), 0.0);
    }

    #[test]
    fn test_collectible_stats_respect_skill_scope() {
        let boot = Collectible {
            name: "Old Boot".to_string(),
            stats: vec![
                ScopedStats {
                    skills: vec!["fishing".to_string()],
                    stats: HashMap::from([(attr::WORK_EFFICIENCY.to_string(), 0.03)]),
                    ..Default::default()
                },
                ScopedStats {
                    stats: HashMap::from([(attr::DOUBLE_REWARDS.to_string(), 0.01)]),
                    ..Default::default()
                },
            ],
        };

        let fishing = collectible_stats(&[&boot], "Fishing", None);
        assert!((fishing.work_efficiency() - 0.03).abs() < 1e-9);
        assert!((fishing.double_rewards() - 0.01).abs() < 1e-9);

        let mining = collectible_stats(&[&boot], "Mining", None);
        assert_eq!(mining.work_efficiency(), 0.0);
        assert!((mining.double_rewards() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_character_stats_include_collectibles_and_overrides() {
        use crate::catalog::{Catalog, CatalogData};
        use crate::character::Character;

        let catalog = Catalog::from_data(CatalogData {
            collectibles: vec![Collectible {
                name: "Old Boot".to_string(),
                stats: vec![ScopedStats {
                    stats: HashMap::from([(attr::WORK_EFFICIENCY.to_string(), 0.03)]),
                    ..Default::default()
                }],
            }],
            ..Default::default()
        });
        let mut character = Character::default();
        character.collectibles.push("old boot".to_string());
        character.collectibles.push("Unknown Trinket".to_string());
        character.custom_stats =
            Some(HashMap::from([(attr::DOUBLE_ACTION.to_string(), 0.05)]));

        let totals = character_stats(&character, &catalog, "mining", None);
        assert!((totals.work_efficiency() - 0.03).abs() < 1e-9);
        assert!((totals.double_action() - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_level_bonus_caps_efficiency_not_quality() {
        let totals = aggregate_with_level_bonus(&[], "mining", None, 80, 50);
        // 30 levels above: WE capped at 20 levels, QO uses all 30.
        assert!((totals.work_efficiency() - 0.25).abs() < 1e-9);
        assert!((totals.quality_outcome() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_level_bonus_absent_at_or_below_level() {
        let totals = aggregate_with_level_bonus(&[], "mining", None, 50, 50);
        assert_eq!(totals.work_efficiency(), 0.0);
        assert_eq!(totals.quality_outcome(), 0.0);
    }
}
