//! Character data imported from the game's character export.

use crate::catalog::{Catalog, Collectible, Item};
use crate::error::{Result, WayfarerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Skill level cap.
pub const MAX_LEVEL: u32 = 100;

/// XP required to reach a level from level 1.
pub fn xp_for_level(level: u32) -> u64 {
    if level <= 1 {
        return 0;
    }
    let n = (level - 1) as u64;
    50 * n * n * (n + 5)
}

/// Level reached with the given amount of XP.
pub fn level_for_xp(xp: u64) -> u32 {
    let mut level = 1;
    while level < MAX_LEVEL && xp >= xp_for_level(level + 1) {
        level += 1;
    }
    level
}

/// Character level derived from lifetime steps. Every level costs 10%
/// more steps than the one before it.
pub fn character_level_from_steps(steps: u64) -> u32 {
    let mut level = 1;
    let mut threshold = 1000.0_f64;
    let mut total = threshold;
    while level < MAX_LEVEL && steps as f64 >= total {
        level += 1;
        threshold *= 1.1;
        total += threshold;
    }
    level
}

/// A character as parsed from the game's JSON export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub steps: u64,
    #[serde(default)]
    pub achievement_points: u32,
    #[serde(default)]
    pub coins: i64,
    #[serde(default)]
    pub custom_stats: Option<HashMap<String, f64>>,
    /// Skill name to lifetime XP.
    #[serde(default)]
    pub skills: HashMap<String, u64>,
    /// Equipped items by export name. Quantity is always 1.
    #[serde(default)]
    pub gear: HashMap<String, u32>,
    #[serde(default)]
    pub inventory: HashMap<String, u32>,
    #[serde(default)]
    pub bank: HashMap<String, u32>,
    #[serde(default)]
    pub collectibles: Vec<String>,
    #[serde(default)]
    pub reputation: HashMap<String, i64>,
    #[serde(default)]
    pub completions: Vec<String>,
}

impl Character {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let character: Character = serde_json::from_str(&raw).map_err(|e| {
            WayfarerError::Parse(format!("character export {}: {}", path.display(), e))
        })?;
        tracing::debug!(
            "Loaded character '{}' ({} skills, {} owned item names)",
            character.name,
            character.skills.len(),
            character.items().len()
        );
        Ok(character)
    }

    pub fn skill_level(&self, skill: &str) -> u32 {
        let skill_lower = skill.to_lowercase();
        self.skills
            .iter()
            .find(|(name, _)| name.to_lowercase() == skill_lower)
            .map(|(_, &xp)| level_for_xp(xp))
            .unwrap_or(1)
    }

    pub fn total_skill_level(&self) -> u32 {
        self.skills.values().map(|&xp| level_for_xp(xp)).sum()
    }

    pub fn level(&self) -> u32 {
        character_level_from_steps(self.steps)
    }

    pub fn has_completion(&self, activity: &str) -> bool {
        self.completions
            .iter()
            .any(|c| c.eq_ignore_ascii_case(activity))
    }

    /// Every item the character owns across gear, inventory, and bank,
    /// keyed by export name with quantities merged.
    pub fn items(&self) -> HashMap<String, u32> {
        let mut merged: HashMap<String, u32> = HashMap::new();
        for name in self.gear.keys() {
            *merged.entry(name.clone()).or_insert(0) += 1;
        }
        for (name, &qty) in self.inventory.iter().chain(self.bank.iter()) {
            *merged.entry(name.clone()).or_insert(0) += qty;
        }
        merged
    }

    /// Owned items resolved against the catalog. Names the catalog does
    /// not know are skipped.
    pub fn owned_items<'c>(&self, catalog: &'c Catalog) -> Vec<(&'c Item, u32)> {
        self.items()
            .into_iter()
            .filter_map(|(name, qty)| catalog.item_by_name(&name).map(|item| (item, qty)))
            .collect()
    }

    /// Collectibles resolved against the catalog. Names the catalog
    /// does not know are skipped.
    pub fn owned_collectibles<'c>(&self, catalog: &'c Catalog) -> Vec<&'c Collectible> {
        self.collectibles
            .iter()
            .filter_map(|name| catalog.collectible(name))
            .collect()
    }

    /// Owned quantity per item uuid. Quality variants of the same item
    /// share a uuid, so quantities are merged across them.
    pub fn uuid_quantities(&self, catalog: &Catalog) -> HashMap<String, u32> {
        let mut quantities: HashMap<String, u32> = HashMap::new();
        for (item, qty) in self.owned_items(catalog) {
            *quantities.entry(item.uuid.clone()).or_insert(0) += qty;
        }
        quantities
    }

    /// Coin value of everything owned.
    pub fn total_value(&self, catalog: &Catalog) -> i64 {
        self.owned_items(catalog)
            .iter()
            .map(|(item, qty)| item.value * *qty as i64)
            .sum()
    }

    /// Coin value locked up in copies beyond the first of each item.
    pub fn duplicate_value(&self, catalog: &Catalog) -> i64 {
        self.owned_items(catalog)
            .iter()
            .filter(|(_, qty)| *qty > 1)
            .map(|(item, qty)| item.value * (*qty as i64 - 1))
            .sum()
    }

    /// Coin value of currently equipped gear.
    pub fn equipment_value(&self, catalog: &Catalog) -> i64 {
        self.gear
            .keys()
            .filter_map(|name| catalog.item_by_name(name))
            .map(|item| item.value)
            .sum()
    }

    /// Work-efficiency bonus applied to travel from the agility level.
    pub fn travel_efficiency(&self) -> f64 {
        (self.skill_level("agility").saturating_sub(1)) as f64 * 0.005
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogData, Item, ItemSlot};

    fn catalog_with(items: Vec<Item>) -> Catalog {
        Catalog::from_data(CatalogData {
            items,
            ..Default::default()
        })
    }

    fn plain_item(uuid: &str, name: &str, value: i64) -> Item {
        Item {
            uuid: uuid.to_string(),
            name: name.to_string(),
            slot: ItemSlot::Head,
            keywords: vec![],
            value,
            stats: vec![],
            requirements: Default::default(),
        }
    }

    #[test]
    fn test_load_rejects_malformed_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        match Character::load(&path) {
            Err(WayfarerError::Parse(_)) => {}
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_level_curve_monotonic() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(xp_for_level(2)), 2);
        assert_eq!(level_for_xp(xp_for_level(2) - 1), 1);
        assert_eq!(level_for_xp(xp_for_level(50)), 50);
        assert_eq!(level_for_xp(u64::MAX), MAX_LEVEL);
    }

    #[test]
    fn test_character_level_from_steps() {
        assert_eq!(character_level_from_steps(0), 1);
        assert_eq!(character_level_from_steps(999), 1);
        assert_eq!(character_level_from_steps(1000), 2);
        assert!(character_level_from_steps(10_000_000) > 10);
    }

    #[test]
    fn test_items_merges_sources() {
        let mut character = Character::default();
        character.gear.insert("Iron Sickle".to_string(), 1);
        character.inventory.insert("Iron Sickle".to_string(), 2);
        character.bank.insert("Rope".to_string(), 5);

        let items = character.items();
        assert_eq!(items.get("Iron Sickle"), Some(&3));
        assert_eq!(items.get("Rope"), Some(&5));
    }

    #[test]
    fn test_uuid_quantities_merge_quality_variants() {
        let catalog = catalog_with(vec![
            plain_item("u1", "Iron Sickle (Normal)", 10),
            plain_item("u1", "Iron Sickle (Perfect)", 10),
        ]);
        let mut character = Character::default();
        character
            .inventory
            .insert("Iron Sickle (Normal)".to_string(), 1);
        character
            .bank
            .insert("Iron Sickle (Perfect)".to_string(), 2);

        let quantities = character.uuid_quantities(&catalog);
        assert_eq!(quantities.get("u1"), Some(&3));
    }

    #[test]
    fn test_value_calculators() {
        let catalog = catalog_with(vec![
            plain_item("u1", "Rope", 7),
            plain_item("u2", "Hat", 100),
        ]);
        let mut character = Character::default();
        character.bank.insert("Rope".to_string(), 3);
        character.gear.insert("Hat".to_string(), 1);

        assert_eq!(character.total_value(&catalog), 3 * 7 + 100);
        assert_eq!(character.duplicate_value(&catalog), 2 * 7);
        assert_eq!(character.equipment_value(&catalog), 100);
    }

    #[test]
    fn test_travel_efficiency_from_agility() {
        let mut character = Character::default();
        assert_eq!(character.travel_efficiency(), 0.0);
        character
            .skills
            .insert("Agility".to_string(), xp_for_level(21));
        assert!((character.travel_efficiency() - 0.1).abs() < 1e-9);
    }
}
