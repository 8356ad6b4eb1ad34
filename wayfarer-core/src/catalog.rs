//! Catalog of game data: items, activities, recipes, and travel routes.
//!
//! The catalog is the scraped wiki data, shipped as a JSON file and loaded
//! into lookup maps at startup. Quality variants of craftable items appear
//! as separate entries whose names carry the quality suffix, e.g.
//! "Iron Sickle (Perfect)".

use crate::error::{Result, WayfarerError};
use crate::gearset::Quality;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Equipment slot an item can occupy. Rings fit either ring slot and
/// tools fit any tool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemSlot {
    Head,
    Cape,
    Back,
    Chest,
    Primary,
    Secondary,
    Hands,
    Legs,
    Neck,
    Feet,
    Ring,
    Tools,
}

/// Bonus that only applies once enough unique pieces of a set are equipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBonus {
    pub keyword: String,
    pub pieces: u32,
}

/// A block of attribute values scoped to skills and/or a location.
///
/// Empty `skills` means the block applies to every skill (a global stat).
/// A `location` restricts the block to activities or travel in that region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopedStats {
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub set_bonus: Option<SetBonus>,
    pub stats: HashMap<String, f64>,
}

/// Conditions gating whether a character can equip an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnlockRequirements {
    #[serde(default)]
    pub achievement_points: u32,
    #[serde(default)]
    pub total_skill_level: u32,
    #[serde(default)]
    pub skills: HashMap<String, u32>,
    #[serde(default)]
    pub activity_completions: Vec<String>,
}

impl UnlockRequirements {
    pub fn is_empty(&self) -> bool {
        self.achievement_points == 0
            && self.total_skill_level == 0
            && self.skills.is_empty()
            && self.activity_completions.is_empty()
    }
}

/// An equippable item from the wiki catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub uuid: String,
    pub name: String,
    pub slot: ItemSlot,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub stats: Vec<ScopedStats>,
    #[serde(default)]
    pub requirements: UnlockRequirements,
}

lazy_static! {
    static ref QUALITY_SUFFIX: Regex = Regex::new(r"\(([A-Za-z]+)\)\s*$").unwrap();
}

impl Item {
    /// Name with the quality suffix removed: "Iron Sickle (Perfect)"
    /// -> "Iron Sickle". Parenthesized suffixes that are not a quality
    /// tier stay part of the name.
    pub fn base_name(&self) -> &str {
        match QUALITY_SUFFIX.captures(&self.name) {
            Some(caps) => match (caps.get(0), Quality::from_name(&caps[1])) {
                (Some(whole), Some(_)) => self.name[..whole.start()].trim_end(),
                _ => &self.name,
            },
            None => &self.name,
        }
    }

    /// Quality parsed from the name suffix, if any.
    pub fn quality(&self) -> Option<Quality> {
        let caps = QUALITY_SUFFIX.captures(&self.name)?;
        Quality::from_name(&caps[1])
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.to_lowercase();
        self.keywords
            .iter()
            .any(|kw| kw.to_lowercase().contains(&needle))
    }

    /// Aggregate this item's attribute values for a skill at a location.
    ///
    /// Set-bonus blocks only count when `set_piece_counts` shows enough
    /// unique pieces of the set equipped.
    pub fn stats_for_skill(
        &self,
        skill: &str,
        location: Option<&str>,
        set_piece_counts: &HashMap<String, u32>,
    ) -> HashMap<String, f64> {
        let mut total: HashMap<String, f64> = HashMap::new();

        for block in &self.stats {
            if !block_in_scope(block, skill, location) {
                continue;
            }
            if let Some(bonus) = &block.set_bonus {
                let equipped = set_piece_counts
                    .get(&bonus.keyword.to_lowercase())
                    .copied()
                    .unwrap_or(0);
                if equipped < bonus.pieces {
                    continue;
                }
            }
            for (name, value) in &block.stats {
                *total.entry(name.clone()).or_insert(0.0) += value;
            }
        }

        total
    }

    /// Whether a character meets the item's unlock requirements.
    /// Gear-keyword requirements are ignored here; the optimizer checks
    /// those at the gearset level.
    pub fn is_unlocked(&self, character: &crate::character::Character) -> bool {
        let req = &self.requirements;
        if req.is_empty() {
            return true;
        }
        if character.achievement_points < req.achievement_points {
            return false;
        }
        if character.total_skill_level() < req.total_skill_level {
            return false;
        }
        for (skill, level) in &req.skills {
            if character.skill_level(skill) < *level {
                return false;
            }
        }
        for completion in &req.activity_completions {
            if !character.has_completion(completion) {
                return false;
            }
        }
        true
    }
}

/// Whether a stat block's skill and location scoping match.
fn block_in_scope(block: &ScopedStats, skill: &str, location: Option<&str>) -> bool {
    if !block.skills.is_empty() && !block.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
        return false;
    }
    if let Some(required_loc) = &block.location {
        match location {
            Some(loc) if loc.eq_ignore_ascii_case(required_loc) => {}
            _ => return false,
        }
    }
    true
}

/// A collectible trophy granting passive stat bonuses while owned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collectible {
    pub name: String,
    #[serde(default)]
    pub stats: Vec<ScopedStats>,
}

impl Collectible {
    /// Attribute values this collectible grants for a skill at a
    /// location. Collectibles carry no set bonuses.
    pub fn stats_for_skill(&self, skill: &str, location: Option<&str>) -> HashMap<String, f64> {
        let mut total: HashMap<String, f64> = HashMap::new();
        for block in &self.stats {
            if !block_in_scope(block, skill, location) {
                continue;
            }
            for (name, value) in &block.stats {
                *total.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        total
    }
}

/// Requirements gating an activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityRequirements {
    #[serde(default)]
    pub skills: HashMap<String, u32>,
    #[serde(default)]
    pub reputation: HashMap<String, i64>,
    #[serde(default)]
    pub achievement_points: u32,
    /// Required gear keywords as {keyword: count} pairs, e.g.
    /// {"diving gear": 3, "light source": 2}.
    #[serde(default)]
    pub keyword_counts: HashMap<String, u32>,
}

/// Expected drop from an activity's reward table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDrop {
    pub item: String,
    /// Average reward rolls needed for one drop.
    pub rolls_per_drop: f64,
}

/// A repeatable skilling activity from the wiki.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub primary_skill: String,
    #[serde(default)]
    pub location: Option<String>,
    pub base_steps: u32,
    pub base_xp: u32,
    pub max_efficiency: f64,
    /// Required level of the primary skill; caps the level WE bonus.
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub requirements: ActivityRequirements,
    #[serde(default)]
    pub drops: Vec<ActivityDrop>,
}

fn default_level() -> u32 {
    1
}

impl Activity {
    /// Check gating conditions against a character and the set of
    /// keywords carried by equipped items.
    pub fn is_unlocked(
        &self,
        character: &crate::character::Character,
        equipped_items: &[&Item],
    ) -> bool {
        for (skill, level) in &self.requirements.skills {
            if character.skill_level(skill) < *level {
                return false;
            }
        }
        for (faction, amount) in &self.requirements.reputation {
            if character.reputation.get(faction).copied().unwrap_or(0) < *amount {
                return false;
            }
        }
        if character.achievement_points < self.requirements.achievement_points {
            return false;
        }
        for (keyword, required) in &self.requirements.keyword_counts {
            if *required == 0 {
                continue;
            }
            let count = equipped_items
                .iter()
                .filter(|item| item.has_keyword(keyword))
                .count() as u32;
            if count < *required {
                return false;
            }
        }
        true
    }
}

/// A crafting recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub skill: String,
    #[serde(default = "default_level")]
    pub level: u32,
    pub base_steps: u32,
    pub base_xp: u32,
    pub max_efficiency: f64,
    #[serde(default)]
    pub materials: Vec<RecipeMaterial>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeMaterial {
    pub item: String,
    pub amount: u32,
}

/// One travel connection between two locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLeg {
    pub from: String,
    pub to: String,
    pub distance: u32,
    /// Requirement tag, e.g. "diving_gear", "3_light_sources", "skis".
    #[serde(default)]
    pub requires: String,
    /// Region the leg belongs to, used for default gear selection.
    #[serde(default)]
    pub region: Option<String>,
}

/// Raw catalog file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub routes: Vec<RouteLeg>,
    #[serde(default)]
    pub collectibles: Vec<Collectible>,
}

/// Indexed catalog used by the rest of the crate.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub items: Vec<Item>,
    pub activities: Vec<Activity>,
    pub recipes: Vec<Recipe>,
    pub routes: Vec<RouteLeg>,
    pub collectibles: Vec<Collectible>,
    by_name: HashMap<String, usize>,
    by_uuid: HashMap<String, Vec<usize>>,
    by_collectible: HashMap<String, usize>,
}

impl Catalog {
    pub fn from_data(data: CatalogData) -> Self {
        let mut catalog = Self {
            items: data.items,
            activities: data.activities,
            recipes: data.recipes,
            routes: data.routes,
            collectibles: data.collectibles,
            by_name: HashMap::new(),
            by_uuid: HashMap::new(),
            by_collectible: HashMap::new(),
        };
        for (idx, item) in catalog.items.iter().enumerate() {
            catalog.by_name.insert(item.name.to_lowercase(), idx);
            catalog
                .by_uuid
                .entry(item.uuid.clone())
                .or_default()
                .push(idx);
        }
        for (idx, collectible) in catalog.collectibles.iter().enumerate() {
            catalog
                .by_collectible
                .insert(collectible.name.to_lowercase(), idx);
        }
        catalog
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let data: CatalogData = serde_json::from_str(&raw)
            .map_err(|e| WayfarerError::Parse(format!("catalog {}: {}", path.display(), e)))?;
        tracing::info!(
            "Loaded catalog: {} items, {} activities, {} recipes, {} routes, {} collectibles",
            data.items.len(),
            data.activities.len(),
            data.recipes.len(),
            data.routes.len(),
            data.collectibles.len()
        );
        Ok(Self::from_data(data))
    }

    pub fn collectible(&self, name: &str) -> Option<&Collectible> {
        self.by_collectible
            .get(&name.to_lowercase())
            .map(|&idx| &self.collectibles[idx])
    }

    pub fn item_by_name(&self, name: &str) -> Option<&Item> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|&idx| &self.items[idx])
    }

    /// Look up an item by uuid and quality. Falls back to the first
    /// entry with the uuid when no variant carries the quality suffix.
    pub fn item_by_uuid(&self, uuid: &str, quality: Quality) -> Option<&Item> {
        let indices = self.by_uuid.get(uuid)?;
        indices
            .iter()
            .map(|&idx| &self.items[idx])
            .find(|item| item.quality().unwrap_or(Quality::Normal) == quality)
            .or_else(|| indices.first().map(|&idx| &self.items[idx]))
    }

    pub fn activity(&self, name: &str) -> Result<&Activity> {
        self.activities
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| WayfarerError::NotFound(format!("activity '{}'", name)))
    }

    pub fn recipe(&self, name: &str) -> Result<&Recipe> {
        self.recipes
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| WayfarerError::NotFound(format!("recipe '{}'", name)))
    }
}
