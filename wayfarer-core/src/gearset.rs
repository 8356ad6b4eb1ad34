//! Gearset model and the export-string codec.
//!
//! Export strings are the in-game share format: a JSON payload listing all
//! 18 equipment entries, gzip-compressed, then base64-encoded. Each entry's
//! `item` field is itself a JSON document serialized to a string, or the
//! literal string "null" for an empty slot.

use crate::catalog::{Catalog, Item, ItemSlot};
use crate::error::{Result, WayfarerError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Read, Write};

/// Item quality tiers, worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quality {
    Normal,
    Good,
    Great,
    Excellent,
    Perfect,
    Eternal,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::Normal,
        Quality::Good,
        Quality::Great,
        Quality::Excellent,
        Quality::Perfect,
        Quality::Eternal,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Quality::Normal => "Normal",
            Quality::Good => "Good",
            Quality::Great => "Great",
            Quality::Excellent => "Excellent",
            Quality::Perfect => "Perfect",
            Quality::Eternal => "Eternal",
        }
    }

    pub fn from_name(name: &str) -> Option<Quality> {
        match name.to_lowercase().as_str() {
            "normal" => Some(Quality::Normal),
            "good" => Some(Quality::Good),
            "great" => Some(Quality::Great),
            "excellent" => Some(Quality::Excellent),
            "perfect" => Some(Quality::Perfect),
            "eternal" => Some(Quality::Eternal),
            _ => None,
        }
    }

    /// Rank for min-sorting: 0 is Eternal, 5 is Normal.
    pub fn rank(self) -> u32 {
        match self {
            Quality::Eternal => 0,
            Quality::Perfect => 1,
            Quality::Excellent => 2,
            Quality::Great => 3,
            Quality::Good => 4,
            Quality::Normal => 5,
        }
    }

    /// Name used inside export strings. The game client uses a rarity
    /// vocabulary rather than the quality names shown in tooltips.
    pub fn export_name(self) -> &'static str {
        match self {
            Quality::Normal => "common",
            Quality::Good => "uncommon",
            Quality::Great => "rare",
            Quality::Excellent => "epic",
            Quality::Perfect => "legendary",
            Quality::Eternal => "ethereal",
        }
    }

    pub fn from_export_name(name: &str) -> Quality {
        match name.to_lowercase().as_str() {
            "common" => Quality::Normal,
            "uncommon" => Quality::Good,
            "rare" => Quality::Great,
            "epic" => Quality::Excellent,
            "legendary" => Quality::Perfect,
            "ethereal" => Quality::Eternal,
            _ => Quality::Normal,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The 18 equipment slots a character can fill: 12 gear slots plus up to
/// 6 tool slots (how many are usable depends on character level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GearSlot {
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
    Ring1,
    Ring2,
    Tool0,
    Tool1,
    Tool2,
    Tool3,
    Tool4,
    Tool5,
}

impl GearSlot {
    pub const ALL: [GearSlot; 18] = [
        GearSlot::Head,
        GearSlot::Cape,
        GearSlot::Back,
        GearSlot::Chest,
        GearSlot::Primary,
        GearSlot::Secondary,
        GearSlot::Hands,
        GearSlot::Legs,
        GearSlot::Neck,
        GearSlot::Feet,
        GearSlot::Ring1,
        GearSlot::Ring2,
        GearSlot::Tool0,
        GearSlot::Tool1,
        GearSlot::Tool2,
        GearSlot::Tool3,
        GearSlot::Tool4,
        GearSlot::Tool5,
    ];

    pub const GEAR: [GearSlot; 12] = [
        GearSlot::Head,
        GearSlot::Cape,
        GearSlot::Back,
        GearSlot::Chest,
        GearSlot::Primary,
        GearSlot::Secondary,
        GearSlot::Hands,
        GearSlot::Legs,
        GearSlot::Neck,
        GearSlot::Feet,
        GearSlot::Ring1,
        GearSlot::Ring2,
    ];

    pub const TOOLS: [GearSlot; 6] = [
        GearSlot::Tool0,
        GearSlot::Tool1,
        GearSlot::Tool2,
        GearSlot::Tool3,
        GearSlot::Tool4,
        GearSlot::Tool5,
    ];

    pub fn is_tool(self) -> bool {
        matches!(
            self,
            GearSlot::Tool0
                | GearSlot::Tool1
                | GearSlot::Tool2
                | GearSlot::Tool3
                | GearSlot::Tool4
                | GearSlot::Tool5
        )
    }

    pub fn is_ring(self) -> bool {
        matches!(self, GearSlot::Ring1 | GearSlot::Ring2)
    }

    /// Item slot that fits this gear slot.
    pub fn item_slot(self) -> ItemSlot {
        match self {
            GearSlot::Head => ItemSlot::Head,
            GearSlot::Cape => ItemSlot::Cape,
            GearSlot::Back => ItemSlot::Back,
            GearSlot::Chest => ItemSlot::Chest,
            GearSlot::Primary => ItemSlot::Primary,
            GearSlot::Secondary => ItemSlot::Secondary,
            GearSlot::Hands => ItemSlot::Hands,
            GearSlot::Legs => ItemSlot::Legs,
            GearSlot::Neck => ItemSlot::Neck,
            GearSlot::Feet => ItemSlot::Feet,
            GearSlot::Ring1 | GearSlot::Ring2 => ItemSlot::Ring,
            _ => ItemSlot::Tools,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GearSlot::Head => "head",
            GearSlot::Cape => "cape",
            GearSlot::Back => "back",
            GearSlot::Chest => "chest",
            GearSlot::Primary => "primary",
            GearSlot::Secondary => "secondary",
            GearSlot::Hands => "hands",
            GearSlot::Legs => "legs",
            GearSlot::Neck => "neck",
            GearSlot::Feet => "feet",
            GearSlot::Ring1 => "ring1",
            GearSlot::Ring2 => "ring2",
            GearSlot::Tool0 => "tool0",
            GearSlot::Tool1 => "tool1",
            GearSlot::Tool2 => "tool2",
            GearSlot::Tool3 => "tool3",
            GearSlot::Tool4 => "tool4",
            GearSlot::Tool5 => "tool5",
        }
    }

    pub fn parse(name: &str) -> Option<GearSlot> {
        GearSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.name() == name.to_lowercase())
    }

    /// (type name, index) pair used in export entries. Gear types use
    /// index 0, rings index 0 and 1, tools index 0 through 5.
    pub fn export_key(self) -> (&'static str, u32) {
        match self {
            GearSlot::Ring1 => ("ring", 0),
            GearSlot::Ring2 => ("ring", 1),
            GearSlot::Tool0 => ("tool", 0),
            GearSlot::Tool1 => ("tool", 1),
            GearSlot::Tool2 => ("tool", 2),
            GearSlot::Tool3 => ("tool", 3),
            GearSlot::Tool4 => ("tool", 4),
            GearSlot::Tool5 => ("tool", 5),
            other => (other.name(), 0),
        }
    }

    fn from_export_key(type_name: &str, index: u32) -> Option<GearSlot> {
        match (type_name, index) {
            ("ring", 0) => Some(GearSlot::Ring1),
            ("ring", 1) => Some(GearSlot::Ring2),
            ("tool", 0) => Some(GearSlot::Tool0),
            ("tool", 1) => Some(GearSlot::Tool1),
            ("tool", 2) => Some(GearSlot::Tool2),
            ("tool", 3) => Some(GearSlot::Tool3),
            ("tool", 4) => Some(GearSlot::Tool4),
            ("tool", 5) => Some(GearSlot::Tool5),
            (name, 0) => GearSlot::parse(name).filter(|s| !s.is_ring() && !s.is_tool()),
            _ => None,
        }
    }
}

impl fmt::Display for GearSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of usable tool slots at a character level.
pub fn tool_slots_for_level(level: u32) -> usize {
    match level {
        0..=9 => 2,
        10..=19 => 3,
        20..=34 => 4,
        35..=49 => 5,
        _ => 6,
    }
}

/// Reference to a catalog item occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub uuid: String,
    pub quality: Quality,
}

/// A gear loadout: assignment of items to equipment slots. Empty slots
/// are simply absent from the map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gearset {
    pub slots: BTreeMap<GearSlot, SlotEntry>,
}

impl Gearset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, slot: GearSlot, uuid: impl Into<String>, quality: Quality) {
        self.slots.insert(
            slot,
            SlotEntry {
                uuid: uuid.into(),
                quality,
            },
        );
    }

    pub fn clear(&mut self, slot: GearSlot) {
        self.slots.remove(&slot);
    }

    pub fn get(&self, slot: GearSlot) -> Option<&SlotEntry> {
        self.slots.get(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve slot entries against the catalog. Slots whose uuid is
    /// unknown are skipped.
    pub fn items<'c>(&self, catalog: &'c Catalog) -> Vec<(GearSlot, &'c Item)> {
        self.slots
            .iter()
            .filter_map(|(&slot, entry)| {
                catalog
                    .item_by_uuid(&entry.uuid, entry.quality)
                    .map(|item| (slot, item))
            })
            .collect()
    }

    /// How many times each uuid is used across the set.
    pub fn uuid_counts(&self) -> HashMap<String, u32> {
        let mut counts = HashMap::new();
        for entry in self.slots.values() {
            *counts.entry(entry.uuid.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportPayload {
    items: Vec<ExportEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportEntry {
    #[serde(rename = "type")]
    type_name: String,
    index: u32,
    /// Nested JSON document as a string, or the literal string "null".
    item: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportItem {
    id: String,
    quality: String,
    tag: Option<String>,
}

/// Encode a gearset into the game's share format.
///
/// The payload always lists all 18 entries in fixed order so the output
/// matches what the game client itself produces for the same loadout.
pub fn encode_gearset(gearset: &Gearset) -> Result<String> {
    let mut entries = Vec::with_capacity(GearSlot::ALL.len());
    for slot in GearSlot::ALL {
        let (type_name, index) = slot.export_key();
        let item = match gearset.get(slot) {
            Some(entry) => serde_json::to_string(&ExportItem {
                id: entry.uuid.clone(),
                quality: entry.quality.export_name().to_string(),
                tag: None,
            })?,
            None => "null".to_string(),
        };
        entries.push(ExportEntry {
            type_name: type_name.to_string(),
            index,
            item,
            errors: vec![],
        });
    }

    let json = serde_json::to_vec(&ExportPayload { items: entries })?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let compressed = encoder.finish()?;
    Ok(BASE64.encode(compressed))
}

/// Decode a share string back into a gearset.
///
/// Tolerates missing base64 padding since the strings are often passed
/// through URL fields that strip trailing '=' characters.
pub fn decode_gearset(export: &str) -> Result<Gearset> {
    let mut padded = export.trim().to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let compressed = BASE64
        .decode(padded.as_bytes())
        .map_err(|e| WayfarerError::Decode(format!("invalid base64: {}", e)))?;

    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(|e| WayfarerError::Decode(format!("invalid gzip stream: {}", e)))?;

    let payload: ExportPayload = serde_json::from_slice(&json)
        .map_err(|e| WayfarerError::Decode(format!("invalid payload: {}", e)))?;

    let mut gearset = Gearset::new();
    for entry in payload.items {
        if entry.item == "null" || entry.item.is_empty() {
            continue;
        }
        let slot = match GearSlot::from_export_key(&entry.type_name, entry.index) {
            Some(slot) => slot,
            None => {
                tracing::warn!(
                    "Skipping unknown slot '{}' index {}",
                    entry.type_name,
                    entry.index
                );
                continue;
            }
        };
        let item: ExportItem = serde_json::from_str(&entry.item)
            .map_err(|e| WayfarerError::Decode(format!("invalid item entry: {}", e)))?;
        gearset.set(slot, item.id, Quality::from_export_name(&item.quality));
    }
    Ok(gearset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_rank_order() {
        assert!(Quality::Eternal.rank() < Quality::Perfect.rank());
        assert!(Quality::Perfect.rank() < Quality::Normal.rank());
        assert_eq!(Quality::from_name("perfect"), Some(Quality::Perfect));
        assert_eq!(Quality::from_name("mythic"), None);
    }

    #[test]
    fn test_export_name_roundtrip() {
        for quality in Quality::ALL {
            assert_eq!(Quality::from_export_name(quality.export_name()), quality);
        }
        assert_eq!(Quality::from_export_name("garbage"), Quality::Normal);
    }

    #[test]
    fn test_slot_parse() {
        assert_eq!(GearSlot::parse("ring2"), Some(GearSlot::Ring2));
        assert_eq!(GearSlot::parse("Tool3"), Some(GearSlot::Tool3));
        assert_eq!(GearSlot::parse("weapon"), None);
    }

    #[test]
    fn test_tool_slots_for_level() {
        assert_eq!(tool_slots_for_level(1), 2);
        assert_eq!(tool_slots_for_level(10), 3);
        assert_eq!(tool_slots_for_level(34), 4);
        assert_eq!(tool_slots_for_level(35), 5);
        assert_eq!(tool_slots_for_level(90), 6);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut gearset = Gearset::new();
        gearset.set(GearSlot::Head, "aaaa-1111", Quality::Perfect);
        gearset.set(GearSlot::Ring2, "bbbb-2222", Quality::Normal);
        gearset.set(GearSlot::Tool4, "cccc-3333", Quality::Eternal);

        let encoded = encode_gearset(&gearset).unwrap();
        let decoded = decode_gearset(&encoded).unwrap();
        assert_eq!(decoded, gearset);
    }

    #[test]
    fn test_encode_always_emits_all_entries() {
        let encoded = encode_gearset(&Gearset::new()).unwrap();
        let compressed = BASE64.decode(encoded.as_bytes()).unwrap();
        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .unwrap();
        let payload: ExportPayload = serde_json::from_slice(&json).unwrap();
        assert_eq!(payload.items.len(), 18);
        assert!(payload.items.iter().all(|e| e.item == "null"));
    }

    #[test]
    fn test_decode_tolerates_stripped_padding() {
        let mut gearset = Gearset::new();
        gearset.set(GearSlot::Chest, "dddd-4444", Quality::Good);
        let encoded = encode_gearset(&gearset).unwrap();
        let stripped = encoded.trim_end_matches('=');
        let decoded = decode_gearset(stripped).unwrap();
        assert_eq!(decoded, gearset);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_gearset("not a share string!!").is_err());
    }
}
