//! Travel route optimizer: shortest expected-step paths over the world
//! graph, with per-leg gear selection.
//!
//! Walking happens in nodes of 10 steps. Work efficiency and step
//! modifiers shrink the node count, double action shrinks the expected
//! steps spent per node.

use crate::catalog::{Catalog, RouteLeg};
use crate::character::Character;
use crate::error::{Result, WayfarerError};
use crate::gearset::{decode_gearset, Gearset};
use crate::stats::{aggregate, character_stats, StatTotals};
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::Path;

/// Travel gear configuration, loaded from a TOML file.
///
/// `gearsets` maps a name to a share-format export string. A gearset may
/// carry a `<name>_short` sibling worn on legs below the breakpoint
/// distance, typically trading efficiency for flat step reductions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TravelConfig {
    #[serde(default)]
    pub gearsets: HashMap<String, String>,
    /// Region name to gearset name, for legs without a requirement tag.
    #[serde(default)]
    pub regions: HashMap<String, String>,
    /// Requirement tag (e.g. "diving_gear", "skis") to gearset name.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Uuid of the teleport ring, if owned. Grants a free hop to
    /// `teleport_target` from anywhere.
    #[serde(default)]
    pub teleport_ring: Option<String>,
    #[serde(default)]
    pub teleport_target: Option<String>,
}

impl TravelConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| WayfarerError::Config(format!("{}: {}", path.display(), e)))
    }
}

const DEFAULT_GEARSET: &str = "default";
const SHORT_SUFFIX: &str = "_short";

/// One leg of a planned route.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedLeg {
    pub from: String,
    pub to: String,
    pub steps: u64,
    pub gearset: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TravelPlan {
    pub legs: Vec<PlannedLeg>,
    pub total_steps: u64,
}

pub struct TravelOptimizer<'a> {
    catalog: &'a Catalog,
    character: &'a Character,
    config: &'a TravelConfig,
    /// Decoded gearsets with their travel stats cached per region.
    gearsets: HashMap<String, Gearset>,
}

impl<'a> TravelOptimizer<'a> {
    pub fn new(
        catalog: &'a Catalog,
        character: &'a Character,
        config: &'a TravelConfig,
    ) -> Result<Self> {
        let mut gearsets = HashMap::new();
        for (name, export) in &config.gearsets {
            let gearset = decode_gearset(export).map_err(|e| {
                WayfarerError::Config(format!("travel gearset '{}': {}", name, e))
            })?;
            gearsets.insert(name.clone(), gearset);
        }
        Ok(Self {
            catalog,
            character,
            config,
            gearsets,
        })
    }

    fn travel_stats(&self, gearset_name: &str, region: Option<&str>) -> StatTotals {
        let items = match self.gearsets.get(gearset_name) {
            Some(gearset) => gearset
                .items(self.catalog)
                .into_iter()
                .map(|(_, item)| item)
                .collect(),
            None => Vec::new(),
        };
        let mut totals = aggregate(&items, "agility", region);
        totals.extend(&character_stats(
            self.character,
            self.catalog,
            "agility",
            region,
        ));
        totals
    }

    /// Expected steps to walk `distance` with the given stats.
    fn calc_steps(&self, distance: u32, stats: &StatTotals) -> u64 {
        let efficiency = 1.0 + self.character.travel_efficiency() + stats.work_efficiency();
        let adjusted = (distance as f64 / efficiency) * (1.0 + stats.steps_percent());
        let nodes = (adjusted.ceil() / 10.0 + stats.steps_add()).ceil().max(10.0);
        ((10.0 / (1.0 + stats.double_action())) * nodes).ceil() as u64
    }

    /// Whether a gearset actually satisfies a leg's requirement tag.
    /// Light-source tags need enough unique light-source items equipped.
    fn satisfies_tag(&self, gearset_name: &str, tag: &str) -> bool {
        let Some(gearset) = self.gearsets.get(gearset_name) else {
            return false;
        };
        let required_sources = match tag {
            "2_light_sources" => 2,
            "3_light_sources" => 3,
            _ => return true,
        };
        let unique: HashSet<&str> = gearset
            .items(self.catalog)
            .into_iter()
            .filter(|(_, item)| item.has_keyword("light source"))
            .map(|(_, item)| item.uuid.as_str())
            .collect();
        unique.len() >= required_sources
    }

    /// Pick the gearset for a leg: requirement tag first, then the
    /// region default, then the global default.
    fn gearset_for_leg(&self, leg: &RouteLeg) -> Option<String> {
        if !leg.requires.is_empty() {
            let name = self.config.tags.get(&leg.requires)?;
            if !self.satisfies_tag(name, &leg.requires) {
                return None;
            }
            return Some(name.clone());
        }
        if let Some(region) = &leg.region {
            if let Some(name) = self.config.regions.get(region) {
                return Some(name.clone());
            }
        }
        Some(DEFAULT_GEARSET.to_string())
    }

    /// Distance below which the short variant beats the main gearset.
    ///
    /// Step cost is monotone in distance for both sets, so a binary
    /// search over the playable distance range finds the crossover.
    fn short_breakpoint(&self, name: &str, region: Option<&str>) -> Option<u32> {
        let short_name = format!("{}{}", name, SHORT_SUFFIX);
        if !self.gearsets.contains_key(&short_name) {
            return None;
        }
        let long_stats = self.travel_stats(name, region);
        let short_stats = self.travel_stats(&short_name, region);

        let short_wins =
            |d: u32| self.calc_steps(d, &short_stats) <= self.calc_steps(d, &long_stats);
        if !short_wins(100) {
            return None;
        }
        let (mut lo, mut hi) = (100u32, 3000u32);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if short_wins(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        Some(lo)
    }

    /// Cost and gearset choice for one leg, or None when the leg is
    /// locked for this character.
    fn leg_cost(&self, leg: &RouteLeg) -> Option<(u64, String)> {
        let mut name = self.gearset_for_leg(leg)?;
        if let Some(breakpoint) = self.short_breakpoint(&name, leg.region.as_deref()) {
            if leg.distance <= breakpoint {
                name = format!("{}{}", name, SHORT_SUFFIX);
            }
        }
        let stats = self.travel_stats(&name, leg.region.as_deref());
        Some((self.calc_steps(leg.distance, &stats), name))
    }

    fn owns_teleport_ring(&self) -> bool {
        match &self.config.teleport_ring {
            Some(uuid) => self
                .character
                .uuid_quantities(self.catalog)
                .get(uuid)
                .copied()
                .unwrap_or(0)
                > 0,
            None => false,
        }
    }

    /// Shortest-path route between two locations.
    pub fn route(&self, start: &str, end: &str) -> Result<TravelPlan> {
        if start.eq_ignore_ascii_case(end) {
            return Ok(TravelPlan::default());
        }

        // Adjacency: location -> (neighbor, steps, gearset). Legs are
        // bidirectional; locked legs are dropped up front.
        let mut adjacency: HashMap<&str, Vec<(&str, u64, String)>> = HashMap::new();
        for leg in &self.catalog.routes {
            let Some((steps, gearset)) = self.leg_cost(leg) else {
                continue;
            };
            adjacency.entry(leg.from.as_str()).or_default().push((
                leg.to.as_str(),
                steps,
                gearset.clone(),
            ));
            adjacency
                .entry(leg.to.as_str())
                .or_default()
                .push((leg.from.as_str(), steps, gearset));
        }
        if let (true, Some(target)) = (self.owns_teleport_ring(), &self.config.teleport_target) {
            for location in adjacency.keys().copied().collect::<Vec<_>>() {
                if location != target.as_str() {
                    if let Some(edges) = adjacency.get_mut(location) {
                        edges.push((target.as_str(), 0, "teleport ring".to_string()));
                    }
                }
            }
        }

        if !adjacency.contains_key(start) {
            return Err(WayfarerError::NotFound(format!("location '{}'", start)));
        }
        if !adjacency.contains_key(end) {
            return Err(WayfarerError::NotFound(format!("location '{}'", end)));
        }

        #[derive(PartialEq, Eq)]
        struct Pending<'g> {
            steps: u64,
            location: &'g str,
        }
        impl Ord for Pending<'_> {
            fn cmp(&self, other: &Self) -> Ordering {
                other.steps.cmp(&self.steps)
            }
        }
        impl PartialOrd for Pending<'_> {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut best: HashMap<&str, u64> = HashMap::from([(start, 0)]);
        let mut previous: HashMap<&str, (&str, u64, String)> = HashMap::new();
        let mut heap = BinaryHeap::from([Pending {
            steps: 0,
            location: start,
        }]);

        while let Some(Pending { steps, location }) = heap.pop() {
            if location == end {
                break;
            }
            if steps > best.get(location).copied().unwrap_or(u64::MAX) {
                continue;
            }
            let Some(neighbors) = adjacency.get(location) else {
                continue;
            };
            for (neighbor, cost, gearset) in neighbors {
                let candidate = steps + cost;
                if candidate < best.get(neighbor).copied().unwrap_or(u64::MAX) {
                    best.insert(neighbor, candidate);
                    previous.insert(neighbor, (location, *cost, gearset.clone()));
                    heap.push(Pending {
                        steps: candidate,
                        location: neighbor,
                    });
                }
            }
        }

        if !previous.contains_key(end) {
            return Err(WayfarerError::NotFound(format!(
                "no route from '{}' to '{}'",
                start, end
            )));
        }

        let mut legs = Vec::new();
        let mut cursor = end;
        while cursor != start {
            let (from, steps, gearset) = &previous[cursor];
            legs.push(PlannedLeg {
                from: from.to_string(),
                to: cursor.to_string(),
                steps: *steps,
                gearset: gearset.clone(),
            });
            cursor = *from;
        }
        legs.reverse();
        let total_steps = legs.iter().map(|leg| leg.steps).sum();
        Ok(TravelPlan { legs, total_steps })
    }

    /// Cheapest route visiting every stop in some order before the
    /// destination. Tries all stop permutations, so the stop list should
    /// stay small.
    pub fn route_via(&self, start: &str, stops: &[String], end: &str) -> Result<TravelPlan> {
        if stops.is_empty() {
            return self.route(start, end);
        }

        let mut order: Vec<&str> = stops.iter().map(String::as_str).collect();
        let mut best_plan: Option<TravelPlan> = None;
        permute(&mut order, 0, &mut |order| -> Result<()> {
            let mut plan = TravelPlan::default();
            let mut here = start;
            for &stop in order.iter().chain(std::iter::once(&end)) {
                let segment = self.route(here, stop)?;
                plan.total_steps += segment.total_steps;
                plan.legs.extend(segment.legs);
                here = stop;
            }
            if best_plan
                .as_ref()
                .map(|b| plan.total_steps < b.total_steps)
                .unwrap_or(true)
            {
                best_plan = Some(plan);
            }
            Ok(())
        })?;

        best_plan.ok_or_else(|| WayfarerError::NotFound("no viable route".to_string()))
    }
}

/// Heap's algorithm, invoking the visitor on each permutation.
fn permute<'s, F>(order: &mut Vec<&'s str>, k: usize, visit: &mut F) -> Result<()>
where
    F: FnMut(&[&'s str]) -> Result<()>,
{
    if k == order.len().saturating_sub(1) || order.is_empty() {
        return visit(order);
    }
    for i in k..order.len() {
        order.swap(k, i);
        permute(order, k + 1, visit)?;
        order.swap(k, i);
    }
    Ok(())
}
