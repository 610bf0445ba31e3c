//! Area relationship graph
//!
//! Static graph of how business areas depend on each other. Dependency edges
//! are directed ("A depends on B" makes B upstream of A); critical edges are
//! undirected and mark pairs where a failure in one directly undermines the
//! other. Both carry a weight in `0.0..=1.0`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::models::Area;

/// Minimum number of risk-scan suggestions when enough areas exist
pub const MIN_RISK_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Edge {
    from: Area,
    to: Area,
    weight: f64,
}

#[derive(Debug, Clone)]
pub struct AreaGraph {
    /// `from` depends on `to`
    dependencies: Vec<Edge>,
    critical: Vec<Edge>,
    criticality: BTreeMap<Area, f64>,
    max_distance: usize,
}

impl AreaGraph {
    /// Empty graph with neutral criticality
    pub fn empty() -> Self {
        Self {
            dependencies: Vec::new(),
            critical: Vec::new(),
            criticality: Area::all().iter().map(|a| (*a, 0.5)).collect(),
            max_distance: 2,
        }
    }

    /// Add a dependency edge: `area` depends on `upstream`
    pub fn depends_on(mut self, area: Area, upstream: Area, weight: f64) -> Self {
        self.dependencies.push(Edge {
            from: area,
            to: upstream,
            weight: weight.clamp(0.0, 1.0),
        });
        self
    }

    /// Add an undirected critical edge
    pub fn critical(mut self, a: Area, b: Area, weight: f64) -> Self {
        self.critical.push(Edge {
            from: a,
            to: b,
            weight: weight.clamp(0.0, 1.0),
        });
        self
    }

    pub fn with_criticality(mut self, area: Area, weight: f64) -> Self {
        self.criticality.insert(area, weight.clamp(0.0, 1.0));
        self
    }

    /// Suggestions further than this many hops from the detected area are ranked last
    pub fn with_max_distance(mut self, hops: usize) -> Self {
        self.max_distance = hops;
        self
    }

    // ========================================================================
    // Direct neighbors
    // ========================================================================

    /// Areas `area` depends on, strongest first
    pub fn get_upstream_areas(&self, area: Area) -> Vec<(Area, f64)> {
        sorted(
            self.dependencies
                .iter()
                .filter(|e| e.from == area)
                .map(|e| (e.to, e.weight)),
        )
    }

    /// Areas that depend on `area`, strongest first
    pub fn get_downstream_areas(&self, area: Area) -> Vec<(Area, f64)> {
        sorted(
            self.dependencies
                .iter()
                .filter(|e| e.to == area)
                .map(|e| (e.from, e.weight)),
        )
    }

    /// Areas sharing a critical edge with `area`, strongest first
    pub fn get_critical_areas(&self, area: Area) -> Vec<(Area, f64)> {
        sorted(self.critical.iter().filter_map(|e| {
            if e.from == area {
                Some((e.to, e.weight))
            } else if e.to == area {
                Some((e.from, e.weight))
            } else {
                None
            }
        }))
    }

    pub fn critical_weight(&self, a: Area, b: Area) -> Option<f64> {
        self.critical
            .iter()
            .filter(|e| (e.from == a && e.to == b) || (e.from == b && e.to == a))
            .map(|e| e.weight)
            .reduce(f64::max)
    }

    /// Strongest dependency between two areas, in either direction
    pub fn dependency_weight(&self, a: Area, b: Area) -> Option<f64> {
        self.dependencies
            .iter()
            .filter(|e| (e.from == a && e.to == b) || (e.from == b && e.to == a))
            .map(|e| e.weight)
            .reduce(f64::max)
    }

    /// Business criticality of an area, used to weight the overall score
    pub fn criticality(&self, area: Area) -> f64 {
        self.criticality.get(&area).copied().unwrap_or(0.5)
    }

    // ========================================================================
    // Scoring
    // ========================================================================

    /// Weighted proximity of two areas in `0.0..=1.0`.
    ///
    /// A direct critical edge scores `0.5 + 0.5w`, a direct dependency
    /// `0.25 + 0.25w`, an indirect path `0.2 / hops` and no path `0`.
    pub fn calculate_relationship_score(&self, a: Area, b: Area) -> f64 {
        if a == b {
            return 1.0;
        }
        if let Some(w) = self.critical_weight(a, b) {
            return 0.5 + 0.5 * w;
        }
        if let Some(w) = self.dependency_weight(a, b) {
            return 0.25 + 0.25 * w;
        }
        match self.calculate_area_distance(a, b) {
            Some(hops) if hops > 0 => 0.2 / hops as f64,
            _ => 0.0,
        }
    }

    /// Hop count over the undirected union of all edges
    pub fn calculate_area_distance(&self, a: Area, b: Area) -> Option<usize> {
        if a == b {
            return Some(0);
        }

        let mut visited = HashSet::from([a]);
        let mut queue = VecDeque::from([(a, 0usize)]);
        while let Some((current, hops)) = queue.pop_front() {
            for next in self.neighbors(current) {
                if next == b {
                    return Some(hops + 1);
                }
                if visited.insert(next) {
                    queue.push_back((next, hops + 1));
                }
            }
        }
        None
    }

    fn neighbors(&self, area: Area) -> Vec<Area> {
        self.dependencies
            .iter()
            .chain(self.critical.iter())
            .filter_map(|e| {
                if e.from == area {
                    Some(e.to)
                } else if e.to == area {
                    Some(e.from)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Order candidate risk-scan areas for a detected area.
    ///
    /// Areas within reach come first, then by critical-edge strength to the
    /// detected area, relationship score and business criticality. The
    /// detected area is never suggested. Excluded areas are only used to
    /// backfill when fewer than three candidates remain.
    pub fn suggest_risk_scan_areas(&self, detected: Area, exclude: &[Area]) -> Vec<Area> {
        let rank = |candidates: Vec<Area>| -> Vec<Area> {
            let mut keyed: Vec<(Area, bool, f64, f64, f64)> = candidates
                .into_iter()
                .map(|area| {
                    let reachable = self
                        .calculate_area_distance(detected, area)
                        .map_or(false, |d| d <= self.max_distance);
                    (
                        area,
                        reachable,
                        self.critical_weight(detected, area).unwrap_or(0.0),
                        self.calculate_relationship_score(detected, area),
                        self.criticality(area),
                    )
                })
                .collect();

            keyed.sort_by(|a, b| {
                b.1.cmp(&a.1)
                    .then(desc(a.2, b.2))
                    .then(desc(a.3, b.3))
                    .then(desc(a.4, b.4))
                    .then(a.0.index().cmp(&b.0.index()))
            });
            keyed.into_iter().map(|k| k.0).collect()
        };

        let (kept, excluded): (Vec<Area>, Vec<Area>) = Area::all()
            .iter()
            .copied()
            .filter(|a| *a != detected)
            .partition(|a| !exclude.contains(a));

        let mut suggestions = rank(kept);
        if suggestions.len() < MIN_RISK_SUGGESTIONS {
            let needed = MIN_RISK_SUGGESTIONS - suggestions.len();
            suggestions.extend(rank(excluded).into_iter().take(needed));
        }
        suggestions
    }
}

impl Default for AreaGraph {
    /// The built-in fixture
    fn default() -> Self {
        use Area::*;

        AreaGraph::empty()
            .with_criticality(Finance, 1.0)
            .with_criticality(Sales, 0.95)
            .with_criticality(Operations, 0.85)
            .with_criticality(Strategy, 0.8)
            .with_criticality(Technology, 0.75)
            .with_criticality(People, 0.7)
            .with_criticality(Marketing, 0.65)
            .critical(Technology, Finance, 0.9)
            .critical(Technology, Sales, 0.8)
            .critical(Technology, Operations, 0.6)
            .critical(Sales, Marketing, 0.9)
            .critical(Sales, Finance, 0.85)
            .critical(Finance, Operations, 0.7)
            .critical(Finance, Strategy, 0.6)
            .critical(Operations, People, 0.75)
            .critical(People, Strategy, 0.55)
            .critical(Marketing, Strategy, 0.65)
            .depends_on(Technology, Finance, 0.8)
            .depends_on(Technology, Sales, 0.6)
            .depends_on(Technology, Strategy, 0.5)
            .depends_on(Technology, People, 0.5)
            .depends_on(Sales, Marketing, 0.8)
            .depends_on(Sales, Technology, 0.4)
            .depends_on(Sales, People, 0.5)
            .depends_on(Marketing, Strategy, 0.6)
            .depends_on(Marketing, Technology, 0.4)
            .depends_on(Finance, Sales, 0.9)
            .depends_on(Finance, Operations, 0.6)
            .depends_on(Operations, Technology, 0.7)
            .depends_on(Operations, People, 0.7)
            .depends_on(Operations, Finance, 0.5)
            .depends_on(People, Finance, 0.6)
            .depends_on(People, Strategy, 0.5)
            .depends_on(Strategy, Finance, 0.6)
            .depends_on(Strategy, Sales, 0.5)
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn sorted(items: impl Iterator<Item = (Area, f64)>) -> Vec<(Area, f64)> {
    let mut items: Vec<(Area, f64)> = items.collect();
    items.sort_by(|a, b| desc(a.1, b.1).then(a.0.index().cmp(&b.0.index())));
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_and_downstream_are_mirrors() {
        let graph = AreaGraph::default();
        let upstream = graph.get_upstream_areas(Area::Technology);
        assert_eq!(upstream[0], (Area::Finance, 0.8));
        for (up, _) in &upstream {
            assert!(graph
                .get_downstream_areas(*up)
                .iter()
                .any(|(a, _)| *a == Area::Technology));
        }
    }

    #[test]
    fn test_critical_edges_are_undirected() {
        let graph = AreaGraph::default();
        assert_eq!(graph.critical_weight(Area::Finance, Area::Technology), Some(0.9));
        assert_eq!(graph.critical_weight(Area::Technology, Area::Finance), Some(0.9));
        let critical: Vec<Area> = graph
            .get_critical_areas(Area::Technology)
            .into_iter()
            .map(|(a, _)| a)
            .collect();
        assert_eq!(critical, vec![Area::Finance, Area::Sales, Area::Operations]);
    }

    #[test]
    fn test_relationship_score_ordering() {
        let graph = AreaGraph::default();
        let critical = graph.calculate_relationship_score(Area::Technology, Area::Finance);
        let dependency = graph.calculate_relationship_score(Area::Technology, Area::People);
        let reverse_dependency =
            graph.calculate_relationship_score(Area::Technology, Area::Marketing);
        assert!((critical - 0.95).abs() < 1e-9);
        assert!((dependency - 0.375).abs() < 1e-9);
        assert!((reverse_dependency - 0.35).abs() < 1e-9);
        assert!(critical > dependency);
        assert_eq!(graph.calculate_relationship_score(Area::Sales, Area::Sales), 1.0);
    }

    #[test]
    fn test_indirect_and_unrelated_scores() {
        let graph = AreaGraph::empty()
            .depends_on(Area::Technology, Area::Sales, 1.0)
            .depends_on(Area::Sales, Area::Marketing, 1.0);
        assert!((graph.calculate_relationship_score(Area::Technology, Area::Marketing) - 0.1).abs() < 1e-9);
        assert_eq!(graph.calculate_relationship_score(Area::Technology, Area::People), 0.0);
    }

    #[test]
    fn test_distance() {
        let graph = AreaGraph::empty()
            .depends_on(Area::Technology, Area::Sales, 0.5)
            .critical(Area::Sales, Area::Finance, 0.5);
        assert_eq!(graph.calculate_area_distance(Area::Technology, Area::Technology), Some(0));
        assert_eq!(graph.calculate_area_distance(Area::Finance, Area::Technology), Some(2));
        assert_eq!(graph.calculate_area_distance(Area::Technology, Area::People), None);
    }

    #[test]
    fn test_technology_risk_scan_prefers_critical_partners() {
        let graph = AreaGraph::default();
        let suggestions = graph.suggest_risk_scan_areas(Area::Technology, &[]);
        assert_eq!(
            &suggestions[..3],
            &[Area::Finance, Area::Sales, Area::Operations]
        );
    }

    #[test]
    fn test_suggestions_never_include_detected_area() {
        let graph = AreaGraph::default();
        for area in Area::all() {
            let suggestions = graph.suggest_risk_scan_areas(*area, &[]);
            assert!(!suggestions.contains(area));
            assert!(suggestions.len() >= MIN_RISK_SUGGESTIONS);
        }
    }

    #[test]
    fn test_excluded_areas_backfill_only_when_needed() {
        let graph = AreaGraph::default();
        let suggestions = graph.suggest_risk_scan_areas(Area::Technology, &[Area::Finance]);
        assert_eq!(suggestions[0], Area::Sales);
        assert!(!suggestions.contains(&Area::Finance));

        let exclude: Vec<Area> = Area::all()
            .iter()
            .copied()
            .filter(|a| *a != Area::Technology && *a != Area::People)
            .collect();
        let suggestions = graph.suggest_risk_scan_areas(Area::Technology, &exclude);
        assert_eq!(suggestions.len(), MIN_RISK_SUGGESTIONS);
        assert_eq!(suggestions[0], Area::People);
        assert!(!suggestions.contains(&Area::Technology));
    }

    #[test]
    fn test_unreachable_areas_are_deprioritized_not_dropped() {
        let graph = AreaGraph::empty()
            .critical(Area::Technology, Area::Sales, 0.2)
            .with_criticality(Area::Finance, 1.0);
        let suggestions = graph.suggest_risk_scan_areas(Area::Technology, &[]);
        assert_eq!(suggestions[0], Area::Sales);
        assert_eq!(suggestions[1], Area::Finance);
        assert_eq!(suggestions.len(), Area::all().len() - 1);
    }
}
