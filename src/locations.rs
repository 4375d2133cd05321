//! Controlled vocabulary of route endpoints.
//!
//! Callback tokens carry a [`LocationId`]; stored trips carry the location
//! name. Ids are positions in [`LOCATIONS`] and must stay stable once
//! deployed, so new entries are only ever appended.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into [`LOCATIONS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub u16);

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    /// Provincial capital or major city
    RegionalCenter,
    District,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub id: LocationId,
    pub name: &'static str,
    pub kind: LocationKind,
}

const fn center(id: u16, name: &'static str) -> Location {
    Location {
        id: LocationId(id),
        name,
        kind: LocationKind::RegionalCenter,
    }
}

const fn district(id: u16, name: &'static str) -> Location {
    Location {
        id: LocationId(id),
        name,
        kind: LocationKind::District,
    }
}

pub static LOCATIONS: [Location; 17] = [
    center(0, "Toshkent"),
    center(1, "Samarqand"),
    center(2, "Qarshi"),
    center(3, "Termiz"),
    district(4, "Denov"),
    district(5, "Sherobod"),
    district(6, "Boysun"),
    district(7, "Jarqo'rg'on"),
    district(8, "Qumqo'rg'on"),
    district(9, "Sho'rchi"),
    district(10, "Sariosiyo"),
    district(11, "Uzun"),
    district(12, "Angor"),
    district(13, "Muzrabot"),
    district(14, "Qiziriq"),
    district(15, "Oltinsoy"),
    district(16, "Bandixon"),
];

pub fn all() -> &'static [Location] {
    &LOCATIONS
}

pub fn get(id: LocationId) -> Option<&'static Location> {
    LOCATIONS.get(id.0 as usize)
}

pub fn by_name(name: &str) -> Option<&'static Location> {
    LOCATIONS.iter().find(|loc| loc.name == name)
}

pub fn is_regional_center(id: LocationId) -> bool {
    get(id).is_some_and(|loc| loc.kind == LocationKind::RegionalCenter)
}

/// Everything except the chosen origin, so a same-to-same route can't be picked.
pub fn destination_candidates(origin: LocationId) -> Vec<&'static Location> {
    LOCATIONS.iter().filter(|loc| loc.id != origin).collect()
}

/// Extra pickup points offered when a trip ends at a regional center
pub fn pickup_candidates(origin: LocationId, destination: LocationId) -> Vec<&'static Location> {
    LOCATIONS
        .iter()
        .filter(|loc| loc.id != origin && loc.id != destination)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_match_positions() {
        for (index, loc) in LOCATIONS.iter().enumerate() {
            assert_eq!(loc.id.0 as usize, index, "{} is out of place", loc.name);
        }
    }

    #[test]
    fn test_origin_never_in_destination_candidates() {
        for loc in all() {
            let candidates = destination_candidates(loc.id);
            assert!(candidates.iter().all(|c| c.id != loc.id));
            assert_eq!(candidates.len(), LOCATIONS.len() - 1);
        }
    }

    #[test]
    fn test_pickup_candidates_exclude_route_endpoints() {
        let origin = by_name("Denov").map(|l| l.id).unwrap();
        let destination = by_name("Termiz").map(|l| l.id).unwrap();
        let candidates = pickup_candidates(origin, destination);
        assert!(candidates.iter().all(|c| c.id != origin && c.id != destination));
        assert_eq!(candidates.len(), LOCATIONS.len() - 2);
    }

    #[test]
    fn test_regional_center_classification() {
        assert!(is_regional_center(by_name("Toshkent").unwrap().id));
        assert!(is_regional_center(by_name("Termiz").unwrap().id));
        assert!(!is_regional_center(by_name("Denov").unwrap().id));
        assert!(!is_regional_center(LocationId(999)));
    }
}
