//! Conversation state for the multi-step bot flows.
//!
//! Each flow has its own step enum; a chat is in at most one flow at a time.
//! Registration keeps no state: the contact message is answered on its own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::locations::LocationId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "flow", content = "step", rename_all = "snake_case")]
pub enum Conversation {
    Search(SearchStep),
    AddTrip(AddTripStep),
}

impl Conversation {
    /// Flow discriminant, stored alongside the payload
    pub fn flow_name(&self) -> &'static str {
        match self {
            Conversation::Search(_) => "search",
            Conversation::AddTrip(_) => "add_trip",
        }
    }
}

/// Passenger flow: route, trip, seats, then contact details
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SearchStep {
    ChooseOrigin,
    ChooseDestination {
        origin: LocationId,
    },
    ChooseTrip {
        origin: LocationId,
        destination: LocationId,
    },
    ChooseSeats {
        trip_id: i64,
        /// Route of the result list the trip was picked from
        origin: LocationId,
        destination: LocationId,
    },
    PassengerName {
        trip_id: i64,
        seats: i32,
        origin: LocationId,
        destination: LocationId,
    },
    PassengerPhone {
        trip_id: i64,
        seats: i32,
        origin: LocationId,
        destination: LocationId,
        name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: LocationId,
    pub destination: LocationId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Itinerary {
    pub route: Route,
    pub pickups: Vec<LocationId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub itinerary: Itinerary,
    pub date: NaiveDate,
    pub hour: u32,
}

/// Driver flow; every step carries exactly the fields collected so far
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AddTripStep {
    ChooseOrigin,
    ChooseDestination {
        origin: LocationId,
    },
    /// Only entered when the destination is a regional center
    ChoosePickups {
        route: Route,
        selected: BTreeSet<LocationId>,
    },
    ChooseDate {
        itinerary: Itinerary,
    },
    ChooseTime {
        itinerary: Itinerary,
        date: NaiveDate,
    },
    EnterPrice {
        schedule: Schedule,
    },
    ChooseModel {
        schedule: Schedule,
        price: i64,
    },
    ChooseColor {
        schedule: Schedule,
        price: i64,
        model: usize,
    },
    ChooseSeats {
        schedule: Schedule,
        price: i64,
        model: usize,
        color: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_serializes_with_flow_tag() {
        let state = Conversation::Search(SearchStep::ChooseDestination {
            origin: LocationId(3),
        });
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"flow\":\"search\""));

        let restored: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
        assert_eq!(restored.flow_name(), "search");
    }

    #[test]
    fn test_add_trip_state_keeps_pickup_selection() {
        let state = Conversation::AddTrip(AddTripStep::ChoosePickups {
            route: Route {
                origin: LocationId(4),
                destination: LocationId(0),
            },
            selected: [LocationId(5), LocationId(3)].into_iter().collect(),
        });
        let json = serde_json::to_string(&state).unwrap();
        let restored: Conversation = serde_json::from_str(&json).unwrap();
        match restored {
            Conversation::AddTrip(AddTripStep::ChoosePickups { selected, .. }) => {
                assert_eq!(selected.len(), 2);
                assert!(selected.contains(&LocationId(5)));
            }
            other => panic!("unexpected state: {:?}", other),
        }
    }
}
