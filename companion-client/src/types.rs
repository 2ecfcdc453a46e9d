//! Wire and domain types shared by the client crates.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Server-assigned trip identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub i64);

impl fmt::Display for TripId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned identifier of a place or packing item, unique within its trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(pub i64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque bearer token proving an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Who the session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// A place to visit on a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub visited: bool,
    /// Owning trip; not part of the wire format.
    #[serde(skip)]
    pub trip_id: TripId,
}

/// An entry on a trip's packing list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingItem {
    pub id: ResourceId,
    pub name: String,
    #[serde(default)]
    pub packed: bool,
    /// Owning trip; not part of the wire format.
    #[serde(skip)]
    pub trip_id: TripId,
}

/// A trip as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: TripId,
    pub name: String,
    pub destination: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

impl Trip {
    /// Length of the trip in days, counting both the first and last day.
    pub fn duration_days(&self) -> i64 {
        (self.to_date - self.from_date).num_days() + 1
    }
}

/// Input for creating a trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTrip {
    pub name: String,
    pub destination: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

impl NewTrip {
    /// Reject input the server would refuse.
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.name.trim().is_empty() {
            return Err(ClientError::Invalid("Trip name is required".into()));
        }
        if self.destination.trim().is_empty() {
            return Err(ClientError::Invalid("Destination is required".into()));
        }
        if self.from_date > self.to_date {
            return Err(ClientError::Invalid("fromDate cannot be after toDate".into()));
        }
        Ok(())
    }
}

/// Server-produced candidates for a trip. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSet {
    #[serde(default)]
    pub places: Vec<String>,
    #[serde(default)]
    pub items: Vec<String>,
}

impl SuggestionSet {
    pub fn is_empty(&self) -> bool {
        self.places.is_empty() && self.items.is_empty()
    }
}

/// Body of a successful `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trip_decodes_camel_case_and_ignores_extras() {
        let trip: Trip = serde_json::from_value(json!({
            "id": 7,
            "name": "Lisbon",
            "destination": "Portugal",
            "fromDate": "2026-05-01",
            "toDate": "2026-05-04",
            "durationDays": 4
        }))
        .unwrap();

        assert_eq!(trip.id, TripId(7));
        assert_eq!(trip.duration_days(), 4);
    }

    #[test]
    fn test_new_trip_validation() {
        let mut trip = NewTrip {
            name: "Lisbon".into(),
            destination: "Portugal".into(),
            from_date: date(2026, 5, 4),
            to_date: date(2026, 5, 1),
        };
        assert!(matches!(trip.validate(), Err(ClientError::Invalid(_))));

        trip.to_date = date(2026, 5, 4);
        assert!(trip.validate().is_ok());

        trip.destination = "  ".into();
        assert!(trip.validate().is_err());
    }

    #[test]
    fn test_place_wire_format_omits_trip() {
        let place = Place {
            id: ResourceId(3),
            name: "Belem Tower".into(),
            visited: true,
            trip_id: TripId(9),
        };
        let value = serde_json::to_value(&place).unwrap();
        assert_eq!(value, json!({"id": 3, "name": "Belem Tower", "visited": true}));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = Credential::new("abc123");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert_eq!(credential.bearer(), "Bearer abc123");
    }

    #[test]
    fn test_suggestion_set_tolerates_missing_fields() {
        let set: SuggestionSet = serde_json::from_value(json!({"places": ["Alfama"]})).unwrap();
        assert_eq!(set.places, vec!["Alfama".to_string()]);
        assert!(set.items.is_empty());
        assert!(!set.is_empty());
    }
}
