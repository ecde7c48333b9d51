use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Structured venue contact details pulled out of a free-text prompt.
///
/// Both fields are best-effort: either may be absent when neither the model
/// nor the heuristic fallback could find a value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueContact {
    pub venue_name: Option<String>,
    pub venue_phone: Option<String>,
}

impl VenueContact {
    /// Fill any missing field from `fallback`. Present fields always win.
    pub fn merge(self, fallback: VenueContact) -> VenueContact {
        VenueContact {
            venue_name: self.venue_name.or(fallback.venue_name),
            venue_phone: self.venue_phone.or(fallback.venue_phone),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.venue_name.is_some() && self.venue_phone.is_some()
    }
}

/// Optional client details supplied with a process-prompt request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub guest_count: Option<u32>,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub dietary_restrictions: Option<Vec<String>>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub preferred_cuisine: Option<String>,
}

/// Fixed-shape payload handed to the voice agent as its single JSON argument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceCallRequest {
    pub venue_name: Option<String>,
    pub venue_phone: Option<String>,
    pub client_name: String,
    pub event_date: String,
    pub guest_count: u32,
    pub budget_range: String,
    pub event_type: String,
    pub dietary_restrictions: Vec<String>,
    pub special_requests: Option<String>,
    pub preferred_cuisine: Option<String>,
}

impl VoiceCallRequest {
    pub fn from_parts(venue: &VenueContact, client: &ClientInfo) -> Self {
        Self {
            venue_name: venue.venue_name.clone(),
            venue_phone: venue.venue_phone.clone(),
            client_name: client.client_name.clone().unwrap_or_else(|| "Client".to_string()),
            event_date: client
                .event_date
                .clone()
                .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
            guest_count: client.guest_count.unwrap_or(2),
            budget_range: client.budget_range.clone().unwrap_or_else(|| "$50-$100".to_string()),
            event_type: client
                .event_type
                .clone()
                .unwrap_or_else(|| "Dinner Reservation".to_string()),
            dietary_restrictions: client.dietary_restrictions.clone().unwrap_or_default(),
            special_requests: client.special_requests.clone(),
            preferred_cuisine: client.preferred_cuisine.clone(),
        }
    }
}
