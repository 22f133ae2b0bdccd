use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::slot::{ServiceKind, SlotRequest};

/// Turns kept per session; older history is dropped, the draft is not.
pub const MAX_TURNS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Fields the reservation flow collects, in prompting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Service,
    Date,
    Time,
    Nights,
    PartySize,
    Name,
    Contact,
}

/// A partially filled reservation request carried across turns. The flow
/// fills fields as the guest supplies them; `awaiting_proceed` gates the
/// contact-collection phase behind an explicit yes after the advisory
/// availability check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub service: Option<ServiceKind>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub party_size: Option<u32>,
    pub nights: Option<u32>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
    pub slot_checked: bool,
    pub awaiting_proceed: bool,
}

impl ReservationDraft {
    pub fn for_service(service: ServiceKind) -> Self {
        Self { service: Some(service), ..Self::default() }
    }

    /// Missing fields in the order the flow prompts for them. Time is a
    /// table concern, nights a room concern; before the service is known
    /// neither is requested.
    pub fn missing_fields(&self) -> Vec<DraftField> {
        let mut missing = Vec::new();
        if self.service.is_none() {
            missing.push(DraftField::Service);
        }
        if self.date.is_none() {
            missing.push(DraftField::Date);
        }
        match self.service {
            Some(ServiceKind::Table) if self.time.is_none() => missing.push(DraftField::Time),
            Some(ServiceKind::Room) if self.nights.is_none() => missing.push(DraftField::Nights),
            _ => {}
        }
        if self.party_size.is_none() {
            missing.push(DraftField::PartySize);
        }
        if self.name.is_none() {
            missing.push(DraftField::Name);
        }
        if self.phone.is_none() && self.email.is_none() {
            missing.push(DraftField::Contact);
        }
        missing
    }

    /// Slot fields are everything the availability checker needs; contact
    /// fields come later in the flow.
    pub fn missing_slot_fields(&self) -> Vec<DraftField> {
        self.missing_fields()
            .into_iter()
            .filter(|field| {
                !matches!(field, DraftField::Name | DraftField::Contact)
            })
            .collect()
    }

    pub fn slot_request(&self) -> Option<SlotRequest> {
        let service = self.service?;
        let date = self.date?;
        let party_size = self.party_size?;
        match service {
            ServiceKind::Table if self.time.is_none() => return None,
            ServiceKind::Room if self.nights.is_none() => return None,
            _ => {}
        }
        Some(SlotRequest { service, date, time: self.time, party_size, nights: self.nights })
    }

    pub fn is_bookable(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

/// Per-guest short-term state. Created on first reference by the session
/// registry; expiry is the hosting store's retention policy, not ours.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub turns: Vec<Turn>,
    pub draft: Option<ReservationDraft>,
    pub last_active: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            turns: Vec::new(),
            draft: None,
            last_active: Utc::now(),
        }
    }

    pub fn push_turn(&mut self, role: TurnRole, text: impl Into<String>) {
        self.turns.push(Turn { role, text: text.into(), at: Utc::now() });
        if self.turns.len() > MAX_TURNS {
            let excess = self.turns.len() - MAX_TURNS;
            self.turns.drain(..excess);
        }
        self.last_active = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::slot::ServiceKind;

    use super::{ConversationSession, DraftField, ReservationDraft, TurnRole, MAX_TURNS};

    #[test]
    fn empty_draft_reports_all_slot_fields_missing() {
        let draft = ReservationDraft::default();
        let missing = draft.missing_fields();
        assert_eq!(missing[0], DraftField::Service);
        assert!(missing.contains(&DraftField::Date));
        assert!(missing.contains(&DraftField::PartySize));
        assert!(missing.contains(&DraftField::Contact));
        // Neither time nor nights before the service is known.
        assert!(!missing.contains(&DraftField::Time));
        assert!(!missing.contains(&DraftField::Nights));
    }

    #[test]
    fn table_draft_requires_time_not_nights() {
        let draft = ReservationDraft::for_service(ServiceKind::Table);
        let missing = draft.missing_fields();
        assert!(missing.contains(&DraftField::Time));
        assert!(!missing.contains(&DraftField::Nights));
    }

    #[test]
    fn room_draft_requires_nights_not_time() {
        let draft = ReservationDraft::for_service(ServiceKind::Room);
        let missing = draft.missing_fields();
        assert!(missing.contains(&DraftField::Nights));
        assert!(!missing.contains(&DraftField::Time));
    }

    #[test]
    fn slot_request_needs_all_slot_fields() {
        let mut draft = ReservationDraft::for_service(ServiceKind::Room);
        draft.date = NaiveDate::from_ymd_opt(2026, 10, 9);
        draft.party_size = Some(2);
        assert!(draft.slot_request().is_none(), "nights still missing");

        draft.nights = Some(2);
        let request = draft.slot_request().expect("complete slot request");
        assert_eq!(request.service, ServiceKind::Room);
        assert_eq!(request.nights, Some(2));
    }

    #[test]
    fn turn_history_is_capped() {
        let mut session = ConversationSession::new("s-1");
        for i in 0..(MAX_TURNS + 8) {
            session.push_turn(TurnRole::User, format!("message {i}"));
        }
        assert_eq!(session.turns.len(), MAX_TURNS);
        assert_eq!(session.turns.first().expect("first turn").text, "message 8");
    }
}
