//! Multi-turn reservation flow.
//!
//! The flow collects the slot fields one at a time, runs the advisory
//! availability check once they are complete, gates contact collection
//! behind an explicit yes, and finally asks the store to create the
//! reservation — where the authoritative conflict re-check happens. A
//! conflict never clears the draft: the guest only has to change the
//! contested detail, and re-sending the same draft can never produce a
//! second pending reservation while the first one occupies the slot.

use chrono::NaiveDate;

use innkeep_core::{
    Availability, AvailabilityChecker, AvailabilityReason, ContactInfo, DraftField,
    NewReservation, Reservation, ReservationDraft, ReservationStore, ScheduleViolation,
    ServiceKind, StoreError, TimeSlot,
};
use tracing::warn;

use crate::intent::{self, ServiceSignal};
use crate::parsing;

pub const ABANDON_REPLY: &str = "V redu, rezervacijo prekinjam. Kako vam lahko še pomagam?";

pub const DECLINE_REPLY: &str =
    "V redu, rezervacije ne pripravim. Če si premislite, samo povejte.";

/// Fixed close of a successful flow. Deliberately non-committal: the
/// reservation awaits confirmation by the house, nothing is "booked".
pub const PENDING_RECEIVED_REPLY: &str =
    "Vaše povpraševanje je prejeto in čaka na potrditev. Obvestilo boste prejeli po \
     e-pošti ali telefonu v najkrajšem možnem času.";

pub const BACKEND_APOLOGY: &str =
    "Oprostite, rezervacij trenutno ne morem preveriti. Poskusite znova čez nekaj minut.";

#[derive(Debug)]
pub enum FlowOutcome {
    /// The flow goes on; the draft stays in the session.
    Continue(String),
    /// A reservation was persisted as pending; the caller clears the draft.
    Booked { reservation: Reservation, reply: String },
    /// The guest backed out; the caller clears the draft.
    Abandoned(String),
}

pub struct ReservationFlow<'a> {
    checker: &'a AvailabilityChecker,
    store: &'a dyn ReservationStore,
}

impl<'a> ReservationFlow<'a> {
    pub fn new(checker: &'a AvailabilityChecker, store: &'a dyn ReservationStore) -> Self {
        Self { checker, store }
    }

    pub async fn advance(
        &self,
        draft: &mut ReservationDraft,
        message: &str,
        today: NaiveDate,
    ) -> FlowOutcome {
        if intent::is_exit(message) {
            return FlowOutcome::Abandoned(ABANDON_REPLY.to_string());
        }

        if draft.awaiting_proceed {
            if intent::is_negative(message) {
                return FlowOutcome::Abandoned(DECLINE_REPLY.to_string());
            }
            if intent::is_affirmative(message) {
                draft.awaiting_proceed = false;
                return self.next_step(draft, today).await;
            }
            // Neither yes nor no: the guest may be adjusting a detail.
        }

        let slot_before = slot_fingerprint(draft);
        fill_slot_fields(draft, message, today);
        if slot_fingerprint(draft) != slot_before {
            draft.slot_checked = false;
            draft.awaiting_proceed = false;
        }

        if draft.slot_checked && !draft.awaiting_proceed {
            fill_contact_fields(draft, message);
        }

        self.next_step(draft, today).await
    }

    /// The prompt that would resume the flow; used after an info answer
    /// given mid-flow.
    pub fn continuation_prompt(&self, draft: &ReservationDraft) -> String {
        if draft.awaiting_proceed {
            return proceed_prompt(draft);
        }
        match draft.missing_fields().first() {
            Some(field) => prompt_for_field(*field, draft),
            None => "Vse podatke imam, rezervacijo samo še potrdite.".to_string(),
        }
    }

    async fn next_step(&self, draft: &mut ReservationDraft, today: NaiveDate) -> FlowOutcome {
        if let Some(field) = draft.missing_slot_fields().first() {
            return FlowOutcome::Continue(prompt_for_field(*field, draft));
        }

        if !draft.slot_checked {
            let request = match draft.slot_request() {
                Some(request) => request,
                None => return FlowOutcome::Continue(prompt_for_field(DraftField::Date, draft)),
            };
            let availability = match self.checker.check(self.store, &request, today).await {
                Ok(availability) => availability,
                Err(error) => {
                    warn!(
                        event_name = "flow.availability_check_failed",
                        error = %error,
                        "advisory availability check failed"
                    );
                    return FlowOutcome::Continue(BACKEND_APOLOGY.to_string());
                }
            };

            return match availability.reason {
                AvailabilityReason::Open => {
                    draft.slot_checked = true;
                    draft.awaiting_proceed = true;
                    FlowOutcome::Continue(available_prompt(draft, &availability))
                }
                AvailabilityReason::OutsideBusinessHours { violation } => {
                    clear_violating_field(draft, &violation);
                    FlowOutcome::Continue(violation_reply(&violation))
                }
                AvailabilityReason::Conflict => {
                    FlowOutcome::Continue(conflict_reply(&availability.alternatives))
                }
            };
        }

        if draft.awaiting_proceed {
            return FlowOutcome::Continue(proceed_prompt(draft));
        }

        if draft.name.is_none() {
            return FlowOutcome::Continue(prompt_for_field(DraftField::Name, draft));
        }
        if draft.phone.is_none() && draft.email.is_none() {
            return FlowOutcome::Continue(prompt_for_field(DraftField::Contact, draft));
        }

        self.create(draft, today).await
    }

    async fn create(&self, draft: &mut ReservationDraft, today: NaiveDate) -> FlowOutcome {
        let request = match draft.slot_request() {
            Some(request) => request,
            None => return FlowOutcome::Continue(prompt_for_field(DraftField::Date, draft)),
        };
        let slot = match self.checker.rules().materialize(&request, today) {
            Ok(slot) => slot,
            Err(violation) => {
                clear_violating_field(draft, &violation);
                draft.slot_checked = false;
                return FlowOutcome::Continue(violation_reply(&violation));
            }
        };

        let new = NewReservation {
            service: request.service,
            slot,
            party_size: request.party_size,
            nights: request.nights,
            contact: ContactInfo {
                name: draft.name.clone().unwrap_or_default(),
                phone: draft.phone.clone(),
                email: draft.email.clone(),
            },
            note: draft.note.clone(),
        };

        match self.store.create(new).await {
            Ok(reservation) => {
                let reply = format!(
                    "{} ({}, {} oseb)\n\n{}",
                    summary_line(&reservation),
                    reservation.slot,
                    reservation.party_size,
                    PENDING_RECEIVED_REPLY
                );
                FlowOutcome::Booked { reservation, reply }
            }
            Err(StoreError::Conflict { .. }) => {
                // The advisory check was stale; someone else took the
                // slot between turns. Re-run it just for suggestions.
                draft.slot_checked = false;
                draft.awaiting_proceed = false;
                let alternatives = match self.checker.check(self.store, &request, today).await {
                    Ok(Availability { alternatives, .. }) => alternatives,
                    Err(_) => Vec::new(),
                };
                FlowOutcome::Continue(conflict_reply(&alternatives))
            }
            Err(StoreError::Validation { missing }) => match missing.first() {
                Some(field) => FlowOutcome::Continue(prompt_for_field(*field, draft)),
                None => FlowOutcome::Continue(BACKEND_APOLOGY.to_string()),
            },
            Err(StoreError::OutsideBusinessHours(violation)) => {
                clear_violating_field(draft, &violation);
                draft.slot_checked = false;
                FlowOutcome::Continue(violation_reply(&violation))
            }
            Err(error) => {
                warn!(
                    event_name = "flow.create_failed",
                    error = %error,
                    "reservation create failed"
                );
                FlowOutcome::Continue(BACKEND_APOLOGY.to_string())
            }
        }
    }
}

fn slot_fingerprint(
    draft: &ReservationDraft,
) -> (Option<ServiceKind>, Option<NaiveDate>, Option<chrono::NaiveTime>, Option<u32>, Option<u32>)
{
    (draft.service, draft.date, draft.time, draft.party_size, draft.nights)
}

fn fill_slot_fields(draft: &mut ReservationDraft, message: &str, today: NaiveDate) {
    if let ServiceSignal::One(service) = intent::detect_service(message) {
        if draft.service != Some(service) {
            draft.service = Some(service);
        }
    }

    if draft.service == Some(ServiceKind::Room) {
        if let Some((start, end)) = parsing::extract_date_range(message, today) {
            draft.date = Some(start);
            if let Some(nights) = parsing::nights_from_range(start, end) {
                draft.nights = Some(nights);
            }
        }
    }
    if let Some(date) = parsing::extract_date(message, today) {
        draft.date = Some(date);
    }
    if let Some(time) = parsing::extract_time(message) {
        draft.time = Some(time);
    }
    if let Some(nights) = parsing::extract_nights(message) {
        draft.nights = Some(nights);
    }
    let party = parsing::labeled_party_count(message);
    if let Some(total) = party.total {
        draft.party_size = Some(total);
    }

    // A bare number answers whichever slot question is open.
    if let Some(value) = parsing::bare_number(message) {
        match draft.missing_slot_fields().first() {
            Some(DraftField::Nights) => draft.nights = Some(value),
            Some(DraftField::PartySize) => draft.party_size = Some(value),
            _ => {}
        }
    }
}

fn fill_contact_fields(draft: &mut ReservationDraft, message: &str) {
    if let Some(email) = parsing::extract_email(message) {
        draft.email = Some(email);
    } else if draft.name.is_some() {
        if let Some(phone) = parsing::extract_phone(message) {
            draft.phone = Some(phone);
        }
    }

    if draft.name.is_none() {
        if let Some(name) = plausible_name(message) {
            draft.name = Some(name);
        }
    }
}

/// A name answer is a short alphabetic message that is not a yes/no.
fn plausible_name(message: &str) -> Option<String> {
    let trimmed = message.trim();
    if trimmed.chars().count() < 3 || trimmed.chars().count() > 60 {
        return None;
    }
    if trimmed.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if intent::is_affirmative(trimmed) || intent::is_negative(trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

fn prompt_for_field(field: DraftField, draft: &ReservationDraft) -> String {
    match field {
        DraftField::Service => "Želite rezervirati sobo ali mizo za kosilo?".to_string(),
        DraftField::Date => match draft.service {
            Some(ServiceKind::Table) => {
                "Za kateri datum? Kosila strežemo ob sobotah in nedeljah (DD.MM.YYYY)."
                    .to_string()
            }
            _ => "Za kateri datum? (DD.MM.YYYY)".to_string(),
        },
        DraftField::Time => {
            "Ob kateri uri bi prišli na kosilo? Strežemo med 12:00 in 20:00, zadnji prihod \
             ob 15:00."
                .to_string()
        }
        DraftField::Nights => "Za koliko nočitev bi ostali?".to_string(),
        DraftField::PartySize => "Za koliko oseb?".to_string(),
        DraftField::Name => "Na katero ime naj zapišem rezervacijo?".to_string(),
        DraftField::Contact => {
            "Prosim še telefonsko številko ali e-naslov, da vam potrdimo rezervacijo."
                .to_string()
        }
    }
}

fn available_prompt(draft: &ReservationDraft, availability: &Availability) -> String {
    let slot_text = availability
        .slot
        .as_ref()
        .map(TimeSlot::to_string)
        .unwrap_or_else(|| "izbran termin".to_string());
    let party = draft.party_size.unwrap_or(0);
    format!("Termin {slot_text} je prost za {party} oseb. Želite, da pripravim rezervacijo? (da/ne)")
}

fn proceed_prompt(draft: &ReservationDraft) -> String {
    let party = draft.party_size.unwrap_or(0);
    format!("Termin je prost za {party} oseb. Želite, da pripravim rezervacijo? (da/ne)")
}

fn conflict_reply(alternatives: &[TimeSlot]) -> String {
    if alternatives.is_empty() {
        return "Izbran termin je žal zaseden. Želite preveriti drug datum ali uro?".to_string();
    }
    let listed: Vec<String> = alternatives.iter().map(TimeSlot::to_string).collect();
    format!(
        "Izbran termin je žal zaseden. Prosti so še: {}. Vam kateri od teh ustreza?",
        listed.join("; ")
    )
}

fn violation_reply(violation: &ScheduleViolation) -> String {
    match violation {
        ScheduleViolation::ClosedDay { .. } => {
            "Vikend kosila strežemo le ob sobotah in nedeljah. Prosim, izberite soboto ali \
             nedeljo (DD.MM.YYYY)."
                .to_string()
        }
        ScheduleViolation::OutsideHours { open, close } => {
            format!("Kosila strežemo med {open} in {close}. Ob kateri uri bi prišli?")
        }
        ScheduleViolation::AfterLastArrival { last_arrival } => {
            format!("Zadnji prihod na kosilo je ob {last_arrival}. Ob kateri uri bi prišli?")
        }
        ScheduleViolation::BelowMinimumStay { required, .. } => {
            format!(
                "Za ta termin je najkrajše bivanje {required} nočitev. Koliko nočitev bi \
                 ostali?"
            )
        }
        ScheduleViolation::DateInPast { .. } => {
            "Ta datum je že mimo. Za kateri datum želite rezervacijo?".to_string()
        }
        ScheduleViolation::EmptyParty => "Za koliko oseb?".to_string(),
        ScheduleViolation::Incomplete(field) => {
            prompt_for_field(*field, &ReservationDraft::default())
        }
    }
}

fn clear_violating_field(draft: &mut ReservationDraft, violation: &ScheduleViolation) {
    match violation {
        ScheduleViolation::ClosedDay { .. } | ScheduleViolation::DateInPast { .. } => {
            draft.date = None;
        }
        ScheduleViolation::OutsideHours { .. } | ScheduleViolation::AfterLastArrival { .. } => {
            draft.time = None;
        }
        ScheduleViolation::BelowMinimumStay { .. } => draft.nights = None,
        ScheduleViolation::EmptyParty => draft.party_size = None,
        ScheduleViolation::Incomplete(_) => {}
    }
}

fn summary_line(reservation: &Reservation) -> String {
    match reservation.service {
        ServiceKind::Table => "Miza za kosilo je zabeležena.".to_string(),
        ServiceKind::Room => "Soba je zabeležena.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use innkeep_core::{
        AvailabilityChecker, OpeningRules, ReservationDraft, ReservationStatus,
        ReservationStore, ServiceKind,
    };
    use innkeep_db::InMemoryReservationRepository;

    use super::{FlowOutcome, ReservationFlow, PENDING_RECEIVED_REPLY};

    // A Thursday; the following Saturday is 2030-06-01.
    const TODAY: fn() -> NaiveDate = || NaiveDate::from_ymd_opt(2030, 5, 30).expect("valid date");

    fn reply(outcome: &FlowOutcome) -> &str {
        match outcome {
            FlowOutcome::Continue(text) => text,
            FlowOutcome::Booked { reply, .. } => reply,
            FlowOutcome::Abandoned(text) => text,
        }
    }

    async fn drive(
        flow: &ReservationFlow<'_>,
        draft: &mut ReservationDraft,
        messages: &[&str],
    ) -> Vec<String> {
        let mut replies = Vec::new();
        for message in messages {
            let outcome = flow.advance(draft, message, TODAY()).await;
            let text = reply(&outcome).to_string();
            if let FlowOutcome::Booked { .. } = outcome {
                replies.push(text);
                return replies;
            }
            replies.push(text);
        }
        replies
    }

    #[tokio::test]
    async fn full_table_flow_creates_a_pending_reservation() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        let replies = drive(
            &flow,
            &mut draft,
            &[
                "rezerviral bi mizo",
                "1.6.2030",
                "ob 13:00",
                "4 osebe",
                "da",
                "Ana Novak",
                "031 111 222",
            ],
        )
        .await;

        let last = replies.last().expect("final reply");
        assert!(last.contains(PENDING_RECEIVED_REPLY), "got: {last}");

        let pending = repo.list(Some(ReservationStatus::Pending)).await.expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].party_size, 4);
        assert_eq!(pending[0].contact.name, "Ana Novak");
        assert_eq!(pending[0].service, ServiceKind::Table);
    }

    #[tokio::test]
    async fn fields_known_upfront_are_not_asked_again() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        let outcome = flow
            .advance(&mut draft, "mizo za 4 osebe 1.6.2030 ob 13:00", TODAY())
            .await;

        // Everything needed for the slot arrived in one message, so the
        // advisory check runs immediately and asks to proceed.
        let text = reply(&outcome);
        assert!(text.contains("prost"), "got: {text}");
        assert!(draft.awaiting_proceed);
    }

    #[tokio::test]
    async fn weekday_lunch_is_pushed_back_to_the_weekend() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        // 2030-06-05 is a Wednesday.
        let outcome = flow
            .advance(&mut draft, "mizo za 4 osebe 5.6.2030 ob 13:00", TODAY())
            .await;

        let text = reply(&outcome);
        assert!(text.contains("sobotah in nedeljah"), "got: {text}");
        assert!(draft.date.is_none(), "the rejected date must be cleared");
        assert_eq!(draft.party_size, Some(4), "valid fields survive");
    }

    #[tokio::test]
    async fn conflicting_slot_keeps_the_draft_and_suggests_alternatives() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());

        {
            let flow = ReservationFlow::new(&checker, &repo);
            let mut first = ReservationDraft::default();
            drive(
                &flow,
                &mut first,
                &["mizo za 2 osebi 1.6.2030 ob 13:00", "da", "Marko Satler", "marko@example.com"],
            )
            .await;
            assert_eq!(
                repo.list(Some(ReservationStatus::Pending)).await.expect("list").len(),
                1
            );
        }

        let flow = ReservationFlow::new(&checker, &repo);
        let mut second = ReservationDraft::default();
        let outcome = flow
            .advance(&mut second, "mizo za 4 osebe 1.6.2030 ob 13:00", TODAY())
            .await;

        let text = reply(&outcome);
        assert!(text.contains("zaseden"), "got: {text}");
        assert!(second.date.is_some(), "conflict keeps the draft");

        // Re-sending the identical request must not create anything.
        let again = flow
            .advance(&mut second, "mizo za 4 osebe 1.6.2030 ob 13:00", TODAY())
            .await;
        assert!(reply(&again).contains("zaseden"));
        assert_eq!(
            repo.list(Some(ReservationStatus::Pending)).await.expect("list").len(),
            1
        );
    }

    #[tokio::test]
    async fn declining_the_proceed_question_abandons_the_draft() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        flow.advance(&mut draft, "mizo za 4 osebe 1.6.2030 ob 13:00", TODAY()).await;
        let outcome = flow.advance(&mut draft, "ne, hvala", TODAY()).await;

        assert!(matches!(outcome, FlowOutcome::Abandoned(_)));
        let all = repo.list(None).await.expect("list");
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn exit_words_abandon_mid_flow() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        flow.advance(&mut draft, "rezerviral bi sobo", TODAY()).await;
        let outcome = flow.advance(&mut draft, "pozabi, drugič", TODAY()).await;
        assert!(matches!(outcome, FlowOutcome::Abandoned(_)));
    }

    #[tokio::test]
    async fn room_flow_collects_nights_and_respects_minimum_stay() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        // June: minimum stay is three nights.
        let replies = drive(
            &flow,
            &mut draft,
            &["rezerviral bi sobo za 2 osebi", "10.6.2030", "2"],
        )
        .await;

        let last = replies.last().expect("reply");
        assert!(last.contains("najkrajše bivanje 3"), "got: {last}");
        assert!(draft.nights.is_none(), "rejected nights are cleared");

        let outcome = flow.advance(&mut draft, "3", TODAY()).await;
        let text = reply(&outcome);
        assert!(text.contains("prost"), "got: {text}");
    }

    #[tokio::test]
    async fn bare_numbers_fill_the_field_the_flow_is_waiting_for() {
        let repo = InMemoryReservationRepository::default();
        let checker = AvailabilityChecker::new(OpeningRules::default());
        let flow = ReservationFlow::new(&checker, &repo);
        let mut draft = ReservationDraft::default();

        flow.advance(&mut draft, "rezerviral bi sobo", TODAY()).await;
        flow.advance(&mut draft, "10.10.2030", TODAY()).await;
        // Nights are asked before party size for rooms.
        flow.advance(&mut draft, "2", TODAY()).await;
        assert_eq!(draft.nights, Some(2));
        flow.advance(&mut draft, "4", TODAY()).await;
        assert_eq!(draft.party_size, Some(4));
    }
}
