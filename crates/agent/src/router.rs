//! First-match-wins message routing.
//!
//! Order: active reservation flow, static FAQ, rule-based reservation
//! resolve, LLM tool cycle, knowledge-grounded fallback. The cheap
//! deterministic paths always get the first look; the oracle is invoked
//! only when the rules cannot resolve a booking-shaped message, and its
//! output is checked against the tool-use policy before anything
//! reaches the guest.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};

use innkeep_core::{
    AvailabilityChecker, ConversationSession, KnowledgeStore, OpeningRules, ReservationDraft,
    ReservationStore, Retriever, RoutingError, ServiceKind, TurnRole,
};

use crate::faq;
use crate::flow::{FlowOutcome, ReservationFlow};
use crate::intent::{self, ServiceSignal};
use crate::llm::{
    CheckAvailabilityArgs, LlmOracle, OracleError, OracleMessage, OracleOutcome, OracleRequest,
    OracleRole, ReservationAction, ReservationIntentArgs, ToolCall, CHECK_AVAILABILITY_TOOL,
    RESERVATION_INTENT_TOOL, SYSTEM_PROMPT,
};
use crate::parsing;
use crate::policy::{PolicyDecision, ToolUsePolicy};

pub const RESTATE_REPLY: &str =
    "Oprostite, nisem vas najbolje razumel. Mi lahko poveste še enkrat, kaj želite?";

pub const APOLOGY_REPLY: &str =
    "Oprostite, trenutno ne morem odgovoriti. Poskusite znova čez trenutek.";

pub const LOW_CONFIDENCE_REPLY: &str =
    "Nisem povsem prepričan, kaj točno iščete. Prosim, povejte bolj konkretno (npr. sobe, \
     kosila, lokacija).";

/// Turns of history handed to the oracle.
const ORACLE_HISTORY_TURNS: usize = 12;

/// Hard cap on oracle invocations per turn, over and above the policy's
/// retry budget.
const MAX_ORACLE_CALLS: u32 = 4;

/// Which path produced the reply. One variant per path so each
/// contract stays independently testable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    StaticFaq,
    RuleBased,
    Knowledge,
    Reservation,
    Clarification,
    Fallback,
}

impl ReplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticFaq => "static_faq",
            Self::RuleBased => "rule_based",
            Self::Knowledge => "knowledge",
            Self::Reservation => "reservation",
            Self::Clarification => "clarification",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RoutedReply {
    pub kind: ReplyKind,
    pub text: String,
}

impl RoutedReply {
    fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self { kind, text: text.into() }
    }
}

pub struct ChatRouter {
    store: Arc<dyn ReservationStore>,
    oracle: Arc<dyn LlmOracle>,
    checker: AvailabilityChecker,
    knowledge: Arc<KnowledgeStore>,
    retriever: Retriever,
    policy: ToolUsePolicy,
}

impl ChatRouter {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        oracle: Arc<dyn LlmOracle>,
        knowledge: Arc<KnowledgeStore>,
        rules: OpeningRules,
    ) -> Self {
        Self {
            store,
            oracle,
            checker: AvailabilityChecker::new(rules),
            knowledge,
            retriever: Retriever::default(),
            policy: ToolUsePolicy::default(),
        }
    }

    pub async fn route(&self, session: &mut ConversationSession, message: &str) -> RoutedReply {
        self.route_with_today(session, message, Utc::now().date_naive()).await
    }

    /// `today` is injected so date words resolve deterministically in
    /// tests; production passes the current date.
    pub async fn route_with_today(
        &self,
        session: &mut ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        session.push_turn(TurnRole::User, message);
        let reply = self.dispatch(session, message, today).await;
        session.push_turn(TurnRole::Assistant, reply.text.clone());
        info!(
            event_name = "router.reply",
            session_id = %session.session_id,
            reply_kind = ?reply.kind,
            "routed chat turn"
        );
        reply
    }

    async fn dispatch(
        &self,
        session: &mut ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        if message.trim().is_empty() {
            return RoutedReply::new(
                ReplyKind::Clarification,
                "Prosim, napišite, kako vam lahko pomagam.",
            );
        }

        if session.draft.is_some() {
            return self.continue_flow(session, message, today).await;
        }

        if faq::is_greeting(message) && message.split_whitespace().count() <= 4 {
            return RoutedReply::new(ReplyKind::Fallback, faq::GREETING_REPLY);
        }

        if let Some(entry) = faq::match_static(message) {
            info!(
                event_name = "router.static_faq",
                session_id = %session.session_id,
                faq_key = entry.key,
                "static FAQ answered without a model call"
            );
            return RoutedReply::new(ReplyKind::StaticFaq, entry.answer);
        }

        if faq::is_goodbye(message) {
            return RoutedReply::new(ReplyKind::Fallback, faq::GOODBYE_REPLY);
        }

        if intent::wants_reservation(message) {
            match intent::detect_service(message) {
                ServiceSignal::One(service) => {
                    return self.start_flow(session, service, message, today).await;
                }
                // Room or table is unclear; let the oracle read the
                // message, with the rules as the fallback.
                _ => return self.oracle_cycle(session, message, today).await,
            }
        }

        if intent::has_booking_intent_words(message) {
            return self.oracle_cycle(session, message, today).await;
        }

        self.knowledge_answer(session, message)
    }

    async fn continue_flow(
        &self,
        session: &mut ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        // An info question asked mid-flow gets its answer plus the
        // flow's continuation prompt, and the draft stays untouched.
        if let Some(entry) = faq::match_static(message) {
            if !carries_booking_data(message, today) {
                let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
                let continuation = session
                    .draft
                    .as_ref()
                    .map(|draft| flow.continuation_prompt(draft))
                    .unwrap_or_default();
                return RoutedReply::new(
                    ReplyKind::StaticFaq,
                    format!("{}\n\nNadaljujemo z rezervacijo: {continuation}", entry.answer),
                );
            }
        }

        let mut draft = session.draft.take().unwrap_or_default();
        let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
        match flow.advance(&mut draft, message, today).await {
            FlowOutcome::Continue(text) => {
                session.draft = Some(draft);
                RoutedReply::new(ReplyKind::Reservation, text)
            }
            FlowOutcome::Booked { reservation, reply } => {
                info!(
                    event_name = "router.reservation_created",
                    session_id = %session.session_id,
                    reservation_id = %reservation.id,
                    "reservation persisted as pending"
                );
                RoutedReply::new(ReplyKind::Reservation, reply)
            }
            FlowOutcome::Abandoned(text) => RoutedReply::new(ReplyKind::Reservation, text),
        }
    }

    async fn start_flow(
        &self,
        session: &mut ConversationSession,
        service: ServiceKind,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        let mut draft = ReservationDraft::for_service(service);
        let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
        match flow.advance(&mut draft, message, today).await {
            FlowOutcome::Continue(text) => {
                session.draft = Some(draft);
                RoutedReply::new(ReplyKind::RuleBased, text)
            }
            FlowOutcome::Booked { reply, .. } => RoutedReply::new(ReplyKind::RuleBased, reply),
            FlowOutcome::Abandoned(text) => RoutedReply::new(ReplyKind::RuleBased, text),
        }
    }

    /// The LLM tool cycle for booking-shaped messages the rules could
    /// not resolve. The oracle may extract an intent or request an
    /// availability check; it may not assert availability on its own.
    async fn oracle_cycle(
        &self,
        session: &mut ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        let mut force_tool = Some(RESERVATION_INTENT_TOOL);
        let mut attempts: u32 = 0;

        while attempts < MAX_ORACLE_CALLS {
            attempts += 1;
            let request =
                OracleRequest { messages: oracle_messages(session), force_tool };

            let outcome = match self.oracle.invoke(request).await {
                Ok(outcome) => outcome,
                Err(OracleError::Protocol(detail)) => {
                    warn!(
                        event_name = "router.oracle_protocol_failure",
                        session_id = %session.session_id,
                        detail = %detail,
                        "oracle response was unusable"
                    );
                    return RoutedReply::new(ReplyKind::Clarification, RESTATE_REPLY);
                }
                Err(error) => {
                    let routing_error = RoutingError::Unavailable(error.to_string());
                    warn!(
                        event_name = "router.oracle_unavailable",
                        session_id = %session.session_id,
                        error = %routing_error,
                        "oracle unreachable; falling back to deterministic path"
                    );
                    return self.oracle_unavailable_fallback(session, message, today).await;
                }
            };

            match outcome {
                OracleOutcome::ToolCalls(calls) => {
                    if let Some(call) = find_tool(&calls, RESERVATION_INTENT_TOOL) {
                        return self
                            .handle_reservation_intent(session, call, message, today)
                            .await;
                    }
                    if let Some(call) = find_tool(&calls, CHECK_AVAILABILITY_TOOL) {
                        return self.handle_check_availability(session, call, today).await;
                    }
                    warn!(
                        event_name = "router.oracle_unknown_tool",
                        session_id = %session.session_id,
                        "oracle called a tool outside the fixed schema"
                    );
                    return RoutedReply::new(ReplyKind::Clarification, RESTATE_REPLY);
                }
                OracleOutcome::Text(text) => {
                    // A tool-grounded turn returns deterministically
                    // above, so any text reaching this point was
                    // produced without the check tool.
                    match self.policy.evaluate_text(&text, false, attempts) {
                        PolicyDecision::Allow => {
                            return RoutedReply::new(ReplyKind::Reservation, text);
                        }
                        PolicyDecision::Retry { reason } => {
                            warn!(
                                event_name = "router.tool_misuse_retry",
                                session_id = %session.session_id,
                                reason = reason,
                                attempt = attempts,
                                "oracle asserted availability without the check tool"
                            );
                            force_tool = Some(CHECK_AVAILABILITY_TOOL);
                            continue;
                        }
                        PolicyDecision::Degrade { reason, user_message } => {
                            let routing_error = RoutingError::ToolMisuse { attempts };
                            warn!(
                                event_name = "router.tool_misuse_degrade",
                                session_id = %session.session_id,
                                reason = reason,
                                error = %routing_error,
                                "oracle retries exhausted; degrading to manual contact"
                            );
                            return RoutedReply::new(ReplyKind::Fallback, user_message);
                        }
                    }
                }
            }
        }

        RoutedReply::new(ReplyKind::Fallback, crate::policy::MANUAL_CONTACT_REPLY)
    }

    async fn handle_reservation_intent(
        &self,
        session: &mut ConversationSession,
        call: &ToolCall,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        let args: ReservationIntentArgs = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!(
                    event_name = "router.tool_arguments_malformed",
                    session_id = %session.session_id,
                    tool = RESERVATION_INTENT_TOOL,
                    error = %error,
                    "asking the guest to restate"
                );
                return RoutedReply::new(ReplyKind::Clarification, RESTATE_REPLY);
            }
        };

        let service = match args.action {
            ReservationAction::None => return self.knowledge_answer(session, message),
            ReservationAction::BookingRoom => ServiceKind::Room,
            ReservationAction::BookingTable => ServiceKind::Table,
        };

        let mut draft = ReservationDraft::for_service(service);
        if let Some(date) = args.date.as_deref().and_then(|raw| parsing::extract_date(raw, today))
        {
            draft.date = Some(date);
        }
        if let Some(time) = args.time.as_deref().and_then(parsing::extract_time) {
            draft.time = Some(time);
        }
        draft.party_size = args.people;
        draft.nights = args.nights;

        let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
        match flow.advance(&mut draft, message, today).await {
            FlowOutcome::Continue(text) => {
                session.draft = Some(draft);
                RoutedReply::new(ReplyKind::Reservation, text)
            }
            FlowOutcome::Booked { reply, .. } => RoutedReply::new(ReplyKind::Reservation, reply),
            FlowOutcome::Abandoned(text) => RoutedReply::new(ReplyKind::Reservation, text),
        }
    }

    /// Execute the model's availability request against the checker and
    /// answer deterministically. The model never gets to phrase the
    /// availability verdict itself.
    async fn handle_check_availability(
        &self,
        session: &mut ConversationSession,
        call: &ToolCall,
        today: NaiveDate,
    ) -> RoutedReply {
        let args: CheckAvailabilityArgs = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(error) => {
                warn!(
                    event_name = "router.tool_arguments_malformed",
                    session_id = %session.session_id,
                    tool = CHECK_AVAILABILITY_TOOL,
                    error = %error,
                    "asking the guest to restate"
                );
                return RoutedReply::new(ReplyKind::Clarification, RESTATE_REPLY);
            }
        };

        let Some(service) = ServiceKind::parse(&args.service) else {
            return RoutedReply::new(ReplyKind::Clarification, RESTATE_REPLY);
        };

        let mut draft = ReservationDraft::for_service(service);
        draft.date = parsing::extract_date(&args.date, today);
        draft.time = args.time.as_deref().and_then(parsing::extract_time);
        draft.party_size = args.people;
        draft.nights = args.nights;

        // An empty message advances nothing; the flow runs the advisory
        // check (or asks for whatever the model's arguments lacked).
        let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
        match flow.advance(&mut draft, "", today).await {
            FlowOutcome::Continue(text) => {
                session.draft = Some(draft);
                RoutedReply::new(ReplyKind::Reservation, text)
            }
            FlowOutcome::Booked { reply, .. } => RoutedReply::new(ReplyKind::Reservation, reply),
            FlowOutcome::Abandoned(text) => RoutedReply::new(ReplyKind::Reservation, text),
        }
    }

    /// Oracle unreachable: recover locally. Booking-shaped messages get
    /// a fresh deterministic flow seeded with whatever the rules can
    /// read, so the partial draft survives into the next turn; anything
    /// else falls back to the knowledge path.
    async fn oracle_unavailable_fallback(
        &self,
        session: &mut ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> RoutedReply {
        if intent::wants_reservation(message) || intent::has_booking_intent_words(message) {
            let mut draft = ReservationDraft::default();
            let flow = ReservationFlow::new(&self.checker, self.store.as_ref());
            if let FlowOutcome::Continue(prompt) =
                flow.advance(&mut draft, message, today).await
            {
                session.draft = Some(draft);
                return RoutedReply::new(
                    ReplyKind::Fallback,
                    format!("{APOLOGY_REPLY} {prompt}"),
                );
            }
        }

        let grounded = self.knowledge_answer(session, message);
        if grounded.kind == ReplyKind::Knowledge {
            return grounded;
        }
        RoutedReply::new(ReplyKind::Fallback, APOLOGY_REPLY)
    }

    /// Retrieval-grounded answer, or an honest refusal. The oracle is
    /// never consulted here: with no grounding there is nothing it
    /// could safely add.
    fn knowledge_answer(&self, session: &ConversationSession, message: &str) -> RoutedReply {
        let hits = self.retriever.retrieve_confident(&self.knowledge, message, 3);
        match hits.first().and_then(|hit| self.knowledge.get(hit.id)) {
            Some(document) => {
                info!(
                    event_name = "router.knowledge_answer",
                    session_id = %session.session_id,
                    document_id = %document.id,
                    "answering from the knowledge corpus"
                );
                RoutedReply::new(ReplyKind::Knowledge, innkeep_core::knowledge::snippet(document))
            }
            None => RoutedReply::new(ReplyKind::Clarification, LOW_CONFIDENCE_REPLY),
        }
    }
}

fn find_tool<'a>(calls: &'a [ToolCall], name: &str) -> Option<&'a ToolCall> {
    calls.iter().find(|call| call.name == name)
}

fn oracle_messages(session: &ConversationSession) -> Vec<OracleMessage> {
    let mut messages = vec![OracleMessage::new(OracleRole::System, SYSTEM_PROMPT)];
    let start = session.turns.len().saturating_sub(ORACLE_HISTORY_TURNS);
    for turn in &session.turns[start..] {
        let role = match turn.role {
            TurnRole::User => OracleRole::User,
            TurnRole::Assistant => OracleRole::Assistant,
        };
        messages.push(OracleMessage::new(role, turn.text.clone()));
    }
    messages
}

/// True when a message carries concrete booking data, so a FAQ keyword
/// inside it should not hijack the flow.
fn carries_booking_data(message: &str, today: NaiveDate) -> bool {
    parsing::extract_date(message, today).is_some()
        || parsing::extract_time(message).is_some()
        || parsing::labeled_party_count(message).total.is_some()
        || parsing::bare_number(message).is_some()
        || intent::detect_service(message) != ServiceSignal::None
}
