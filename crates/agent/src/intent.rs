//! Deterministic intent signals: reservation stems (with the typos
//! guests actually make), service detection, availability triggers, and
//! the yes/no/abort vocabulary the flow runs on.

use innkeep_core::ServiceKind;

const RESERVATION_STEMS: &[&str] =
    &["rezerv", "rezev", "rezer", "book", "buking", "bokking", "reserve"];

const ROOM_TOKENS: &[&str] =
    &["soba", "sobo", "sobe", "nočitev", "nocitev", "nočitve", "nocitve", "preno", "room", "zimmer"];

const TABLE_TOKENS: &[&str] =
    &["miza", "mizo", "mize", "kosilo", "kosila", "večerj", "vecerj", "table", "tisch"];

const AVAILABILITY_TOKENS: &[&str] = &[
    "prosto", "prosta", "proste", "prost ", "razpolo", "na voljo", "zaseden", "zasedeno",
    "termin", "available", "free",
];

const INTENT_PHRASES: &[&str] = &[
    "rad bi", "rada bi", "želim", "zelim", "hočem", "hocem", "imel bi", "imela bi",
    "lahko dobim", "i would like", "can i book",
];

const AFFIRMATIVE_TOKENS: &[&str] =
    &["da", "ja", "yes", "ok", "okej", "seveda", "velja", "lahko", "prosim", "yup"];

const NEGATIVE_TOKENS: &[&str] = &["ne", "no", "nope"];

const EXIT_TOKENS: &[&str] =
    &["konec", "stop", "prekini", "nehaj", "pozabi", "cancel", "quit", "exit", "pusti", "drugič", "drugic"];

const EXIT_PHRASES: &[&str] = &["ne rabim", "ni treba", "pustimo to"];

/// What the message says about which service the guest means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceSignal {
    One(ServiceKind),
    Ambiguous,
    None,
}

pub fn detect_service(message: &str) -> ServiceSignal {
    let lowered = message.to_lowercase();
    let mentions_room = ROOM_TOKENS.iter().any(|token| lowered.contains(token));
    let mentions_table = TABLE_TOKENS.iter().any(|token| lowered.contains(token));
    match (mentions_room, mentions_table) {
        (true, true) => ServiceSignal::Ambiguous,
        (true, false) => ServiceSignal::One(ServiceKind::Room),
        (false, true) => ServiceSignal::One(ServiceKind::Table),
        (false, false) => ServiceSignal::None,
    }
}

pub fn has_reservation_stem(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RESERVATION_STEMS.iter().any(|stem| lowered.contains(stem))
}

pub fn has_booking_intent_words(message: &str) -> bool {
    let lowered = message.to_lowercase();
    INTENT_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

pub fn is_availability_query(message: &str) -> bool {
    let lowered = message.to_lowercase();
    AVAILABILITY_TOKENS.iter().any(|token| lowered.contains(token))
}

/// A message opens the booking path when it carries a reservation stem,
/// an availability trigger, or an intent phrase pointed at a service.
pub fn wants_reservation(message: &str) -> bool {
    if has_reservation_stem(message) || is_availability_query(message) {
        return true;
    }
    has_booking_intent_words(message) && detect_service(message) != ServiceSignal::None
}

fn tokens(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_affirmative(message: &str) -> bool {
    let tokens = tokens(message);
    match tokens.first() {
        Some(first) => AFFIRMATIVE_TOKENS.contains(&first.as_str()),
        None => false,
    }
}

pub fn is_negative(message: &str) -> bool {
    let tokens = tokens(message);
    match tokens.first() {
        Some(first) => NEGATIVE_TOKENS.contains(&first.as_str()),
        None => false,
    }
}

pub fn is_exit(message: &str) -> bool {
    let lowered = message.to_lowercase();
    if EXIT_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return true;
    }
    tokens(message).iter().any(|token| EXIT_TOKENS.contains(&token.as_str()))
}
