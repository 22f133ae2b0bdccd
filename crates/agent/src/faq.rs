//! Pre-authored answers for the handful of facts that must never be
//! paraphrased: address, opening hours, contact details, house policy.
//! Keyword matching is deliberately dumb and deterministic; entries are
//! ordered from specific to generic so "kje lahko parkiram" hits the
//! parking entry before the location one.

pub struct FaqEntry {
    pub key: &'static str,
    keywords: &'static [&'static str],
    pub answer: &'static str,
}

const FAQ_TABLE: &[FaqEntry] = &[
    FaqEntry {
        key: "parking",
        keywords: &["parkir", "parking", "z avtom", "avtodom"],
        answer: "Parkiranje je brezplačno ob hiši, prostora je za več kot 10 avtomobilov.",
    },
    FaqEntry {
        key: "opening_hours",
        keywords: &[
            "odprt", "odpiralni", "obratoval", "delovni čas", "delovni cas", "do kdaj",
            "kdaj ste", "kdaj imate", "obratujete",
        ],
        answer: "Vikend kosila strežemo ob sobotah in nedeljah med 12:00 in 20:00, zadnji \
                 prihod na kosilo je ob 15:00. Ob ponedeljkih in torkih je kuhinja zaprta. \
                 Sobe sprejemajo goste vse dni v tednu.",
    },
    FaqEntry {
        key: "check_in_out",
        keywords: &["prijava", "odjava", "check-in", "check in", "check out", "checkout"],
        answer: "Prijava v sobe je od 14:00 naprej, odjava do 10:00. Zajtrk strežemo med \
                 8:00 in 9:00.",
    },
    FaqEntry {
        key: "contact",
        keywords: &[
            "telefon", "kontakt", "email", "e-mail", "e-pošta", "e-posta", "mail",
            "številka", "stevilka", "pokličem", "poklicem",
        ],
        answer: "Dosegljivi smo na 02 700 12 34 ali 031 777 888, lahko pa nam pišete na \
                 info@kmetijapodgoro.si.",
    },
    FaqEntry {
        key: "payment",
        keywords: &["plačilo", "placilo", "plačam", "placam", "kartic", "gotovin"],
        answer: "Plačate lahko z gotovino ali plačilno kartico ob prihodu. Predplačilo ni \
                 potrebno.",
    },
    FaqEntry {
        key: "location",
        keywords: &[
            "kje", "naslov", "lokacija", "nahaja", "kako pridem", "pot do", "address",
            "where", "ordinacij",
        ],
        answer: "Najdete nas na naslovu Gorska cesta 7, 2315 Zeleno Polje, na pohorski \
                 strani nad Zelenim Poljem. Iz avtoceste A1 vzemite izvoz Zeleno Polje in \
                 sledite tablam proti Kopivniku; od cerkve v Zelenem Polju je do nas slabih \
                 15 minut.",
    },
];

const GREETING_TOKENS: &[&str] = &["živjo", "zivjo", "zdravo", "hej", "hello", "hi", "pozdravljeni"];
const GREETING_PHRASES: &[&str] = &["dober dan", "dobro jutro", "dober večer", "dober vecer"];

const GOODBYE_PHRASES: &[&str] = &[
    "hvala", "adijo", "nasvidenje", "na svidenje", "čao", "ciao", "bye", "lep pozdrav",
    "se vidimo", "vidimo se", "lahko noč", "lahko noc",
];

pub const GREETING_REPLY: &str = "Pozdravljeni pri Kmetiji Pod Goro! Kako vam lahko pomagam?";

pub const GOODBYE_REPLY: &str =
    "Hvala vam in lep pozdrav s Pohorja! Če boste imeli še kakšno vprašanje, sem tu.";

/// First entry whose keyword appears in the message, scanned in table
/// order. Returns the fixed answer; no model is ever involved.
pub fn match_static(message: &str) -> Option<&'static FaqEntry> {
    let lowered = message.to_lowercase();
    FAQ_TABLE
        .iter()
        .find(|entry| entry.keywords.iter().any(|keyword| lowered.contains(keyword)))
}

pub fn is_greeting(message: &str) -> bool {
    let lowered = message.to_lowercase();
    if GREETING_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        return true;
    }
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(|token| GREETING_TOKENS.contains(&token))
}

pub fn is_goodbye(message: &str) -> bool {
    let lowered = message.to_lowercase();
    GOODBYE_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::{is_goodbye, is_greeting, match_static};

    #[test]
    fn address_question_hits_the_location_entry() {
        let entry = match_static("Kje imate ordinacijo?").expect("match");
        assert_eq!(entry.key, "location");
        assert!(entry.answer.contains("Gorska cesta 7"));
    }

    #[test]
    fn parking_wins_over_generic_location_words() {
        let entry = match_static("kje lahko parkiram?").expect("match");
        assert_eq!(entry.key, "parking");
    }

    #[test]
    fn opening_hours_question_matches() {
        let entry = match_static("do kdaj ste odprti v nedeljo?").expect("match");
        assert_eq!(entry.key, "opening_hours");
    }

    #[test]
    fn unrelated_question_matches_nothing() {
        assert!(match_static("kakšna vina priporočate k divjačini?").is_none());
    }

    #[test]
    fn greetings_and_goodbyes_are_recognized() {
        assert!(is_greeting("Dober dan!"));
        assert!(is_greeting("zivjo"));
        assert!(!is_greeting("rezervacija sobe"));
        assert!(is_goodbye("najlepša hvala, adijo"));
        assert!(!is_goodbye("je miza prosta?"));
    }
}
