//! Fixed lookup tables used to read intent out of a question.
//!
//! These are hand-curated and never derived from the data: offense groups map
//! a word a user might type to the literal offense-type codes the city uses.

/// A named bucket of offense-type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffenseGroup {
    pub name: &'static str,
    pub codes: &'static [&'static str],
}

impl OffenseGroup {
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(&code)
    }
}

/// Offense groups in the order they are tried against a question
pub const OFFENSE_GROUPS: &[OffenseGroup] = &[
    OffenseGroup {
        name: "robbery",
        codes: &[
            "ROBBERY PERSONAL (JO)(W)",
            "ROBBERY PERSONAL (IP)",
            "ROBBERY BUSINESS (NIP)",
        ],
    },
    OffenseGroup {
        name: "assault",
        codes: &[
            "ASSAULT (IP)(W)",
            "ASSAULT (JO)(W)(E)",
            "SEX ASSAULT ADULT (S)",
            "SEX ASSAULT CHILD (IP)",
            "SEX ASSAULT CHILD (S)(W)(E)",
            "RAPER",
        ],
    },
    OffenseGroup {
        name: "disturbance",
        codes: &[
            "DISTURBANCE VERB (IP)(W)",
            "DISTURBANCE VERB (S)",
            "DISTURBANCE PHYS (JO)",
            "DISTURBANCE VERB (S)(W)",
            "DISTURBANCE PHYS (S)(E)",
            "FAMILY DIST PHYS (JO)(E)",
            "FAMILY DIST PHYS (S)",
            "FAMILY DIST UNKN (JO)",
        ],
    },
    OffenseGroup {
        name: "theft",
        codes: &[
            "VEHICLE THEFT (JO)(W)",
            "U-AUTO THEFT/RECOVERY RPT",
            "THEFT (IP)(W)",
            "OCR THEFT ATTEMPT (NIP)",
        ],
    },
    OffenseGroup {
        name: "drug",
        codes: &[
            "DRUG USE/POSSESS (IP)(W)(E)",
            "DRUG SALE (IP)(W)(E)",
            "ADV - DRUG SALE (NIP)",
        ],
    },
];

/// Month names, index + 1 is the calendar month
pub const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Phrases that ask for newest-first ordering
pub const RECENCY_CUES: &[&str] = &[
    "latest",
    "most recent",
    "last offense",
    "last incident",
    "recent",
];

/// Phrases that ask for a count instead of examples
pub const COUNT_CUES: &[&str] = &["how many", "count", "number of"];

/// First offense group whose name appears in the (lower-cased) question
pub fn find_group(question: &str) -> Option<&'static OffenseGroup> {
    OFFENSE_GROUPS.iter().find(|g| question.contains(g.name))
}

/// First month whose name appears in the (lower-cased) question, as 1..=12
pub fn find_month(question: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|name| question.contains(name))
        .map(|idx| idx as u32 + 1)
}

pub fn has_recency_cue(question: &str) -> bool {
    RECENCY_CUES.iter().any(|cue| question.contains(cue))
}

pub fn has_count_cue(question: &str) -> bool {
    COUNT_CUES.iter().any(|cue| question.contains(cue))
}
