// Input normalizers for mutation operations
//
// Each normalizer maps one free-text utterance fragment onto the value
// stored in a field. Where a sensible default exists (timeline) the
// normalizer never fails; otherwise unparseable input is a validation error.

use serde::{Deserialize, Serialize};

use crate::domain::capture::errors::{CaptureError, CaptureResult};

/// When a prospect wants to get started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeline {
    Now,
    Soon,
    Later,
}

const NOW_KEYWORDS: &[&str] = &[
    "now",
    "asap",
    "urgent",
    "urgently",
    "immediate",
    "immediately",
    "today",
    "right away",
    "this week",
];

const SOON_KEYWORDS: &[&str] = &[
    "soon",
    "this month",
    "next month",
    "next week",
    "few weeks",
    "couple of weeks",
    "maybe",
];

impl Timeline {
    pub const OPTIONS: [&'static str; 3] = ["now", "soon", "later"];

    /// Maps free text onto a timeline by keyword containment
    ///
    /// Anything that matches neither `now` nor `soon` keywords, including
    /// empty input, falls back to `Later`.
    ///
    /// # Example
    /// ```
    /// use voice_capture_api::agents::normalize::Timeline;
    ///
    /// assert_eq!(Timeline::from_text("we need this ASAP"), Timeline::Now);
    /// assert_eq!(Timeline::from_text("probably next quarter"), Timeline::Later);
    /// ```
    pub fn from_text(input: &str) -> Self {
        let words = padded_words(input);
        let contains = |keywords: &[&str]| {
            keywords
                .iter()
                .any(|keyword| words.contains(&format!(" {} ", keyword)))
        };

        if contains(NOW_KEYWORDS) {
            Timeline::Now
        } else if contains(SOON_KEYWORDS) {
            Timeline::Soon
        } else {
            Timeline::Later
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::Now => "now",
            Timeline::Soon => "soon",
            Timeline::Later => "later",
        }
    }
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lower-cased words separated by single spaces, padded with a space on
/// both ends so phrases can be matched on word boundaries.
fn padded_words(input: &str) -> String {
    let cleaned: String = input
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    format!(" {} ", joined)
}

pub const TUTOR_MODES: [&str; 4] = ["coordinator", "learn", "quiz", "teach_back"];

pub const CASE_STATUSES: [&str; 4] = [
    "pending_review",
    "verification_failed",
    "confirmed_safe",
    "confirmed_fraud",
];

pub const IMPROV_PHASES: [&str; 4] = ["intro", "awaiting_improv", "reacting", "done"];

/// Typed input handler attached to an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Surrounding whitespace removed
    Trimmed,
    Lowercase,
    /// Every word capitalized (customer and player names)
    TitleCase,
    Email,
    Timeline,
    TutorMode,
}

impl Normalizer {
    /// Normalizes input destined for `field`
    pub fn apply(&self, field: &str, input: &str) -> CaptureResult<String> {
        let trimmed = input.trim();

        match self {
            Normalizer::Timeline => Ok(Timeline::from_text(trimmed).as_str().to_string()),
            _ if trimmed.is_empty() => Err(CaptureError::validation(field, "value cannot be empty")),
            Normalizer::Trimmed => Ok(trimmed.to_string()),
            Normalizer::Lowercase => Ok(trimmed.to_lowercase()),
            Normalizer::TitleCase => Ok(title_case(trimmed)),
            Normalizer::Email => normalize_email(field, trimmed),
            Normalizer::TutorMode => tutor_mode(trimmed)
                .map(str::to_string)
                .ok_or_else(|| CaptureError::validation(field, format!("unknown mode '{}'", trimmed))),
        }
    }
}

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Same rule as account emails elsewhere: an '@' and at least 3 characters
fn normalize_email(field: &str, input: &str) -> CaptureResult<String> {
    let email = input.to_lowercase();
    if email.contains('@') && email.len() >= 3 {
        Ok(email)
    } else {
        Err(CaptureError::validation(field, format!("'{}' is not an email address", input)))
    }
}

fn tutor_mode(input: &str) -> Option<&'static str> {
    let words = padded_words(input);
    let has = |phrase: &str| words.contains(&format!(" {} ", phrase));

    if has("teach back") || has("teach") || has("teachback") {
        Some("teach_back")
    } else if has("quiz") || has("test") {
        Some("quiz")
    } else if has("learn") || has("learning") || has("explain") {
        Some("learn")
    } else if has("coordinator") || has("menu") {
        Some("coordinator")
    } else {
        None
    }
}

const UNSURE_PHRASES: &[&str] = &[
    "not sure",
    "unsure",
    "don t know",
    "dont know",
    "do not know",
    "can t remember",
    "cant remember",
    "don t remember",
    "no idea",
    "not certain",
];

const NEGATIONS: &[&str] = &["not", "no", "isn t", "wasn t", "never", "hardly"];

/// A spoken answer reduced to lower-cased, space-padded words
struct Answer(String);

impl Answer {
    fn new(input: &str) -> Self {
        Answer(padded_words(input))
    }

    fn has(&self, phrase: &str) -> bool {
        self.0.contains(&format!(" {} ", phrase))
    }

    fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.has(phrase))
    }

    fn negated(&self, phrase: &str) -> bool {
        NEGATIONS
            .iter()
            .any(|negation| self.has(&format!("{} {}", negation, phrase)))
    }

    /// True when `phrase` occurs without a negation right in front of it
    fn affirms(&self, phrase: &str) -> bool {
        self.0
            .match_indices(&format!(" {} ", phrase))
            .any(|(at, _)| {
                let before = &self.0[..=at];
                !NEGATIONS
                    .iter()
                    .any(|negation| before.ends_with(&format!(" {} ", negation)))
            })
    }

    fn unsure(&self) -> bool {
        self.has_any(UNSURE_PHRASES)
    }
}

const FRAUD_WORDS: &[&str] = &["fraud", "fraudulent", "unauthorized", "stolen", "scam"];
const SAFE_WORDS: &[&str] = &["safe", "legitimate", "legit", "fine", "genuine"];
const DENIALS: &[&str] = &[
    "not me",
    "wasn t me",
    "didn t make",
    "did not make",
    "never made",
    "didn t buy",
];
const ADMISSIONS: &[&str] = &["i made it", "i did make", "that was me", "it was me", "i bought"];

/// Reads a spoken verdict on a flagged purchase
///
/// `Some(true)` when the caller says it was theirs ("it's legit", "I made
/// it"), `Some(false)` when they call it fraud ("that was fraud", "not
/// me"). A negated keyword counts for the opposite verdict, so "not fraud"
/// is legitimate. Hedged answers and answers pointing both ways give `None`.
pub fn parse_verdict(input: &str) -> Option<bool> {
    let answer = Answer::new(input);
    if answer.unsure() {
        return None;
    }

    let fraud = FRAUD_WORDS.iter().any(|w| answer.affirms(w))
        || SAFE_WORDS.iter().any(|w| answer.negated(w))
        || answer.has_any(DENIALS);
    let safe = SAFE_WORDS.iter().any(|w| answer.affirms(w))
        || FRAUD_WORDS.iter().any(|w| answer.negated(w))
        || answer.has_any(ADMISSIONS);

    match (safe, fraud) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

const YES_WORDS: &[&str] = &["yes", "yeah", "yep", "yup", "correct", "right", "true", "sure"];
const NO_WORDS: &[&str] = &["no", "nope", "nah", "false", "never"];

/// Interprets a spoken yes/no answer
///
/// Returns `None` for hedges ("I'm not sure") and for answers that point
/// both ways ("yes, no, wait").
pub fn parse_yes_no(input: &str) -> Option<bool> {
    let answer = Answer::new(input);
    if answer.unsure() {
        return None;
    }

    let no = answer.has_any(NO_WORDS)
        || answer.has_any(DENIALS)
        || answer.has("didn t")
        || answer.has("did not")
        || YES_WORDS.iter().any(|w| answer.negated(w));
    let yes = YES_WORDS.iter().any(|w| answer.affirms(w))
        || answer.has_any(ADMISSIONS)
        || answer.affirms("i did");

    match (yes, no) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Reads an answer to "did you make this purchase?"
///
/// Accepts a plain yes/no as well as a verdict ("that was fraud"). When the
/// two readings disagree the answer is treated as unclear.
pub fn parse_confirmation(input: &str) -> Option<bool> {
    match (parse_yes_no(input), parse_verdict(input)) {
        (Some(answer), Some(verdict)) if answer != verdict => None,
        (answer, verdict) => answer.or(verdict),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_now_keywords() {
        assert_eq!(Timeline::from_text("we need this ASAP"), Timeline::Now);
        assert_eq!(Timeline::from_text("It's urgent"), Timeline::Now);
        assert_eq!(Timeline::from_text("this week if possible"), Timeline::Now);
    }

    #[test]
    fn timeline_soon_keywords() {
        assert_eq!(Timeline::from_text("sometime next month"), Timeline::Soon);
        assert_eq!(Timeline::from_text("this month"), Timeline::Soon);
        assert_eq!(Timeline::from_text("maybe"), Timeline::Soon);
    }

    #[test]
    fn timeline_defaults_to_later() {
        assert_eq!(Timeline::from_text("probably next quarter"), Timeline::Later);
        assert_eq!(Timeline::from_text(""), Timeline::Later);
        assert_eq!(Timeline::from_text("just exploring"), Timeline::Later);
    }

    #[test]
    fn timeline_matches_whole_words() {
        // "know" contains "now" but is not the keyword
        assert_eq!(Timeline::from_text("I don't know"), Timeline::Later);
    }

    #[test]
    fn timeline_normalizer_never_fails() {
        assert_eq!(Normalizer::Timeline.apply("timeline", "").unwrap(), "later");
        assert_eq!(Normalizer::Timeline.apply("timeline", "ASAP!").unwrap(), "now");
    }

    #[test]
    fn text_normalizers() {
        assert_eq!(Normalizer::Trimmed.apply("f", "  oat milk ").unwrap(), "oat milk");
        assert_eq!(Normalizer::Lowercase.apply("f", "Latte").unwrap(), "latte");
        assert_eq!(Normalizer::TitleCase.apply("f", "priya sHARMA").unwrap(), "Priya Sharma");
    }

    #[test]
    fn blank_input_is_rejected() {
        let result = Normalizer::Lowercase.apply("size", "   ");
        assert!(matches!(result, Err(CaptureError::Validation { .. })));
    }

    #[test]
    fn email_normalizer() {
        assert_eq!(Normalizer::Email.apply("email", " P@X.com ").unwrap(), "p@x.com");
        assert!(Normalizer::Email.apply("email", "not-an-email").is_err());
    }

    #[test]
    fn tutor_modes() {
        assert_eq!(Normalizer::TutorMode.apply("mode", "teach back").unwrap(), "teach_back");
        assert_eq!(Normalizer::TutorMode.apply("mode", "Quiz me").unwrap(), "quiz");
        assert_eq!(Normalizer::TutorMode.apply("mode", "learn").unwrap(), "learn");
        assert!(Normalizer::TutorMode.apply("mode", "dance").is_err());
    }

    #[test]
    fn verdicts() {
        assert_eq!(parse_verdict("that was fraud"), Some(false));
        assert_eq!(parse_verdict("it's legit"), Some(true));
        assert_eq!(parse_verdict("unclear"), None);
    }

    #[test]
    fn negated_verdicts_flip() {
        assert_eq!(parse_verdict("it's not fraud, I made it"), Some(true));
        assert_eq!(parse_verdict("that's not safe, it wasn't me"), Some(false));
    }

    #[test]
    fn hedged_or_mixed_verdicts_are_rejected() {
        for input in ["I'm not sure", "I don't know if it's fraud", "it's fraud but also safe"] {
            assert_eq!(parse_verdict(input), None, "{} was accepted", input);
        }
    }

    #[test]
    fn hedged_or_mixed_answers_are_not_yes_or_no() {
        assert_eq!(parse_yes_no("I'm not sure"), None);
        assert_eq!(parse_yes_no("I don't know"), None);
        assert_eq!(parse_yes_no("yes, no, wait"), None);
    }

    #[test]
    fn negated_yes_is_no() {
        assert_eq!(parse_yes_no("not really"), None);
        assert_eq!(parse_yes_no("that's not correct"), Some(false));
        assert_eq!(parse_yes_no("it was me"), Some(true));
    }

    #[test]
    fn yes_no_answers() {
        assert_eq!(parse_yes_no("Yes, I did"), Some(true));
        assert_eq!(parse_yes_no("no that wasn't me"), Some(false));
        assert_eq!(parse_yes_no("I didn't"), Some(false));
        assert_eq!(parse_yes_no("hmm"), None);
    }

    #[test]
    fn confirmations_combine_yes_no_and_verdicts() {
        assert_eq!(parse_confirmation("it's not fraud, I made it"), Some(true));
        assert_eq!(parse_confirmation("that was fraud"), Some(false));
        assert_eq!(parse_confirmation("yes"), Some(true));
        assert_eq!(parse_confirmation("yes, it's fraud"), None);
        assert_eq!(parse_confirmation("I'm not sure"), None);
    }
}
