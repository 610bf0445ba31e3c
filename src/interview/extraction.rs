// Answer extraction - turns raw answer text into structured field values

use regex::Regex;
use std::sync::OnceLock;

use crate::error::EngineError;
use crate::models::{ExtractionRule, FieldValue, Question};

static NUMBER_PATTERN: OnceLock<Regex> = OnceLock::new();
static LIST_SEPARATOR: OnceLock<Regex> = OnceLock::new();
static NON_ANSWER: OnceLock<Regex> = OnceLock::new();

fn get_number_pattern() -> &'static Regex {
    NUMBER_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|-?\d+(?:\.\d+)?)\s*([a-z]+)?").unwrap()
    })
}

fn get_list_separator() -> &'static Regex {
    LIST_SEPARATOR.get_or_init(|| Regex::new(r"(?i)\s*(?:[,;\n]|\band\b|&)\s*").unwrap())
}

fn get_non_answer() -> &'static Regex {
    NON_ANSWER.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:do\s*n[o'’]?t\s+know|no\s+(?:idea|clue)|not\s+sure|unsure|idk|dunno|n/a|hard\s+to\s+say|can[’']?t\s+say|rather\s+not\s+say|skip)\b",
        )
        .unwrap()
    })
}

const WORD_NUMBERS: &[(&str, f64)] = &[
    ("zero", 0.0),
    ("none", 0.0),
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("eleven", 11.0),
    ("twelve", 12.0),
    ("dozen", 12.0),
    ("fifteen", 15.0),
    ("twenty", 20.0),
    ("thirty", 30.0),
    ("fifty", 50.0),
    ("hundred", 100.0),
];

const STOPWORDS: &[&str] = &[
    "the", "and", "with", "than", "only", "some", "when", "that", "this", "very", "from",
];

/// Run a question's extraction rule against a raw answer
pub fn extract(question: &Question, answer: &str) -> Result<FieldValue, EngineError> {
    let fail = |reason: String| EngineError::ExtractionFailure {
        question_id: question.id.clone(),
        field: question.field().to_string(),
        reason,
    };

    let answer = answer.trim();
    if answer.is_empty() {
        return Err(fail("empty answer".to_string()));
    }

    match &question.extractor.rule {
        ExtractionRule::Text { min_chars } => {
            if answer.chars().count() < *min_chars {
                return Err(fail(format!(
                    "answer shorter than {} characters",
                    min_chars
                )));
            }
            Ok(FieldValue::Text(answer.to_string()))
        }
        ExtractionRule::Number { min, max } => {
            let value = extract_number(answer, *max)
                .ok_or_else(|| fail("no number found in answer".to_string()))?;
            if min.map_or(false, |m| value < m) || max.map_or(false, |m| value > m) {
                return Err(fail(format!("{} is out of range", value)));
            }
            Ok(FieldValue::Number(value))
        }
        ExtractionRule::Percentage => {
            let value = extract_number(answer, Some(100.0))
                .ok_or_else(|| fail("no percentage found in answer".to_string()))?;
            if !(0.0..=100.0).contains(&value) {
                return Err(fail(format!("{} is not a percentage", value)));
            }
            Ok(FieldValue::Number(value))
        }
        ExtractionRule::Choice { options } => match_choice(answer, options)
            .map(FieldValue::Text)
            .ok_or_else(|| fail("answer matches none of the options".to_string())),
        ExtractionRule::MultiChoice { options } => {
            let mut selected: Vec<String> = Vec::new();
            for piece in split_list(answer) {
                if let Some(option) = match_choice(&piece, options) {
                    if !selected.contains(&option) {
                        selected.push(option);
                    }
                }
            }
            if selected.is_empty() {
                return Err(fail("answer matches none of the options".to_string()));
            }
            // Keep option order so re-extraction is deterministic
            selected.sort_by_key(|s| options.iter().position(|o| o == s));
            Ok(FieldValue::List(selected))
        }
        ExtractionRule::List => {
            let items = split_list(answer);
            if items.is_empty() {
                return Err(fail("no list items found".to_string()));
            }
            Ok(FieldValue::List(items))
        }
    }
}

/// First number in the text, honoring thousands separators and k/m/b suffixes.
///
/// When a suffix pushes the value past `max` but the bare number fits, the
/// suffix is treated as a unit ("18m" of runway is months, not millions).
pub fn extract_number(text: &str, max: Option<f64>) -> Option<f64> {
    if let Some(caps) = get_number_pattern().captures(text) {
        let raw: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
        let multiplier = caps
            .get(2)
            .map(|s| match s.as_str().to_lowercase().as_str() {
                "k" | "thousand" => 1_000.0,
                "m" | "mm" | "million" => 1_000_000.0,
                "b" | "bn" | "billion" => 1_000_000_000.0,
                _ => 1.0,
            })
            .unwrap_or(1.0);

        let scaled = raw * multiplier;
        return Some(match max {
            Some(max) if scaled > max && raw <= max => raw,
            _ => scaled,
        });
    }

    let lower = text.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| {
            WORD_NUMBERS
                .iter()
                .find(|(w, _)| *w == word)
                .map(|(_, n)| *n)
        })
}

/// Whether the text contains any digit or spelled-out number
pub fn has_number(text: &str) -> bool {
    extract_number(text, None).is_some()
}

/// Whether the answer declines to answer ("no idea", "not sure", "skip")
pub fn is_non_answer(text: &str) -> bool {
    get_non_answer().is_match(text)
}

/// Match an answer against a fixed option set.
///
/// Tries an exact match, then a 1-based option index, then an option
/// contained in the answer, then the best keyword overlap. An option named
/// "Other" takes a concrete unlisted answer, never a non-answer.
pub fn match_choice(answer: &str, options: &[String]) -> Option<String> {
    let answer_lower = answer.trim().to_lowercase();
    if answer_lower.is_empty() {
        return None;
    }

    if let Some(o) = options.iter().find(|o| o.to_lowercase() == answer_lower) {
        return Some(o.clone());
    }

    if let Ok(index) = answer_lower.parse::<usize>() {
        if index >= 1 && index <= options.len() {
            return Some(options[index - 1].clone());
        }
    }

    // Longest contained option wins ("Documented, loosely followed" over "Documented")
    if let Some(o) = options
        .iter()
        .filter(|o| answer_lower.contains(&o.to_lowercase()))
        .max_by_key(|o| o.len())
    {
        return Some(o.clone());
    }

    if is_non_answer(&answer_lower) {
        return None;
    }

    let answer_words = keywords(&answer_lower);
    let best = options
        .iter()
        .map(|o| {
            let overlap = keywords(&o.to_lowercase())
                .iter()
                .filter(|w| answer_words.contains(w))
                .count();
            (o, overlap)
        })
        .filter(|(_, overlap)| *overlap > 0)
        .fold(None::<(&String, usize)>, |best, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        });
    if let Some((o, _)) = best {
        return Some(o.clone());
    }

    if answer_words.is_empty() {
        return None;
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case("other"))
        .cloned()
}

fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn split_list(text: &str) -> Vec<String> {
    get_list_separator()
        .split(text)
        .map(|s| s.trim().trim_matches(|c: char| c == '.' || c == '-' || c == '*'))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
