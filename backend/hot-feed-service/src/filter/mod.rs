//! Filter pipeline: decides whether a post creation enters the ranked set.
//!
//! Rules run in order and stop at the first rejection:
//! 1. replies are rejected
//! 2. a present language list must contain the accepted language
//! 3. too many hashtags rejects
//! 4. any negative keyword (substring) vetoes
//! 5. a positive keyword must match as a whole word, or a partial keyword
//!    as a substring
//!
//! Accepted posts get a boost (largest matching boosted keyword, never a sum)
//! and a classification flag (any eval-trigger keyword present).

use crate::config::FilterSettings;
use crate::models::{PostCreate, RankedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Reply,
    Language,
    TooManyHashtags,
    NegativeKeyword,
    NoKeywordMatch,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Language => "language",
            Self::TooManyHashtags => "hashtags",
            Self::NegativeKeyword => "negative_keyword",
            Self::NoKeywordMatch => "no_match",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived fields of an accepted post.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub matched_keyword: String,
    pub boost: f64,
    pub needs_classification: bool,
}

impl Candidate {
    pub fn into_item(self, create: &PostCreate, now_ms: i64) -> RankedItem {
        RankedItem::new(
            create.uri.clone(),
            create.cid.clone(),
            now_ms,
            self.boost,
            self.needs_classification,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterDecision {
    Accept(Candidate),
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept(_))
    }
}

pub fn evaluate(create: &PostCreate, settings: &FilterSettings) -> FilterDecision {
    if create.is_reply {
        return FilterDecision::Reject(RejectReason::Reply);
    }

    if let Some(langs) = &create.langs {
        let accepted = langs
            .iter()
            .any(|lang| lang.eq_ignore_ascii_case(&settings.accepted_language));
        if !accepted {
            return FilterDecision::Reject(RejectReason::Language);
        }
    }

    if count_hashtags(&create.text) > settings.max_hashtags {
        return FilterDecision::Reject(RejectReason::TooManyHashtags);
    }

    let lower = create.text.to_lowercase();

    if settings
        .negative_keywords
        .iter()
        .any(|keyword| lower.contains(keyword.as_str()))
    {
        return FilterDecision::Reject(RejectReason::NegativeKeyword);
    }

    let matched_keyword = match match_keyword(&lower, settings) {
        Some(keyword) => keyword.to_string(),
        None => return FilterDecision::Reject(RejectReason::NoKeywordMatch),
    };

    FilterDecision::Accept(Candidate {
        matched_keyword,
        boost: calculate_boost(&lower, &settings.boosted_keywords),
        needs_classification: settings
            .keywords_to_eval
            .iter()
            .any(|keyword| lower.contains(keyword.as_str())),
    })
}

pub fn count_hashtags(text: &str) -> usize {
    text.matches('#').count()
}

/// Lowercase, pad with spaces, turn newlines and sentence separators into
/// spaces, and collapse runs of spaces. Every word ends up between two spaces.
pub fn normalize_for_word_match(text: &str) -> String {
    let padded = format!(" {} ", text.to_lowercase()).replace('\n', " ");
    let separated = padded
        .replace(", ", " ")
        .replace(". ", " ")
        .replace("! ", " ")
        .replace("? ", " ");

    let mut normalized = String::with_capacity(separated.len() + 1);
    let mut previous_space = false;
    for ch in separated.chars() {
        if ch == ' ' {
            if !previous_space {
                normalized.push(ch);
            }
            previous_space = true;
        } else {
            normalized.push(ch);
            previous_space = false;
        }
    }
    if !normalized.ends_with(' ') {
        normalized.push(' ');
    }
    normalized
}

fn match_keyword<'a>(lower: &str, settings: &'a FilterSettings) -> Option<&'a str> {
    let spaced = normalize_for_word_match(lower);
    settings
        .keywords
        .iter()
        .find(|keyword| spaced.contains(&format!(" {} ", keyword)))
        .or_else(|| {
            settings
                .partial_keywords
                .iter()
                .find(|keyword| lower.contains(keyword.as_str()))
        })
        .map(String::as_str)
}

/// Largest boost among matching keywords; 0 when none match.
pub fn calculate_boost(lower: &str, boosted_keywords: &[(String, f64)]) -> f64 {
    boosted_keywords
        .iter()
        .filter(|(keyword, _)| lower.contains(keyword.as_str()))
        .map(|(_, boost)| *boost)
        .fold(None, |best: Option<f64>, boost| {
            Some(best.map_or(boost, |b| b.max(boost)))
        })
        .unwrap_or(0.0)
}
