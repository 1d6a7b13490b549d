//! Local lexicon heuristic.
//!
//! The last step of the fallback chain: keyword matching against per-emotion
//! lexicons. It never fails and never leaves the process, and its confidence
//! is capped below what the remote models report.
//!
//! Scoring, per token:
//! - a lexicon hit adds the keyword's weight to its emotion
//! - a preceding intensifier multiplies it by 1.5, a diminisher by 0.6
//! - a negation word within the window dampens it to 30%; negated joy and
//!   love additionally push half their weight to sadness
//!
//! Then compound phrases add a bonus, generic positive/negative words count
//! only when no emotion keyword scored, a trailing `!` amplifies the leader,
//! and neutral always starts with a small bias so text without signal lands
//! on neutral rather than an arbitrary emotion.

use crate::config::LexiconConfig;
use crate::{Classification, Emotion, PROVIDER_LOCAL};
use std::collections::HashMap;

const KEYWORDS: &[(Emotion, &[(&str, f64)])] = &[
    (
        Emotion::Joy,
        &[
            ("happy", 1.0),
            ("happiness", 1.0),
            ("joy", 1.0),
            ("joyful", 1.0),
            ("excited", 1.0),
            ("glad", 0.8),
            ("delighted", 1.2),
            ("pleased", 0.8),
            ("cheerful", 1.0),
            ("thrilled", 1.2),
            ("ecstatic", 1.5),
            ("elated", 1.2),
            ("grateful", 0.8),
            ("proud", 0.8),
            ("fun", 0.6),
        ],
    ),
    (
        Emotion::Sadness,
        &[
            ("sad", 1.0),
            ("unhappy", 1.0),
            ("depressed", 1.2),
            ("down", 0.6),
            ("miserable", 1.2),
            ("upset", 0.8),
            ("lonely", 1.0),
            ("heartbroken", 1.5),
            ("devastated", 1.5),
            ("hurt", 0.8),
            ("disappointed", 1.0),
            ("crying", 1.0),
            ("grief", 1.2),
            ("hopeless", 1.2),
        ],
    ),
    (
        Emotion::Anger,
        &[
            ("angry", 1.0),
            ("mad", 1.0),
            ("furious", 1.5),
            ("annoyed", 0.8),
            ("irritated", 0.8),
            ("frustrated", 1.0),
            ("hate", 1.2),
            ("rage", 1.5),
            ("outraged", 1.5),
            ("resent", 1.0),
            ("disgusted", 1.0),
        ],
    ),
    (
        Emotion::Fear,
        &[
            ("afraid", 1.0),
            ("scared", 1.0),
            ("frightened", 1.2),
            ("worried", 0.8),
            ("anxious", 1.0),
            ("nervous", 0.8),
            ("terrified", 1.5),
            ("panic", 1.2),
            ("panicking", 1.2),
            ("dread", 1.2),
            ("fear", 1.0),
            ("stressed", 0.8),
        ],
    ),
    (
        Emotion::Love,
        &[
            ("love", 1.0),
            ("loving", 1.0),
            ("adore", 1.2),
            ("cherish", 1.2),
            ("affection", 1.0),
            ("fond", 0.8),
            ("caring", 0.8),
            ("romantic", 1.0),
            ("beloved", 1.0),
        ],
    ),
    (
        Emotion::Surprise,
        &[
            ("surprised", 1.0),
            ("amazed", 1.0),
            ("astonished", 1.2),
            ("shocked", 1.2),
            ("stunned", 1.2),
            ("unexpected", 0.8),
            ("wow", 0.8),
            ("speechless", 1.0),
        ],
    ),
    (
        Emotion::Neutral,
        &[
            ("okay", 0.6),
            ("ok", 0.6),
            ("fine", 0.6),
            ("alright", 0.6),
            ("neutral", 0.8),
            ("calm", 0.8),
            ("meh", 0.6),
        ],
    ),
];

const INTENSIFIERS: &[&str] = &[
    "very",
    "really",
    "so",
    "extremely",
    "incredibly",
    "super",
    "totally",
    "absolutely",
    "deeply",
    "truly",
];

const DIMINISHERS: &[&str] = &[
    "slightly",
    "somewhat",
    "kinda",
    "kind",
    "bit",
    "little",
    "barely",
    "mildly",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "dont", "cannot", "cant", "hardly", "neither", "nor", "without",
    "nothing",
];

const COMPOUNDS: &[(Emotion, &[&str])] = &[
    (
        Emotion::Joy,
        &[
            "happy and excited",
            "love and joy",
            "happy and grateful",
            "excited and happy",
        ],
    ),
    (
        Emotion::Sadness,
        &[
            "sad and lonely",
            "disappointed and hurt",
            "sad and angry",
            "upset and sad",
        ],
    ),
    (
        Emotion::Anger,
        &[
            "angry and frustrated",
            "mad and disappointed",
            "angry and upset",
            "furious and mad",
        ],
    ),
    (
        Emotion::Fear,
        &[
            "scared and worried",
            "afraid and anxious",
            "nervous and scared",
            "terrified and afraid",
        ],
    ),
    (
        Emotion::Surprise,
        &[
            "surprised and amazed",
            "shocked and surprised",
            "amazed and shocked",
        ],
    ),
];

const POSITIVE: &[&str] = &[
    "good",
    "great",
    "awesome",
    "wonderful",
    "fantastic",
    "amazing",
    "excellent",
    "positive",
];

const NEGATIVE: &[&str] = &["bad", "terrible", "awful", "horrible", "worst", "negative"];

const COMPOUND_BONUS: f64 = 2.0;
const INTENSIFIER_FACTOR: f64 = 1.5;
const DIMINISHER_FACTOR: f64 = 0.6;
const NEGATION_FACTOR: f64 = 0.3;
const INVERSION_FACTOR: f64 = 0.5;
const EXCLAMATION_FACTOR: f64 = 1.2;
const WEAK_SIGNAL: f64 = 0.5;
const WEAK_SIGNAL_CONFIDENCE: f64 = 0.4;

/// Keyword/pattern emotion classifier.
#[derive(Debug, Clone)]
pub struct LexiconClassifier {
    neutral_bias: f64,
    confidence_cap: f64,
    negation_window: usize,
    lookup: HashMap<&'static str, (Emotion, f64)>,
}

impl Default for LexiconClassifier {
    fn default() -> Self {
        Self::new(&LexiconConfig::default())
    }
}

impl LexiconClassifier {
    /// Build a classifier from lexicon settings.
    pub fn new(config: &LexiconConfig) -> Self {
        let lookup = KEYWORDS
            .iter()
            .flat_map(|(emotion, words)| {
                words
                    .iter()
                    .map(move |(word, weight)| (*word, (*emotion, *weight)))
            })
            .collect();
        Self {
            neutral_bias: config.neutral_bias.max(0.0),
            confidence_cap: config.confidence_cap.clamp(0.0, 1.0),
            negation_window: config.negation_window.max(1),
            lookup,
        }
    }

    /// Classify `text`. Always succeeds.
    pub fn classify(&self, text: &str) -> Classification {
        let scores = self.scores(text);

        let (top, top_score) = Emotion::ALL
            .iter()
            .map(|e| (*e, scores.get(e).copied().unwrap_or(0.0)))
            .fold((Emotion::Neutral, f64::MIN), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if top_score < WEAK_SIGNAL {
            return Classification::new(
                Emotion::Neutral,
                WEAK_SIGNAL_CONFIDENCE.min(self.confidence_cap),
                PROVIDER_LOCAL,
            );
        }

        let total: f64 = scores.values().sum();
        let confidence = if total > 0.0 {
            top_score / total
        } else {
            WEAK_SIGNAL_CONFIDENCE
        };
        Classification::new(top, confidence.min(self.confidence_cap), PROVIDER_LOCAL)
    }

    /// Accumulated weighted score per emotion.
    pub fn scores(&self, text: &str) -> HashMap<Emotion, f64> {
        let mut scores: HashMap<Emotion, f64> = Emotion::ALL.iter().map(|e| (*e, 0.0)).collect();
        let tokens = tokenize(text);

        for (i, token) in tokens.iter().enumerate() {
            let Some(&(emotion, weight)) = self.lookup.get(token.as_str()) else {
                continue;
            };

            let mut score = weight;
            if let Some(prev) = i.checked_sub(1).and_then(|p| tokens.get(p)) {
                if INTENSIFIERS.contains(&prev.as_str()) {
                    score *= INTENSIFIER_FACTOR;
                } else if DIMINISHERS.contains(&prev.as_str()) {
                    score *= DIMINISHER_FACTOR;
                }
            }

            let window_start = i.saturating_sub(self.negation_window);
            let negated = tokens[window_start..i].iter().any(|t| is_negation(t));
            if negated {
                if matches!(emotion, Emotion::Joy | Emotion::Love) {
                    *scores.entry(Emotion::Sadness).or_insert(0.0) += score * INVERSION_FACTOR;
                }
                score *= NEGATION_FACTOR;
            }

            *scores.entry(emotion).or_insert(0.0) += score;
        }

        let joined = tokens.join(" ");
        for (emotion, phrases) in COMPOUNDS {
            for phrase in *phrases {
                if contains_phrase(&joined, phrase) {
                    *scores.entry(*emotion).or_insert(0.0) += COMPOUND_BONUS;
                }
            }
        }

        let strongest = scores
            .iter()
            .filter(|(e, _)| **e != Emotion::Neutral)
            .map(|(_, s)| *s)
            .fold(0.0, f64::max);
        if strongest < 1.0 {
            let positive = tokens.iter().filter(|t| POSITIVE.contains(&t.as_str())).count();
            let negative = tokens.iter().filter(|t| NEGATIVE.contains(&t.as_str())).count();
            if positive > negative {
                *scores.entry(Emotion::Joy).or_insert(0.0) += 1.0;
            } else if negative > positive {
                *scores.entry(Emotion::Sadness).or_insert(0.0) += 1.0;
            }
        }

        if text.trim_end().ends_with('!') {
            let leader = Emotion::ALL
                .iter()
                .copied()
                .max_by(|a, b| {
                    let sa = scores.get(a).copied().unwrap_or(0.0);
                    let sb = scores.get(b).copied().unwrap_or(0.0);
                    sa.total_cmp(&sb)
                })
                .unwrap_or(Emotion::Neutral);
            if let Some(score) = scores.get_mut(&leader) {
                if *score > 0.0 {
                    *score *= EXCLAMATION_FACTOR;
                }
            }
        }

        *scores.entry(Emotion::Neutral).or_insert(0.0) += self.neutral_bias;
        scores
    }
}

/// Lowercase word tokens. Apostrophes are dropped so "don't" reads as "dont".
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(&token) || is_nt_contraction(token)
}

fn is_nt_contraction(token: &str) -> bool {
    matches!(
        token,
        "isnt" | "wasnt" | "arent" | "werent" | "doesnt" | "didnt" | "wont" | "wouldnt"
            | "shouldnt" | "couldnt" | "havent" | "hasnt" | "hadnt" | "aint"
    )
}

fn contains_phrase(joined: &str, phrase: &str) -> bool {
    format!(" {joined} ").contains(&format!(" {phrase} "))
}
