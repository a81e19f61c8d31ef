//! Learner analytics computed from answered questions.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::confidence::{ConfidenceLevel, LearningState, Priority};

/// Gap between confidence and accuracy that counts as miscalibrated
const CALIBRATION_TOLERANCE: f64 = 0.15;

/// One answered question, as stored after a quiz or review
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    pub question_id: i64,
    pub prompt: String,
    pub concept: String,
    pub correct: bool,
    pub confidence: ConfidenceLevel,
    pub state: LearningState,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationLabel {
    Overconfident,
    Underconfident,
    WellCalibrated,
}

impl CalibrationLabel {
    pub fn describe(&self) -> &'static str {
        match self {
            CalibrationLabel::Overconfident => "Overconfident: you feel surer than your results",
            CalibrationLabel::Underconfident => "Underconfident: you know more than you think",
            CalibrationLabel::WellCalibrated => "Well calibrated: your confidence matches your results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBucket {
    pub level: ConfidenceLevel,
    pub answered: usize,
    pub correct: usize,
}

impl ConfidenceBucket {
    pub fn accuracy(&self) -> Option<f64> {
        if self.answered == 0 {
            None
        } else {
            Some(self.correct as f64 / self.answered as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub buckets: Vec<ConfidenceBucket>,
    pub mean_confidence: f64,
    pub accuracy: f64,
    /// Positive when confidence runs ahead of accuracy
    pub calibration_gap: f64,
}

impl Calibration {
    pub fn label(&self) -> CalibrationLabel {
        if self.calibration_gap > CALIBRATION_TOLERANCE {
            CalibrationLabel::Overconfident
        } else if self.calibration_gap < -CALIBRATION_TOLERANCE {
            CalibrationLabel::Underconfident
        } else {
            CalibrationLabel::WellCalibrated
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptStats {
    pub concept: String,
    pub attempts: usize,
    pub correct: usize,
    pub misconceptions: usize,
    pub dominant_state: LearningState,
}

impl ConceptStats {
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MisconceptionSummary {
    pub question_id: i64,
    pub prompt: String,
    pub concept: String,
    pub latest_state: LearningState,
    pub occurrences: usize,
    pub last_seen: DateTime<Utc>,
}

impl MisconceptionSummary {
    pub fn priority(&self) -> Priority {
        self.latest_state.priority()
    }
}

pub fn accuracy(records: &[ResponseRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().filter(|r| r.correct).count() as f64 / records.len() as f64
}

pub fn calibration(records: &[ResponseRecord]) -> Calibration {
    let buckets: Vec<ConfidenceBucket> = ConfidenceLevel::ALL
        .iter()
        .map(|level| {
            let matching = records.iter().filter(|r| r.confidence == *level);
            let (answered, correct) =
                matching.fold((0, 0), |(n, c), r| (n + 1, c + usize::from(r.correct)));
            ConfidenceBucket {
                level: *level,
                answered,
                correct,
            }
        })
        .collect();

    let mean_confidence = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.confidence.weight()).sum::<f64>() / records.len() as f64
    };
    let accuracy = accuracy(records);

    Calibration {
        buckets,
        mean_confidence,
        accuracy,
        calibration_gap: mean_confidence - accuracy,
    }
}

pub fn state_distribution(records: &[ResponseRecord]) -> BTreeMap<LearningState, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.state).or_insert(0) += 1;
    }
    counts
}

/// Per-concept results, weakest concept first
pub fn concept_breakdown(records: &[ResponseRecord]) -> Vec<ConceptStats> {
    let mut grouped: HashMap<&str, Vec<&ResponseRecord>> = HashMap::new();
    for record in records {
        grouped.entry(record.concept.as_str()).or_default().push(record);
    }

    let mut stats: Vec<ConceptStats> = grouped
        .into_iter()
        .map(|(concept, items)| {
            let mut state_counts: BTreeMap<LearningState, usize> = BTreeMap::new();
            for item in &items {
                *state_counts.entry(item.state).or_insert(0) += 1;
            }
            // Ties go to the more urgent state
            let dominant_state = state_counts
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(a.0.priority().cmp(&b.0.priority())))
                .map(|(state, _)| *state)
                .unwrap_or(LearningState::Developing);

            ConceptStats {
                concept: concept.to_string(),
                attempts: items.len(),
                correct: items.iter().filter(|r| r.correct).count(),
                misconceptions: items
                    .iter()
                    .filter(|r| r.state == LearningState::Misconception)
                    .count(),
                dominant_state,
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        a.accuracy()
            .partial_cmp(&b.accuracy())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.attempts.cmp(&a.attempts))
            .then(a.concept.cmp(&b.concept))
    });
    stats
}

/// Questions whose most recent answer was wrong, most urgent first
pub fn misconceptions(records: &[ResponseRecord]) -> Vec<MisconceptionSummary> {
    let mut by_question: HashMap<i64, Vec<&ResponseRecord>> = HashMap::new();
    for record in records {
        by_question.entry(record.question_id).or_default().push(record);
    }

    let mut open: Vec<MisconceptionSummary> = by_question
        .into_values()
        .filter_map(|mut items| {
            items.sort_by_key(|r| r.answered_at);
            let latest = *items.last()?;
            if latest.correct {
                return None;
            }
            Some(MisconceptionSummary {
                question_id: latest.question_id,
                prompt: latest.prompt.clone(),
                concept: latest.concept.clone(),
                latest_state: latest.state,
                occurrences: items.iter().filter(|r| !r.correct).count(),
                last_seen: latest.answered_at,
            })
        })
        .collect();

    open.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then(b.occurrences.cmp(&a.occurrences))
            .then(b.last_seen.cmp(&a.last_seen))
    });
    open
}

/// Consecutive days with activity, ending today (or yesterday if today is empty)
pub fn study_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let active: BTreeSet<NaiveDate> = days.iter().copied().collect();

    let mut cursor = if active.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while active.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}
