use chrono::{DateTime, Duration, Utc};

use super::confidence::LearningState;

pub const INITIAL_STRENGTH: u8 = 50;
pub const INITIAL_EASE: f64 = 2.5;
pub const MIN_EASE: f64 = 1.3;
pub const MASTERED_STRENGTH: u8 = 80;
pub const MAX_INTERVAL_DAYS: f64 = 180.0;

/// Spaced repetition state for one question and one learner
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSchedule {
    pub strength: u8,
    pub ease_factor: f64,
    pub interval_days: f64,
    pub review_count: u32,
    pub lapses: u32,
    pub next_review: DateTime<Utc>,
    pub last_state: Option<LearningState>,
}

impl ReviewSchedule {
    /// A fresh item, due immediately
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            strength: INITIAL_STRENGTH,
            ease_factor: INITIAL_EASE,
            interval_days: 0.0,
            review_count: 0,
            lapses: 0,
            next_review: now,
            last_state: None,
        }
    }

    /// Compute the schedule after the learner answers in `state`
    pub fn schedule_next(&self, state: LearningState, now: DateTime<Utc>) -> ReviewSchedule {
        let strength = (self.strength as i32 + state.strength_delta()).clamp(0, 100) as u8;

        // SM-2 ease update
        let q = state.quality().min(5) as f64;
        let ease = (self.ease_factor + 0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02)).max(MIN_EASE);

        let (interval, review_count, lapses) = if state.is_correct() {
            let base = match self.review_count {
                0 => 1.0,
                1 => 3.0,
                _ => self.interval_days * ease,
            };
            let interval = (base * state_factor(state)).clamp(1.0, MAX_INTERVAL_DAYS);
            (interval, self.review_count + 1, self.lapses)
        } else {
            let interval = if state == LearningState::Misconception {
                0.5
            } else {
                1.0
            };
            (interval, 0, self.lapses + 1)
        };

        let next_review = now + Duration::seconds((interval * 86_400.0).round() as i64);

        ReviewSchedule {
            strength,
            ease_factor: ease,
            interval_days: interval,
            review_count,
            lapses,
            next_review,
            last_state: Some(state),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    pub fn is_mastered(&self) -> bool {
        self.strength >= MASTERED_STRENGTH && self.last_state.is_some_and(|s| s.is_correct())
    }
}

/// Shrinks intervals for correct answers given without full confidence
fn state_factor(state: LearningState) -> f64 {
    match state {
        LearningState::Mastered => 1.0,
        LearningState::Developing => 0.8,
        LearningState::LuckyGuess => 0.5,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_new_item_is_due_now() {
        let s = ReviewSchedule::new(t0());
        assert!(s.is_due(t0()));
        assert_eq!(s.strength, INITIAL_STRENGTH);
        assert!(!s.is_mastered());
    }

    #[test]
    fn test_mastered_intervals_grow() {
        let s0 = ReviewSchedule::new(t0());
        let s1 = s0.schedule_next(LearningState::Mastered, t0());
        assert_eq!(s1.review_count, 1);
        assert!((s1.interval_days - 1.0).abs() < f64::EPSILON);
        assert_eq!(s1.next_review, t0() + Duration::days(1));

        let s2 = s1.schedule_next(LearningState::Mastered, s1.next_review);
        assert!((s2.interval_days - 3.0).abs() < f64::EPSILON);

        let s3 = s2.schedule_next(LearningState::Mastered, s2.next_review);
        assert!(s3.interval_days > s2.interval_days * 2.0);
        assert!(s3.ease_factor > INITIAL_EASE);
        assert!(s3.is_mastered());
    }

    #[test]
    fn test_lucky_guess_reviews_sooner_than_mastery() {
        let s0 = ReviewSchedule::new(t0());
        let sure = s0
            .schedule_next(LearningState::Mastered, t0())
            .schedule_next(LearningState::Mastered, t0());
        let guess = s0
            .schedule_next(LearningState::Mastered, t0())
            .schedule_next(LearningState::LuckyGuess, t0());
        assert!(guess.interval_days < sure.interval_days);
        assert!(guess.interval_days >= 1.0);
    }

    #[test]
    fn test_misconception_resets_and_comes_back_in_half_a_day() {
        let s = ReviewSchedule::new(t0())
            .schedule_next(LearningState::Mastered, t0())
            .schedule_next(LearningState::Mastered, t0());
        let after = s.schedule_next(LearningState::Misconception, t0());

        assert_eq!(after.review_count, 0);
        assert_eq!(after.lapses, 1);
        assert_eq!(after.next_review, t0() + Duration::hours(12));
        assert!(after.strength < s.strength);
        assert!(after.ease_factor < s.ease_factor);
        assert!(!after.is_mastered());
    }

    #[test]
    fn test_strength_is_clamped() {
        let mut s = ReviewSchedule::new(t0());
        for _ in 0..10 {
            s = s.schedule_next(LearningState::Misconception, t0());
        }
        assert_eq!(s.strength, 0);
        assert!(s.ease_factor >= MIN_EASE);

        for _ in 0..10 {
            s = s.schedule_next(LearningState::Mastered, t0());
        }
        assert_eq!(s.strength, 100);
        assert!(s.interval_days <= MAX_INTERVAL_DAYS);
    }

    #[test]
    fn test_knowledge_gap_waits_a_day() {
        let s = ReviewSchedule::new(t0()).schedule_next(LearningState::KnowledgeGap, t0());
        assert_eq!(s.next_review, t0() + Duration::days(1));
        assert_eq!(s.strength, 40);
    }
}
