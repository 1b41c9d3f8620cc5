//! Adaptive round timing and difficulty (component D, spec.md §4.D.3).
//!
//! After a window of `W` finalized rounds, `T_c`/`T_r` are rescaled by
//! `clamp(target / avg, 0.9, 1.1)` and the leader-selection difficulty is
//! nudged within `[1, 100]` toward the configured target winner rate.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

pub const ADJUSTMENT_WINDOW: usize = 10;
const MIN_ADJUSTMENT: f64 = 0.9;
const MAX_ADJUSTMENT: f64 = 1.1;
const MIN_DIFFICULTY: u64 = 1;
const MAX_DIFFICULTY: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct RoundTiming {
    pub commit_seconds: u64,
    pub reveal_seconds: u64,
}

pub struct DynamicTiming {
    round_durations: Arc<RwLock<VecDeque<u64>>>,
    target_round_seconds: u64,
    current: RwLock<RoundTiming>,
    difficulty: RwLock<u64>,
    had_winner_history: Arc<RwLock<VecDeque<bool>>>,
}

impl DynamicTiming {
    pub fn new(target_round_seconds: u64, base_commit_seconds: u64, base_reveal_seconds: u64) -> Self {
        Self {
            round_durations: Arc::new(RwLock::new(VecDeque::new())),
            target_round_seconds,
            current: RwLock::new(RoundTiming {
                commit_seconds: base_commit_seconds,
                reveal_seconds: base_reveal_seconds,
            }),
            difficulty: RwLock::new(MIN_DIFFICULTY),
            had_winner_history: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub fn record_finalized_round(&self, duration_seconds: u64, had_winner: bool) {
        {
            let mut durations = self.round_durations.write();
            durations.push_back(duration_seconds);
            while durations.len() > ADJUSTMENT_WINDOW {
                durations.pop_front();
            }
        }
        {
            let mut history = self.had_winner_history.write();
            history.push_back(had_winner);
            while history.len() > ADJUSTMENT_WINDOW {
                history.pop_front();
            }
        }

        if self.round_durations.read().len() == ADJUSTMENT_WINDOW {
            self.rescale_timing();
            self.adjust_difficulty();
        }
    }

    fn rescale_timing(&self) {
        let durations = self.round_durations.read();
        let avg = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
        if avg <= 0.0 {
            return;
        }
        let factor = (self.target_round_seconds as f64 / avg).clamp(MIN_ADJUSTMENT, MAX_ADJUSTMENT);

        let mut current = self.current.write();
        current.commit_seconds = ((current.commit_seconds as f64) * factor).round() as u64;
        current.reveal_seconds = ((current.reveal_seconds as f64) * factor).round() as u64;
    }

    fn adjust_difficulty(&self) {
        let history = self.had_winner_history.read();
        let win_rate = history.iter().filter(|&&w| w).count() as f64 / history.len() as f64;
        let mut difficulty = self.difficulty.write();

        if win_rate > 0.5 {
            *difficulty = (*difficulty + 1).min(MAX_DIFFICULTY);
        } else if win_rate < 0.2 {
            *difficulty = difficulty.saturating_sub(1).max(MIN_DIFFICULTY);
        }
    }

    pub fn current_timing(&self) -> RoundTiming {
        *self.current.read()
    }

    pub fn current_difficulty(&self) -> u64 {
        *self.difficulty.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_unchanged_before_window_fills() {
        let timing = DynamicTiming::new(90, 30, 30);
        for _ in 0..ADJUSTMENT_WINDOW - 1 {
            timing.record_finalized_round(200, true);
        }
        let t = timing.current_timing();
        assert_eq!(t.commit_seconds, 30);
        assert_eq!(t.reveal_seconds, 30);
    }

    #[test]
    fn slow_rounds_lengthen_timing_within_clamp() {
        let timing = DynamicTiming::new(90, 30, 30);
        for _ in 0..ADJUSTMENT_WINDOW {
            timing.record_finalized_round(200, true);
        }
        let t = timing.current_timing();
        // factor clamps at 1.1
        assert_eq!(t.commit_seconds, 33);
    }

    #[test]
    fn difficulty_stays_within_bounds() {
        let timing = DynamicTiming::new(90, 30, 30);
        for _ in 0..100 {
            timing.record_finalized_round(90, true);
        }
        assert!(timing.current_difficulty() <= MAX_DIFFICULTY);
        assert!(timing.current_difficulty() >= MIN_DIFFICULTY);
    }
}
