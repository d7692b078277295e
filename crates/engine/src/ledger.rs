use tracing::{debug, info};

use crate::events::{EventBus, GameEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

impl Outcome {
    pub fn won(self) -> bool {
        matches!(self, Self::Won)
    }
}

/// Pass/fail thresholds derived once from the memory values present in the
/// scene. Re-deriving from the same scan yields the same thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub min_balance_for_good_ending: i32,
    pub max_accumulation_for_good_ending: i32,
    /// Sum of the non-negative memory values.
    pub total_positive_value: i32,
    /// Sum of the absolute memory values.
    pub total_absolute_value: i32,
}

/// Accumulates the two competing sentimental scores from player decisions.
#[derive(Debug, Default)]
pub struct ScoreLedger {
    balance: i32,
    accumulation: i32,
    thresholds: Option<Thresholds>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives the thresholds from the scene's memory values if they have not
    /// been derived yet, and publishes the current score pair. Safe to call
    /// any number of times.
    pub fn ensure_thresholds(
        &mut self,
        memory_values: &[i32],
        balance_pct: f32,
        accumulation_pct: f32,
        bus: &mut EventBus,
    ) -> Thresholds {
        let thresholds = match self.thresholds {
            Some(existing) => existing,
            None => {
                let mut total_positive: i32 = 0;
                let mut total_absolute: i32 = 0;
                for value in memory_values {
                    total_positive = total_positive.saturating_add((*value).max(0));
                    total_absolute = total_absolute.saturating_add(value.saturating_abs());
                }
                let derived = Thresholds {
                    min_balance_for_good_ending: (f64::from(total_positive)
                        * f64::from(balance_pct))
                    .ceil() as i32,
                    max_accumulation_for_good_ending: (f64::from(total_absolute)
                        * f64::from(accumulation_pct))
                    .floor() as i32,
                    total_positive_value: total_positive,
                    total_absolute_value: total_absolute,
                };
                info!(
                    min_balance = derived.min_balance_for_good_ending,
                    max_accumulation = derived.max_accumulation_for_good_ending,
                    total_positive,
                    total_absolute,
                    "sentimental thresholds derived"
                );
                self.thresholds = Some(derived);
                derived
            }
        };
        self.publish_scores(bus);
        thresholds
    }

    /// Applies one kept/discarded decision about a memory entity:
    /// - kept: accumulation grows by |value|; a kept bad memory also drags
    ///   the balance down by |value|.
    /// - discarded: a discarded good memory drags the balance down by its
    ///   value; a discarded bad memory improves the balance by |value|.
    pub fn apply_decision(&mut self, kept: bool, value: i32, bus: &mut EventBus) {
        let absolute = value.saturating_abs();
        if kept {
            self.accumulation = self.accumulation.saturating_add(absolute);
            if value < 0 {
                self.balance = self.balance.saturating_sub(absolute);
            }
        } else if value > 0 {
            self.balance = self.balance.saturating_sub(value);
        } else {
            self.balance = self.balance.saturating_add(absolute);
        }
        debug!(
            kept,
            value,
            balance = self.balance,
            accumulation = self.accumulation,
            "memory decision applied"
        );
        self.publish_scores(bus);
    }

    /// Decides the ending from the current scores. Accumulation above its
    /// maximum is an automatic loss regardless of balance; otherwise the
    /// balance must reach its minimum. Pure in the current state: repeated
    /// calls give the same answer.
    pub fn evaluate(&self) -> Outcome {
        let thresholds = self.thresholds.unwrap_or_default();
        if self.accumulation > thresholds.max_accumulation_for_good_ending {
            Outcome::Lost
        } else if self.balance >= thresholds.min_balance_for_good_ending {
            Outcome::Won
        } else {
            Outcome::Lost
        }
    }

    /// Debug path: a score pair that deterministically passes evaluation.
    /// Thresholds must have been ensured first.
    pub fn apply_ideal_score(&mut self, bus: &mut EventBus) {
        let thresholds = self.thresholds.unwrap_or_default();
        self.balance = thresholds.min_balance_for_good_ending.saturating_add(50);
        self.accumulation = 10.min(thresholds.max_accumulation_for_good_ending);
        info!(
            balance = self.balance,
            accumulation = self.accumulation,
            "ideal score applied"
        );
        self.publish_scores(bus);
    }

    pub fn balance(&self) -> i32 {
        self.balance
    }

    pub fn accumulation(&self) -> i32 {
        self.accumulation
    }

    pub fn thresholds(&self) -> Option<Thresholds> {
        self.thresholds
    }

    pub(crate) fn publish_scores(&self, bus: &mut EventBus) {
        bus.publish(&GameEvent::ScoresChanged {
            balance: self.balance,
            accumulation: self.accumulation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensured_ledger(memory_values: &[i32], balance_pct: f32, accumulation_pct: f32) -> ScoreLedger {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.ensure_thresholds(memory_values, balance_pct, accumulation_pct, &mut bus);
        ledger
    }

    #[test]
    fn thresholds_use_ceil_for_balance_and_floor_for_accumulation() {
        let ledger = ensured_ledger(&[100, -50, 33], 0.8, 0.5);
        let thresholds = ledger.thresholds().expect("thresholds");
        // positive pool 133, absolute pool 183
        assert_eq!(thresholds.total_positive_value, 133);
        assert_eq!(thresholds.total_absolute_value, 183);
        assert_eq!(thresholds.min_balance_for_good_ending, 107); // ceil(106.4)
        assert_eq!(thresholds.max_accumulation_for_good_ending, 91); // floor(91.5)
    }

    #[test]
    fn ensure_thresholds_is_idempotent() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        let first = ledger.ensure_thresholds(&[40, -10], 0.8, 0.5, &mut bus);
        // A later call with a different-looking scan must not re-derive.
        let second = ledger.ensure_thresholds(&[999], 0.8, 0.5, &mut bus);
        assert_eq!(first, second);
        assert_eq!(ledger.thresholds(), Some(first));
    }

    #[test]
    fn keeping_a_good_memory_only_accumulates() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.apply_decision(true, 30, &mut bus);
        assert_eq!(ledger.balance(), 0);
        assert_eq!(ledger.accumulation(), 30);
    }

    #[test]
    fn keeping_a_bad_memory_accumulates_and_worsens_balance() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.apply_decision(true, -50, &mut bus);
        assert_eq!(ledger.balance(), -50);
        assert_eq!(ledger.accumulation(), 50);
    }

    #[test]
    fn discarding_a_good_memory_worsens_balance() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.apply_decision(false, 100, &mut bus);
        assert_eq!(ledger.balance(), -100);
        assert_eq!(ledger.accumulation(), 0);
    }

    #[test]
    fn discarding_a_bad_memory_improves_balance() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.apply_decision(false, -40, &mut bus);
        assert_eq!(ledger.balance(), 40);
        assert_eq!(ledger.accumulation(), 0);
    }

    #[test]
    fn accumulation_over_max_loses_regardless_of_balance() {
        let mut ledger = ensured_ledger(&[10, -60, -40], 0.8, 0.5);
        let mut bus = EventBus::new();
        // Balance far above the minimum, accumulation past the maximum.
        ledger.apply_decision(false, -60, &mut bus);
        ledger.apply_decision(false, -40, &mut bus);
        ledger.apply_decision(true, 10, &mut bus);
        ledger.accumulation = 100; // past max_accumulation 55
        assert_eq!(ledger.evaluate(), Outcome::Lost);
    }

    #[test]
    fn evaluate_is_pure_in_the_current_state() {
        let mut ledger = ensured_ledger(&[10, -60], 0.8, 0.5);
        let mut bus = EventBus::new();
        ledger.apply_decision(false, -60, &mut bus);
        ledger.apply_decision(true, 10, &mut bus);
        let first = ledger.evaluate();
        let second = ledger.evaluate();
        assert_eq!(first, Outcome::Won);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_memory_pool_makes_zero_scores_a_win() {
        let ledger = ensured_ledger(&[], 0.8, 0.5);
        assert_eq!(ledger.evaluate(), Outcome::Won);
    }

    #[test]
    fn scores_are_published_after_every_decision() {
        let mut ledger = ScoreLedger::new();
        let mut bus = EventBus::new();
        ledger.apply_decision(true, 5, &mut bus);
        ledger.apply_decision(false, -5, &mut bus);
        assert_eq!(bus.publish_counts().scores_changed, 2);
    }
}
