//! Cadence logic for automatic maintenance analysis.

/// Number of ingested samples between automatic analyses
pub const DEFAULT_THRESHOLD: usize = 10;

/// Counts ingested samples and fires once every `threshold` of them.
///
/// Manual "run now" requests bypass the trigger entirely, so they never
/// reset or advance the count.
#[derive(Debug, Clone)]
pub struct AnalysisTrigger {
    threshold: usize,
    count: usize,
    fired: u64,
}

impl Default for AnalysisTrigger {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AnalysisTrigger {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            count: 0,
            fired: 0,
        }
    }

    /// Record one successful ingestion. Returns `true` when the threshold was
    /// reached, in which case the count has already been reset to zero.
    pub fn record(&mut self) -> bool {
        self.count += 1;
        if self.count == self.threshold {
            self.count = 0;
            self.fired += 1;
            true
        } else {
            false
        }
    }

    /// Samples counted toward the next automatic analysis
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Automatic analyses fired so far
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_count(trigger: &mut AnalysisTrigger, n: usize) -> usize {
        (0..n).filter(|_| trigger.record()).count()
    }

    #[test]
    fn nine_records_do_not_fire() {
        let mut trigger = AnalysisTrigger::default();
        assert_eq!(fire_count(&mut trigger, 9), 0);
        assert_eq!(trigger.count(), 9);
    }

    #[test]
    fn tenth_record_fires_and_resets() {
        let mut trigger = AnalysisTrigger::default();
        assert_eq!(fire_count(&mut trigger, 10), 1);
        assert_eq!(trigger.count(), 0);
        assert_eq!(trigger.fired(), 1);
    }

    #[test]
    fn twenty_five_records_fire_twice() {
        let mut trigger = AnalysisTrigger::default();
        let fired_at: Vec<usize> = (1..=25).filter(|_| trigger.record()).collect();
        assert_eq!(fired_at, vec![10, 20]);
        assert_eq!(trigger.count(), 5);
    }

    #[test]
    fn custom_threshold() {
        let mut trigger = AnalysisTrigger::new(3);
        assert_eq!(fire_count(&mut trigger, 7), 2);
        assert_eq!(trigger.count(), 1);
    }
}
