use crate::populations::FitnessError;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// Sentinel fitness carried by organisms the host has not scored yet.
pub(crate) const UNSET_FITNESS: f32 = -1.0;

/// One generation's worth of write-back cells, one per live organism.
///
/// The engine holds the owning [`Arc`] and replaces it at generation
/// turnover, which invalidates every outstanding handle at once. Cells are
/// `f32` bit patterns behind atomics so evaluations of distinct networks
/// may report from different threads.
#[derive(Debug)]
pub(crate) struct FitnessLedger {
    slots: Vec<AtomicU32>,
}

impl FitnessLedger {
    pub(crate) fn new(organisms: usize) -> FitnessLedger {
        FitnessLedger {
            slots: (0..organisms)
                .map(|_| AtomicU32::new(UNSET_FITNESS.to_bits()))
                .collect(),
        }
    }

    pub(crate) fn get(&self, index: usize) -> f32 {
        f32::from_bits(self.slots[index].load(Ordering::Relaxed))
    }

    fn set(&self, index: usize, value: f32) {
        self.slots[index].store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Write-back channel from one network evaluation to its organism.
///
/// Handles go stale the moment the engine turns the generation over; a
/// stale handle refuses the report instead of touching a dead organism.
#[derive(Debug, Clone)]
pub struct FitnessHandle {
    ledger: Weak<FitnessLedger>,
    index: usize,
}

impl FitnessHandle {
    pub(crate) fn new(ledger: &Arc<FitnessLedger>, index: usize) -> FitnessHandle {
        FitnessHandle { ledger: Arc::downgrade(ledger), index }
    }

    /// Records `fitness` for the organism this handle was issued for.
    pub fn set_fitness(&self, fitness: f32) -> Result<(), FitnessError> {
        let ledger = self.ledger.upgrade().ok_or(FitnessError::StaleGeneration)?;
        if fitness.is_nan() || fitness < 0.0 {
            return Err(FitnessError::InvalidValue(fitness));
        }
        ledger.set(self.index, fitness);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_zero_is_a_valid_fitness() {
        let ledger = Arc::new(FitnessLedger::new(1));
        let handle = FitnessHandle::new(&ledger, 0);
        assert!(handle.set_fitness(-0.0).is_ok());
        assert_eq!(ledger.get(0), 0.0);
    }

    #[test]
    fn negative_and_nan_values_are_refused() {
        let ledger = Arc::new(FitnessLedger::new(1));
        let handle = FitnessHandle::new(&ledger, 0);
        assert_eq!(handle.set_fitness(-1.0), Err(FitnessError::InvalidValue(-1.0)));
        assert!(handle.set_fitness(f32::NAN).is_err());
        assert_eq!(ledger.get(0), UNSET_FITNESS);
    }

    #[test]
    fn dropping_the_ledger_invalidates_handles() {
        let ledger = Arc::new(FitnessLedger::new(2));
        let handle = FitnessHandle::new(&ledger, 1);
        assert!(handle.set_fitness(3.0).is_ok());
        drop(ledger);
        assert_eq!(handle.set_fitness(4.0), Err(FitnessError::StaleGeneration));
    }
}
