use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// Where a writer stands in a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalState {
    NoStepsYet,
    /// Steps `0..next` are written
    StepsInProgress { next: usize },
    Finalized,
}

/// Enforces that steps are written once each, in order, starting from zero.
#[derive(Debug, Clone)]
pub struct TemporalController {
    state: TemporalState,
}

impl Default for TemporalController {
    fn default() -> Self {
        Self {
            state: TemporalState::NoStepsYet,
        }
    }
}

impl TemporalController {
    pub fn state(&self) -> TemporalState {
        self.state
    }

    /// Number of committed steps.
    pub fn steps_written(&self) -> usize {
        match self.state {
            TemporalState::NoStepsYet => 0,
            TemporalState::StepsInProgress { next } => next,
            TemporalState::Finalized => 0,
        }
    }

    /// Checks that step `index` may be written now.
    pub fn check_step(&self, index: usize) -> VtkHdfResult<()> {
        let expected = match self.state {
            TemporalState::NoStepsYet => 0,
            TemporalState::StepsInProgress { next } => next,
            TemporalState::Finalized => {
                vtkhdf_bail!(SequenceError: "step {index} written after the series was finished")
            }
        };
        if index < expected {
            vtkhdf_bail!(SequenceError: "step {index} was already written");
        }
        if index > expected {
            vtkhdf_bail!(SequenceError: "step {index} written before step {expected}");
        }
        Ok(())
    }

    /// Records that the checked step is complete.
    pub fn commit_step(&mut self) {
        self.state = TemporalState::StepsInProgress {
            next: self.steps_written() + 1,
        };
    }

    pub fn finalize(&mut self) {
        self.state = TemporalState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use vtkhdf_error::VtkHdfError;

    use super::*;

    #[test]
    fn steps_run_in_order() {
        let mut controller = TemporalController::default();
        assert_eq!(controller.state(), TemporalState::NoStepsYet);
        assert!(matches!(
            controller.check_step(1).unwrap_err(),
            VtkHdfError::SequenceError(..)
        ));
        controller.check_step(0).unwrap();
        controller.commit_step();
        controller.check_step(1).unwrap();
        controller.commit_step();
        assert_eq!(controller.state(), TemporalState::StepsInProgress { next: 2 });
        assert!(controller.check_step(1).is_err());
        assert!(controller.check_step(3).is_err());
        controller.finalize();
        assert!(controller.check_step(2).is_err());
    }
}
