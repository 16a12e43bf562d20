//! Exit code logic for the export process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use space_export_core::RunSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from a finished run.
pub(crate) fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.interrupted() {
        ProcessExit::Interrupted
    } else if summary.failed() == 0 {
        ProcessExit::Success
    } else if summary.succeeded() > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use space_export_core::{ExportOutcome, RunAggregator};

    use super::determine_exit_outcome;
    use crate::ProcessExit;

    fn summary(succeeded: usize, failed: usize, interrupted: bool) -> space_export_core::RunSummary {
        let mut aggregator = RunAggregator::new(succeeded + failed, false);
        for i in 0..succeeded {
            aggregator.observe(&ExportOutcome::cached(
                format!("OK{i}"),
                PathBuf::from(format!("/out/OK{i}.html.zip")),
            ));
        }
        for i in 0..failed {
            aggregator.observe(&ExportOutcome::failed(
                format!("BAD{i}"),
                "HTTP 500",
                3,
                Duration::ZERO,
            ));
        }
        if interrupted {
            aggregator.mark_interrupted();
        }
        aggregator.finalize()
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(&summary(3, 0, false)), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_nothing_exported() {
        assert_eq!(determine_exit_outcome(&summary(0, 0, false)), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(&summary(2, 1, false)), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(&summary(0, 2, false)), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_outcome_interrupted_wins() {
        assert_eq!(determine_exit_outcome(&summary(2, 1, true)), ProcessExit::Interrupted);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Partial.code(), 2);
        assert_eq!(ProcessExit::Interrupted.code(), 130);
    }
}
