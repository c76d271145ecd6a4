//! The four pipeline stage workers (Discovery, Preparation, Generation,
//! Posting) and the placeholder renderer they share.
//!
//! Workers never hold a database transaction open across an HTTP or LLM
//! call: each item is read, acted on outside any transaction, then written
//! back as a single-row update.

pub mod discovery;
pub mod generation;
pub mod placeholders;
pub mod posting;
pub mod preparation;

/// Coarse outcome of a single stage worker invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageOutcome {
    /// No item failed (including the case of zero items to process).
    Success,
    /// At least one item failed and at least one item advanced.
    Partial,
    /// The stage worker itself threw before any item could be processed.
    Failed,
}

/// The result record returned by every stage worker.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StageResult {
    /// Number of items that advanced to the next stage.
    pub advanced: u32,
    /// Number of items that were marked failed.
    pub failed: u32,
    /// Human-readable error messages collected along the way.
    pub errors: Vec<String>,
    /// Wall-clock time the stage took, in milliseconds.
    pub elapsed_ms: u64,
    /// Coarse outcome, derived from `advanced`/`failed`.
    pub status: StageOutcome,
}

impl StageResult {
    fn new(advanced: u32, failed: u32, errors: Vec<String>, elapsed_ms: u64) -> Self {
        let status = if failed > 0 && advanced > 0 {
            StageOutcome::Partial
        } else {
            StageOutcome::Success
        };
        Self {
            advanced,
            failed,
            errors,
            elapsed_ms,
            status,
        }
    }

    /// Build the result record for a stage that threw before any item could
    /// be processed.
    pub fn stage_exception(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            advanced: 0,
            failed: 0,
            errors: vec![message.into()],
            elapsed_ms,
            status: StageOutcome::Failed,
        }
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_when_nothing_failed() {
        let result = StageResult::new(3, 0, vec![], 10);
        assert_eq!(result.status, StageOutcome::Success);
    }

    #[test]
    fn success_when_nothing_to_do() {
        let result = StageResult::new(0, 0, vec![], 1);
        assert_eq!(result.status, StageOutcome::Success);
    }

    #[test]
    fn partial_when_some_advanced_and_some_failed() {
        let result = StageResult::new(2, 1, vec!["item x failed".to_string()], 10);
        assert_eq!(result.status, StageOutcome::Partial);
    }

    #[test]
    fn stage_exception_is_always_failed() {
        let result = StageResult::stage_exception("database unreachable", 5);
        assert_eq!(result.status, StageOutcome::Failed);
        assert_eq!(result.advanced, 0);
        assert_eq!(result.errors, vec!["database unreachable".to_string()]);
    }
}
