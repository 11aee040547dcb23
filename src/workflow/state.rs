//! 单个提交的状态机
//!
//! `Raw → Normalized → Classified → GuardrailChecked → Graded | Rejected | Failed`
//!
//! 任何非终态都可以进入 `Failed`；不允许回到更早的状态

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Raw,
    Normalized,
    Classified,
    GuardrailChecked,
    Graded,
    Rejected,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SubmissionState::Graded | SubmissionState::Rejected | SubmissionState::Failed
        )
    }

    /// 是否允许从当前状态迁移到 `next`
    pub fn can_transition_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (Raw, Normalized)
                | (Normalized, Classified)
                | (Classified, GuardrailChecked)
                | (GuardrailChecked, Graded)
                | (GuardrailChecked, Rejected)
        )
    }
}

/// 状态轨迹
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTracker {
    history: Vec<SubmissionState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            history: vec![SubmissionState::Raw],
        }
    }

    pub fn current(&self) -> SubmissionState {
        self.history
            .last()
            .copied()
            .unwrap_or(SubmissionState::Raw)
    }

    /// 迁移状态，非法迁移会被忽略并返回 false
    pub fn advance(&mut self, next: SubmissionState) -> bool {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!("忽略非法状态迁移: {:?} → {:?}", current, next);
            return false;
        }
        self.history.push(next);
        true
    }

    pub fn history(&self) -> &[SubmissionState] {
        &self.history
    }

    pub fn into_history(self) -> Vec<SubmissionState> {
        self.history
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubmissionState::*;

    #[test]
    fn test_happy_path() {
        let mut tracker = StateTracker::new();
        for next in [Normalized, Classified, GuardrailChecked, Graded] {
            assert!(tracker.advance(next));
        }
        assert_eq!(
            tracker.history(),
            &[Raw, Normalized, Classified, GuardrailChecked, Graded]
        );
    }

    #[test]
    fn test_any_non_terminal_state_can_fail() {
        for state in [Raw, Normalized, Classified, GuardrailChecked] {
            assert!(state.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_no_backwards_or_skipping() {
        assert!(!Classified.can_transition_to(Normalized));
        assert!(!Raw.can_transition_to(Classified));
        assert!(!Normalized.can_transition_to(Rejected));
        assert!(!Graded.can_transition_to(Failed));

        let mut tracker = StateTracker::new();
        assert!(tracker.advance(Failed));
        assert!(!tracker.advance(Normalized));
        assert_eq!(tracker.current(), Failed);
    }
}
