// ==========================================
// OPME 对账报表 - 阶段结果通知
// ==========================================
// 职责: 把每个阶段的 StageOutcome 交给展示方（日志 / UI / 测试）
// ==========================================

use crate::domain::report::StageOutcome;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

// ==========================================
// OutcomeNotifier Trait
// ==========================================
// 实现者: TracingNotifier, CollectingNotifier
pub trait OutcomeNotifier: Send + Sync {
    fn notify(&self, outcome: &StageOutcome);
}

/// 以 tracing 日志输出阶段结果
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl OutcomeNotifier for TracingNotifier {
    fn notify(&self, outcome: &StageOutcome) {
        if outcome.success {
            info!(
                run_id = %outcome.run_id,
                stage = %outcome.stage,
                records = outcome.record_count,
                "{}",
                outcome.message
            );
        } else {
            warn!(
                run_id = %outcome.run_id,
                stage = %outcome.stage,
                "{}",
                outcome.message
            );
        }
    }
}

/// 收集阶段结果（供 UI 轮询或测试断言）
#[derive(Debug, Default, Clone)]
pub struct CollectingNotifier {
    outcomes: Arc<Mutex<Vec<StageOutcome>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已收集结果的副本
    pub fn outcomes(&self) -> Vec<StageOutcome> {
        self.outcomes
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<StageOutcome> {
        self.outcomes
            .lock()
            .ok()
            .and_then(|guard| guard.last().cloned())
    }
}

impl OutcomeNotifier for CollectingNotifier {
    fn notify(&self, outcome: &StageOutcome) {
        if let Ok(mut guard) = self.outcomes.lock() {
            guard.push(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::PipelineStage;

    #[test]
    fn test_collecting_notifier_shares_state_between_clones() {
        let notifier = CollectingNotifier::new();
        let handle = notifier.clone();

        notifier.notify(&StageOutcome::success(PipelineStage::SurgicalMapUpload, 3, "ok"));
        notifier.notify(&StageOutcome::failure(PipelineStage::Export, "falhou"));

        let outcomes = handle.outcomes();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].success);
        assert_eq!(handle.last().map(|o| o.stage), Some(PipelineStage::Export));
    }

    #[test]
    fn test_tracing_notifier_does_not_panic() {
        crate::logging::init_test();
        TracingNotifier.notify(&StageOutcome::success(PipelineStage::Export, 1, "ok"));
        TracingNotifier.notify(&StageOutcome::failure(PipelineStage::Export, "erro"));
    }
}
