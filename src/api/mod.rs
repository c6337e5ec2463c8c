// ==========================================
// OPME 对账报表 - API 层
// ==========================================
// 职责: 提供报表会话接口，供 CLI / 界面调用
// ==========================================

pub mod error;
pub mod notifier;
pub mod report_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use notifier::{CollectingNotifier, OutcomeNotifier, TracingNotifier};
pub use report_api::{GeneratedReport, ReportApi};
