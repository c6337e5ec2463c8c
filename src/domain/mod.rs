// ==========================================
// OPME 对账报表 - 领域模型层
// ==========================================
// 职责: 定义单元格网格、记录、报表等领域实体
// 红线: 不含解析逻辑,不含对账逻辑
// ==========================================

pub mod grid;
pub mod record;
pub mod report;
pub mod types;

// 重导出核心类型
pub use grid::{CellGrid, CellValue};
pub use record::{CaseRecord, MaterialRecord, DEFAULT_COST, DEFAULT_QUANTITY, UNKNOWN_TEXT};
pub use report::{CombinedReportEntry, ExportRow, ExportValue, ReportSummary, StageOutcome};
pub use types::{JoinMode, JoinModeSelection, NameMatchPolicy, PipelineStage, RecordKind};
