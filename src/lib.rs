// ==========================================
// OPME 对账报表 - 核心库
// ==========================================
// 流程: 手术排程表 + OPME 材料表 → 合并报表 → Excel 导出
// 技术栈: calamine / csv 读入，rust_xlsxwriter 写出
// 系统定位: 派生报表工具（不做持久化）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 记录与报表类型
pub mod domain;

// 导入层 - 外部表格
pub mod importer;

// 配置层 - 布局与流水线配置
pub mod config;

// 引擎层 - 对账与导出
pub mod engine;

// 日志系统
pub mod logging;

// API 层 - 报表会话
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{JoinMode, JoinModeSelection, NameMatchPolicy, PipelineStage, RecordKind};

// 领域实体
pub use domain::{
    CaseRecord, CellGrid, CellValue, CombinedReportEntry, ExportRow, MaterialRecord,
    ReportSummary, StageOutcome,
};

// 配置
pub use config::{ConfigManager, PipelineConfig, SheetLayout};

// 导入
pub use importer::{ImportError, ImportResult, RowExtractor};

// 引擎
pub use engine::{Exporter, Reconciler, XlsxReportWriter, EXPORT_COLUMNS};

// API
pub use api::{ApiError, ApiResult, ReportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "OPME 对账报表";
