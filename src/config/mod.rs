// ==========================================
// OPME 对账报表 - 配置层
// ==========================================
// 职责: 表格布局、流水线配置、配置加载与覆写
// 存储: JSON 文件（可选）
// ==========================================

pub mod config_manager;
pub mod import_config_trait;
pub mod layout;
pub mod pipeline_config;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::PipelineConfigReader;
pub use layout::{FieldRule, FieldSpec, RecordField, RowFilterRule, SheetLayout};
pub use pipeline_config::{ExportConfig, LayoutOverrides, ModeLayouts, PipelineConfig};
