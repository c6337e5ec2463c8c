// ==========================================
// OPME 对账报表 - 流水线配置读取 Trait
// ==========================================
// 职责: 定义导入/对账流水线所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::layout::SheetLayout;
use crate::config::pipeline_config::ExportConfig;
use crate::domain::types::{JoinMode, JoinModeSelection, NameMatchPolicy};
use crate::importer::error::ImportResult;

// ==========================================
// PipelineConfigReader Trait
// ==========================================
// 用途: 流水线所需的配置读取接口
// 实现者: ConfigManager
pub trait PipelineConfigReader: Send + Sync {
    /// 获取关联方式选择
    ///
    /// # 默认值
    /// - AUTO（按材料记录携带的关联键判定）
    fn get_join_mode(&self) -> ImportResult<JoinModeSelection>;

    /// 获取姓名匹配策略
    ///
    /// # 默认值
    /// - PERMISSIVE
    fn get_name_match_policy(&self) -> ImportResult<NameMatchPolicy>;

    /// 获取指定关联方式下的表格布局
    ///
    /// # 返回
    /// - (手术排程表布局, 材料表布局)，未覆写时为内置布局
    fn get_layouts(&self, mode: JoinMode) -> ImportResult<(SheetLayout, SheetLayout)>;

    /// 获取导出设置
    fn get_export_config(&self) -> ImportResult<ExportConfig>;
}
