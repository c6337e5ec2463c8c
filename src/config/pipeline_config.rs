// ==========================================
// OPME 对账报表 - 流水线配置
// ==========================================
// 职责: 关联方式 / 姓名匹配策略 / 布局覆写 / 导出设置
// 格式: JSON，缺失的键回退默认值
// ==========================================

use crate::config::layout::SheetLayout;
use crate::domain::types::{JoinMode, JoinModeSelection, NameMatchPolicy};
use serde::{Deserialize, Serialize};

/// 导出文件名默认前缀
pub const DEFAULT_FILE_PREFIX: &str = "report";

/// 导出工作表默认名称
pub const DEFAULT_SHEET_NAME: &str = "Relatório OPME";

/// 病例无关联材料时材料列的占位文字
pub const DEFAULT_NO_MATERIAL_TEXT: &str = "Nenhum material relacionado";

// ==========================================
// ExportConfig - 导出设置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub file_prefix: String,
    pub sheet_name: String,
    pub no_material_text: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            no_material_text: DEFAULT_NO_MATERIAL_TEXT.to_string(),
        }
    }
}

// ==========================================
// 布局覆写（按关联方式）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeLayouts {
    pub surgical_map: Option<SheetLayout>,
    pub materials: Option<SheetLayout>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOverrides {
    pub by_identifier: ModeLayouts,
    pub by_fuzzy_name: ModeLayouts,
}

impl LayoutOverrides {
    pub fn for_mode(&self, mode: JoinMode) -> &ModeLayouts {
        match mode {
            JoinMode::ByIdentifier => &self.by_identifier,
            JoinMode::ByFuzzyName => &self.by_fuzzy_name,
        }
    }
}

// ==========================================
// PipelineConfig
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub join_mode: JoinModeSelection,
    pub name_match_policy: NameMatchPolicy,
    pub layouts: LayoutOverrides,
    pub export: ExportConfig,
}

impl PipelineConfig {
    /// 指定关联方式下生效的 (手术排程表布局, 材料表布局)
    pub fn layouts_for(&self, mode: JoinMode) -> (SheetLayout, SheetLayout) {
        let overrides = self.layouts.for_mode(mode);
        let surgical_map = overrides
            .surgical_map
            .clone()
            .unwrap_or_else(|| SheetLayout::surgical_map(mode));
        let materials = overrides
            .materials
            .clone()
            .unwrap_or_else(|| SheetLayout::opme_materials(mode));
        (surgical_map, materials)
    }
}
