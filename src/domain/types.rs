// ==========================================
// OPME 对账报表 - 领域类型定义
// ==========================================
// 职责: 记录类型 / 关联方式 / 流水线阶段等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 记录类型 (Record Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    Case,     // 手术病例（手术排程表）
    Material, // 材料明细（OPME 材料表）
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Case => write!(f, "CASE"),
            RecordKind::Material => write!(f, "MATERIAL"),
        }
    }
}

// ==========================================
// 关联方式 (Join Mode)
// ==========================================
// 每次对账只选定一种，互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinMode {
    ByIdentifier, // 就诊号精确匹配，汇总数量
    ByFuzzyName,  // 患者姓名模糊匹配，汇总金额
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::ByIdentifier => "by_identifier",
            JoinMode::ByFuzzyName => "by_fuzzy_name",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JoinMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "by_identifier" | "identifier" | "id" | "atendimento" => Ok(JoinMode::ByIdentifier),
            "by_fuzzy_name" | "name" | "fuzzy" | "paciente" => Ok(JoinMode::ByFuzzyName),
            other => Err(format!("未知的关联方式: {}", other)),
        }
    }
}

// ==========================================
// 关联方式选择 (Join Mode Selection)
// ==========================================
// Auto: 按材料记录携带的关联键自动判定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinModeSelection {
    #[default]
    Auto,
    ByIdentifier,
    ByFuzzyName,
}

impl JoinModeSelection {
    /// 显式选择时返回对应关联方式，Auto 返回 None
    pub fn explicit(&self) -> Option<JoinMode> {
        match self {
            JoinModeSelection::Auto => None,
            JoinModeSelection::ByIdentifier => Some(JoinMode::ByIdentifier),
            JoinModeSelection::ByFuzzyName => Some(JoinMode::ByFuzzyName),
        }
    }
}

impl From<JoinMode> for JoinModeSelection {
    fn from(mode: JoinMode) -> Self {
        match mode {
            JoinMode::ByIdentifier => JoinModeSelection::ByIdentifier,
            JoinMode::ByFuzzyName => JoinModeSelection::ByFuzzyName,
        }
    }
}

// ==========================================
// 姓名匹配策略 (Name Match Policy)
// ==========================================
// Permissive: 相等或互为子串即匹配，同一材料可能计入多个病例
// ExactFirst: 存在精确匹配的病例时只挂到精确匹配的病例上
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatchPolicy {
    #[default]
    Permissive,
    ExactFirst,
}

// ==========================================
// 流水线阶段 (Pipeline Stage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    SurgicalMapUpload, // 上传手术排程表
    MaterialsUpload,   // 上传 OPME 材料表
    ReportGeneration,  // 生成合并报表
    Export,            // 导出 Excel
}

impl PipelineStage {
    /// 阶段对应的记录类型（生成/导出阶段无）
    pub fn record_kind(&self) -> Option<RecordKind> {
        match self {
            PipelineStage::SurgicalMapUpload => Some(RecordKind::Case),
            PipelineStage::MaterialsUpload => Some(RecordKind::Material),
            PipelineStage::ReportGeneration | PipelineStage::Export => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::SurgicalMapUpload => write!(f, "SURGICAL_MAP_UPLOAD"),
            PipelineStage::MaterialsUpload => write!(f, "MATERIALS_UPLOAD"),
            PipelineStage::ReportGeneration => write!(f, "REPORT_GENERATION"),
            PipelineStage::Export => write!(f, "EXPORT"),
        }
    }
}
