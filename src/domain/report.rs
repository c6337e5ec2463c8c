// ==========================================
// OPME 对账报表 - 报表领域模型
// ==========================================
// 职责: 合并报表条目 / 导出行 / 报表汇总 / 阶段结果
// 红线: 报表为派生状态，每次对账整体替换，不做增量更新
// ==========================================

use crate::domain::record::{CaseRecord, MaterialRecord};
use crate::domain::types::{JoinMode, PipelineStage, RecordKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// CombinedReportEntry - 合并报表条目
// ==========================================
// 与病例输入一一对应，顺序一致
// materials 为共享引用：模糊匹配下同一材料可能挂到多个病例
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedReportEntry {
    pub case: CaseRecord,
    pub materials: Vec<Arc<MaterialRecord>>,
    pub aggregate: f64, // 按就诊号: 数量合计；按姓名: 金额合计
    pub join_mode: JoinMode,
}

impl CombinedReportEntry {
    pub fn has_materials(&self) -> bool {
        !self.materials.is_empty()
    }
}

// ==========================================
// ExportRow - 导出行
// ==========================================
// 列顺序固定，见 engine::exporter::EXPORT_COLUMNS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Atendimento")]
    pub case_id: String,
    #[serde(rename = "Paciente")]
    pub patient_name: String,
    #[serde(rename = "Data/Hora")]
    pub scheduled_at: String,
    #[serde(rename = "Cirurgia")]
    pub procedure_name: String,
    #[serde(rename = "Cirurgião")]
    pub surgeon_name: String,
    #[serde(rename = "Material OPME")]
    pub material_name: String,
    #[serde(rename = "Quantidade")]
    pub quantity: f64,
    #[serde(rename = "Valor")]
    pub cost: f64,
    #[serde(rename = "Total Atendimento")]
    pub case_aggregate: f64,
}

/// 导出单元格值
#[derive(Debug, Clone, PartialEq)]
pub enum ExportValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl ExportRow {
    /// 按固定列顺序返回单元格
    pub fn values(&self) -> [ExportValue<'_>; 9] {
        [
            ExportValue::Text(&self.case_id),
            ExportValue::Text(&self.patient_name),
            ExportValue::Text(&self.scheduled_at),
            ExportValue::Text(&self.procedure_name),
            ExportValue::Text(&self.surgeon_name),
            ExportValue::Text(&self.material_name),
            ExportValue::Number(self.quantity),
            ExportValue::Number(self.cost),
            ExportValue::Number(self.case_aggregate),
        ]
    }
}

// ==========================================
// ReportSummary - 报表汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_cases: usize,               // 病例数
    pub total_materials: usize,           // 已关联材料行数（按条目累加）
    pub total_aggregate: f64,             // 各条目汇总值之和
    pub cases_without_materials: usize,   // 无关联材料的病例数
    pub unmatched_materials: usize,       // 未关联到任何病例的材料数
    pub multiply_matched_materials: usize, // 关联到多个病例的材料数
}

// ==========================================
// StageOutcome - 阶段结果
// ==========================================
// 取代 "已上传" 之类的全局布尔标志，交给通知方展示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub run_id: String,
    pub stage: PipelineStage,
    pub record_kind: Option<RecordKind>,
    pub record_count: usize,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl StageOutcome {
    pub fn success(stage: PipelineStage, record_count: usize, message: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            stage,
            record_kind: stage.record_kind(),
            record_count,
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            stage,
            record_kind: stage.record_kind(),
            record_count: 0,
            success: false,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
