// ==========================================
// OPME 对账报表 - 记录领域模型
// ==========================================
// 职责: 手术病例记录 / 材料明细记录
// 生命周期: 仅在一次流水线运行内，由抽取层产出
// ==========================================

use crate::domain::types::JoinMode;
use serde::{Deserialize, Serialize};

/// 文本字段缺失时的占位值
pub const UNKNOWN_TEXT: &str = "N/A";

/// 数量无法解析时的默认值
pub const DEFAULT_QUANTITY: f64 = 1.0;

/// 金额无法解析时的默认值
pub const DEFAULT_COST: f64 = 0.0;

// ==========================================
// CaseRecord - 手术病例
// ==========================================
// 红线: patient_name 永不为空（未通过过滤的行不会生成记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: Option<String>,  // 就诊号（可缺失，不保证唯一）
    pub patient_name: String,     // 患者姓名（必填）
    pub scheduled_at: String,     // 手术日期/时间（不解析，原样展示）
    pub procedure_name: String,   // 手术名称（缺失为 N/A）
    pub surgeon_name: String,     // 主刀医生（缺失为 N/A）

    // 元信息
    pub row_number: usize, // 源表行号（从 1 开始）
}

impl CaseRecord {
    /// 就诊号（缺失时为空串，用于展示/导出）
    pub fn case_id_or_empty(&self) -> &str {
        self.case_id.as_deref().unwrap_or("")
    }
}

// ==========================================
// MaterialRecord - 材料明细
// ==========================================
// 红线: material_name 非空；布局声明的关联键非空
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub case_id: Option<String>,      // 就诊号（按就诊号关联时的键）
    pub patient_name: Option<String>, // 患者姓名（按姓名关联时的键）
    pub material_name: String,        // 材料描述（必填）
    pub quantity: f64,                // 数量（>= 0，默认 1）
    pub cost: f64,                    // 金额（>= 0，默认 0）

    // 元信息
    pub row_number: usize,
}

impl MaterialRecord {
    /// 指定关联方式下的关联键（去空白后为空视为缺失）
    pub fn join_key(&self, mode: JoinMode) -> Option<&str> {
        let key = match mode {
            JoinMode::ByIdentifier => self.case_id.as_deref(),
            JoinMode::ByFuzzyName => self.patient_name.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    /// 指定关联方式下参与汇总的数值
    pub fn aggregate_value(&self, mode: JoinMode) -> f64 {
        match mode {
            JoinMode::ByIdentifier => self.quantity,
            JoinMode::ByFuzzyName => self.cost,
        }
    }
}
