// ==========================================
// OPME 对账报表 - 表格布局配置
// ==========================================
// 职责: 声明式描述 "列 → 字段" 的抽取规则
// 红线: 列位置是配置常量，不从表头文字推断（各导出版本表头不一致）
// ==========================================

use crate::domain::types::{JoinMode, RecordKind};
use serde::{Deserialize, Serialize};

/// 复合患者单元格 "<编号> - <姓名>" 的默认匹配规则
pub const COMPOSITE_PATIENT_PATTERN: &str = r"^\d+\s*-\s*(.+)$";

// ==========================================
// RecordField - 记录字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    CaseId,
    PatientName,
    ScheduledAt,
    ProcedureName,
    SurgeonName,
    MaterialName,
    Quantity,
    Cost,
}

impl RecordField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::CaseId => "case_id",
            RecordField::PatientName => "patient_name",
            RecordField::ScheduledAt => "scheduled_at",
            RecordField::ProcedureName => "procedure_name",
            RecordField::SurgeonName => "surgeon_name",
            RecordField::MaterialName => "material_name",
            RecordField::Quantity => "quantity",
            RecordField::Cost => "cost",
        }
    }

    /// 该字段可出现在哪类记录中
    pub fn belongs_to(&self, kind: RecordKind) -> bool {
        match self {
            RecordField::CaseId | RecordField::PatientName => true,
            RecordField::ScheduledAt | RecordField::ProcedureName | RecordField::SurgeonName => {
                kind == RecordKind::Case
            }
            RecordField::MaterialName | RecordField::Quantity | RecordField::Cost => {
                kind == RecordKind::Material
            }
        }
    }
}

// ==========================================
// FieldRule - 单条抽取规则
// ==========================================
// 按声明顺序尝试，第一个产出非空值的规则生效
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// 按列位置读取
    ByColumnIndex { column: usize },
    /// 按表头别名读取（别名按顺序匹配，精确比较去空白后的表头文字）
    ByHeaderAlias { aliases: Vec<String> },
    /// 按正则从单元格中提取第 1 个捕获组；不匹配时原样使用去空白后的值
    ByPatternExtraction { column: usize, pattern: String },
}

impl FieldRule {
    pub fn column(column: usize) -> Self {
        FieldRule::ByColumnIndex { column }
    }

    pub fn aliases(aliases: &[&str]) -> Self {
        FieldRule::ByHeaderAlias {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn pattern(column: usize, pattern: &str) -> Self {
        FieldRule::ByPatternExtraction {
            column,
            pattern: pattern.to_string(),
        }
    }
}

// ==========================================
// FieldSpec - 字段 + 规则链
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: RecordField,
    pub rules: Vec<FieldRule>,
}

impl FieldSpec {
    pub fn new(field: RecordField, rules: Vec<FieldRule>) -> Self {
        Self { field, rules }
    }
}

// ==========================================
// RowFilterRule - 数据行判定规则
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowFilterRule {
    /// 去空白后必须非空的列
    pub required_columns: Vec<usize>,
    /// 需要检查哨兵值的列
    #[serde(default)]
    pub sentinel_columns: Vec<usize>,
    /// 哨兵值（表中夹杂的表头文字等），命中即不是数据行
    #[serde(default)]
    pub rejected_values: Vec<String>,
}

// ==========================================
// SheetLayout - 表格布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub name: String,
    pub kind: RecordKind,
    /// 第一条合格行是否为表头（是则丢弃）
    pub headers_present: bool,
    pub filter: RowFilterRule,
    pub fields: Vec<FieldSpec>,
}

// 表头别名（源系统导出的常见写法）
const CASE_ID_ALIASES: &[&str] = &["Atendimento", "ATENDIMENTO", "Nr. Atendimento"];
const PATIENT_ALIASES: &[&str] = &["Paciente", "PACIENTE", "Nome"];
const SCHEDULED_AT_ALIASES: &[&str] = &["Data", "DATA", "Data da Cirurgia", "Data/Hora"];
const PROCEDURE_ALIASES: &[&str] = &["Procedimento", "PROCEDIMENTO", "Cirurgia"];
const SURGEON_ALIASES: &[&str] = &["Cirurgião", "CIRURGIAO", "Médico"];
const MATERIAL_ALIASES: &[&str] = &["Material", "MATERIAL", "Descrição", "DESCRICAO"];
const QUANTITY_ALIASES: &[&str] = &["Quantidade", "QUANTIDADE", "Qtd", "QTD"];
const COST_ALIASES: &[&str] = &["Valor", "VALOR", "Custo"];

impl SheetLayout {
    /// 手术排程表布局
    ///
    /// # 列位置
    /// - 1: 日期/时间
    /// - 2: 就诊号
    /// - 3: 患者姓名
    /// - 5: 手术名称
    /// - 7: 主刀医生
    ///
    /// # 说明
    /// - 按就诊号关联时就诊号列也必须非空
    /// - 表中夹杂的表头行由哨兵值剔除，因此不声明表头
    pub fn surgical_map(mode: JoinMode) -> Self {
        let required_columns = match mode {
            JoinMode::ByIdentifier => vec![2, 3],
            JoinMode::ByFuzzyName => vec![3],
        };

        let mut rejected_values: Vec<String> =
            CASE_ID_ALIASES.iter().map(|s| s.to_string()).collect();
        rejected_values.extend(PATIENT_ALIASES.iter().map(|s| s.to_string()));

        Self {
            name: format!("surgical_map_{}", mode),
            kind: RecordKind::Case,
            headers_present: false,
            filter: RowFilterRule {
                required_columns,
                sentinel_columns: vec![2, 3],
                rejected_values,
            },
            fields: vec![
                FieldSpec::new(
                    RecordField::CaseId,
                    vec![FieldRule::column(2), FieldRule::aliases(CASE_ID_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::PatientName,
                    vec![FieldRule::column(3), FieldRule::aliases(PATIENT_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::ScheduledAt,
                    vec![FieldRule::column(1), FieldRule::aliases(SCHEDULED_AT_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::ProcedureName,
                    vec![FieldRule::column(5), FieldRule::aliases(PROCEDURE_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::SurgeonName,
                    vec![FieldRule::column(7), FieldRule::aliases(SURGEON_ALIASES)],
                ),
            ],
        }
    }

    /// OPME 材料表布局
    ///
    /// # 列位置
    /// - 0: 关联键（就诊号，或 "<编号> - <姓名>" 复合患者单元格）
    /// - 1: 材料描述
    /// - 2: 数量
    /// - 3: 金额
    pub fn opme_materials(mode: JoinMode) -> Self {
        let join_field = match mode {
            JoinMode::ByIdentifier => FieldSpec::new(
                RecordField::CaseId,
                vec![FieldRule::column(0), FieldRule::aliases(CASE_ID_ALIASES)],
            ),
            JoinMode::ByFuzzyName => FieldSpec::new(
                RecordField::PatientName,
                vec![
                    FieldRule::pattern(0, COMPOSITE_PATIENT_PATTERN),
                    FieldRule::aliases(PATIENT_ALIASES),
                ],
            ),
        };

        Self {
            name: format!("opme_materials_{}", mode),
            kind: RecordKind::Material,
            headers_present: true,
            filter: RowFilterRule {
                required_columns: vec![0],
                sentinel_columns: Vec::new(),
                rejected_values: Vec::new(),
            },
            fields: vec![
                join_field,
                FieldSpec::new(
                    RecordField::MaterialName,
                    vec![FieldRule::column(1), FieldRule::aliases(MATERIAL_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::Quantity,
                    vec![FieldRule::column(2), FieldRule::aliases(QUANTITY_ALIASES)],
                ),
                FieldSpec::new(
                    RecordField::Cost,
                    vec![FieldRule::column(3), FieldRule::aliases(COST_ALIASES)],
                ),
            ],
        }
    }

    /// 指定字段的规则链
    pub fn rules_for(&self, field: RecordField) -> &[FieldRule] {
        self.fields
            .iter()
            .find(|spec| spec.field == field)
            .map(|spec| spec.rules.as_slice())
            .unwrap_or(&[])
    }

    /// 布局声明的全部表头别名（按声明顺序）
    pub fn all_aliases(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().flat_map(|spec| {
            spec.rules.iter().flat_map(|rule| match rule {
                FieldRule::ByHeaderAlias { aliases } => aliases.as_slice(),
                _ => &[][..],
            })
        })
        .map(String::as_str)
    }

    /// 材料布局的关联键字段（优先就诊号）
    pub fn join_field(&self) -> Option<RecordField> {
        let declares = |field: RecordField| self.fields.iter().any(|spec| spec.field == field);
        if declares(RecordField::CaseId) {
            Some(RecordField::CaseId)
        } else if declares(RecordField::PatientName) {
            Some(RecordField::PatientName)
        } else {
            None
        }
    }
}
