// ==========================================
// OPME 对账报表 - 字段映射器实现
// ==========================================
// 职责: 按布局规则链将合格行映射为病例/材料记录
// 规则: 列位置 → 表头别名 → 正则提取，按声明顺序取第一个非空值
// ==========================================

use crate::config::layout::{FieldRule, RecordField, SheetLayout, COMPOSITE_PATIENT_PATTERN};
use crate::domain::grid::{row_cell, CellGrid, CellValue};
use crate::domain::record::{CaseRecord, MaterialRecord, DEFAULT_COST, DEFAULT_QUANTITY, UNKNOWN_TEXT};
use crate::domain::types::RecordKind;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::DataCleaner as _;
use crate::importer::record_filter::QualifiedRow;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// 内置复合患者单元格规则，所有布局共用一份编译结果
static COMPOSITE_PATIENT_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(COMPOSITE_PATIENT_PATTERN).ok());

// ==========================================
// CompiledLayout - 预编译布局
// ==========================================
// 正则只在构建时编译一次；非法正则在此报错，不会拖到逐行映射
#[derive(Debug, Clone)]
enum CompiledRule {
    Column(usize),
    Aliases(Vec<String>),
    Pattern { column: usize, regex: Regex },
}

#[derive(Debug, Clone)]
pub struct CompiledLayout {
    layout: SheetLayout,
    rules: Vec<(RecordField, Vec<CompiledRule>)>,
    join_field: Option<RecordField>,
}

impl CompiledLayout {
    /// 编译并校验布局
    ///
    /// # 校验
    /// - 病例布局必须声明 patient_name
    /// - 材料布局必须声明 material_name 以及关联键（case_id 或 patient_name）
    /// - 正则必须合法
    pub fn compile(layout: &SheetLayout) -> ImportResult<Self> {
        let missing = |field: RecordField| ImportError::MissingRequiredField {
            layout: layout.name.clone(),
            field: field.as_str().to_string(),
        };

        let declares = |field: RecordField| layout.fields.iter().any(|spec| spec.field == field);
        match layout.kind {
            RecordKind::Case => {
                if !declares(RecordField::PatientName) {
                    return Err(missing(RecordField::PatientName));
                }
            }
            RecordKind::Material => {
                if !declares(RecordField::MaterialName) {
                    return Err(missing(RecordField::MaterialName));
                }
                if layout.join_field().is_none() {
                    return Err(missing(RecordField::CaseId));
                }
            }
        }

        let mut rules = Vec::with_capacity(layout.fields.len());
        for spec in &layout.fields {
            let mut compiled = Vec::with_capacity(spec.rules.len());
            for rule in &spec.rules {
                compiled.push(match rule {
                    FieldRule::ByColumnIndex { column } => CompiledRule::Column(*column),
                    FieldRule::ByHeaderAlias { aliases } => CompiledRule::Aliases(
                        aliases.iter().map(|a| a.trim().to_string()).collect(),
                    ),
                    FieldRule::ByPatternExtraction { column, pattern } => {
                        let regex = compile_pattern(pattern).map_err(|e| {
                            ImportError::InvalidPattern {
                                layout: layout.name.clone(),
                                field: spec.field.as_str().to_string(),
                                message: e.to_string(),
                            }
                        })?;
                        CompiledRule::Pattern {
                            column: *column,
                            regex,
                        }
                    }
                });
            }
            rules.push((spec.field, compiled));
        }

        Ok(Self {
            layout: layout.clone(),
            rules,
            join_field: layout.join_field(),
        })
    }

    pub fn layout(&self) -> &SheetLayout {
        &self.layout
    }

    pub fn kind(&self) -> RecordKind {
        self.layout.kind
    }

    /// 位置列 → 同一字段表头别名所在的列
    ///
    /// 位置列为空时，过滤器据此判断别名列能否补上必填字段
    pub fn fallback_columns(&self, headers: &HeaderIndex) -> HashMap<usize, Vec<usize>> {
        let mut fallbacks: HashMap<usize, Vec<usize>> = HashMap::new();
        if headers.is_empty() {
            return fallbacks;
        }

        for (_, rules) in &self.rules {
            let alias_columns: Vec<usize> = rules
                .iter()
                .filter_map(|rule| match rule {
                    CompiledRule::Aliases(aliases) => Some(aliases),
                    _ => None,
                })
                .flatten()
                .filter_map(|alias| headers.column_of(alias))
                .collect();

            for rule in rules {
                let column = match rule {
                    CompiledRule::Column(column) | CompiledRule::Pattern { column, .. } => *column,
                    CompiledRule::Aliases(_) => continue,
                };
                let entry = fallbacks.entry(column).or_default();
                for &alt in &alias_columns {
                    if alt != column && !entry.contains(&alt) {
                        entry.push(alt);
                    }
                }
            }
        }

        fallbacks.retain(|_, alts| !alts.is_empty());
        fallbacks
    }

    fn rules_for(&self, field: RecordField) -> &[CompiledRule] {
        self.rules
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, r)| r.as_slice())
            .unwrap_or(&[])
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    match COMPOSITE_PATIENT_REGEX.as_ref() {
        Some(regex) if pattern == COMPOSITE_PATIENT_PATTERN => Ok(regex.clone()),
        _ => Regex::new(pattern),
    }
}

// ==========================================
// HeaderIndex - 表头索引（表头文字 → 列位置）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    /// 以一行作为表头建立索引（同名表头取最左侧一列）
    pub fn from_row(cells: &[CellValue]) -> Self {
        let mut columns = HashMap::new();
        for (idx, cell) in cells.iter().enumerate() {
            let text = cell.to_trimmed_string();
            if !text.is_empty() {
                columns.entry(text).or_insert(idx);
            }
        }
        Self { columns }
    }

    /// 在网格中定位第一条包含任一别名的行作为表头
    pub fn locate_header<'g, 'a>(
        grid: &'g CellGrid,
        aliases: impl IntoIterator<Item = &'a str>,
    ) -> Option<QualifiedRow<'g>> {
        let aliases: Vec<&str> = aliases.into_iter().map(str::trim).collect();
        if aliases.is_empty() {
            return None;
        }

        grid.rows()
            .iter()
            .enumerate()
            .find(|(_, cells)| {
                cells
                    .iter()
                    .any(|c| aliases.contains(&c.to_trimmed_string().as_str()))
            })
            .map(|(idx, cells)| QualifiedRow {
                row_number: idx + 1,
                cells: cells.as_slice(),
            })
    }

    pub fn column_of(&self, header: &str) -> Option<usize> {
        self.columns.get(header).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// 按正则提取第 1 个捕获组；不匹配（或捕获为空）时原样返回去空白后的值
pub fn extract_with_pattern(regex: &Regex, raw: &str) -> String {
    let trimmed = raw.trim();
    regex
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed)
        .to_string()
}

// ==========================================
// FieldMapper - 字段映射器
// ==========================================
pub struct FieldMapper<'l> {
    layout: &'l CompiledLayout,
    headers: HeaderIndex,
    cleaner: DataCleaner,
}

impl<'l> FieldMapper<'l> {
    pub fn new(layout: &'l CompiledLayout, headers: HeaderIndex) -> Self {
        Self {
            layout,
            headers,
            cleaner: DataCleaner,
        }
    }

    /// 按规则链解析字段，返回第一个非空值
    pub fn resolve(&self, field: RecordField, cells: &[CellValue]) -> Option<CellValue> {
        let rules = self.layout.rules_for(field);
        // 别名列的值同样按该字段的正则提取（复合患者单元格）
        let pattern = rules.iter().find_map(|rule| match rule {
            CompiledRule::Pattern { regex, .. } => Some(regex),
            _ => None,
        });
        rules
            .iter()
            .find_map(|rule| self.apply_rule(rule, pattern, cells))
    }

    fn apply_rule(
        &self,
        rule: &CompiledRule,
        pattern: Option<&Regex>,
        cells: &[CellValue],
    ) -> Option<CellValue> {
        let value = match rule {
            CompiledRule::Column(column) => row_cell(cells, *column).clone(),
            CompiledRule::Aliases(aliases) => {
                let cell = aliases
                    .iter()
                    .filter_map(|alias| self.headers.column_of(alias))
                    .map(|column| row_cell(cells, column))
                    .find(|cell| !cell.is_blank())?;
                match pattern {
                    Some(regex) => CellValue::from(extract_with_pattern(
                        regex,
                        &self.cleaner.clean_text(cell),
                    )),
                    None => cell.clone(),
                }
            }
            CompiledRule::Pattern { column, regex } => {
                let raw = self.cleaner.clean_text(row_cell(cells, *column));
                CellValue::from(extract_with_pattern(regex, &raw))
            }
        };

        if value.is_blank() {
            None
        } else {
            Some(value)
        }
    }

    /// 解析文本字段（去空白，空值为 None）
    pub fn text(&self, field: RecordField, cells: &[CellValue]) -> Option<String> {
        self.cleaner
            .normalize_null(self.resolve(field, cells).map(|v| self.cleaner.clean_text(&v)))
    }

    /// 映射为病例记录
    ///
    /// # 返回
    /// - None: 患者姓名为空（不满足病例记录的不变量）
    pub fn map_case(&self, row: QualifiedRow<'_>) -> Option<CaseRecord> {
        let cells = row.cells;
        let patient_name = self.text(RecordField::PatientName, cells)?;
        let text_or_unknown = |field| {
            self.text(field, cells)
                .unwrap_or_else(|| UNKNOWN_TEXT.to_string())
        };

        Some(CaseRecord {
            case_id: self.text(RecordField::CaseId, cells),
            patient_name,
            scheduled_at: text_or_unknown(RecordField::ScheduledAt),
            procedure_name: text_or_unknown(RecordField::ProcedureName),
            surgeon_name: text_or_unknown(RecordField::SurgeonName),
            row_number: row.row_number,
        })
    }

    /// 映射为材料记录
    ///
    /// # 返回
    /// - None: 材料描述为空，或布局声明的关联键为空
    pub fn map_material(&self, row: QualifiedRow<'_>) -> Option<MaterialRecord> {
        let cells = row.cells;
        let material_name = self.text(RecordField::MaterialName, cells)?;
        let case_id = self.text(RecordField::CaseId, cells);
        let patient_name = self.text(RecordField::PatientName, cells);

        let join_present = match self.layout.join_field {
            Some(RecordField::CaseId) => case_id.is_some(),
            Some(RecordField::PatientName) => patient_name.is_some(),
            _ => false,
        };
        if !join_present {
            return None;
        }

        let quantity = self
            .resolve(RecordField::Quantity, cells)
            .map(|v| self.cleaner.parse_quantity(&v, row.row_number))
            .unwrap_or(DEFAULT_QUANTITY);
        let cost = self
            .resolve(RecordField::Cost, cells)
            .map(|v| self.cleaner.parse_cost(&v, row.row_number))
            .unwrap_or(DEFAULT_COST);

        Some(MaterialRecord {
            case_id,
            patient_name,
            material_name,
            quantity,
            cost,
            row_number: row.row_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::layout::FieldSpec;
    use crate::domain::types::JoinMode;

    fn row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    fn qualified(cells: &[CellValue]) -> QualifiedRow<'_> {
        QualifiedRow {
            row_number: 1,
            cells,
        }
    }

    #[test]
    fn test_map_case_positional() {
        let layout = CompiledLayout::compile(&SheetLayout::surgical_map(JoinMode::ByIdentifier)).unwrap();
        let mapper = FieldMapper::new(&layout, HeaderIndex::default());
        let cells = row(&["", "2024-01-01 10:00", "A100", "Jane Doe", "", "Knee Repair", "", "Dr. Smith"]);

        let record = mapper.map_case(qualified(&cells)).unwrap();
        assert_eq!(record.case_id, Some("A100".to_string()));
        assert_eq!(record.patient_name, "Jane Doe");
        assert_eq!(record.scheduled_at, "2024-01-01 10:00");
        assert_eq!(record.procedure_name, "Knee Repair");
        assert_eq!(record.surgeon_name, "Dr. Smith");
    }

    #[test]
    fn test_map_case_missing_text_uses_sentinel() {
        let layout = CompiledLayout::compile(&SheetLayout::surgical_map(JoinMode::ByFuzzyName)).unwrap();
        let mapper = FieldMapper::new(&layout, HeaderIndex::default());
        let cells = row(&["", "", "", "John Smith"]);

        let record = mapper.map_case(qualified(&cells)).unwrap();
        assert_eq!(record.case_id, None);
        assert_eq!(record.procedure_name, UNKNOWN_TEXT);
        assert_eq!(record.surgeon_name, UNKNOWN_TEXT);
        assert_eq!(record.scheduled_at, UNKNOWN_TEXT);
    }

    #[test]
    fn test_alias_consulted_only_when_positional_empty() {
        let layout = CompiledLayout::compile(&SheetLayout::surgical_map(JoinMode::ByFuzzyName)).unwrap();
        let header = row(&["", "", "", "Paciente", "", "", "", "", "Cirurgião"]);
        let mapper = FieldMapper::new(&layout, HeaderIndex::from_row(&header));

        // 第 7 列为空 → 回退到 "Cirurgião" 表头所在的第 8 列
        let cells = row(&["", "", "", "Ana", "", "", "", "", "Dra. Souza"]);
        let record = mapper.map_case(qualified(&cells)).unwrap();
        assert_eq!(record.surgeon_name, "Dra. Souza");

        // 第 7 列非空 → 位置规则优先
        let cells = row(&["", "", "", "Ana", "", "", "", "Dr. Lima", "Dra. Souza"]);
        let record = mapper.map_case(qualified(&cells)).unwrap();
        assert_eq!(record.surgeon_name, "Dr. Lima");
    }

    #[test]
    fn test_pattern_extraction_and_fallback() {
        let regex = Regex::new(COMPOSITE_PATIENT_PATTERN).unwrap();
        assert_eq!(extract_with_pattern(&regex, "12345 - John Smith"), "John Smith");
        assert_eq!(extract_with_pattern(&regex, " 987-Maria  Silva "), "Maria  Silva");
        assert_eq!(extract_with_pattern(&regex, "John Smith"), "John Smith");
        assert_eq!(extract_with_pattern(&regex, "AB12 - John"), "AB12 - John");
    }

    #[test]
    fn test_map_material_by_name_with_locale_cost() {
        let layout = CompiledLayout::compile(&SheetLayout::opme_materials(JoinMode::ByFuzzyName)).unwrap();
        let mapper = FieldMapper::new(&layout, HeaderIndex::default());
        let cells = row(&["12345 - John Smith", "Placa bloqueada", "", "R$ 1.234,56"]);

        let record = mapper.map_material(qualified(&cells)).unwrap();
        assert_eq!(record.patient_name, Some("John Smith".to_string()));
        assert_eq!(record.case_id, None);
        assert_eq!(record.quantity, DEFAULT_QUANTITY);
        assert_eq!(record.cost, 1234.56);
    }

    #[test]
    fn test_map_material_requires_name_and_join_key() {
        let layout = CompiledLayout::compile(&SheetLayout::opme_materials(JoinMode::ByIdentifier)).unwrap();
        let mapper = FieldMapper::new(&layout, HeaderIndex::default());

        assert!(mapper.map_material(qualified(&row(&["A100", "  ", "2"]))).is_none());
        assert!(mapper.map_material(qualified(&row(&["", "Screw", "2"]))).is_none());

        let record = mapper.map_material(qualified(&row(&["A100", "Screw", "x"]))).unwrap();
        assert_eq!(record.quantity, DEFAULT_QUANTITY);
        assert_eq!(record.cost, DEFAULT_COST);
    }

    #[test]
    fn test_compile_rejects_invalid_pattern() {
        let mut layout = SheetLayout::opme_materials(JoinMode::ByFuzzyName);
        layout.fields[0] = FieldSpec::new(
            RecordField::PatientName,
            vec![FieldRule::pattern(0, r"^(\d+")],
        );

        let err = CompiledLayout::compile(&layout).unwrap_err();
        assert!(matches!(err, ImportError::InvalidPattern { .. }));
    }

    #[test]
    fn test_compile_rejects_material_layout_without_join_key() {
        let mut layout = SheetLayout::opme_materials(JoinMode::ByIdentifier);
        layout.fields.retain(|spec| spec.field != RecordField::CaseId);

        let err = CompiledLayout::compile(&layout).unwrap_err();
        assert!(matches!(err, ImportError::MissingRequiredField { .. }));
    }

    #[test]
    fn test_header_index_locate_first_alias_row() {
        let grid = CellGrid::new(vec![
            row(&["Relatório de cirurgias"]),
            row(&["", "Data", "Atendimento", "Paciente"]),
            row(&["", "01/01", "A1", "Paciente"]),
        ]);

        let header = HeaderIndex::locate_header(&grid, ["Paciente", "Nome"]).unwrap();
        assert_eq!(header.row_number, 2);

        let index = HeaderIndex::from_row(header.cells);
        assert_eq!(index.column_of("Paciente"), Some(3));
        assert_eq!(index.column_of("Atendimento"), Some(2));
        assert_eq!(index.column_of("Nome"), None);
    }

    #[test]
    fn test_fallback_columns_point_required_fields_at_alias_columns() {
        let layout = CompiledLayout::compile(&SheetLayout::opme_materials(JoinMode::ByFuzzyName)).unwrap();
        let header = row(&["Código", "Material", "Qtd", "Valor", "Paciente"]);

        let fallbacks = layout.fallback_columns(&HeaderIndex::from_row(&header));
        assert_eq!(fallbacks.get(&0), Some(&vec![4]));
        // "Material" 与位置列重合，不算备选
        assert_eq!(fallbacks.get(&1), None);
        assert!(layout.fallback_columns(&HeaderIndex::default()).is_empty());
    }

    #[test]
    fn test_alias_value_goes_through_field_pattern() {
        let layout = CompiledLayout::compile(&SheetLayout::opme_materials(JoinMode::ByFuzzyName)).unwrap();
        let header = row(&["Código", "Material", "Qtd", "Valor", "Paciente"]);
        let mapper = FieldMapper::new(&layout, HeaderIndex::from_row(&header));
        let cells = row(&["", "Screw", "1", "R$ 10,00", "12345 - Jane Doe"]);

        let record = mapper.map_material(qualified(&cells)).unwrap();
        assert_eq!(record.patient_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.cost, 10.0);
    }
}
