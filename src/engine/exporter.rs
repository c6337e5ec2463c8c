// ==========================================
// OPME 对账报表 - 导出展平
// ==========================================
// 职责: 合并报表 → 固定列的导出行
// 规则: 有材料时每条材料一行（病例字段重复）；无材料时一行占位
// 红线: 纯转换，行数 = Σ max(1, 材料数)
// ==========================================

use crate::config::pipeline_config::DEFAULT_NO_MATERIAL_TEXT;
use crate::domain::report::{CombinedReportEntry, ExportRow};
use tracing::debug;

/// 导出列定义（表头, 列宽）
pub const EXPORT_COLUMNS: [(&str, f64); 9] = [
    ("Atendimento", 15.0),
    ("Paciente", 25.0),
    ("Data/Hora", 20.0),
    ("Cirurgia", 30.0),
    ("Cirurgião", 25.0),
    ("Material OPME", 40.0),
    ("Quantidade", 12.0),
    ("Valor", 14.0),
    ("Total Atendimento", 20.0),
];

pub struct Exporter {
    no_material_text: String,
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new(DEFAULT_NO_MATERIAL_TEXT)
    }
}

impl Exporter {
    pub fn new(no_material_text: impl Into<String>) -> Self {
        Self {
            no_material_text: no_material_text.into(),
        }
    }

    /// 展平合并报表
    pub fn flatten(&self, report: &[CombinedReportEntry]) -> Vec<ExportRow> {
        let capacity = report.iter().map(|e| e.materials.len().max(1)).sum();
        let mut rows = Vec::with_capacity(capacity);

        for entry in report {
            let case = &entry.case;
            let base = |material_name: &str, quantity: f64, cost: f64, aggregate: f64| ExportRow {
                case_id: case.case_id_or_empty().to_string(),
                patient_name: case.patient_name.clone(),
                scheduled_at: case.scheduled_at.clone(),
                procedure_name: case.procedure_name.clone(),
                surgeon_name: case.surgeon_name.clone(),
                material_name: material_name.to_string(),
                quantity,
                cost,
                case_aggregate: aggregate,
            };

            if entry.materials.is_empty() {
                rows.push(base(&self.no_material_text, 0.0, 0.0, 0.0));
            } else {
                rows.extend(entry.materials.iter().map(|material| {
                    base(
                        &material.material_name,
                        material.quantity,
                        material.cost,
                        entry.aggregate,
                    )
                }));
            }
        }

        debug!(entries = report.len(), rows = rows.len(), "报表展平完成");
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{CaseRecord, MaterialRecord};
    use crate::domain::types::JoinMode;
    use std::sync::Arc;

    fn entry(case_id: &str, materials: &[(&str, f64)]) -> CombinedReportEntry {
        let materials: Vec<Arc<MaterialRecord>> = materials
            .iter()
            .enumerate()
            .map(|(idx, (name, quantity))| {
                Arc::new(MaterialRecord {
                    case_id: Some(case_id.to_string()),
                    patient_name: None,
                    material_name: name.to_string(),
                    quantity: *quantity,
                    cost: 0.0,
                    row_number: idx + 2,
                })
            })
            .collect();
        let aggregate = materials.iter().map(|m| m.quantity).sum();

        CombinedReportEntry {
            case: CaseRecord {
                case_id: Some(case_id.to_string()),
                patient_name: "Jane Doe".to_string(),
                scheduled_at: "2024-01-01 10:00".to_string(),
                procedure_name: "Knee Repair".to_string(),
                surgeon_name: "Dr. Smith".to_string(),
                row_number: 1,
            },
            materials,
            aggregate,
            join_mode: JoinMode::ByIdentifier,
        }
    }

    #[test]
    fn test_one_row_per_material_with_case_total() {
        let report = vec![entry("A100", &[("Screw", 2.0), ("Plate", 1.0)])];
        let rows = Exporter::default().flatten(&report);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].material_name, "Screw");
        assert_eq!(rows[1].material_name, "Plate");
        assert!(rows.iter().all(|r| r.case_aggregate == 3.0));
        assert!(rows.iter().all(|r| r.patient_name == "Jane Doe"));
    }

    #[test]
    fn test_case_without_materials_gets_placeholder_row() {
        let rows = Exporter::default().flatten(&[entry("A200", &[])]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].material_name, "Nenhum material relacionado");
        assert_eq!(rows[0].quantity, 0.0);
        assert_eq!(rows[0].cost, 0.0);
        assert_eq!(rows[0].case_aggregate, 0.0);
    }

    #[test]
    fn test_row_count_is_sum_of_max_one() {
        let report = vec![
            entry("A", &[("x", 1.0), ("y", 1.0), ("z", 1.0)]),
            entry("B", &[]),
            entry("C", &[("w", 1.0)]),
        ];
        assert_eq!(Exporter::default().flatten(&report).len(), 5);
        assert!(Exporter::default().flatten(&[]).is_empty());
    }

    #[test]
    fn test_custom_placeholder_text() {
        let rows = Exporter::new("sem material").flatten(&[entry("A", &[])]);
        assert_eq!(rows[0].material_name, "sem material");
    }

    #[test]
    fn test_column_headers_fixed() {
        let headers: Vec<&str> = EXPORT_COLUMNS.iter().map(|(h, _)| *h).collect();
        assert_eq!(headers[0], "Atendimento");
        assert_eq!(headers[5], "Material OPME");
        assert_eq!(headers[8], "Total Atendimento");
        assert_eq!(EXPORT_COLUMNS[5].1, 40.0);
    }
}
