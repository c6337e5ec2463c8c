// ==========================================
// 端到端集成测试 - 上传 → 对账 → 导出
// ==========================================
// 测试目标: 验证两张表从文件到 Excel 报表的完整流程
// 覆盖范围: RowExtractor + Reconciler + Exporter + ReportApi
// ==========================================


use chrono::NaiveDate;
use opme_report::api::{ApiError, CollectingNotifier, ReportApi};
use opme_report::config::{config_keys, ConfigManager};
use opme_report::domain::{CellValue, PipelineStage};
use opme_report::engine::{Exporter, Reconciler};
use opme_report::importer::{GridDecoder, RowExtractor, WorkbookDecoder};
use opme_report::{logging, JoinMode, NameMatchPolicy};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use test_helpers::*;

fn api_with(config: ConfigManager) -> (ReportApi, CollectingNotifier) {
    let notifier = CollectingNotifier::new();
    let api = ReportApi::new(Arc::new(config)).with_notifier(Arc::new(notifier.clone()));
    (api, notifier)
}

// ==========================================
// 场景 A: 按就诊号关联
// ==========================================

#[test]
fn test_scenario_identifier_mode_single_material() {
    logging::init_test();

    let extractor = RowExtractor::for_mode(JoinMode::ByIdentifier).unwrap();
    let cases = extractor.extract_cases(&grid(&[&[
        "",
        "2024-01-01 10:00",
        "A100",
        "Jane Doe",
        "",
        "Knee Repair",
        "",
        "Dr. Smith",
    ]]));
    let materials = extractor.extract_materials(&grid(&[
        &["Atendimento", "Material", "Quantidade"],
        &["A100", "Screw", "2"],
    ]));

    let report = Reconciler::new().reconcile(&cases, &materials, JoinMode::ByIdentifier);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].case.patient_name, "Jane Doe");
    assert_eq!(report[0].case.surgeon_name, "Dr. Smith");
    assert_eq!(report[0].materials.len(), 1);
    assert_eq!(report[0].materials[0].material_name, "Screw");
    assert_eq!(report[0].aggregate, 2.0);
}

// ==========================================
// 场景 B: 按姓名模糊关联
// ==========================================

#[test]
fn test_scenario_fuzzy_name_with_composite_cell() {
    let extractor = RowExtractor::for_mode(JoinMode::ByFuzzyName).unwrap();
    let cases = extractor.extract_cases(&to_grid(&surgical_map_rows()));
    let materials = extractor.extract_materials(&to_grid(&name_material_rows()));

    assert_eq!(materials.len(), 2);
    assert_eq!(materials[0].patient_name.as_deref(), Some("John Smith"));

    let report = Reconciler::new().reconcile(&cases, &materials, JoinMode::ByFuzzyName);
    let john = report
        .iter()
        .find(|e| e.case.patient_name == "John Smith")
        .unwrap();
    assert_eq!(john.materials.len(), 2);
    assert!((john.aggregate - 2034.56).abs() < 1e-9);

    let jane = report
        .iter()
        .find(|e| e.case.patient_name == "Jane Doe")
        .unwrap();
    assert!(jane.materials.is_empty());
}

// ==========================================
// 场景 C: 无关联材料
// ==========================================

#[test]
fn test_scenario_case_without_materials_exports_placeholder() {
    let cases = vec![case(Some("A300"), "Maria Silva", 3)];
    let report = Reconciler::new().reconcile(&cases, &[], JoinMode::ByIdentifier);

    assert!(report[0].materials.is_empty());
    assert_eq!(report[0].aggregate, 0.0);

    let rows = Exporter::default().flatten(&report);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].material_name, "Nenhum material relacionado");
    assert_eq!(rows[0].quantity, 0.0);
    assert_eq!(rows[0].cost, 0.0);
}

// ==========================================
// 场景 D: 本地化金额
// ==========================================

#[test]
fn test_scenario_brazilian_currency_cost() {
    let extractor = RowExtractor::for_mode(JoinMode::ByIdentifier).unwrap();
    let materials = extractor.extract_materials(&grid(&[
        &["Atendimento", "Material", "Quantidade", "Valor"],
        &["A100", "Plate", "", "R$ 1.234,56"],
    ]));

    assert_eq!(materials.len(), 1);
    assert_eq!(materials[0].cost, 1234.56);
    assert_eq!(materials[0].quantity, 1.0);
}

// ==========================================
// 场景 E: 同一关联键的两条材料
// ==========================================

#[test]
fn test_scenario_two_materials_grouped_under_one_case() {
    let cases = vec![case(Some("A100"), "Jane Doe", 1)];
    let materials = vec![
        material_by_id("A100", "Screw", 2.0, 2),
        material_by_id("A100", "Plate", 3.0, 3),
    ];

    let report = Reconciler::new().reconcile(&cases, &materials, JoinMode::ByIdentifier);
    assert_eq!(report[0].aggregate, 5.0);

    let rows = Exporter::default().flatten(&report);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].material_name, "Screw");
    assert_eq!(rows[1].material_name, "Plate");
    assert!(rows.iter().all(|r| r.case_aggregate == 5.0 && r.case_id == "A100"));
}

// ==========================================
// 性质: 幂等 / 顺序 / 展平完整
// ==========================================

#[test]
fn test_pipeline_is_idempotent_and_order_preserving() {
    let extractor = RowExtractor::for_mode(JoinMode::ByIdentifier).unwrap();
    let map = to_grid(&surgical_map_rows());
    let sheet = to_grid(&identifier_material_rows());

    let run = || {
        let cases = extractor.extract_cases(&map);
        let materials = extractor.extract_materials(&sheet);
        let report = Reconciler::new().reconcile(&cases, &materials, JoinMode::ByIdentifier);
        let rows = Exporter::default().flatten(&report);
        (report, rows)
    };

    let (first_report, first_rows) = run();
    let (second_report, second_rows) = run();
    assert_eq!(first_report, second_report);
    assert_eq!(first_rows, second_rows);

    let ids: Vec<&str> = first_report
        .iter()
        .map(|e| e.case.case_id_or_empty())
        .collect();
    assert_eq!(ids, vec!["A100", "A200"]);

    let expected_rows: usize = first_report
        .iter()
        .map(|e| e.materials.len().max(1))
        .sum();
    assert_eq!(first_rows.len(), expected_rows);
    assert_eq!(first_rows.len(), 3);
}

#[test]
fn test_fuzzy_double_counting_is_reported_in_summary() {
    let cases = vec![case(None, "Ana Silva", 1), case(None, "Ana Souza", 2)];
    let materials = vec![material_by_name("Ana", "Placa", 100.0, 2)];

    let permissive = Reconciler::new().reconcile(&cases, &materials, JoinMode::ByFuzzyName);
    let summary = Reconciler::summarize(&permissive, &materials);
    assert_eq!(summary.multiply_matched_materials, 1);
    assert_eq!(summary.total_aggregate, 200.0);

    // 无精确匹配时 ExactFirst 与宽松策略一致
    let exact_first = Reconciler::with_policy(NameMatchPolicy::ExactFirst).reconcile(
        &cases,
        &materials,
        JoinMode::ByFuzzyName,
    );
    assert_eq!(permissive, exact_first);
}

// ==========================================
// ReportApi: 文件上传到 Excel 导出
// ==========================================

#[tokio::test]
async fn test_csv_upload_generate_and_export() {
    logging::init_test();

    let map_file = write_csv(&surgical_map_rows()).unwrap();
    let materials_file = write_csv(&identifier_material_rows()).unwrap();
    let (mut api, notifier) = api_with(ConfigManager::new());

    let outcome = api.upload_surgical_map(map_file.path()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.record_count, 2);

    let outcome = api.upload_materials(materials_file.path()).await.unwrap();
    assert_eq!(outcome.record_count, 2);

    let report = api.generate_report(None).unwrap();
    assert_eq!(report.join_mode, JoinMode::ByIdentifier);
    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.entries[0].aggregate, 3.0);

    let dir = TempDir::new().unwrap();
    let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let path = api.export_report_dated(dir.path(), date).unwrap();
    assert!(path.ends_with("report_2024-01-01.xlsx"));

    let bytes = std::fs::read(&path).unwrap();
    let written = WorkbookDecoder.decode(&bytes, "report_2024-01-01.xlsx").unwrap();
    assert_eq!(written.row_count(), 4); // 表头 + 2 条材料 + 1 条占位
    assert_eq!(written.cell(1, 0), &CellValue::Text("A100".to_string()));
    assert_eq!(written.cell(2, 7), &CellValue::Number(1234.56));
    assert_eq!(
        written.cell(3, 5),
        &CellValue::Text("Nenhum material relacionado".to_string())
    );

    let stages: Vec<PipelineStage> = notifier.outcomes().iter().map(|o| o.stage).collect();
    assert_eq!(
        stages,
        vec![
            PipelineStage::SurgicalMapUpload,
            PipelineStage::MaterialsUpload,
            PipelineStage::ReportGeneration,
            PipelineStage::Export,
        ]
    );
}

#[tokio::test]
async fn test_xlsx_upload_auto_detects_fuzzy_name() {
    let map_file = write_xlsx(&surgical_map_rows()).unwrap();
    let materials_file = write_xlsx(&name_material_rows()).unwrap();
    let (mut api, _) = api_with(ConfigManager::new());

    api.upload_surgical_map(map_file.path()).await.unwrap();
    api.upload_materials(materials_file.path()).await.unwrap();

    let report = api.generate_report(None).unwrap();
    assert_eq!(report.join_mode, JoinMode::ByFuzzyName);
    assert_eq!(report.summary.total_materials, 2);
    assert_eq!(report.summary.unmatched_materials, 0);
}

#[tokio::test]
async fn test_configured_mode_is_used_when_not_overridden() {
    let config = ConfigManager::new();
    config
        .set_config_value(config_keys::JOIN_MODE, "by_fuzzy_name")
        .unwrap();
    let (mut api, _) = api_with(config);

    api.load_surgical_map("map.csv", to_grid(&surgical_map_rows()))
        .unwrap();
    api.load_materials("opme.csv", to_grid(&identifier_material_rows()))
        .unwrap();

    // 材料表第 0 列是就诊号，按姓名关联时不会匹配任何病例
    let report = api.generate_report(None).unwrap();
    assert_eq!(report.join_mode, JoinMode::ByFuzzyName);
    assert_eq!(report.summary.total_materials, 0);

    let report = api.generate_report(Some(JoinMode::ByIdentifier)).unwrap();
    assert_eq!(report.join_mode, JoinMode::ByIdentifier);
    assert_eq!(report.summary.total_materials, 2);
}

#[tokio::test]
async fn test_export_before_generate_writes_nothing() {
    let map_file = write_csv(&surgical_map_rows()).unwrap();
    let (mut api, notifier) = api_with(ConfigManager::new());
    api.upload_surgical_map(map_file.path()).await.unwrap();

    let dir = TempDir::new().unwrap();
    let result = api.export_report(dir.path());
    assert!(matches!(result, Err(ApiError::ExportWithEmptyReport)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(notifier.last().map(|o| o.success), Some(false));
}

#[tokio::test]
async fn test_unsupported_file_is_decode_failure() {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
    writeln!(file, "not a spreadsheet").unwrap();
    let (mut api, notifier) = api_with(ConfigManager::new());

    let result = api.upload_materials(file.path()).await;
    match result {
        Err(ApiError::DecodeFailure { file_name, .. }) => assert!(file_name.ends_with(".txt")),
        other => panic!("Expected DecodeFailure, got {:?}", other),
    }
    let last = notifier.last().unwrap();
    assert!(!last.success);
    assert_eq!(last.stage, PipelineStage::MaterialsUpload);
}

#[tokio::test]
async fn test_empty_sheet_is_zero_count_success() {
    let empty = write_csv(&[vec![""]]).unwrap();
    let (mut api, _) = api_with(ConfigManager::new());

    let outcome = api.upload_surgical_map(empty.path()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.record_count, 0);
}
