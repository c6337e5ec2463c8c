// ==========================================
// OPME 对账报表 - 报表会话 API
// ==========================================
// 职责: 上传两张表 → 生成合并报表 → 导出 Excel
// 状态: 每个会话只保留最近一次上传；重新上传会使已生成的报表失效
// 挂起点: 只有读取文件字节是异步的，其余阶段同步执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::api::notifier::{OutcomeNotifier, TracingNotifier};
use crate::config::import_config_trait::PipelineConfigReader;
use crate::config::ConfigManager;
use crate::domain::grid::CellGrid;
use crate::domain::record::{CaseRecord, MaterialRecord};
use crate::domain::report::{CombinedReportEntry, ExportRow, ReportSummary, StageOutcome};
use crate::domain::types::{JoinMode, PipelineStage, RecordKind};
use crate::engine::{Exporter, Reconciler, XlsxReportWriter};
use crate::importer::{FileSheetSource, GridDecoder, RowExtractor, SheetSource, UniversalDecoder};
use chrono::{DateTime, Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// 已上传的表格
#[derive(Debug, Clone)]
struct LoadedSheet {
    file_name: String,
    grid: CellGrid,
}

/// 已生成的合并报表
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub entries: Vec<CombinedReportEntry>,
    pub join_mode: JoinMode,
    pub summary: ReportSummary,
    pub generated_at: DateTime<Utc>,
}

// ==========================================
// ReportApi - 报表会话
// ==========================================
pub struct ReportApi {
    config: Arc<dyn PipelineConfigReader>,
    source: Arc<dyn SheetSource>,
    decoder: Arc<dyn GridDecoder>,
    notifier: Arc<dyn OutcomeNotifier>,

    surgical_map: Option<LoadedSheet>,
    materials: Option<LoadedSheet>,
    report: Option<GeneratedReport>,
}

impl Default for ReportApi {
    fn default() -> Self {
        Self::new(Arc::new(ConfigManager::new()))
    }
}

impl ReportApi {
    /// 创建报表会话（本地文件 + 按扩展名解码 + 日志通知）
    pub fn new(config: Arc<dyn PipelineConfigReader>) -> Self {
        Self {
            config,
            source: Arc::new(FileSheetSource),
            decoder: Arc::new(UniversalDecoder),
            notifier: Arc::new(TracingNotifier),
            surgical_map: None,
            materials: None,
            report: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SheetSource>) -> Self {
        self.source = source;
        self
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn GridDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn OutcomeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // ==========================================
    // 上传
    // ==========================================

    /// 读取并解码文件（不修改会话状态）
    ///
    /// # 返回
    /// - Err(DecodeFailure): 文件不存在、格式不支持或文件损坏
    pub async fn fetch_grid(&self, path: &Path) -> ApiResult<CellGrid> {
        let file_name = display_name(path);
        let bytes = self
            .source
            .fetch(path)
            .await
            .map_err(|e| ApiError::from(e).with_file_name(&file_name))?;

        self.decoder
            .decode(&bytes, &file_name)
            .map_err(|e| ApiError::from(e).with_file_name(&file_name))
    }

    /// 上传手术排程表
    pub async fn upload_surgical_map(&mut self, path: &Path) -> ApiResult<StageOutcome> {
        self.upload(path, PipelineStage::SurgicalMapUpload).await
    }

    /// 上传 OPME 材料表
    pub async fn upload_materials(&mut self, path: &Path) -> ApiResult<StageOutcome> {
        self.upload(path, PipelineStage::MaterialsUpload).await
    }

    async fn upload(&mut self, path: &Path, stage: PipelineStage) -> ApiResult<StageOutcome> {
        match self.fetch_grid(path).await {
            Ok(grid) => self.load_grid(stage, &display_name(path), grid),
            Err(err) => {
                self.notify(StageOutcome::failure(
                    stage,
                    "Erro no Processamento: Erro ao processar o arquivo. Verifique se é um arquivo Excel válido.",
                ));
                Err(err)
            }
        }
    }

    /// 载入已解码的手术排程表
    pub fn load_surgical_map(&mut self, file_name: &str, grid: CellGrid) -> ApiResult<StageOutcome> {
        self.load_grid(PipelineStage::SurgicalMapUpload, file_name, grid)
    }

    /// 载入已解码的 OPME 材料表
    pub fn load_materials(&mut self, file_name: &str, grid: CellGrid) -> ApiResult<StageOutcome> {
        self.load_grid(PipelineStage::MaterialsUpload, file_name, grid)
    }

    #[instrument(skip(self, grid), fields(stage = %stage, rows = grid.row_count()))]
    fn load_grid(
        &mut self,
        stage: PipelineStage,
        file_name: &str,
        grid: CellGrid,
    ) -> ApiResult<StageOutcome> {
        let kind = stage.record_kind().ok_or_else(|| {
            ApiError::InvalidInput(format!("阶段 {} 不接受表格上传", stage))
        })?;

        // 预览记录数：显式关联方式按其布局，Auto 按就诊号布局
        let preview_mode = self
            .config
            .get_join_mode()?
            .explicit()
            .unwrap_or(JoinMode::ByIdentifier);
        let record_count = self.extractor(preview_mode)?.extract(&grid, kind).len();

        let loaded = LoadedSheet {
            file_name: file_name.to_string(),
            grid,
        };
        let message = match kind {
            RecordKind::Case => {
                self.surgical_map = Some(loaded);
                format!(
                    "Mapa Cirúrgico Carregado: {} registros processados com sucesso.",
                    record_count
                )
            }
            RecordKind::Material => {
                self.materials = Some(loaded);
                format!(
                    "Dados OPME Carregados: {} materiais processados com sucesso.",
                    record_count
                )
            }
        };

        if self.report.take().is_some() {
            debug!("重新上传，已生成的报表失效");
        }

        let outcome = StageOutcome::success(stage, record_count, message);
        self.notify(outcome.clone());
        Ok(outcome)
    }

    // ==========================================
    // 生成报表
    // ==========================================

    /// 生成合并报表
    ///
    /// # 参数
    /// - mode: 本次使用的关联方式；None 时按配置，配置为 Auto 时自动判定
    ///
    /// # 返回
    /// - Err(InvalidInput): 两张表未全部上传
    pub fn generate_report(&mut self, mode: Option<JoinMode>) -> ApiResult<&GeneratedReport> {
        let start = Instant::now();
        let (Some(surgical_map), Some(materials)) = (&self.surgical_map, &self.materials) else {
            let message = "Erro na Geração: envie o mapa cirúrgico e a planilha OPME antes de gerar o relatório.";
            self.notify(StageOutcome::failure(PipelineStage::ReportGeneration, message));
            return Err(ApiError::InvalidInput("请先上传手术排程表和 OPME 材料表".to_string()));
        };

        let mode = match mode.or(self.config.get_join_mode()?.explicit()) {
            Some(mode) => mode,
            None => self.detect_mode(&surgical_map.grid, &materials.grid)?,
        };

        let extractor = self.extractor(mode)?;
        let cases: Vec<CaseRecord> = extractor.extract_cases(&surgical_map.grid);
        let material_records: Vec<MaterialRecord> = extractor.extract_materials(&materials.grid);

        let reconciler = Reconciler::with_policy(self.config.get_name_match_policy()?);
        let entries = reconciler.reconcile(&cases, &material_records, mode);
        let summary = Reconciler::summarize(&entries, &material_records);

        info!(
            mode = %mode,
            surgical_map = %surgical_map.file_name,
            materials = %materials.file_name,
            entries = entries.len(),
            unmatched = summary.unmatched_materials,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "合并报表生成完成"
        );

        let outcome = StageOutcome::success(
            PipelineStage::ReportGeneration,
            entries.len(),
            format!(
                "Relatório Gerado: Relatório combinado criado com {} atendimentos.",
                entries.len()
            ),
        );
        self.notify(outcome);

        Ok(self.report.insert(GeneratedReport {
            entries,
            join_mode: mode,
            summary,
            generated_at: Utc::now(),
        }))
    }

    fn detect_mode(&self, surgical_map: &CellGrid, materials: &CellGrid) -> ApiResult<JoinMode> {
        let extractor = self.extractor(JoinMode::ByIdentifier)?;
        let cases = extractor.extract_cases(surgical_map);
        let material_records = extractor.extract_materials(materials);
        Ok(Reconciler::detect_mode(&cases, &material_records))
    }

    fn extractor(&self, mode: JoinMode) -> ApiResult<RowExtractor> {
        let (case_layout, material_layout) = self.config.get_layouts(mode)?;
        Ok(RowExtractor::new(&case_layout, &material_layout)?)
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 当前报表的导出行
    ///
    /// # 返回
    /// - Err(ExportWithEmptyReport): 尚未生成报表或报表为空
    pub fn export_rows(&self) -> ApiResult<Vec<ExportRow>> {
        let report = self
            .report
            .as_ref()
            .filter(|r| !r.entries.is_empty())
            .ok_or(ApiError::ExportWithEmptyReport)?;

        let export_config = self.config.get_export_config()?;
        Ok(Exporter::new(export_config.no_material_text).flatten(&report.entries))
    }

    /// 导出到目录（文件名按当天日期）
    pub fn export_report(&self, dir: &Path) -> ApiResult<PathBuf> {
        self.export_report_dated(dir, Local::now().date_naive())
    }

    /// 导出到目录（指定文件名日期）
    #[instrument(skip(self, dir), fields(dir = %dir.display()))]
    pub fn export_report_dated(&self, dir: &Path, date: NaiveDate) -> ApiResult<PathBuf> {
        let rows = match self.export_rows() {
            Ok(rows) => rows,
            Err(err) => {
                self.notify(StageOutcome::failure(
                    PipelineStage::Export,
                    "Nenhum Relatório: Gere o relatório antes de exportar.",
                ));
                return Err(err);
            }
        };

        let writer = XlsxReportWriter::from_config(&self.config.get_export_config()?);
        match writer.write_to_dir(&rows, dir, date) {
            Ok(path) => {
                self.notify(StageOutcome::success(
                    PipelineStage::Export,
                    rows.len(),
                    format!(
                        "Relatório Exportado: Arquivo {} baixado com sucesso.",
                        writer.file_name_for(date)
                    ),
                ));
                Ok(path)
            }
            Err(err) => {
                self.notify(StageOutcome::failure(
                    PipelineStage::Export,
                    "Erro na Exportação: Erro ao exportar o relatório.",
                ));
                Err(err.into())
            }
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn report(&self) -> Option<&GeneratedReport> {
        self.report.as_ref()
    }

    pub fn summary(&self) -> Option<&ReportSummary> {
        self.report.as_ref().map(|r| &r.summary)
    }

    /// 两张表是否都已上传
    pub fn is_ready(&self) -> bool {
        self.surgical_map.is_some() && self.materials.is_some()
    }

    /// 清空会话
    pub fn reset(&mut self) {
        self.surgical_map = None;
        self.materials = None;
        self.report = None;
    }

    fn notify(&self, outcome: StageOutcome) {
        self.notifier.notify(&outcome);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
