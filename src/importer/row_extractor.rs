// ==========================================
// OPME 对账报表 - 行抽取器
// ==========================================
// 职责: 网格 → 合格行 → 类型化记录
// 流程: 过滤 → 建立表头索引 → 字段映射 → 丢弃必填字段为空的记录
// 红线: 单元格问题只回退默认值，抽取本身不因脏数据失败
// ==========================================

use crate::config::layout::SheetLayout;
use crate::domain::grid::CellGrid;
use crate::domain::record::{CaseRecord, MaterialRecord};
use crate::domain::types::{JoinMode, RecordKind};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{CompiledLayout, FieldMapper, HeaderIndex};
use crate::importer::record_filter::{QualifiedRow, RecordFilter};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// 抽取结果（按记录类型）
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedRecords {
    Cases(Vec<CaseRecord>),
    Materials(Vec<MaterialRecord>),
}

impl ExtractedRecords {
    pub fn kind(&self) -> RecordKind {
        match self {
            ExtractedRecords::Cases(_) => RecordKind::Case,
            ExtractedRecords::Materials(_) => RecordKind::Material,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExtractedRecords::Cases(records) => records.len(),
            ExtractedRecords::Materials(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==========================================
// RowExtractor
// ==========================================
#[derive(Debug, Clone)]
pub struct RowExtractor {
    case_layout: CompiledLayout,
    material_layout: CompiledLayout,
}

impl RowExtractor {
    /// 由两张表的布局创建抽取器（布局在此编译并校验）
    pub fn new(case_layout: &SheetLayout, material_layout: &SheetLayout) -> ImportResult<Self> {
        let case_layout = CompiledLayout::compile(case_layout)?;
        let material_layout = CompiledLayout::compile(material_layout)?;

        for (compiled, expected) in [
            (&case_layout, RecordKind::Case),
            (&material_layout, RecordKind::Material),
        ] {
            if compiled.kind() != expected {
                return Err(ImportError::ConfigValueError {
                    key: compiled.layout().name.clone(),
                    value: compiled.kind().to_string(),
                    message: format!("布局类型应为 {}", expected),
                });
            }
        }

        Ok(Self {
            case_layout,
            material_layout,
        })
    }

    /// 使用内置布局创建抽取器
    pub fn for_mode(mode: JoinMode) -> ImportResult<Self> {
        Self::new(
            &SheetLayout::surgical_map(mode),
            &SheetLayout::opme_materials(mode),
        )
    }

    pub fn layout(&self, kind: RecordKind) -> &SheetLayout {
        self.compiled(kind).layout()
    }

    fn compiled(&self, kind: RecordKind) -> &CompiledLayout {
        match kind {
            RecordKind::Case => &self.case_layout,
            RecordKind::Material => &self.material_layout,
        }
    }

    /// 按记录类型选择布局并抽取
    pub fn extract(&self, grid: &CellGrid, kind: RecordKind) -> ExtractedRecords {
        match kind {
            RecordKind::Case => ExtractedRecords::Cases(self.extract_cases(grid)),
            RecordKind::Material => ExtractedRecords::Materials(self.extract_materials(grid)),
        }
    }

    /// 抽取手术病例
    #[instrument(skip(self, grid), fields(layout = %self.case_layout.layout().name))]
    pub fn extract_cases(&self, grid: &CellGrid) -> Vec<CaseRecord> {
        let start = Instant::now();
        let (mapper, rows) = self.prepare(grid, &self.case_layout);
        let qualified = rows.len();

        let records: Vec<CaseRecord> = rows
            .into_iter()
            .filter_map(|row| mapper.map_case(row))
            .collect();

        info!(
            grid_rows = grid.row_count(),
            qualified,
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "病例抽取完成"
        );
        records
    }

    /// 抽取材料明细
    #[instrument(skip(self, grid), fields(layout = %self.material_layout.layout().name))]
    pub fn extract_materials(&self, grid: &CellGrid) -> Vec<MaterialRecord> {
        let start = Instant::now();
        let (mapper, rows) = self.prepare(grid, &self.material_layout);
        let qualified = rows.len();

        let records: Vec<MaterialRecord> = rows
            .into_iter()
            .filter_map(|row| mapper.map_material(row))
            .collect();

        info!(
            grid_rows = grid.row_count(),
            qualified,
            records = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "材料抽取完成"
        );
        records
    }

    fn prepare<'g, 'l>(
        &self,
        grid: &'g CellGrid,
        compiled: &'l CompiledLayout,
    ) -> (FieldMapper<'l>, Vec<QualifiedRow<'g>>) {
        let layout = compiled.layout();
        let strict = RecordFilter::new(&layout.filter, layout.headers_present);

        // 声明表头时取第一条合格行；否则按别名定位，且该行不作为数据行
        let header = if layout.headers_present {
            strict.first_qualifying(grid)
        } else {
            HeaderIndex::locate_header(grid, layout.all_aliases())
        };
        let headers = header
            .map(|h| HeaderIndex::from_row(h.cells))
            .unwrap_or_default();

        let filter = strict.with_fallback_columns(compiled.fallback_columns(&headers));
        let rows = filter.data_rows(grid, header.map(|h| h.row_number));
        debug!(
            qualified = rows.len(),
            header_columns = !headers.is_empty(),
            "数据行过滤完成"
        );

        (FieldMapper::new(compiled, headers), rows)
    }
}
