// ==========================================
// OPME 对账报表 - Excel 报表写出
// ==========================================
// 职责: 导出行 → .xlsx（固定表头/列宽，冻结表头行）
// 文件名: <前缀>_<YYYY-MM-DD>.xlsx
// ==========================================

use crate::config::pipeline_config::{ExportConfig, DEFAULT_FILE_PREFIX, DEFAULT_SHEET_NAME};
use crate::domain::report::{ExportRow, ExportValue};
use crate::engine::exporter::EXPORT_COLUMNS;
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tracing::info;

/// 金额列数字格式
const MONEY_FORMAT: &str = "#,##0.00";

/// 金额列位置（Valor）
const COST_COLUMN: usize = 7;

pub struct XlsxReportWriter {
    file_prefix: String,
    sheet_name: String,
}

impl Default for XlsxReportWriter {
    fn default() -> Self {
        Self::new(DEFAULT_FILE_PREFIX, DEFAULT_SHEET_NAME)
    }
}

impl XlsxReportWriter {
    pub fn new(file_prefix: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            sheet_name: sheet_name.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.file_prefix.clone(), config.sheet_name.clone())
    }

    /// 导出文件名
    pub fn file_name_for(&self, date: NaiveDate) -> String {
        format!("{}_{}.xlsx", self.file_prefix, date.format("%Y-%m-%d"))
    }

    /// 构建工作簿
    fn build(&self, rows: &[ExportRow]) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet_name)?;

        let header_format = Format::new().set_bold();
        let money_format = Format::new()
            .set_num_format(MONEY_FORMAT)
            .set_align(FormatAlign::Right);

        for (col, (header, width)) in EXPORT_COLUMNS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (idx, row) in rows.iter().enumerate() {
            let row_num = (idx + 1) as u32;
            for (col, value) in row.values().iter().enumerate() {
                match value {
                    ExportValue::Text(text) => {
                        worksheet.write_string(row_num, col as u16, *text)?;
                    }
                    ExportValue::Number(number) if col == COST_COLUMN => {
                        worksheet.write_number_with_format(
                            row_num,
                            col as u16,
                            *number,
                            &money_format,
                        )?;
                    }
                    ExportValue::Number(number) => {
                        worksheet.write_number(row_num, col as u16, *number)?;
                    }
                }
            }
        }

        worksheet.set_freeze_panes(1, 0)?;
        Ok(workbook)
    }

    /// 写出到内存
    pub fn write_to_buffer(&self, rows: &[ExportRow]) -> Result<Vec<u8>, XlsxError> {
        self.build(rows)?.save_to_buffer()
    }

    /// 写出到目录
    ///
    /// # 返回
    /// - Ok(PathBuf): 写出的文件路径（同名文件直接覆盖）
    pub fn write_to_dir(
        &self,
        rows: &[ExportRow],
        dir: &Path,
        date: NaiveDate,
    ) -> Result<PathBuf, XlsxError> {
        let path = dir.join(self.file_name_for(date));
        self.build(rows)?.save(&path)?;

        info!(path = %path.display(), rows = rows.len(), "报表已写出");
        Ok(path)
    }
}
