// ==========================================
// OPME 对账报表 - 网格解码器实现
// ==========================================
// 依据: 外部接口 - 输入边界（每次上传解码一次）
// 支持: Excel (.xlsx/.xls/.xlsm/.ods) / CSV (.csv)
// 说明: 只读取第一个工作表；不识别表头，表头判定交给布局
// CSV: UTF-8（可带 BOM），否则按 Windows-1252；分隔符按前 10 行探测
// ==========================================

use crate::domain::grid::{CellGrid, CellValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::{GridDecoder, SheetSource};
use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

// ==========================================
// FileSheetSource - 本地文件读取
// ==========================================
pub struct FileSheetSource;

#[async_trait]
impl SheetSource for FileSheetSource {
    async fn fetch(&self, path: &Path) -> ImportResult<Vec<u8>> {
        // 检查文件存在
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let bytes = tokio::fs::read(path).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "文件读取完成");
        Ok(bytes)
    }
}

// ==========================================
// CSV Decoder 实现
// ==========================================
pub struct CsvDecoder;

// 逗号排在最前，得分相同时优先
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 10;

impl GridDecoder for CsvDecoder {
    fn decode(&self, bytes: &[u8], file_name: &str) -> ImportResult<CellGrid> {
        let text = decode_text(bytes);
        let delimiter = sniff_delimiter(&text);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Vec<CellValue> = record.iter().map(CellValue::from).collect();
            rows.push(row);
        }

        debug!(
            file = file_name,
            rows = rows.len(),
            delimiter = %char::from(delimiter),
            utf8 = matches!(text, Cow::Borrowed(_)),
            "CSV 解码完成"
        );
        Ok(CellGrid::new(rows))
    }
}

/// 字节 → 文本
///
/// 合法 UTF-8 直接借用（去掉 BOM）；否则按 Windows-1252 解码（Latin-1 导出）
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}

/// 探测分隔符
///
/// 每个候选分隔符在前 10 个非空行上切分，统计多于一列的行的列数分布，
/// 得分 = 列数 × 该列数出现的行数（取最大）。全部为单列时回退逗号。
/// 标题行（如 "Mapa Cirúrgico"）只有一列，不参与计分。
fn sniff_delimiter(text: &str) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best = (b',', 0usize);
    for &delimiter in &DELIMITER_CANDIDATES {
        let mut frequency: HashMap<usize, usize> = HashMap::new();
        for line in &sample {
            let fields = ReaderBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .flexible(true)
                .from_reader(line.as_bytes())
                .records()
                .next()
                .and_then(Result::ok)
                .map_or(0, |record| record.len());
            if fields > 1 {
                *frequency.entry(fields).or_default() += 1;
            }
        }

        let score = frequency
            .iter()
            .map(|(fields, lines)| fields * lines)
            .max()
            .unwrap_or(0);
        if score > best.1 {
            best = (delimiter, score);
        }
    }
    best.0
}

// ==========================================
// Workbook Decoder 实现
// ==========================================
pub struct WorkbookDecoder;

impl GridDecoder for WorkbookDecoder {
    fn decode(&self, bytes: &[u8], file_name: &str) -> ImportResult<CellGrid> {
        let cursor = Cursor::new(bytes.to_vec());
        let mut workbook = open_workbook_auto_from_rs(cursor)?;

        // 读取第一个 sheet
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::EmptyWorkbook(file_name.to_string()))??;

        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();

        debug!(file = file_name, rows = rows.len(), "工作簿解码完成");
        Ok(CellGrid::new(rows))
    }
}

/// calamine 单元格 → CellValue
fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => CellValue::Text(format_excel_serial(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from(s.as_str()),
        Data::Error(_) => CellValue::Empty,
    }
}

/// Excel 序列日期 → "dd/mm/yyyy HH:MM"（无时间部分时只输出日期）
fn format_excel_serial(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return serial.to_string();
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    let Some(datetime) = epoch
        .and_hms_opt(0, 0, 0)
        .zip(Duration::try_milliseconds(millis))
        .and_then(|(start, offset)| start.checked_add_signed(offset))
    else {
        return serial.to_string();
    };

    if serial.fract() == 0.0 {
        datetime.format("%d/%m/%Y").to_string()
    } else {
        datetime.format("%d/%m/%Y %H:%M").to_string()
    }
}

// ==========================================
// 通用解码器（根据扩展名自动选择）
// ==========================================
pub struct UniversalDecoder;

impl GridDecoder for UniversalDecoder {
    fn decode(&self, bytes: &[u8], file_name: &str) -> ImportResult<CellGrid> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvDecoder.decode(bytes, file_name),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => WorkbookDecoder.decode(bytes, file_name),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
