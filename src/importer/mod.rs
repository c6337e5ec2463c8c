// ==========================================
// OPME 对账报表 - 导入层
// ==========================================
// 职责: 外部表格导入，生成类型化记录
// 支持: Excel, CSV
// 流程: 读取字节 → 解码网格 → 过滤 → 字段映射 → 清洗
// ==========================================

// 模块声明
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod record_filter;
pub mod row_extractor;

// 重导出核心类型
pub use data_cleaner::{parse_locale_decimal, DataCleaner as DataCleanerImpl};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{CompiledLayout, FieldMapper, HeaderIndex};
pub use file_parser::{CsvDecoder, FileSheetSource, UniversalDecoder, WorkbookDecoder};
pub use record_filter::{QualifiedRow, RecordFilter};
pub use row_extractor::{ExtractedRecords, RowExtractor};

// 重导出 Trait 接口
pub use importer_trait::{DataCleaner, GridDecoder, SheetSource};
