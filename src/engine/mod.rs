// ==========================================
// OPME 对账报表 - 引擎层
// ==========================================
// 职责: 对账、展平、报表写出
// 红线: 引擎不读文件、不持有会话状态
// ==========================================

pub mod exporter;
pub mod reconciler;
pub mod report_writer;

// 重导出核心引擎
pub use exporter::{Exporter, EXPORT_COLUMNS};
pub use reconciler::{names_match, Reconciler};
pub use report_writer::XlsxReportWriter;
