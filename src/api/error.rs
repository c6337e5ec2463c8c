// ==========================================
// OPME 对账报表 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把导入/导出的技术错误转换为可展示的错误消息
// 说明: 空输入不是错误（记录数为 0 的成功阶段结果）
// ==========================================

use crate::importer::error::ImportError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 上传错误
    // ==========================================
    /// 文件无法解码，流水线不会继续
    #[error("文件解码失败 (file: {file_name}): {message}")]
    DecodeFailure { file_name: String, message: String },

    // ==========================================
    // 导出错误
    // ==========================================
    /// 尚未生成报表（或报表已因重新上传失效），不写出文件
    #[error("没有可导出的报表，请先生成报表")]
    ExportWithEmptyReport,

    #[error("报表导出失败: {0}")]
    ExportFailed(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 配置错误
    // ==========================================
    #[error("配置错误: {0}")]
    Config(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),
}

// ==========================================
// 从 ImportError 转换
// 目的: 文件/格式类错误归为解码失败，布局/配置类错误归为配置错误
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::DecodeFailure {
                file_name: path.clone(),
                message: ImportError::FileNotFound(path).to_string(),
            },
            ImportError::UnsupportedFormat(_)
            | ImportError::FileReadError(_)
            | ImportError::ExcelParseError(_)
            | ImportError::CsvParseError(_)
            | ImportError::EmptyWorkbook(_) => ApiError::DecodeFailure {
                file_name: String::new(),
                message: err.to_string(),
            },
            ImportError::InvalidPattern { .. }
            | ImportError::MissingRequiredField { .. }
            | ImportError::ConfigReadError { .. }
            | ImportError::ConfigValueError { .. } => ApiError::Config(err.to_string()),
            ImportError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ApiError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ApiError::ExportFailed(err.to_string())
    }
}

impl ApiError {
    /// 为解码失败补上文件名
    pub fn with_file_name(self, name: &str) -> Self {
        match self {
            ApiError::DecodeFailure { message, .. } => ApiError::DecodeFailure {
                file_name: name.to_string(),
                message,
            },
            other => other,
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
