// ==========================================
// OPME 对账报表 - 导入接口 Trait
// ==========================================
// 职责: 定义导入层接口（不包含实现）
// 流程: 读取文件字节 → 解码为网格 → 过滤 → 字段映射 → 清洗
// ==========================================

use crate::domain::grid::{CellGrid, CellValue};
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::path::Path;

// ==========================================
// SheetSource Trait
// ==========================================
// 用途: 获取原始文件字节（流水线唯一的挂起点）
// 实现者: FileSheetSource
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// 读取文件原始字节
    ///
    /// # 参数
    /// - path: 文件路径
    ///
    /// # 返回
    /// - Ok(Vec<u8>): 文件内容
    /// - Err: 文件不存在、读取失败
    async fn fetch(&self, path: &Path) -> ImportResult<Vec<u8>>;
}

// ==========================================
// GridDecoder Trait
// ==========================================
// 用途: 将文件字节解码为单元格网格（只取第一个工作表）
// 实现者: WorkbookDecoder, CsvDecoder, UniversalDecoder
pub trait GridDecoder: Send + Sync {
    /// 解码文件字节
    ///
    /// # 参数
    /// - bytes: 文件原始字节
    /// - file_name: 文件名（用于按扩展名判定格式、错误提示）
    ///
    /// # 返回
    /// - Ok(CellGrid): 第一个工作表的网格
    /// - Err: 格式不支持、文件损坏
    fn decode(&self, bytes: &[u8], file_name: &str) -> ImportResult<CellGrid>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 单元格清洗接口
// 实现者: DataCleanerImpl (data_cleaner::DataCleaner)
pub trait DataCleaner: Send + Sync {
    /// 单元格转为去空白字符串
    fn clean_text(&self, value: &CellValue) -> String;

    /// 标准化 NULL 值（空字符串/空白 → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 解析非负小数（支持本地化千分位/小数点）
    ///
    /// # 返回
    /// - Some(f64): 解析成功（>= 0）
    /// - None: 无法解析，由调用方回退默认值
    fn parse_decimal(&self, value: &CellValue) -> Option<f64>;

    /// 姓名规范化（小写、去首尾空白、连续空白合并为单个空格）
    fn normalize_name(&self, value: &str) -> String;
}
