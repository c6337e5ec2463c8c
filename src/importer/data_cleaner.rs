// ==========================================
// OPME 对账报表 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 本地化数值解析 / 姓名规范化
// 红线: 单元格清洗失败只回退默认值，不让整行失败
// ==========================================

use crate::domain::grid::CellValue;
use crate::domain::record::{DEFAULT_COST, DEFAULT_QUANTITY};
use crate::importer::importer_trait::DataCleaner as DataCleanerTrait;
use tracing::trace;

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &CellValue) -> String {
        value.to_trimmed_string()
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn parse_decimal(&self, value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Number(n) if n.is_finite() => Some(n.abs()),
            CellValue::Number(_) | CellValue::Empty => None,
            CellValue::Text(s) => parse_locale_decimal(s),
        }
    }

    fn normalize_name(&self, value: &str) -> String {
        value
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl DataCleaner {
    /// 解析数量（无法解析时为 1）
    pub fn parse_quantity(&self, value: &CellValue, row: usize) -> f64 {
        self.parse_decimal(value).unwrap_or_else(|| {
            trace!(row = row, raw = %value, "数量无法解析，使用默认值");
            DEFAULT_QUANTITY
        })
    }

    /// 解析金额（无法解析时为 0）
    pub fn parse_cost(&self, value: &CellValue, row: usize) -> f64 {
        self.parse_decimal(value).unwrap_or_else(|| {
            trace!(row = row, raw = %value, "金额无法解析，使用默认值");
            DEFAULT_COST
        })
    }
}

/// 解析本地化数值文本（如 "R$ 1.234,56"）
///
/// # 规则
/// 1. 只保留数字与分隔符（货币符号、空格、负号等一律去掉）
/// 2. 同时出现 ',' 与 '.' 时，最右侧的为小数点，另一个为千分位
/// 3. 只有 ',' ：出现一次为小数点（pt-BR），多次为千分位
/// 4. 只有 '.' ：出现多次为千分位；出现一次且其后恰好 3 位、整数部分非 0 时为千分位
///
/// # 返回
/// - None: 不含数字或无法解析
pub fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (kept.rfind('.'), kept.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                kept.replace('.', "").replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        (None, Some(_)) => {
            if kept.matches(',').count() == 1 {
                kept.replace(',', ".")
            } else {
                kept.replace(',', "")
            }
        }
        (Some(dot), None) => {
            if kept.matches('.').count() > 1 {
                kept.replace('.', "")
            } else {
                let int_part = &kept[..dot];
                let frac_part = &kept[dot + 1..];
                let is_thousands = frac_part.len() == 3
                    && !int_part.is_empty()
                    && int_part.chars().any(|c| c != '0');
                if is_thousands {
                    kept.replace('.', "")
                } else {
                    kept
                }
            }
        }
        (None, None) => kept,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_basic() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.clean_text(&CellValue::from("  hello  ")), "hello");
        assert_eq!(cleaner.clean_text(&CellValue::Number(42.0)), "42");
        assert_eq!(cleaner.clean_text(&CellValue::Empty), "");
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some("".to_string())), None);
        assert_eq!(
            cleaner.normalize_null(Some("  value  ".to_string())),
            Some("value".to_string())
        );
        assert_eq!(cleaner.normalize_null(None), None);
    }

    #[test]
    fn test_parse_brazilian_currency() {
        assert_eq!(parse_locale_decimal("R$ 1.234,56"), Some(1234.56));
        assert_eq!(parse_locale_decimal("R$ 12.345.678,90"), Some(12345678.90));
        assert_eq!(parse_locale_decimal("350,00"), Some(350.0));
    }

    #[test]
    fn test_parse_english_and_plain_numbers() {
        assert_eq!(parse_locale_decimal("1,234.56"), Some(1234.56));
        assert_eq!(parse_locale_decimal("2.5"), Some(2.5));
        assert_eq!(parse_locale_decimal("3"), Some(3.0));
        assert_eq!(parse_locale_decimal("0.125"), Some(0.125));
    }

    #[test]
    fn test_parse_single_dot_thousands() {
        assert_eq!(parse_locale_decimal("1.500"), Some(1500.0));
        assert_eq!(parse_locale_decimal("1.234.567"), Some(1234567.0));
    }

    #[test]
    fn test_parse_strips_sign_and_letters() {
        assert_eq!(parse_locale_decimal("-2 un"), Some(2.0));
        assert_eq!(parse_locale_decimal("abc"), None);
        assert_eq!(parse_locale_decimal(""), None);
        assert_eq!(parse_locale_decimal(",."), None);
    }

    #[test]
    fn test_quantity_and_cost_defaults() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.parse_quantity(&CellValue::from("n/d"), 1), 1.0);
        assert_eq!(cleaner.parse_quantity(&CellValue::Empty, 1), 1.0);
        assert_eq!(cleaner.parse_cost(&CellValue::from("sem valor"), 1), 0.0);
        assert_eq!(cleaner.parse_cost(&CellValue::Number(-10.5), 1), 10.5);
        assert_eq!(cleaner.parse_quantity(&CellValue::Number(2.0), 1), 2.0);
    }

    #[test]
    fn test_normalize_name() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_name("  John   SMITH \t"), "john smith");
        assert_eq!(cleaner.normalize_name("   "), "");
    }
}
