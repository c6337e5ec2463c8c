// ==========================================
// OPME 对账报表 - 数据行过滤器
// ==========================================
// 职责: 剔除非数据行（必填列为空、表中夹杂的表头/页脚行）
// 红线: 稳定过滤，不改变行序
// ==========================================

use crate::config::layout::RowFilterRule;
use crate::domain::grid::{row_cell, CellGrid, CellValue};
use std::collections::HashMap;

/// 合格行（行号从 1 开始，对应源表行号）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualifiedRow<'a> {
    pub row_number: usize,
    pub cells: &'a [CellValue],
}

pub struct RecordFilter<'r> {
    rule: &'r RowFilterRule,
    headers_present: bool,
    // 必填列 → 表头别名所在的备选列
    fallback_columns: HashMap<usize, Vec<usize>>,
}

impl<'r> RecordFilter<'r> {
    pub fn new(rule: &'r RowFilterRule, headers_present: bool) -> Self {
        Self {
            rule,
            headers_present,
            fallback_columns: HashMap::new(),
        }
    }

    /// 必填列为空时改查的备选列（来自表头别名）
    pub fn with_fallback_columns(mut self, fallback_columns: HashMap<usize, Vec<usize>>) -> Self {
        self.fallback_columns = fallback_columns;
        self
    }

    /// 单行是否为数据行
    pub fn qualifies(&self, cells: &[CellValue]) -> bool {
        let required_ok = self.rule.required_columns.iter().all(|&col| {
            !row_cell(cells, col).is_blank()
                || self
                    .fallback_columns
                    .get(&col)
                    .is_some_and(|alts| alts.iter().any(|&alt| !row_cell(cells, alt).is_blank()))
        });
        if !required_ok {
            return false;
        }

        !self.rule.sentinel_columns.iter().any(|&col| {
            let value = row_cell(cells, col).to_trimmed_string();
            self.rule.rejected_values.iter().any(|r| r.trim() == value)
        })
    }

    fn qualified_rows<'g>(&self, grid: &'g CellGrid) -> Vec<QualifiedRow<'g>> {
        grid.rows()
            .iter()
            .enumerate()
            .filter(|(_, cells)| self.qualifies(cells))
            .map(|(idx, cells)| QualifiedRow {
                row_number: idx + 1,
                cells: cells.as_slice(),
            })
            .collect()
    }

    /// 第一条合格行
    pub fn first_qualifying<'g>(&self, grid: &'g CellGrid) -> Option<QualifiedRow<'g>> {
        grid.rows()
            .iter()
            .enumerate()
            .find(|(_, cells)| self.qualifies(cells))
            .map(|(idx, cells)| QualifiedRow {
                row_number: idx + 1,
                cells: cells.as_slice(),
            })
    }

    /// 表头之外的数据行
    ///
    /// # 参数
    /// - header_row: 表头行号；声明有表头时表头及其之前的行都不是数据行，
    ///   否则只剔除表头本身
    pub fn data_rows<'g>(
        &self,
        grid: &'g CellGrid,
        header_row: Option<usize>,
    ) -> Vec<QualifiedRow<'g>> {
        self.qualified_rows(grid)
            .into_iter()
            .filter(|row| match header_row {
                Some(header) if self.headers_present => row.row_number > header,
                Some(header) => row.row_number != header,
                None => true,
            })
            .collect()
    }

    /// 过滤网格
    ///
    /// # 返回
    /// - (表头行, 数据行列表)
    /// - 声明有表头时，第一条合格行作为表头返回并从数据行中剔除
    pub fn filter<'g>(
        &self,
        grid: &'g CellGrid,
    ) -> (Option<QualifiedRow<'g>>, Vec<QualifiedRow<'g>>) {
        let header = if self.headers_present {
            self.first_qualifying(grid)
        } else {
            None
        };
        (header, self.data_rows(grid, header.map(|h| h.row_number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::from(*v)).collect()
    }

    fn case_rule() -> RowFilterRule {
        RowFilterRule {
            required_columns: vec![2, 3],
            sentinel_columns: vec![2],
            rejected_values: vec!["Atendimento".to_string()],
        }
    }

    #[test]
    fn test_blank_required_column_rejected() {
        let rule = case_rule();
        let filter = RecordFilter::new(&rule, false);

        assert!(filter.qualifies(&row(&["", "10:00", "A100", "Jane Doe"])));
        assert!(!filter.qualifies(&row(&["", "10:00", "A100", "   "])));
        assert!(!filter.qualifies(&row(&["", "10:00", "", "Jane Doe"])));
        assert!(!filter.qualifies(&row(&["", "10:00"])));
    }

    #[test]
    fn test_sentinel_header_row_rejected() {
        let rule = case_rule();
        let filter = RecordFilter::new(&rule, false);
        assert!(!filter.qualifies(&row(&["", "Data", " Atendimento ", "Paciente"])));
    }

    #[test]
    fn test_filter_preserves_order_and_row_numbers() {
        let rule = case_rule();
        let filter = RecordFilter::new(&rule, false);
        let grid = CellGrid::new(vec![
            row(&["Mapa Cirúrgico"]),
            row(&["", "Data", "Atendimento", "Paciente"]),
            row(&["", "08:00", "A200", "Maria"]),
            row(&[]),
            row(&["", "09:00", "A100", "Jane"]),
        ]);

        let (header, rows) = filter.filter(&grid);
        assert!(header.is_none());
        let numbers: Vec<usize> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![3, 5]);
    }

    #[test]
    fn test_header_skip_only_when_declared() {
        let rule = RowFilterRule {
            required_columns: vec![0],
            ..Default::default()
        };
        let grid = CellGrid::new(vec![
            row(&["Atendimento", "Material"]),
            row(&["A100", "Screw"]),
        ]);

        let (header, rows) = RecordFilter::new(&rule, true).filter(&grid);
        assert_eq!(header.map(|h| h.row_number), Some(1));
        assert_eq!(rows.len(), 1);

        let (header, rows) = RecordFilter::new(&rule, false).filter(&grid);
        assert!(header.is_none());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_fallback_column_satisfies_blank_required_column() {
        let rule = RowFilterRule {
            required_columns: vec![0],
            ..Default::default()
        };
        let cells = row(&["", "Screw", "12345 - Jane Doe"]);

        let strict = RecordFilter::new(&rule, false);
        assert!(!strict.qualifies(&cells));

        let relaxed = RecordFilter::new(&rule, false)
            .with_fallback_columns(HashMap::from([(0, vec![2])]));
        assert!(relaxed.qualifies(&cells));
        assert!(!relaxed.qualifies(&row(&["", "Screw", "  "])));
    }

    #[test]
    fn test_data_rows_excludes_located_header() {
        let rule = RowFilterRule {
            required_columns: vec![0],
            ..Default::default()
        };
        let grid = CellGrid::new(vec![
            row(&["Paciente", "Procedimento"]),
            row(&["Jane Doe", "Knee Repair"]),
        ]);

        let rows = RecordFilter::new(&rule, false).data_rows(&grid, Some(1));
        let numbers: Vec<usize> = rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![2]);
    }
}
