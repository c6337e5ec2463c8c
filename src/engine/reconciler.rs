// ==========================================
// OPME 对账报表 - 对账引擎
// ==========================================
// 职责: 病例 × 材料 关联、按病例分组、汇总
// 输入: 病例记录 + 材料记录 + 关联方式
// 输出: 每个病例一个合并条目（顺序与病例输入一致）
// 红线: 无状态引擎，同样的输入必然得到同样的输出
// ==========================================

use crate::domain::record::{CaseRecord, MaterialRecord};
use crate::domain::report::{CombinedReportEntry, ReportSummary};
use crate::domain::types::{JoinMode, NameMatchPolicy};
use crate::importer::importer_trait::DataCleaner as _;
use crate::importer::DataCleanerImpl;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// Reconciler - 对账引擎
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    policy: NameMatchPolicy,
}

impl Reconciler {
    /// 创建对账引擎（姓名匹配使用默认的宽松策略）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: NameMatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> NameMatchPolicy {
        self.policy
    }

    // ==========================================
    // 核心方法
    // ==========================================

    /// 关联病例与材料
    ///
    /// # 参数
    /// - cases: 病例记录（决定输出顺序）
    /// - materials: 材料记录（决定条目内材料顺序）
    /// - mode: 关联方式
    ///
    /// # 返回
    /// 每个病例一个条目；无关联材料的病例 materials 为空、aggregate 为 0
    #[instrument(skip(self, cases, materials), fields(cases = cases.len(), materials = materials.len()))]
    pub fn reconcile(
        &self,
        cases: &[CaseRecord],
        materials: &[MaterialRecord],
        mode: JoinMode,
    ) -> Vec<CombinedReportEntry> {
        let shared: Vec<Arc<MaterialRecord>> =
            materials.iter().cloned().map(Arc::new).collect();

        let groups = match mode {
            JoinMode::ByIdentifier => self.group_by_identifier(cases, &shared),
            JoinMode::ByFuzzyName => self.group_by_fuzzy_name(cases, &shared),
        };

        let report: Vec<CombinedReportEntry> = cases
            .iter()
            .zip(groups)
            .map(|(case, attached)| {
                let aggregate = attached.iter().map(|m| m.aggregate_value(mode)).sum();
                CombinedReportEntry {
                    case: case.clone(),
                    materials: attached,
                    aggregate,
                    join_mode: mode,
                }
            })
            .collect();

        let multiply_matched = attachment_counts(&report)
            .values()
            .filter(|&&count| count > 1)
            .count();
        if multiply_matched > 0 {
            warn!(
                mode = %mode,
                multiply_matched,
                "部分材料关联到多个病例，汇总值会被重复计入"
            );
        }

        info!(
            mode = %mode,
            entries = report.len(),
            matched_entries = report.iter().filter(|e| e.has_materials()).count(),
            "对账完成"
        );
        report
    }

    /// 按就诊号关联：先按就诊号聚类（保持首次出现顺序），再逐病例查表
    fn group_by_identifier(
        &self,
        cases: &[CaseRecord],
        materials: &[Arc<MaterialRecord>],
    ) -> Vec<Vec<Arc<MaterialRecord>>> {
        let mut clusters: HashMap<&str, Vec<Arc<MaterialRecord>>> = HashMap::new();
        for material in materials {
            if let Some(key) = material.join_key(JoinMode::ByIdentifier) {
                clusters.entry(key).or_default().push(Arc::clone(material));
            }
        }
        debug!(clusters = clusters.len(), "材料按就诊号聚类完成");

        cases
            .iter()
            .map(|case| {
                case.case_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .and_then(|id| clusters.get(id))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect()
    }

    /// 按姓名模糊关联：规范化后相等或互为子串即匹配
    fn group_by_fuzzy_name(
        &self,
        cases: &[CaseRecord],
        materials: &[Arc<MaterialRecord>],
    ) -> Vec<Vec<Arc<MaterialRecord>>> {
        let cleaner = DataCleanerImpl;
        let case_names: Vec<String> = cases
            .iter()
            .map(|c| cleaner.normalize_name(&c.patient_name))
            .collect();
        let material_names: Vec<String> = materials
            .iter()
            .map(|m| {
                m.join_key(JoinMode::ByFuzzyName)
                    .map(|name| cleaner.normalize_name(name))
                    .unwrap_or_default()
            })
            .collect();

        // ExactFirst: 存在精确匹配病例的材料只挂到精确匹配的病例上
        let exact_available: HashSet<usize> = match self.policy {
            NameMatchPolicy::Permissive => HashSet::new(),
            NameMatchPolicy::ExactFirst => {
                let names: HashSet<&str> = case_names
                    .iter()
                    .map(String::as_str)
                    .filter(|n| !n.is_empty())
                    .collect();
                material_names
                    .iter()
                    .enumerate()
                    .filter(|(_, name)| names.contains(name.as_str()))
                    .map(|(idx, _)| idx)
                    .collect()
            }
        };

        case_names
            .iter()
            .map(|case_name| {
                materials
                    .iter()
                    .zip(&material_names)
                    .enumerate()
                    .filter(|(idx, (_, material_name))| {
                        if exact_available.contains(idx) {
                            !case_name.is_empty() && case_name == *material_name
                        } else {
                            names_match(case_name, material_name)
                        }
                    })
                    .map(|(_, (material, _))| Arc::clone(material))
                    .collect()
            })
            .collect()
    }

    /// 自动判定关联方式
    ///
    /// # 参数
    /// - cases: 按就诊号布局抽取的病例
    /// - materials: 按就诊号布局抽取的材料
    ///
    /// # 返回
    /// - ByIdentifier: 至少一条材料的就诊号能在病例中找到
    /// - ByFuzzyName: 其余情况
    pub fn detect_mode(cases: &[CaseRecord], materials: &[MaterialRecord]) -> JoinMode {
        let case_ids: HashSet<&str> = cases
            .iter()
            .filter_map(|c| c.case_id.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        let hits = materials
            .iter()
            .filter_map(|m| m.join_key(JoinMode::ByIdentifier))
            .filter(|key| case_ids.contains(key))
            .count();

        let mode = if hits > 0 {
            JoinMode::ByIdentifier
        } else {
            JoinMode::ByFuzzyName
        };
        debug!(mode = %mode, identifier_hits = hits, "关联方式自动判定");
        mode
    }

    /// 报表汇总
    ///
    /// # 参数
    /// - report: 对账结果
    /// - materials: 参与对账的全部材料（用于统计未关联材料）
    pub fn summarize(report: &[CombinedReportEntry], materials: &[MaterialRecord]) -> ReportSummary {
        let counts = attachment_counts(report);
        let unmatched_materials = materials
            .iter()
            .filter(|m| !counts.contains_key(&m.row_number))
            .count();

        ReportSummary {
            total_cases: report.len(),
            total_materials: report.iter().map(|e| e.materials.len()).sum(),
            total_aggregate: report.iter().map(|e| e.aggregate).sum(),
            cases_without_materials: report.iter().filter(|e| !e.has_materials()).count(),
            unmatched_materials,
            multiply_matched_materials: counts.values().filter(|&&c| c > 1).count(),
        }
    }
}

/// 姓名匹配：均非空，且相等或互为子串
pub fn names_match(case_name: &str, material_name: &str) -> bool {
    if case_name.is_empty() || material_name.is_empty() {
        return false;
    }
    case_name == material_name
        || case_name.contains(material_name)
        || material_name.contains(case_name)
}

/// 材料（按源表行号）被关联的次数
fn attachment_counts(report: &[CombinedReportEntry]) -> HashMap<usize, usize> {
    let mut counts = HashMap::new();
    for material in report.iter().flat_map(|e| e.materials.iter()) {
        *counts.entry(material.row_number).or_insert(0) += 1;
    }
    counts
}
