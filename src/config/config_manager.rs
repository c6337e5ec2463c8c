// ==========================================
// OPME 对账报表 - 配置管理器
// ==========================================
// 职责: 配置加载、校验、查询、覆写
// 存储: JSON 文件（可选），未提供时使用内置默认值
// 红线: 布局正则在加载时一次性编译校验，不拖到流水线运行时
// ==========================================

use crate::config::import_config_trait::PipelineConfigReader;
use crate::config::layout::SheetLayout;
use crate::config::pipeline_config::{ExportConfig, PipelineConfig};
use crate::domain::types::{JoinMode, JoinModeSelection, NameMatchPolicy};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::row_extractor::RowExtractor;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Excel 工作表名称长度上限
const MAX_SHEET_NAME_LEN: usize = 31;

/// Excel 工作表名称禁用字符
const FORBIDDEN_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: Arc<RwLock<PipelineConfig>>,
}

impl ConfigManager {
    /// 创建使用默认配置的 ConfigManager
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置对象创建（先校验）
    pub fn from_config(config: PipelineConfig) -> ImportResult<Self> {
        Self::validate(&config)?;
        Ok(Self {
            config: Arc::new(RwLock::new(config)),
        })
    }

    /// 从 JSON 文件加载配置
    ///
    /// # 参数
    /// - path: 配置文件路径
    ///
    /// # 返回
    /// - Err(ConfigReadError): 文件不存在、读取失败或 JSON 格式错误
    /// - Err(InvalidPattern / ConfigValueError): 配置值校验失败
    pub fn load(path: &Path) -> ImportResult<Self> {
        let source = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| ImportError::ConfigReadError {
            path: source.clone(),
            message: e.to_string(),
        })?;

        let manager = Self::from_json(&raw, &source)?;
        info!(path = %source, "配置加载完成");
        Ok(manager)
    }

    /// 从 JSON 文本创建配置
    pub fn from_json(raw: &str, source: &str) -> ImportResult<Self> {
        let config: PipelineConfig =
            serde_json::from_str(raw).map_err(|e| ImportError::ConfigReadError {
                path: source.to_string(),
                message: e.to_string(),
            })?;
        Self::from_config(config)
    }

    /// 校验配置
    ///
    /// # 校验项
    /// - 两种关联方式下的布局均可编译（正则合法、必填字段齐全、布局类型正确）
    /// - 导出文件名前缀非空
    /// - 工作表名称符合 Excel 限制
    pub fn validate(config: &PipelineConfig) -> ImportResult<()> {
        for mode in [JoinMode::ByIdentifier, JoinMode::ByFuzzyName] {
            let (surgical_map, materials) = config.layouts_for(mode);
            RowExtractor::new(&surgical_map, &materials)?;
        }

        let export = &config.export;
        if export.file_prefix.trim().is_empty() {
            return Err(ImportError::ConfigValueError {
                key: config_keys::EXPORT_FILE_PREFIX.to_string(),
                value: export.file_prefix.clone(),
                message: "文件名前缀不能为空".to_string(),
            });
        }

        let sheet_name = export.sheet_name.trim();
        if sheet_name.is_empty()
            || sheet_name.chars().count() > MAX_SHEET_NAME_LEN
            || sheet_name.contains(FORBIDDEN_SHEET_CHARS)
        {
            return Err(ImportError::ConfigValueError {
                key: config_keys::EXPORT_SHEET_NAME.to_string(),
                value: export.sheet_name.clone(),
                message: format!(
                    "工作表名称需为 1-{} 个字符且不含 []:*?/\\",
                    MAX_SHEET_NAME_LEN
                ),
            });
        }

        debug!("配置校验通过");
        Ok(())
    }

    fn read(&self) -> ImportResult<RwLockReadGuard<'_, PipelineConfig>> {
        self.config
            .read()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))
    }

    fn write(&self) -> ImportResult<RwLockWriteGuard<'_, PipelineConfig>> {
        self.config
            .write()
            .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))
    }

    /// 当前配置的副本
    pub fn current(&self) -> ImportResult<PipelineConfig> {
        Ok(self.read()?.clone())
    }

    /// 读取单个配置值（字符串形式）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 未知的配置键
    pub fn get_config_value(&self, key: &str) -> ImportResult<Option<String>> {
        let config = self.read()?;
        let value = match key {
            config_keys::JOIN_MODE => Some(enum_to_string(&config.join_mode)?),
            config_keys::NAME_MATCH_POLICY => Some(enum_to_string(&config.name_match_policy)?),
            config_keys::EXPORT_FILE_PREFIX => Some(config.export.file_prefix.clone()),
            config_keys::EXPORT_SHEET_NAME => Some(config.export.sheet_name.clone()),
            config_keys::EXPORT_NO_MATERIAL_TEXT => Some(config.export.no_material_text.clone()),
            _ => None,
        };
        Ok(value)
    }

    /// 覆写单个配置值（校验通过后才生效）
    pub fn set_config_value(&self, key: &str, value: &str) -> ImportResult<()> {
        let mut candidate = self.current()?;
        match key {
            config_keys::JOIN_MODE => candidate.join_mode = parse_join_mode(value)?,
            config_keys::NAME_MATCH_POLICY => {
                candidate.name_match_policy = parse_enum(key, value)?
            }
            config_keys::EXPORT_FILE_PREFIX => candidate.export.file_prefix = value.to_string(),
            config_keys::EXPORT_SHEET_NAME => candidate.export.sheet_name = value.to_string(),
            config_keys::EXPORT_NO_MATERIAL_TEXT => {
                candidate.export.no_material_text = value.to_string()
            }
            _ => {
                return Err(ImportError::ConfigValueError {
                    key: key.to_string(),
                    value: value.to_string(),
                    message: "未知的配置键".to_string(),
                })
            }
        }

        Self::validate(&candidate)?;
        *self.write()? = candidate;
        info!(key = key, value = value, "配置已覆写");
        Ok(())
    }

    /// 获取配置快照（JSON）
    pub fn get_config_snapshot(&self) -> ImportResult<String> {
        let config = self.read()?;
        serde_json::to_string_pretty(&*config)
            .map_err(|e| ImportError::InternalError(format!("配置序列化失败: {}", e)))
    }

    /// 从配置快照恢复（整体替换当前配置）
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ImportResult<()> {
        let restored = Self::from_json(snapshot_json, "snapshot")?.current()?;
        *self.write()? = restored;
        info!("配置已从快照恢复");
        Ok(())
    }
}

impl PipelineConfigReader for ConfigManager {
    fn get_join_mode(&self) -> ImportResult<JoinModeSelection> {
        Ok(self.read()?.join_mode)
    }

    fn get_name_match_policy(&self) -> ImportResult<NameMatchPolicy> {
        Ok(self.read()?.name_match_policy)
    }

    fn get_layouts(&self, mode: JoinMode) -> ImportResult<(SheetLayout, SheetLayout)> {
        Ok(self.read()?.layouts_for(mode))
    }

    fn get_export_config(&self) -> ImportResult<ExportConfig> {
        Ok(self.read()?.export.clone())
    }
}

/// 关联方式（接受 "auto" 以及 JoinMode 的各种写法）
fn parse_join_mode(value: &str) -> ImportResult<JoinModeSelection> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("auto") {
        return Ok(JoinModeSelection::Auto);
    }
    trimmed
        .parse::<JoinMode>()
        .map(JoinModeSelection::from)
        .map_err(|message| ImportError::ConfigValueError {
            key: config_keys::JOIN_MODE.to_string(),
            value: value.to_string(),
            message,
        })
}

fn parse_enum<T: DeserializeOwned>(key: &str, value: &str) -> ImportResult<T> {
    serde_json::from_value(serde_json::Value::String(value.trim().to_lowercase())).map_err(|e| {
        ImportError::ConfigValueError {
            key: key.to_string(),
            value: value.to_string(),
            message: e.to_string(),
        }
    })
}

fn enum_to_string<T: serde::Serialize>(value: &T) -> ImportResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        Ok(other) => Ok(other.to_string()),
        Err(e) => Err(ImportError::InternalError(e.to_string())),
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 关联
    pub const JOIN_MODE: &str = "join_mode";
    pub const NAME_MATCH_POLICY: &str = "name_match_policy";

    // 导出
    pub const EXPORT_FILE_PREFIX: &str = "export.file_prefix";
    pub const EXPORT_SHEET_NAME: &str = "export.sheet_name";
    pub const EXPORT_NO_MATERIAL_TEXT: &str = "export.no_material_text";
}
