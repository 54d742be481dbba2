//! 配置模块，负责加载JSON配置文件

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::evaluator::Evaluator;
use crate::sql_compiler::{CompilerConfig, OptimizationConfig};

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "filter_engine.json";

/// 引擎配置，文件中缺省的字段取默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 实体名（或集合名）到数据库表名的映射
    pub table_mapping: HashMap<String, String>,
    /// 子表中指向父表 `id` 的列
    pub foreign_key: String,
    /// 同一列上至少多少个 OR 等值条件时改写为 IN
    pub max_or_conditions_for_in: usize,
    /// 生成 AST 时是否附带 origin
    pub include_origin: bool,
    /// 客户端过滤的默认大小写敏感性
    pub case_sensitive: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut table_mapping = HashMap::new();
        table_mapping.insert("Product".to_string(), "products".to_string());
        table_mapping.insert("Order".to_string(), "orders".to_string());
        table_mapping.insert("Customer".to_string(), "customers".to_string());
        table_mapping.insert("Supplier".to_string(), "suppliers".to_string());
        table_mapping.insert("Items".to_string(), "order_items".to_string());

        let compiler = CompilerConfig::default();
        Self {
            table_mapping,
            foreign_key: compiler.foreign_key,
            max_or_conditions_for_in: compiler.optimization_config.max_or_conditions_for_in,
            include_origin: false,
            case_sensitive: false,
        }
    }
}

impl EngineConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let display = path_ref.display().to_string();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(display));
        }

        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;

        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path: display, source })?;
        tracing::debug!(path = %path_ref.display(), mappings = config.table_mapping.len(), "loaded engine config");
        Ok(config)
    }

    /// 获取实体对应的表名，如果不存在则返回小写的实体名
    pub fn get_table_name(&self, entity: &str) -> String {
        self.table_mapping
            .get(entity)
            .cloned()
            .unwrap_or_else(|| entity.to_lowercase())
    }

    /// 获取所有映射
    pub fn get_mappings(&self) -> &HashMap<String, String> {
        &self.table_mapping
    }

    /// SQL 编译器配置
    pub fn compiler_config(&self) -> CompilerConfig {
        CompilerConfig {
            table_mapping: self.table_mapping.clone(),
            optimization_config: OptimizationConfig {
                max_or_conditions_for_in: self.max_or_conditions_for_in,
            },
            foreign_key: self.foreign_key.clone(),
        }
    }

    /// 客户端求值器
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(self.case_sensitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_valid_json_config() {
        let file = write_config(
            r#"{
                "table_mapping": {"Product": "catalog_products", "Lines": "order_lines"},
                "foreign_key": "owner_id",
                "max_or_conditions_for_in": 3,
                "include_origin": true
            }"#,
        );

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.get_table_name("Product"), "catalog_products");
        assert_eq!(config.get_table_name("Lines"), "order_lines");
        assert_eq!(config.get_table_name("Unknown"), "unknown");
        assert_eq!(config.foreign_key, "owner_id");
        assert_eq!(config.max_or_conditions_for_in, 3);
        assert!(config.include_origin);
        // 未给出的字段取默认值
        assert!(!config.case_sensitive);
    }

    #[test]
    fn test_partial_config_keeps_default_mapping() {
        let file = write_config(r#"{"case_sensitive": true}"#);

        let config = EngineConfig::from_json_file(file.path()).unwrap();
        assert!(config.case_sensitive);
        assert_eq!(config.get_table_name("Order"), "orders");
        assert_eq!(config.foreign_key, "parent_id");
    }

    #[test]
    fn test_invalid_json_config() {
        let file = write_config("invalid json");

        let result = EngineConfig::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineConfig::from_json_file(dir.path().join("non_existent_file.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.get_table_name("Product"), "products");
        assert_eq!(config.get_table_name("Unknown"), "unknown");
        assert_eq!(config.max_or_conditions_for_in, 5);
    }

    #[test]
    fn test_conversions() {
        let config = EngineConfig {
            max_or_conditions_for_in: 2,
            foreign_key: "order_id".to_string(),
            ..Default::default()
        };

        let compiler = config.compiler_config();
        assert_eq!(compiler.optimization_config.max_or_conditions_for_in, 2);
        assert_eq!(compiler.foreign_key, "order_id");
        assert_eq!(compiler.table_mapping.get("Items").map(String::as_str), Some("order_items"));

        let record = serde_json::json!({"Name": "apple"});
        let filter = crate::filter::Filter::leaf("Name", crate::operator::FilterOperator::EQ, "APPLE").unwrap();
        assert!(config.evaluator().matches(&filter, &record));
    }
}
