//! 生成器配置
//!
//! 描述修改链的配置文档：每条链一个份额加一串修改定义。

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::PrepError;

/// 修改选项值，标量三选一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl OptionValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// 整数也可当浮点使用
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Integer(value) => Some(*value as f64),
            OptionValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

pub type OptionMap = HashMap<String, OptionValue>;

/// 单个修改的配置：名字 + 构造选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationSettings {
    pub name: String,
    #[serde(default)]
    pub options: OptionMap,
}

impl ModificationSettings {
    pub fn plain(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: OptionMap::new(),
        }
    }

    pub fn with_options(name: &str, options: Vec<(&str, OptionValue)>) -> Self {
        Self {
            name: name.to_string(),
            options: options
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

/// 修改链配置：目录中 share 比例的帧依序经过 modifications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSettings {
    pub share: f64,
    pub modifications: Vec<ModificationSettings>,
}

/// 生成器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub chains: Vec<ChainSettings>,
}

impl GeneratorSettings {
    pub fn from_json_file(path: &Path) -> Result<Self, PrepError> {
        let file = File::open(path)?;
        let settings = serde_json::from_reader(BufReader::new(file))?;
        Ok(settings)
    }

    pub fn from_json_str(document: &str) -> Result<Self, PrepError> {
        Ok(serde_json::from_str(document)?)
    }

    fn single(share: f64, modification: ModificationSettings) -> ChainSettings {
        ChainSettings {
            share,
            modifications: vec![modification],
        }
    }
}

impl Default for GeneratorSettings {
    /// 内置修改集，每种默认占 5%
    fn default() -> Self {
        let share = 0.05;
        Self {
            chains: vec![
                Self::single(
                    share,
                    ModificationSettings::with_options(
                        "clahe",
                        vec![
                            ("clip_limit", OptionValue::Float(2.0)),
                            ("grid_width", OptionValue::Integer(8)),
                            ("grid_height", OptionValue::Integer(8)),
                        ],
                    ),
                ),
                Self::single(
                    share,
                    ModificationSettings::with_options(
                        "gamma_correction",
                        vec![("gamma_value", OptionValue::Float(1.5))],
                    ),
                ),
                Self::single(
                    share,
                    ModificationSettings::plain("histogram_equalization"),
                ),
                Self::single(
                    share,
                    ModificationSettings::with_options(
                        "gaussian_blur",
                        vec![
                            ("kernel_width", OptionValue::Integer(5)),
                            ("kernel_height", OptionValue::Integer(5)),
                        ],
                    ),
                ),
                Self::single(
                    share,
                    ModificationSettings::with_options(
                        "median_filter",
                        vec![("aperture_size", OptionValue::Integer(5))],
                    ),
                ),
                Self::single(
                    share,
                    ModificationSettings::with_options(
                        "gaussian_noise",
                        vec![
                            ("mean", OptionValue::Float(0.0)),
                            ("standard_deviation", OptionValue::Float(4.0)),
                        ],
                    ),
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_document() {
        let document = r#"
        {
            "chains": [
                {
                    "share": 0.25,
                    "modifications": [
                        {
                            "name": "gaussian_blur",
                            "options": {"kernel_width": 3, "kernel_height": 3}
                        },
                        {"name": "histogram_equalization"}
                    ]
                }
            ]
        }
        "#;

        let settings = GeneratorSettings::from_json_str(document).unwrap();
        assert_eq!(settings.chains.len(), 1);
        let chain = &settings.chains[0];
        assert_eq!(chain.share, 0.25);
        assert_eq!(chain.modifications.len(), 2);
        assert_eq!(chain.modifications[0].name, "gaussian_blur");
        assert_eq!(
            chain.modifications[0].options.get("kernel_width"),
            Some(&OptionValue::Integer(3))
        );
        // options 可省略
        assert!(chain.modifications[1].options.is_empty());
    }

    #[test]
    fn test_option_value_variants() {
        let document = r#"
        {
            "chains": [
                {
                    "share": 0.1,
                    "modifications": [
                        {
                            "name": "clahe",
                            "options": {
                                "clip_limit": 2.5,
                                "grid_width": 8,
                                "label": "soft"
                            }
                        }
                    ]
                }
            ]
        }
        "#;

        let settings = GeneratorSettings::from_json_str(document).unwrap();
        let options = &settings.chains[0].modifications[0].options;
        assert_eq!(options.get("clip_limit").unwrap().as_f64(), Some(2.5));
        assert_eq!(options.get("grid_width").unwrap().as_i64(), Some(8));
        assert_eq!(options.get("grid_width").unwrap().as_f64(), Some(8.0));
        assert_eq!(options.get("label").unwrap().as_str(), Some("soft"));
    }

    #[test]
    fn test_malformed_document_rejected() {
        let result = GeneratorSettings::from_json_str("{\"chains\": [{}]}");
        assert!(matches!(result, Err(PrepError::Settings(_))));
    }

    #[test]
    fn test_default_settings_shape() {
        let settings = GeneratorSettings::default();
        assert_eq!(settings.chains.len(), 6);
        let summed: f64 = settings.chains.iter().map(|chain| chain.share).sum();
        assert!(summed <= 1.0);
    }
}
