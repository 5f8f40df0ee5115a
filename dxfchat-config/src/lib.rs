use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV: &str = "DXFCHAT_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFCHAT_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// 命令行显式给出路径时直接读取，否则走自动发现。
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => Self::discover(),
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// 前端页面所在目录，`GET /` 返回其中的 `index.html`。
    #[serde(default = "ServerConfig::default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "ServerConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_static_dir() -> PathBuf {
        PathBuf::from("static")
    }

    fn default_max_upload_bytes() -> usize {
        20 * 1024 * 1024
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            static_dir: Self::default_static_dir(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

/// 托管模型调用参数。密钥本身不写入配置，只记录读取密钥的环境变量名。
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "AssistantConfig::default_api_base")]
    pub api_base: String,
    #[serde(default = "AssistantConfig::default_model")]
    pub model: String,
    #[serde(default = "AssistantConfig::default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "AssistantConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "AssistantConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl AssistantConfig {
    fn default_api_base() -> String {
        "https://api.anthropic.com".to_string()
    }

    fn default_model() -> String {
        "claude-sonnet-4-20250514".to_string()
    }

    fn default_max_tokens() -> u32 {
        1024
    }

    fn default_api_key_env() -> String {
        "ANTHROPIC_API_KEY".to_string()
    }

    fn default_timeout_secs() -> u64 {
        60
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_base: Self::default_api_base(),
            model: Self::default_model(),
            max_tokens: Self::default_max_tokens(),
            api_key_env: Self::default_api_key_env(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// 背景策略：`off` 为透明背景，`white` 为白底。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundPolicy {
    #[default]
    Off,
    White,
}

/// 颜色策略：`black` 统一黑色，`color` 使用图层颜色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPolicy {
    #[default]
    Black,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderProfile {
    #[serde(default)]
    pub background: BackgroundPolicy,
    #[serde(default)]
    pub color_policy: ColorPolicy,
    #[serde(default = "RenderProfile::default_lineweight_scaling")]
    pub lineweight_scaling: f64,
    /// 输出宽度：SVG 为像素，PDF 为点（1/72 英寸）。
    #[serde(default = "RenderProfile::default_page_width")]
    pub page_width: f64,
}

impl RenderProfile {
    fn default_lineweight_scaling() -> f64 {
        1.5
    }

    fn default_page_width() -> f64 {
        1000.0
    }

    /// 预览：透明背景、黑色线条。
    pub fn preview() -> Self {
        Self {
            background: BackgroundPolicy::Off,
            color_policy: ColorPolicy::Black,
            lineweight_scaling: 1.5,
            page_width: 1000.0,
        }
    }

    /// 导出 PDF：白底、图层颜色，A4 横向宽度。
    pub fn pdf() -> Self {
        Self {
            background: BackgroundPolicy::White,
            color_policy: ColorPolicy::Color,
            lineweight_scaling: 2.0,
            page_width: 842.0,
        }
    }
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self::preview()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "RenderProfile::preview")]
    pub preview: RenderProfile,
    #[serde(default = "RenderProfile::pdf")]
    pub pdf: RenderProfile,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preview: RenderProfile::preview(),
            pdf: RenderProfile::pdf(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
