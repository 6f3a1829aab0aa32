use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::inference::labels::{default_gestures, NO_MOTION_LABEL};
use crate::inference::CONFIDENCE_THRESHOLD;
use crate::sensor::{DEFAULT_ACCEL_SCALE, DEFAULT_GYRO_SCALE, TARGET_LENGTH};

// 应用配置管理模块
// 集中管理所有配置项，提供默认值和配置验证

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sensor: SensorConfig,
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
    pub mqtt: MqttConfig,
    pub channels: ChannelConfig,
}

/// 传感器外设配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Only peers whose advertised name contains this are listed.
    pub name_filter: String,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    pub mtu: u16,
    pub accel_scale: f32,
    pub gyro_scale: f32,
    pub connect_timeout_ms: u64,
}

/// 重采样与置信度门限
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_length: usize,
    pub confidence_threshold: f32,
}

/// 模型文件与标签集
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub graph_path: String,
    pub weights_path: String,
    pub labels: Vec<String>,
    /// Explicit "no move" class of 17-label models.
    pub no_move_label: Option<String>,
    pub no_motion_label: String,
}

/// MQTT网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,
    pub topic_prefix: String,
    pub keep_alive: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 通道配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub notification_channel_capacity: usize,
    pub scan_channel_capacity: usize,
    pub task_channel_capacity: usize,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name_filter: "ESP32_MPU6050".to_string(),
            service_uuid: "12345678-1234-5678-1234-56789abcdef0".to_string(),
            characteristic_uuid: "abcdef12-3456-789a-bcde-f0123456789a".to_string(),
            mtu: 27,
            accel_scale: DEFAULT_ACCEL_SCALE,
            gyro_scale: DEFAULT_GYRO_SCALE,
            connect_timeout_ms: 10_000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_length: TARGET_LENGTH,
            confidence_threshold: CONFIDENCE_THRESHOLD,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            graph_path: "model/model.json".to_string(),
            weights_path: "model/weights.bin".to_string(),
            labels: default_gestures(),
            no_move_label: None,
            no_motion_label: NO_MOTION_LABEL.to_string(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: "localhost".to_string(),
            port: 1883,
            client_id: "gesturehub_client".to_string(),
            topic_prefix: "ble".to_string(),
            keep_alive: 5,
            username: None,
            password: None,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            notification_channel_capacity: 5000,
            scan_channel_capacity: 100,
            task_channel_capacity: 16,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.target_length < 2 {
            return Err(ConfigError::ValidationError("Target length must be at least 2".to_string()));
        }

        if !(0.0..1.0).contains(&self.pipeline.confidence_threshold) {
            return Err(ConfigError::ValidationError("Confidence threshold must be in [0, 1)".to_string()));
        }

        if self.model.labels.is_empty() {
            return Err(ConfigError::ValidationError("Label set must not be empty".to_string()));
        }

        if let Some(no_move) = &self.model.no_move_label {
            if !self.model.labels.contains(no_move) {
                return Err(ConfigError::ValidationError(format!(
                    "No-move label '{}' is not in the label set",
                    no_move
                )));
            }
        }

        if self.sensor.mtu < 27 {
            return Err(ConfigError::ValidationError("MTU must fit a 24-byte frame (>= 27)".to_string()));
        }

        if self.channels.notification_channel_capacity == 0 || self.channels.task_channel_capacity == 0 {
            return Err(ConfigError::ValidationError("Channel capacities must be positive".to_string()));
        }

        Ok(())
    }

    /// 读取 .env 和环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        dotenv::dotenv().ok();

        if let Ok(host) = env::var("MQTT_HOST") {
            self.mqtt.broker = host;
        }
        if let Ok(port) = env::var("MQTT_PORT") {
            self.mqtt.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("Invalid MQTT_PORT '{}'", port)))?;
        }
        if let Ok(user) = env::var("MQTT_USER") {
            self.mqtt.username = Some(user);
        }
        if let Ok(pass) = env::var("MQTT_PASS") {
            self.mqtt.password = Some(pass);
        }
        if let Ok(graph) = env::var("GESTURE_MODEL_GRAPH") {
            self.model.graph_path = graph;
        }
        if let Ok(weights) = env::var("GESTURE_MODEL_WEIGHTS") {
            self.model.weights_path = weights;
        }

        self.validate()
    }

    pub fn graph_path(&self) -> PathBuf {
        PathBuf::from(&self.model.graph_path)
    }

    pub fn weights_path(&self) -> PathBuf {
        PathBuf::from(&self.model.weights_path)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
        }
    }

    /// 文件存在则加载，否则使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self {
                config: AppConfig::default(),
                config_path: Some(path.to_path_buf()),
            });
        }

        let config = AppConfig::load_from_file(path)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }

    /// 保存配置
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.config_path {
            self.config.save_to_file(path)?;
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
