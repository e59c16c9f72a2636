use std::path::PathBuf;

/// 引擎配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (数据库、日志) |
/// | ORDER_DB_FILE | orders.redb | 订单数据库文件名 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志目录，设置后写入滚动日志文件 |
/// | ID_CONFLICT_RETRIES | 1 | ID 冲突时调用层的重试次数 |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders LOG_LEVEL=debug cargo test
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// 数据库文件名 (相对 work_dir)
    pub db_file: String,
    /// 日志级别
    pub log_level: String,
    /// 日志目录
    pub log_dir: Option<String>,
    /// Caller-layer retries of a whole operation after an ID conflict
    pub id_conflict_retries: u32,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            db_file: std::env::var("ORDER_DB_FILE").unwrap_or_else(|_| "orders.redb".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.trim().is_empty()),
            id_conflict_retries: std::env::var("ID_CONFLICT_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Load `.env` (if present) and then read the environment
    pub fn load() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!(error = %e, "No .env file loaded");
        }
        Self::from_env()
    }

    /// 使用自定义工作目录覆盖配置
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    /// Full path of the order database
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join(&self.db_file)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
