//! Order Engine - 订单生命周期与库存对账
//!
//! # 架构概述
//!
//! - **订单** (`orders`): ID 生成、状态同步、库存补偿、金额聚合
//! - **配置** (`core`): 环境变量配置
//! - **工具** (`utils`): 日志
//!
//! # 模块结构
//!
//! ```text
//! order-engine/src/
//! ├── core/          # 配置
//! ├── orders/        # 订单生命周期
//! │   └── manager/   # OrderLifecycleService
//! └── utils/         # 日志
//! ```

pub mod core;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use self::core::Config;
pub use orders::{
    InMemoryStockLedger, LifecycleError, LifecycleResult, OrderHooks, OrderLifecycleService,
    OrderStorage, StockLedger,
};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_from_config, init_logger_with_file};
