//! 驱动层错误类型定义

use crate::link::LinkError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 状态链路错误（建链 / 重绑定 / 发送）
    #[error("Status link error: {0}")]
    Link(#[from] LinkError),

    /// 线程创建失败
    #[error("Failed to spawn reporter thread: {0}")]
    Spawn(#[from] std::io::Error),
}
