//! # Saturn 状态报告驱动
//!
//! Saturn SDR 桥接程序的高优先级状态通道：
//! - 专用报告线程（Idle / Active / Terminated 生命周期）
//! - 每周期组包 + 四路 DMA FIFO 健康度聚合
//! - 自适应发送调度（发射 ~1ms，空闲 ~200ms，键控变化提前唤醒）
//! - 跨线程交互只靠一组原子标志（[`BridgeContext`]），无锁
//!
//! 大多数用户通过 [`StatusReporter`] 门面使用本 crate；
//! `reporter_loop` 导出给需要自管线程的嵌入方。

mod bridge;
mod context;
mod error;
pub mod fifo;
pub mod link;
pub mod metrics;
pub mod reporter;

pub use bridge::StatusReporter;
pub use context::BridgeContext;
pub use error::DriverError;
pub use fifo::{FaultKind, FifoHealth, MONITORED_STREAMS, StreamDescriptor, scaled_samples};
pub use link::{LinkConfig, LinkError, StatusLink, UdpStatusLink};
pub use metrics::{MetricsSnapshot, ReporterMetrics};
pub use reporter::{ReporterConfig, reporter_loop};

#[cfg(any(test, feature = "mock"))]
pub use link::{MockLinkHandle, MockStatusLink};
