//! 报告线程性能指标
//!
//! 原子计数器，Relaxed 读写——只用于观测，不参与任何同步。

use std::sync::atomic::{AtomicU64, Ordering};

/// 报告线程运行指标
#[derive(Debug, Default)]
pub struct ReporterMetrics {
    /// 成功发出的状态包数
    packets_sent: AtomicU64,
    /// 因键控位变化提前结束的等待次数
    early_wakes: AtomicU64,
    /// Socket 重绑定次数
    rebinds: AtomicU64,
    /// 发送错误次数（致命，正常情况下 0 或 1）
    send_errors: AtomicU64,
}

impl ReporterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_packet(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_early_wake(&self) {
        self.early_wakes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rebind(&self) {
        self.rebinds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// 一致性要求不高的快照读（各计数独立 load）
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            early_wakes: self.early_wakes.load(Ordering::Relaxed),
            rebinds: self.rebinds.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照（普通值，可随意拷贝/打印）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub packets_sent: u64,
    pub early_wakes: u64,
    pub rebinds: u64,
    pub send_errors: u64,
}
