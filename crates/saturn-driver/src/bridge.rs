//! StatusReporter：报告线程的对外门面
//!
//! 负责起线程、分发共享上下文、把控制操作（启停、发射指示、
//! 重绑定、故障锁存）包装成方法，并在 Drop 时带超时 join。

use crate::context::BridgeContext;
use crate::error::DriverError;
use crate::link::{LinkConfig, StatusLink, UdpStatusLink};
use crate::metrics::{MetricsSnapshot, ReporterMetrics};
use crate::reporter::{ReporterConfig, reporter_loop};
use arc_swap::ArcSwap;
use saturn_hw::{TelemetrySource, TunerPort};
use saturn_protocol::HighPriorityStatus;
use std::sync::Arc;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::warn;

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程做真正的 join，主线程带超时等结果
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // 超时：看门狗线程继续挂着，进程退出时由 OS 回收
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// Drop 时等待报告线程退出的上限
///
/// 要盖过最坏的停止延迟：一个完整的空闲等待（~200ms）加一个周期。
const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 高优先级状态报告器（对外 API）
///
/// # Example
///
/// ```no_run
/// # use saturn_driver::{LinkConfig, ReporterConfig, StatusReporter};
/// # fn demo(hw: impl saturn_hw::TelemetrySource + 'static,
/// #         tuner: impl saturn_hw::TunerPort + 'static) -> Result<(), saturn_driver::DriverError> {
/// let reporter = StatusReporter::spawn(hw, tuner, LinkConfig::default(), ReporterConfig::default())?;
/// reporter.activate();
/// // ……收到 Stop 命令后
/// reporter.deactivate();
/// # Ok(())
/// # }
/// ```
pub struct StatusReporter {
    ctx: Arc<BridgeContext>,
    metrics: Arc<ReporterMetrics>,
    link_config: Arc<ArcSwap<LinkConfig>>,
    handle: Option<JoinHandle<()>>,
}

impl StatusReporter {
    /// 建 UDP 链路并起报告线程（Idle 态，待 [`activate`](Self::activate)）
    pub fn spawn<H, T>(
        hw: H,
        tuner: T,
        link_config: LinkConfig,
        config: ReporterConfig,
    ) -> Result<Self, DriverError>
    where
        H: TelemetrySource + 'static,
        T: TunerPort + 'static,
    {
        let shared_config = Arc::new(ArcSwap::from_pointee(link_config));
        let link = UdpStatusLink::bind(Arc::clone(&shared_config))?;
        Self::spawn_with_link(hw, link, tuner, shared_config, config)
    }

    /// 用自定义链路起线程（测试注入 mock 链路）
    pub fn spawn_with_link<H, L, T>(
        hw: H,
        link: L,
        tuner: T,
        link_config: Arc<ArcSwap<LinkConfig>>,
        config: ReporterConfig,
    ) -> Result<Self, DriverError>
    where
        H: TelemetrySource + 'static,
        L: StatusLink + 'static,
        T: TunerPort + 'static,
    {
        let ctx = Arc::new(BridgeContext::new());
        let metrics = Arc::new(ReporterMetrics::new());
        let handle = {
            let ctx = Arc::clone(&ctx);
            let metrics = Arc::clone(&metrics);
            std::thread::Builder::new()
                .name("saturn-hp-status".into())
                .spawn(move || reporter_loop(hw, link, tuner, ctx, metrics, config))?
        };
        Ok(Self {
            ctx,
            metrics,
            link_config,
            handle: Some(handle),
        })
    }

    // === 生命周期控制 ===

    /// 开始发送状态包（对应协议 Start 命令）
    pub fn activate(&self) {
        self.ctx.activate();
    }

    /// 停止发送，线程回到 Idle（对应协议 Stop 命令）
    pub fn deactivate(&self) {
        self.ctx.deactivate();
    }

    /// 设置发射进行中指示（收紧报文周期到 ~1ms）
    pub fn set_transmit_active(&self, active: bool) {
        self.ctx.set_transmit_active(active);
    }

    /// 请求按当前链路配置重建 socket（Idle 态生效）
    pub fn request_rebind(&self) {
        self.ctx.request_reconfigure();
    }

    /// 替换链路配置并请求重绑定
    pub fn retarget(&self, config: LinkConfig) {
        self.link_config.store(Arc::new(config));
        self.ctx.request_reconfigure();
    }

    // === 故障锁存（数据搬运路径调用） ===

    /// OR 进 FIFO 故障位，下一个状态包里出现一次
    pub fn latch_fifo_faults(&self, bits: u8) {
        self.ctx.latch_fifo_faults(bits);
    }

    // === 观测 ===

    /// 报告线程是否存活
    pub fn is_alive(&self) -> bool {
        self.ctx.is_alive()
    }

    /// 是否因传输错误终止
    pub fn has_failed(&self) -> bool {
        self.ctx.has_failed()
    }

    /// 最近一次发出的状态包快照
    pub fn last_status(&self) -> Arc<HighPriorityStatus> {
        self.ctx.last_status()
    }

    /// 运行指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 共享上下文（数据搬运线程直接持有，绕开门面）
    pub fn context(&self) -> Arc<BridgeContext> {
        Arc::clone(&self.ctx)
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.ctx.deactivate();
        self.ctx.request_shutdown();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.join_timeout(JOIN_TIMEOUT)
        {
            warn!("status reporter thread did not exit cleanly: {:?}", e);
        }
    }
}
