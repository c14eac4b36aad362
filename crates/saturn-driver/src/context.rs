//! 共享上下文：跨线程标志与故障锁存器
//!
//! 报告线程和外部世界之间唯一的交互通道就是这里的一组原子标志，
//! 没有锁、没有 rendezvous。纪律是单写者：
//! - `run` / `reconfigure` / `transmit_active` / `shutdown`：控制侧写，报告线程读
//! - `alive` / `failed`：报告线程写，控制侧读
//! - `fifo_fault_latch`：数据搬运线程 OR 进去，报告线程每周期换零取走
//! - `last_status`：报告线程每周期发布，观察者无锁读

use arc_swap::ArcSwap;
use saturn_protocol::HighPriorityStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// 桥接共享上下文
///
/// 进程里只建一份，`Arc` 分发给报告线程、数据搬运线程和外层控制代码。
pub struct BridgeContext {
    /// 运行标志（对应协议上的 Start/Stop 命令）
    run: AtomicBool,
    /// 挂起的"关闭并重开 socket"命令位
    reconfigure: AtomicBool,
    /// 报告线程存活标志（线程入口置 true，出口置 false）
    alive: AtomicBool,
    /// 致命错误标志（发送失败后置位，不自动复位）
    failed: AtomicBool,
    /// 发射进行中指示（MOX），决定调度器用短周期还是长周期
    transmit_active: AtomicBool,
    /// 进程收尾请求：让空闲中的报告线程退出外层循环
    shutdown: AtomicBool,
    /// 全局 FIFO 故障锁存器（bit 布局同包内故障汇总字节）
    fifo_fault_latch: AtomicU8,
    /// 最近一次发出的状态包快照
    last_status: ArcSwap<HighPriorityStatus>,
}

impl BridgeContext {
    pub fn new() -> Self {
        Self {
            run: AtomicBool::new(false),
            reconfigure: AtomicBool::new(false),
            alive: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            transmit_active: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            fifo_fault_latch: AtomicU8::new(0),
            last_status: ArcSwap::from_pointee(HighPriorityStatus::default()),
        }
    }

    // === 运行标志（控制侧写） ===

    /// 启动状态发送（Idle → Active 在下一个 100µs 空闲轮询内生效）
    pub fn activate(&self) {
        self.run.store(true, Ordering::Release);
    }

    /// 停止状态发送（Active → Idle 在当前周期结束后生效）
    pub fn deactivate(&self) {
        self.run.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.run.load(Ordering::Acquire)
    }

    // === Socket 重配置命令位 ===

    /// 请求关闭并按当前配置重开 socket（仅在 Idle 态被处理）
    pub fn request_reconfigure(&self) {
        self.reconfigure.store(true, Ordering::Release);
    }

    /// 取走挂起的重配置命令（读 + 清除一步完成）
    pub(crate) fn take_reconfigure(&self) -> bool {
        self.reconfigure.swap(false, Ordering::AcqRel)
    }

    #[cfg(test)]
    pub(crate) fn reconfigure_pending(&self) -> bool {
        self.reconfigure.load(Ordering::Acquire)
    }

    // === 存活 / 错误标志（报告线程写） ===

    pub(crate) fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// 报告线程是否在其入口和出口之间
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn set_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// 报告线程是否因传输错误终止
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    // === 发射指示 ===

    /// 设置发射进行中指示（true → 报文周期收紧到 ~1ms）
    pub fn set_transmit_active(&self, active: bool) {
        self.transmit_active.store(active, Ordering::Release);
    }

    pub fn transmit_active(&self) -> bool {
        self.transmit_active.load(Ordering::Acquire)
    }

    // === 收尾 ===

    /// 请求报告线程彻底退出（只对 Idle 态可见；Active 态先 deactivate）
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // === 全局故障锁存器 ===

    /// 数据搬运路径在发现上溢/欠载时 OR 进故障位
    ///
    /// 位布局与 [`saturn_protocol::fifo_faults`] 一致。同类故障在一个
    /// 周期窗口内重复发生会合并成一位——这是存在标志，不是计数。
    pub fn latch_fifo_faults(&self, bits: u8) {
        self.fifo_fault_latch.fetch_or(bits, Ordering::AcqRel);
    }

    /// 取走并清空锁存器（原子换零）
    ///
    /// 必须一步完成：分开的 load + store 会丢掉恰好写在两步之间的故障位。
    pub(crate) fn take_fifo_faults(&self) -> u8 {
        self.fifo_fault_latch.swap(0, Ordering::AcqRel)
    }

    // === 状态快照 ===

    pub(crate) fn publish_status(&self, status: HighPriorityStatus) {
        self.last_status.store(Arc::new(status));
    }

    /// 最近一次发出的状态包（无锁读）
    pub fn last_status(&self) -> Arc<HighPriorityStatus> {
        self.last_status.load_full()
    }
}

impl Default for BridgeContext {
    fn default() -> Self {
        Self::new()
    }
}
