//! 高优先级状态报告线程
//!
//! 一个专用 OS 线程跑完整个子系统：生命周期状态机（Idle / Active /
//! Terminated）、每周期的包组装、FIFO 聚合、UDP 发送、调谐器旁路信号，
//! 以及自适应等待。
//!
//! 延迟设计：发射中最多 ~1ms 发一包，空闲最多 ~200ms 发一包；
//! 等待被切成 ~500µs 的量子，每个量子末尾只重读键控位，一旦和
//! 刚发出的包里的快照不一致就立刻开始下一周期。这样键控跳变
//! 最迟一个量子内就反映到上位机，空闲时又不至于空转烧 CPU。

use crate::context::BridgeContext;
use crate::fifo;
use crate::link::StatusLink;
use crate::metrics::ReporterMetrics;
use saturn_hw::{AnalogueChannel, TelemetrySource, TunerPort};
use saturn_protocol::HighPriorityStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace};

/// 报告线程时序配置
///
/// 默认值即协议要求的节奏；测试可以整体缩短。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReporterConfig {
    /// Idle 态轮询运行标志的间隔
    pub idle_poll: Duration,
    /// 自适应等待的量子长度
    pub wait_quantum: Duration,
    /// 发射中的最大等待量子数（2 × 500µs ≈ 1ms）
    pub transmit_quanta: u32,
    /// 非发射时的最大等待量子数（400 × 500µs ≈ 200ms）
    pub idle_quanta: u32,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_micros(100),
            wait_quantum: Duration::from_micros(500),
            transmit_quanta: 2,
            idle_quanta: 400,
        }
    }
}

/// 报告线程主体
///
/// 入口置存活标志，出口清除；中途永不 panic，所有失败都通过
/// 上下文标志对外可见。线程不会自我重启——重启策略归上层。
pub fn reporter_loop<H, L, T>(
    mut hw: H,
    mut link: L,
    mut tuner: T,
    ctx: Arc<BridgeContext>,
    metrics: Arc<ReporterMetrics>,
    config: ReporterConfig,
) where
    H: TelemetrySource,
    L: StatusLink,
    T: TunerPort,
{
    ctx.set_alive(true);
    info!("outgoing high-priority status thread up");

    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::warn;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("status reporter thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set status reporter thread priority: {:?}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                    e
                );
            },
        }
    }

    let mut fatal = false;

    'outer: while !fatal {
        // ================================================================
        // Idle 态：等待激活；挂起的 socket 重配置只在这里被处理
        // ================================================================
        loop {
            if ctx.shutdown_requested() {
                break 'outer;
            }
            if ctx.is_running() {
                break;
            }
            if ctx.take_reconfigure() {
                match link.rebind() {
                    Ok(()) => {
                        metrics.record_rebind();
                    },
                    Err(e) => {
                        error!(error = %e, "socket rebind failed");
                        ctx.set_failed();
                        fatal = true;
                        break 'outer;
                    },
                }
            }
            spin_sleep::sleep(config.idle_poll);
        }

        // ================================================================
        // Idle → Active：序列号归零，重取目的地址
        // ================================================================
        let mut sequence: u32 = 0;
        link.refresh_target();
        info!("status reporting active");

        while ctx.is_running() {
            // --- 组包：本周期的硬件快照 ---
            hw.refresh_status();
            let ptt_bits = hw.ptt_key_bits();
            let health = fifo::aggregate(&mut hw, &ctx);
            let status = HighPriorityStatus {
                sequence,
                ptt_key_bits: ptt_bits,
                adc_overflow: hw.adc_overflow(),
                exciter_power: hw.analogue_in(AnalogueChannel::ExciterPower),
                forward_power: hw.analogue_in(AnalogueChannel::ForwardPower),
                reverse_power: hw.analogue_in(AnalogueChannel::ReversePower),
                supply_voltage: hw.analogue_in(AnalogueChannel::SupplyVoltage),
                user_analog1: hw.analogue_in(AnalogueChannel::Ain3),
                user_analog2: hw.analogue_in(AnalogueChannel::Ain4),
                user_io_bits: hw.user_io_bits(),
                fifo_faults: health.fault_bits,
                rx_samples: health.rx_samples,
                mic_samples: health.mic_samples,
                tx_samples: health.tx_samples,
                spk_samples: health.spk_samples,
            };
            sequence = sequence.wrapping_add(1);

            let packet = status.encode();
            let send_result = link.send(&packet);

            // --- 调谐器旁路：每周期转发一次，不管发送成败 ---
            // 用户 I/O bit2 低电平 = 请求调谐（从本周期的 user_io 快照导出）
            let tune_requested = (status.user_io_bits >> 2) & 1 == 0;
            tuner.request_tune(tune_requested);

            match send_result {
                Ok(()) => {
                    metrics.record_packet();
                    trace!(
                        sequence = status.sequence,
                        packet = %hex::encode(packet),
                        "high-priority status sent"
                    );
                    ctx.publish_status(status);
                },
                Err(e) => {
                    error!(
                        error = %e,
                        sequence = status.sequence,
                        "high-priority status send failed, terminating thread"
                    );
                    metrics.record_send_error();
                    ctx.set_failed();
                    fatal = true;
                    break;
                },
            }

            // --- 自适应等待：键控位一变就提前结束 ---
            let quanta = if ctx.transmit_active() {
                config.transmit_quanta
            } else {
                config.idle_quanta
            };
            for _ in 0..quanta {
                hw.refresh_status();
                if hw.ptt_key_bits() != ptt_bits {
                    metrics.record_early_wake();
                    break;
                }
                spin_sleep::sleep(config.wait_quantum);
            }
        }

        if !fatal {
            info!("status reporting paused");
        }
    }

    // Terminated / 收尾：socket 随链路一起关闭，最后清存活标志
    info!(fatal, "shutting down outgoing high-priority status thread");
    drop(link);
    ctx.set_alive(false);
}
