//! FIFO 健康度聚合
//!
//! 每个状态周期把四路 DMA 流的 FIFO 读数压成一个字节的故障位图
//! 加四个采样数字段。各流的换算系数来自 DMA 打包格式：
//! 一个 FIFO 存储单元装几个采样。

use crate::context::BridgeContext;
use saturn_hw::{DmaStream, TelemetrySource};
use saturn_protocol::fifo_faults;

/// 某路流上有意义的故障方向
///
/// 往主机方向的流（接收、麦克风）怕装满，往硬件方向的流
/// （发射、扬声器）怕抽空；另一个方向的标志对该流没有意义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// 占用超过告警阈值
    OverThreshold,
    /// 欠载
    Underflow,
}

/// 一路被监控流的固定描述
#[derive(Debug, Clone, Copy)]
pub struct StreamDescriptor {
    pub stream: DmaStream,
    /// 该流有意义的故障方向
    pub fault: FaultKind,
    /// 故障位图里的对应位
    pub fault_bit: u8,
}

/// 四路被监控流，按包内字段顺序
pub const MONITORED_STREAMS: [StreamDescriptor; 4] = [
    StreamDescriptor {
        stream: DmaStream::RxDdc,
        fault: FaultKind::OverThreshold,
        fault_bit: fifo_faults::RX_OVER_THRESHOLD,
    },
    StreamDescriptor {
        stream: DmaStream::MicCodec,
        fault: FaultKind::OverThreshold,
        fault_bit: fifo_faults::MIC_OVER_THRESHOLD,
    },
    StreamDescriptor {
        stream: DmaStream::TxDuc,
        fault: FaultKind::Underflow,
        fault_bit: fifo_faults::TX_UNDERFLOW,
    },
    StreamDescriptor {
        stream: DmaStream::SpkCodec,
        fault: FaultKind::Underflow,
        fault_bit: fifo_faults::SPK_UNDERFLOW,
    },
];

/// FIFO 存储单元数 → 采样数
///
/// DDC 一单元一采样；麦克风一单元 4 采样；扬声器一单元 2 采样；
/// DUC 一单元 4/3 采样（32 位中间量，整数截断）。
/// 16 位结果按 C 端语义回绕截断。
pub fn scaled_samples(stream: DmaStream, raw_locations: u16) -> u16 {
    let raw = raw_locations as u32;
    let samples = match stream {
        DmaStream::RxDdc => raw,
        DmaStream::MicCodec => raw * 4,
        DmaStream::TxDuc => (raw * 4) / 3,
        DmaStream::SpkCodec => raw * 2,
    };
    samples as u16
}

/// 一个周期的 FIFO 健康度汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FifoHealth {
    pub rx_samples: u16,
    pub mic_samples: u16,
    pub tx_samples: u16,
    pub spk_samples: u16,
    /// 本周期快照故障 | 全局锁存器取走的故障
    pub fault_bits: u8,
}

/// 读四路 FIFO 监视器并聚合
///
/// 快照故障位之外还会换零取走全局锁存器里的位——数据搬运线程
/// 在两个周期之间发现的故障由此进入本周期的包，且只进入一次。
pub fn aggregate<H>(hw: &mut H, ctx: &BridgeContext) -> FifoHealth
where
    H: TelemetrySource + ?Sized,
{
    let mut health = FifoHealth::default();

    for desc in MONITORED_STREAMS {
        let reading = hw.read_fifo_monitor(desc.stream);
        let samples = scaled_samples(desc.stream, reading.raw_locations);
        match desc.stream {
            DmaStream::RxDdc => health.rx_samples = samples,
            DmaStream::MicCodec => health.mic_samples = samples,
            DmaStream::TxDuc => health.tx_samples = samples,
            DmaStream::SpkCodec => health.spk_samples = samples,
        }
        let faulted = match desc.fault {
            FaultKind::OverThreshold => reading.over_threshold,
            FaultKind::Underflow => reading.underflowed,
        };
        if faulted {
            health.fault_bits |= desc.fault_bit;
        }
    }

    // 换零取走：锁存位不会丢、也不会在下个周期重复出现
    health.fault_bits |= ctx.take_fifo_faults();
    health
}

#[cfg(test)]
mod tests {
    use super::*;
    use saturn_hw::{FifoMonitorReading, MockTelemetrySource};

    #[test]
    fn test_scaling_factors() {
        assert_eq!(scaled_samples(DmaStream::RxDdc, 100), 100);
        assert_eq!(scaled_samples(DmaStream::MicCodec, 100), 400);
        assert_eq!(scaled_samples(DmaStream::SpkCodec, 100), 200);
        // 4/3 整数截断
        assert_eq!(scaled_samples(DmaStream::TxDuc, 12), 16);
        assert_eq!(scaled_samples(DmaStream::TxDuc, 100), 133);
        assert_eq!(scaled_samples(DmaStream::TxDuc, 1), 1);
        assert_eq!(scaled_samples(DmaStream::TxDuc, 0), 0);
    }

    #[test]
    fn test_scaling_truncates_to_u16() {
        // 中间量按 32 位算，结果按 16 位截断（与 C 的整型提升一致）
        assert_eq!(scaled_samples(DmaStream::MicCodec, 0xFFFF), 0xFFFC);
        assert_eq!(scaled_samples(DmaStream::TxDuc, 0xFFFF), (0xFFFFu32 * 4 / 3) as u16);
    }

    #[test]
    fn test_aggregate_reads_all_streams() {
        let (mut hw, handle) = MockTelemetrySource::new();
        let ctx = BridgeContext::new();
        handle.set_fifo_locations(DmaStream::RxDdc, 1000);
        handle.set_fifo_locations(DmaStream::MicCodec, 10);
        handle.set_fifo_locations(DmaStream::TxDuc, 9);
        handle.set_fifo_locations(DmaStream::SpkCodec, 7);

        let health = aggregate(&mut hw, &ctx);
        assert_eq!(health.rx_samples, 1000);
        assert_eq!(health.mic_samples, 40);
        assert_eq!(health.tx_samples, 12);
        assert_eq!(health.spk_samples, 14);
        assert_eq!(health.fault_bits, 0);
    }

    #[test]
    fn test_meaningful_fault_direction_per_stream() {
        let (mut hw, handle) = MockTelemetrySource::new();
        let ctx = BridgeContext::new();
        // 接收流：欠载无意义，阈值才计入
        handle.set_fifo(
            DmaStream::RxDdc,
            FifoMonitorReading {
                underflowed: true,
                ..Default::default()
            },
        );
        // 发射流：阈值无意义，欠载才计入
        handle.set_fifo(
            DmaStream::TxDuc,
            FifoMonitorReading {
                over_threshold: true,
                ..Default::default()
            },
        );
        assert_eq!(aggregate(&mut hw, &ctx).fault_bits, 0);

        handle.set_fifo(
            DmaStream::RxDdc,
            FifoMonitorReading {
                over_threshold: true,
                ..Default::default()
            },
        );
        handle.set_fifo(
            DmaStream::TxDuc,
            FifoMonitorReading {
                underflowed: true,
                ..Default::default()
            },
        );
        assert_eq!(
            aggregate(&mut hw, &ctx).fault_bits,
            fifo_faults::RX_OVER_THRESHOLD | fifo_faults::TX_UNDERFLOW
        );
    }

    #[test]
    fn test_latched_faults_merge_once() {
        let (mut hw, _handle) = MockTelemetrySource::new();
        let ctx = BridgeContext::new();
        ctx.latch_fifo_faults(fifo_faults::SPK_UNDERFLOW | 0x80);

        let first = aggregate(&mut hw, &ctx);
        assert_eq!(first.fault_bits, fifo_faults::SPK_UNDERFLOW | 0x80);

        // 没有新故障时下个周期必须干净
        let second = aggregate(&mut hw, &ctx);
        assert_eq!(second.fault_bits, 0);
    }
}
