//! # Saturn 高优先级状态包协议
//!
//! Saturn SDR 桥接程序向上位机发送的"高优先级状态"报文的字节级布局。
//! 固定 60 字节，多字节字段一律网络字节序（大端）。
//!
//! 桥接端只负责编码；`decode` 供上位机侧工具和测试使用。

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 高优先级状态包总长度（字节）
pub const HIGH_PRIORITY_STATUS_LEN: usize = 60;

// ============================================================================
// 字段偏移
// ============================================================================

/// 包内各字段的字节偏移
///
/// 布局来自 HPSDR protocol 2 的高优先级状态报文（V4.3 扩展了 FIFO 深度字段）。
/// 未列出的字节为保留字节，编码时写 0。
pub mod offsets {
    /// 序列号（u32）
    pub const SEQUENCE: usize = 0;
    /// PTT / 键控输入位（u8）
    pub const PTT_KEY: usize = 4;
    /// ADC 过载位（u8）
    pub const ADC_OVERFLOW: usize = 5;
    /// 激励器功率（u16）
    pub const EXCITER_POWER: usize = 6;
    /// 前向功率（u16）
    pub const FORWARD_POWER: usize = 14;
    /// 反向功率（u16）
    pub const REVERSE_POWER: usize = 22;
    /// FIFO 故障汇总位图（u8）
    pub const FIFO_FAULTS: usize = 30;
    /// DDC（接收）流采样数（u16）
    pub const RX_SAMPLES: usize = 31;
    /// 麦克风流采样数（u16）
    pub const MIC_SAMPLES: usize = 33;
    /// DUC（发射）流采样数（u16）
    pub const TX_SAMPLES: usize = 35;
    /// 扬声器流采样数（u16）
    pub const SPK_SAMPLES: usize = 37;
    /// 供电电压（u16）
    pub const SUPPLY_VOLTAGE: usize = 49;
    /// 用户模拟输入 AIN4（u16）
    pub const USER_ANALOG2: usize = 55;
    /// 用户模拟输入 AIN3（u16）
    pub const USER_ANALOG1: usize = 57;
    /// 用户 I/O 输入位（u8）
    pub const USER_IO: usize = 59;
}

// ============================================================================
// 位常量
// ============================================================================

/// PTT / 键控状态位（偏移 4 处的字节）
pub mod keying {
    /// PTT 输入
    pub const PTT: u8 = 0x01;
    /// CW 点键
    pub const CW_DOT: u8 = 0x02;
    /// CW 划键
    pub const CW_DASH: u8 = 0x04;
    /// PLL 锁定指示
    pub const PLL_LOCK: u8 = 0x10;
}

/// FIFO 故障汇总位（偏移 30 处的字节）
///
/// bit4-7 保留，由全局故障锁存器透传。
pub mod fifo_faults {
    /// DDC（接收）FIFO 超过阈值
    pub const RX_OVER_THRESHOLD: u8 = 0x01;
    /// 麦克风 FIFO 超过阈值
    pub const MIC_OVER_THRESHOLD: u8 = 0x02;
    /// DUC（发射）FIFO 欠载
    pub const TX_UNDERFLOW: u8 = 0x04;
    /// 扬声器 FIFO 欠载
    pub const SPK_UNDERFLOW: u8 = 0x08;
}

// ============================================================================
// Error
// ============================================================================

/// 协议层错误类型
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// 缓冲区长度不足
    #[error("Buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

// ============================================================================
// HighPriorityStatus
// ============================================================================

/// 高优先级状态包的结构化表示
///
/// 每个字段对应一次硬件读取的快照；`fifo_faults` 额外混入了
/// 上一周期以来全局锁存的故障位。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HighPriorityStatus {
    /// UDP 序列号（每包自增，回绕不报错）
    pub sequence: u32,
    /// PTT / 键控输入位快照
    pub ptt_key_bits: u8,
    /// ADC 过载位（bit0 = ADC1，bit1 = ADC2）
    pub adc_overflow: u8,
    /// 激励器功率遥测
    pub exciter_power: u16,
    /// 前向功率遥测
    pub forward_power: u16,
    /// 反向功率遥测
    pub reverse_power: u16,
    /// FIFO 故障汇总位图（见 [`fifo_faults`]）
    pub fifo_faults: u8,
    /// DDC（接收）流采样数
    pub rx_samples: u16,
    /// 麦克风流采样数
    pub mic_samples: u16,
    /// DUC（发射）流采样数
    pub tx_samples: u16,
    /// 扬声器流采样数
    pub spk_samples: u16,
    /// 供电电压遥测
    pub supply_voltage: u16,
    /// 用户模拟输入 AIN3
    pub user_analog1: u16,
    /// 用户模拟输入 AIN4
    pub user_analog2: u16,
    /// 用户 I/O 输入位
    pub user_io_bits: u8,
}

impl HighPriorityStatus {
    /// 编码为固定 60 字节的栈上缓冲区
    ///
    /// 保留字节全部为 0。
    pub fn encode(&self) -> [u8; HIGH_PRIORITY_STATUS_LEN] {
        let mut buf = [0u8; HIGH_PRIORITY_STATUS_LEN];
        // 长度恒等，不可能失败
        let _ = self.encode_into(&mut buf);
        buf
    }

    /// 编码到调用方提供的缓冲区（前 60 字节）
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        if buf.len() < HIGH_PRIORITY_STATUS_LEN {
            return Err(ProtocolError::BufferTooShort {
                expected: HIGH_PRIORITY_STATUS_LEN,
                actual: buf.len(),
            });
        }
        buf[..HIGH_PRIORITY_STATUS_LEN].fill(0);

        buf[offsets::SEQUENCE..offsets::SEQUENCE + 4].copy_from_slice(&self.sequence.to_be_bytes());
        buf[offsets::PTT_KEY] = self.ptt_key_bits;
        buf[offsets::ADC_OVERFLOW] = self.adc_overflow;
        put_u16(buf, offsets::EXCITER_POWER, self.exciter_power);
        put_u16(buf, offsets::FORWARD_POWER, self.forward_power);
        put_u16(buf, offsets::REVERSE_POWER, self.reverse_power);
        buf[offsets::FIFO_FAULTS] = self.fifo_faults;
        put_u16(buf, offsets::RX_SAMPLES, self.rx_samples);
        put_u16(buf, offsets::MIC_SAMPLES, self.mic_samples);
        put_u16(buf, offsets::TX_SAMPLES, self.tx_samples);
        put_u16(buf, offsets::SPK_SAMPLES, self.spk_samples);
        put_u16(buf, offsets::SUPPLY_VOLTAGE, self.supply_voltage);
        put_u16(buf, offsets::USER_ANALOG2, self.user_analog2);
        put_u16(buf, offsets::USER_ANALOG1, self.user_analog1);
        buf[offsets::USER_IO] = self.user_io_bits;
        Ok(())
    }

    /// 从接收到的数据报解码
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HIGH_PRIORITY_STATUS_LEN {
            return Err(ProtocolError::BufferTooShort {
                expected: HIGH_PRIORITY_STATUS_LEN,
                actual: buf.len(),
            });
        }
        Ok(Self {
            sequence: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            ptt_key_bits: buf[offsets::PTT_KEY],
            adc_overflow: buf[offsets::ADC_OVERFLOW],
            exciter_power: get_u16(buf, offsets::EXCITER_POWER),
            forward_power: get_u16(buf, offsets::FORWARD_POWER),
            reverse_power: get_u16(buf, offsets::REVERSE_POWER),
            fifo_faults: buf[offsets::FIFO_FAULTS],
            rx_samples: get_u16(buf, offsets::RX_SAMPLES),
            mic_samples: get_u16(buf, offsets::MIC_SAMPLES),
            tx_samples: get_u16(buf, offsets::TX_SAMPLES),
            spk_samples: get_u16(buf, offsets::SPK_SAMPLES),
            supply_voltage: get_u16(buf, offsets::SUPPLY_VOLTAGE),
            user_analog1: get_u16(buf, offsets::USER_ANALOG1),
            user_analog2: get_u16(buf, offsets::USER_ANALOG2),
            user_io_bits: buf[offsets::USER_IO],
        })
    }

    /// 是否处于键控状态（PTT、点键、划键任一有效）
    pub fn is_keyed(&self) -> bool {
        self.ptt_key_bits & (keying::PTT | keying::CW_DOT | keying::CW_DASH) != 0
    }
}

#[inline]
fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

#[inline]
fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_status() -> HighPriorityStatus {
        HighPriorityStatus {
            sequence: 0x0102_0304,
            ptt_key_bits: keying::PTT | keying::PLL_LOCK,
            adc_overflow: 0x01,
            exciter_power: 0x1122,
            forward_power: 0x3344,
            reverse_power: 0x5566,
            fifo_faults: fifo_faults::RX_OVER_THRESHOLD | fifo_faults::SPK_UNDERFLOW,
            rx_samples: 1000,
            mic_samples: 4000,
            tx_samples: 1333,
            spk_samples: 2000,
            supply_voltage: 0x0BB8,
            user_analog1: 0x0AAA,
            user_analog2: 0x0BBB,
            user_io_bits: 0x04,
        }
    }

    /// 字段偏移和字节序必须与 C 端实现逐字节一致
    #[test]
    fn test_encode_byte_exact_layout() {
        let status = sample_status();
        let buf = status.encode();

        assert_eq!(buf.len(), 60);
        // 序列号：大端
        assert_eq!(&buf[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buf[4], keying::PTT | keying::PLL_LOCK);
        assert_eq!(buf[5], 0x01);
        assert_eq!(&buf[6..8], &[0x11, 0x22]); // exciter power
        assert_eq!(&buf[14..16], &[0x33, 0x44]); // forward power
        assert_eq!(&buf[22..24], &[0x55, 0x66]); // reverse power
        assert_eq!(buf[30], 0b0000_1001); // fault bitmap
        assert_eq!(&buf[31..33], &1000u16.to_be_bytes());
        assert_eq!(&buf[33..35], &4000u16.to_be_bytes());
        assert_eq!(&buf[35..37], &1333u16.to_be_bytes());
        assert_eq!(&buf[37..39], &2000u16.to_be_bytes());
        assert_eq!(&buf[49..51], &[0x0B, 0xB8]); // supply voltage
        assert_eq!(&buf[55..57], &[0x0B, 0xBB]); // AIN4 在 AIN3 之前
        assert_eq!(&buf[57..59], &[0x0A, 0xAA]);
        assert_eq!(buf[59], 0x04);
    }

    /// 未命名的字节必须保持为 0（保留区）
    #[test]
    fn test_reserved_bytes_are_zero() {
        let buf = sample_status().encode();
        let named: &[std::ops::Range<usize>] = &[
            0..6,
            6..8,
            14..16,
            22..24,
            30..39,
            49..51,
            55..59,
            59..60,
        ];
        for (i, byte) in buf.iter().enumerate() {
            if !named.iter().any(|r| r.contains(&i)) {
                assert_eq!(*byte, 0, "reserved byte {} must be zero", i);
            }
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let status = sample_status();
        let decoded = HighPriorityStatus::decode(&status.encode()).unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_encode_into_short_buffer() {
        let mut buf = [0u8; 59];
        let err = sample_status().encode_into(&mut buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BufferTooShort {
                expected: 60,
                actual: 59
            }
        );
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = HighPriorityStatus::decode(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, ProtocolError::BufferTooShort { actual: 10, .. }));
    }

    #[test]
    fn test_is_keyed() {
        let mut status = HighPriorityStatus::default();
        assert!(!status.is_keyed());
        status.ptt_key_bits = keying::PLL_LOCK;
        assert!(!status.is_keyed(), "PLL lock alone is not keying");
        status.ptt_key_bits |= keying::CW_DOT;
        assert!(status.is_keyed());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// 任意字段组合下 encode → decode 恒等
            #[test]
            fn roundtrip_preserves_all_fields(
                sequence in any::<u32>(),
                ptt in any::<u8>(),
                adc in any::<u8>(),
                analog in any::<[u16; 6]>(),
                faults in any::<u8>(),
                samples in any::<[u16; 4]>(),
                user_io in any::<u8>(),
            ) {
                let status = HighPriorityStatus {
                    sequence,
                    ptt_key_bits: ptt,
                    adc_overflow: adc,
                    exciter_power: analog[0],
                    forward_power: analog[1],
                    reverse_power: analog[2],
                    fifo_faults: faults,
                    rx_samples: samples[0],
                    mic_samples: samples[1],
                    tx_samples: samples[2],
                    spk_samples: samples[3],
                    supply_voltage: analog[3],
                    user_analog1: analog[4],
                    user_analog2: analog[5],
                    user_io_bits: user_io,
                };
                prop_assert_eq!(HighPriorityStatus::decode(&status.encode()).unwrap(), status);
            }
        }
    }
}
