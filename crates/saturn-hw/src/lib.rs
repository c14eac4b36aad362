//! # Saturn 硬件遥测抽象层
//!
//! Saturn 板（Artix-7 FPGA + CM4）寄存器访问的 trait 抽象。
//! 本 crate 只定义"读一次硬件现状"的窄接口；寄存器如何映射到进程
//! 地址空间（XDMA / PCIe BAR）是下层实现的事，不在这里出现。
//!
//! 所有读取都是时间点快照，无排队、无缓存。

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockHwHandle, MockTelemetrySource, MockTunerPort, TuneRequestLog};

// ============================================================================
// DMA 流
// ============================================================================

/// 四路被监控的 DMA FIFO 流
///
/// 与 FPGA FIFO 监视器的通道编号一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DmaStream {
    /// DDC 接收采样流（FPGA → 主机）
    RxDdc,
    /// DUC 发射采样流（主机 → FPGA）
    TxDuc,
    /// 麦克风 codec 流（FPGA → 主机）
    MicCodec,
    /// 扬声器 codec 流（主机 → FPGA）
    SpkCodec,
}

impl DmaStream {
    /// 全部四路流（固定顺序：RX、TX、Mic、Spk）
    pub const ALL: [DmaStream; 4] = [
        DmaStream::RxDdc,
        DmaStream::TxDuc,
        DmaStream::MicCodec,
        DmaStream::SpkCodec,
    ];

    /// FIFO 监视器通道索引
    pub fn monitor_channel(self) -> usize {
        match self {
            DmaStream::RxDdc => 0,
            DmaStream::TxDuc => 1,
            DmaStream::MicCodec => 2,
            DmaStream::SpkCodec => 3,
        }
    }
}

// ============================================================================
// 模拟通道
// ============================================================================

/// 板上模拟遥测通道
///
/// 判别值即硬件 ADC 多路复用器的通道号。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnalogueChannel {
    /// 前向功率检波
    ForwardPower = 0,
    /// 反向功率检波
    ReversePower = 1,
    /// 用户模拟输入 AIN3
    Ain3 = 2,
    /// 用户模拟输入 AIN4
    Ain4 = 3,
    /// 激励器功率检波
    ExciterPower = 4,
    /// 供电电压
    SupplyVoltage = 5,
}

// ============================================================================
// FIFO 监视器读数
// ============================================================================

/// 一次 FIFO 监视器通道读取的完整结果
///
/// `raw_locations` 是以 FIFO 存储单元为单位的占用数；
/// 换算成采样数需要按流乘以各自的打包系数（由上层负责）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FifoMonitorReading {
    /// 当前占用深度（实现定义单位）
    pub depth: u32,
    /// 自上次读取以来发生过上溢
    pub overflowed: bool,
    /// 占用超过告警阈值
    pub over_threshold: bool,
    /// 自上次读取以来发生过欠载
    pub underflowed: bool,
    /// 原始占用单元数（16 位计数器）
    pub raw_locations: u16,
}

// ============================================================================
// Trait 接口
// ============================================================================

/// 硬件遥测源
///
/// 每个状态周期的读取顺序约定：先 `refresh_status()` 锁存一次状态寄存器，
/// 然后各 getter 返回该次锁存的解析结果。调度器在等待期间也会反复调用
/// `refresh_status()` + `ptt_key_bits()` 做键控变化检测。
///
/// 键控位定义（protocol 2 格式）：bit0 = PTT，bit1 = CW 点键，
/// bit2 = CW 划键，bit4 = PLL 锁定。
pub trait TelemetrySource: Send {
    /// 重新读取状态寄存器（一次硬件访问，之后的 getter 都基于这次快照）
    fn refresh_status(&mut self);

    /// PTT / 键控输入位
    fn ptt_key_bits(&self) -> u8;

    /// ADC 过载位（bit0 = ADC1，bit1 = ADC2）
    ///
    /// 硬件语义为读清除，所以要 `&mut self`。
    fn adc_overflow(&mut self) -> u8;

    /// 按通道读模拟输入（12 位 ADC，高位补零）
    fn analogue_in(&self, channel: AnalogueChannel) -> u16;

    /// 用户 I/O 输入位
    fn user_io_bits(&self) -> u8;

    /// 读一路 FIFO 监视器通道
    ///
    /// 上溢/欠载标志在硬件里是读清除的粘滞位。
    fn read_fifo_monitor(&mut self, stream: DmaStream) -> FifoMonitorReading;
}

/// 天线调谐器（ATU）控制口
///
/// 调谐请求是 fire-and-forget 的：去抖和物理调谐时序由调谐器驱动负责，
/// 调用方只在每个状态周期转发一次当前的请求电平。
pub trait TunerPort: Send {
    /// 转发"请求调谐"信号的当前值
    fn request_tune(&mut self, requested: bool);
}
