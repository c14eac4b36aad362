//! Mock 硬件实现
//!
//! 测试里报告线程独占 `TelemetrySource`，而测试代码要在另一个线程上
//! "拨动硬件"——所以 mock 的内部状态放在共享句柄后面，
//! 两边各持有一个 `Arc`。

use crate::{AnalogueChannel, DmaStream, FifoMonitorReading, TelemetrySource, TunerPort};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mock 硬件的共享内部状态
#[derive(Debug, Default)]
struct MockHwState {
    /// 下次 refresh 时生效的键控位
    ptt_key_bits: u8,
    /// ADC 过载位（读清除）
    adc_overflow: u8,
    /// 六路模拟通道
    analogue: [u16; 6],
    /// 用户 I/O 位
    user_io_bits: u8,
    /// 四路 FIFO 读数，按 monitor_channel 索引
    fifo: [FifoMonitorReading; 4],
    /// refresh_status 调用计数
    status_refreshes: u64,
}

/// 测试侧句柄：随时改写"硬件"状态
#[derive(Clone, Default)]
pub struct MockHwHandle {
    state: Arc<Mutex<MockHwState>>,
}

impl MockHwHandle {
    pub fn set_ptt_key_bits(&self, bits: u8) {
        self.state.lock().ptt_key_bits = bits;
    }

    pub fn set_adc_overflow(&self, bits: u8) {
        self.state.lock().adc_overflow = bits;
    }

    pub fn set_analogue(&self, channel: AnalogueChannel, value: u16) {
        self.state.lock().analogue[channel as usize] = value;
    }

    pub fn set_user_io_bits(&self, bits: u8) {
        self.state.lock().user_io_bits = bits;
    }

    pub fn set_fifo(&self, stream: DmaStream, reading: FifoMonitorReading) {
        self.state.lock().fifo[stream.monitor_channel()] = reading;
    }

    /// 只设置占用数，故障标志清零
    pub fn set_fifo_locations(&self, stream: DmaStream, raw_locations: u16) {
        self.set_fifo(
            stream,
            FifoMonitorReading {
                depth: raw_locations as u32,
                raw_locations,
                ..Default::default()
            },
        );
    }

    pub fn status_refreshes(&self) -> u64 {
        self.state.lock().status_refreshes
    }
}

/// Mock 遥测源
///
/// `refresh_status()` 把句柄侧的键控位锁存为本地快照，
/// 模拟真实实现"一次寄存器读 + 若干解析 getter"的节奏。
pub struct MockTelemetrySource {
    handle: MockHwHandle,
    latched_ptt: u8,
}

impl MockTelemetrySource {
    /// 创建 mock 源和配套的测试句柄
    pub fn new() -> (Self, MockHwHandle) {
        let handle = MockHwHandle::default();
        (
            Self {
                handle: handle.clone(),
                latched_ptt: 0,
            },
            handle,
        )
    }
}

impl TelemetrySource for MockTelemetrySource {
    fn refresh_status(&mut self) {
        let mut state = self.handle.state.lock();
        state.status_refreshes += 1;
        self.latched_ptt = state.ptt_key_bits;
    }

    fn ptt_key_bits(&self) -> u8 {
        self.latched_ptt
    }

    fn adc_overflow(&mut self) -> u8 {
        // 读清除，和硬件一致
        std::mem::take(&mut self.handle.state.lock().adc_overflow)
    }

    fn analogue_in(&self, channel: AnalogueChannel) -> u16 {
        self.handle.state.lock().analogue[channel as usize]
    }

    fn user_io_bits(&self) -> u8 {
        self.handle.state.lock().user_io_bits
    }

    fn read_fifo_monitor(&mut self, stream: DmaStream) -> FifoMonitorReading {
        let mut state = self.handle.state.lock();
        let slot = &mut state.fifo[stream.monitor_channel()];
        let reading = *slot;
        // 粘滞故障位读清除；深度保留
        slot.overflowed = false;
        slot.over_threshold = false;
        slot.underflowed = false;
        reading
    }
}

/// 调谐请求记录（测试侧句柄）
#[derive(Clone, Default)]
pub struct TuneRequestLog {
    requests: Arc<Mutex<Vec<bool>>>,
}

impl TuneRequestLog {
    /// 收到过的全部请求电平，按时间顺序
    pub fn all(&self) -> Vec<bool> {
        self.requests.lock().clone()
    }

    /// 最近一次请求电平
    pub fn last(&self) -> Option<bool> {
        self.requests.lock().last().copied()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

/// Mock 调谐器口：只记录收到的请求
pub struct MockTunerPort {
    log: TuneRequestLog,
}

impl MockTunerPort {
    pub fn new() -> (Self, TuneRequestLog) {
        let log = TuneRequestLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl TunerPort for MockTunerPort {
    fn request_tune(&mut self, requested: bool) {
        self.log.requests.lock().push(requested);
    }
}
