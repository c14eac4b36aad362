//! 报告线程端到端测试：真 UDP 链路 + mock 硬件
//!
//! 时序断言留了很宽的余量（CI 机器的调度抖动远大于目标节奏），
//! 但仍然能区分"~1ms 周期 / ~200ms 周期 / 提前唤醒"三种行为。

use saturn_driver::{LinkConfig, ReporterConfig, StatusReporter};
use saturn_hw::{MockTelemetrySource, MockTunerPort};
use saturn_protocol::{HIGH_PRIORITY_STATUS_LEN, HighPriorityStatus};
use serial_test::serial;
use std::net::UdpSocket;
use std::time::{Duration, Instant};

struct Rig {
    reporter: StatusReporter,
    hw: saturn_hw::MockHwHandle,
    receiver: UdpSocket,
}

fn spawn_rig(config: ReporterConfig) -> Rig {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let (hw, hw_handle) = MockTelemetrySource::new();
    let (tuner, _log) = MockTunerPort::new();
    let link_config = LinkConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        dest_addr: receiver.local_addr().unwrap(),
    };
    let reporter = StatusReporter::spawn(hw, tuner, link_config, config).unwrap();
    Rig {
        reporter,
        hw: hw_handle,
        receiver,
    }
}

fn recv_status(receiver: &UdpSocket) -> HighPriorityStatus {
    let mut buf = [0u8; 128];
    let (n, _) = receiver.recv_from(&mut buf).expect("status packet");
    assert_eq!(n, HIGH_PRIORITY_STATUS_LEN);
    HighPriorityStatus::decode(&buf[..n]).unwrap()
}

#[test]
#[serial]
fn test_sequence_contiguous_over_udp() {
    let rig = spawn_rig(ReporterConfig {
        wait_quantum: Duration::from_millis(1),
        transmit_quanta: 1,
        idle_quanta: 2,
        ..Default::default()
    });
    rig.reporter.activate();

    for expected in 0u32..10 {
        let status = recv_status(&rig.receiver);
        assert_eq!(status.sequence, expected);
    }
    rig.reporter.deactivate();
}

#[test]
#[serial]
fn test_restart_resets_sequence_over_udp() {
    let rig = spawn_rig(ReporterConfig {
        wait_quantum: Duration::from_millis(1),
        transmit_quanta: 1,
        idle_quanta: 2,
        ..Default::default()
    });
    rig.reporter.activate();
    for _ in 0..5 {
        recv_status(&rig.receiver);
    }
    rig.reporter.deactivate();

    // 清掉停机前在途的包
    std::thread::sleep(Duration::from_millis(100));
    rig.receiver
        .set_read_timeout(Some(Duration::from_millis(50)))
        .unwrap();
    let mut buf = [0u8; 128];
    while rig.receiver.recv_from(&mut buf).is_ok() {}
    rig.receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    rig.reporter.activate();
    let status = recv_status(&rig.receiver);
    assert_eq!(status.sequence, 0, "sequence must restart at 0");
    rig.reporter.deactivate();
}

#[test]
#[serial]
fn test_transmit_cadence_is_millisecond_class() {
    // 默认节奏：发射中 2 × 500µs
    let rig = spawn_rig(ReporterConfig::default());
    rig.reporter.set_transmit_active(true);
    rig.reporter.activate();

    recv_status(&rig.receiver);
    let start = Instant::now();
    let n = 20;
    for _ in 0..n {
        recv_status(&rig.receiver);
    }
    let avg = start.elapsed() / n;
    rig.reporter.deactivate();

    // 名义 1ms；给调度抖动留一个数量级
    assert!(
        avg < Duration::from_millis(15),
        "transmit cadence too slow: avg gap {:?}",
        avg
    );
}

#[test]
#[serial]
fn test_idle_cadence_is_long() {
    // 默认节奏：空闲 400 × 500µs ≈ 200ms
    let rig = spawn_rig(ReporterConfig::default());
    rig.reporter.activate();

    recv_status(&rig.receiver);
    let start = Instant::now();
    recv_status(&rig.receiver);
    let gap = start.elapsed();
    rig.reporter.deactivate();

    assert!(
        gap > Duration::from_millis(100),
        "idle cadence too fast: gap {:?}",
        gap
    );
    assert!(
        gap < Duration::from_millis(500),
        "idle cadence too slow: gap {:?}",
        gap
    );
}

#[test]
#[serial]
fn test_keying_change_cuts_idle_wait_short() {
    let rig = spawn_rig(ReporterConfig::default());
    rig.reporter.activate();

    let first = recv_status(&rig.receiver);
    assert_eq!(first.ptt_key_bits, 0);

    // 在 ~200ms 的空闲等待中间拨动 PTT
    std::thread::sleep(Duration::from_millis(20));
    let keyed_at = Instant::now();
    rig.hw.set_ptt_key_bits(saturn_protocol::keying::PTT);

    let second = recv_status(&rig.receiver);
    let latency = keyed_at.elapsed();
    rig.reporter.deactivate();

    assert_eq!(second.ptt_key_bits, saturn_protocol::keying::PTT);
    // 名义一个量子（500µs）；远小于等满 200ms 的剩余时间
    assert!(
        latency < Duration::from_millis(60),
        "keying change not reflected promptly: {:?}",
        latency
    );
    assert_eq!(rig.reporter.metrics().early_wakes, 1);
}

/// 把调谐请求转进 channel 的调谐器口，用于不靠轮询的等待
struct ChannelTuner(crossbeam_channel::Sender<bool>);

impl saturn_hw::TunerPort for ChannelTuner {
    fn request_tune(&mut self, requested: bool) {
        let _ = self.0.send(requested);
    }
}

#[test]
#[serial]
fn test_tuner_side_channel_follows_user_io_bit2() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    let (hw, hw_handle) = MockTelemetrySource::new();
    let (tune_tx, tune_rx) = crossbeam_channel::unbounded();
    let reporter = StatusReporter::spawn(
        hw,
        ChannelTuner(tune_tx),
        LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            dest_addr: receiver.local_addr().unwrap(),
        },
        ReporterConfig {
            wait_quantum: Duration::from_millis(1),
            transmit_quanta: 1,
            idle_quanta: 2,
            ..Default::default()
        },
    )
    .unwrap();

    // bit2 置 1 → 不请求
    hw_handle.set_user_io_bits(0x04);
    reporter.activate();
    let first = tune_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(!first, "bit2 high means no tune request");

    // bit2 清 0 → 请求（低电平有效）
    hw_handle.set_user_io_bits(0x00);
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut requested = false;
    while Instant::now() < deadline {
        if tune_rx.recv_timeout(Duration::from_secs(1)).unwrap() {
            requested = true;
            break;
        }
    }
    assert!(requested, "bit2 low must raise a tune request");
    reporter.deactivate();
}

#[test]
#[serial]
fn test_retarget_moves_destination() {
    let rig = spawn_rig(ReporterConfig {
        wait_quantum: Duration::from_millis(1),
        transmit_quanta: 1,
        idle_quanta: 2,
        ..Default::default()
    });
    rig.reporter.activate();
    recv_status(&rig.receiver);
    rig.reporter.deactivate();
    std::thread::sleep(Duration::from_millis(100));

    let new_receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    new_receiver
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    rig.reporter.retarget(LinkConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        dest_addr: new_receiver.local_addr().unwrap(),
    });
    // 重绑定在 Idle 态处理
    std::thread::sleep(Duration::from_millis(50));
    rig.reporter.activate();

    let status = recv_status(&new_receiver);
    assert_eq!(status.sequence, 0);
    assert_eq!(rig.reporter.metrics().rebinds, 1);
    rig.reporter.deactivate();
}
