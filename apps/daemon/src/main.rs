//! Saturn 桥接守护进程主入口
//!
//! 起高优先级状态报告线程，对上位机发送状态包。
//! 遥测源目前是仿真实现。
//! TODO: XDMA 寄存器访问层落地后，把 MockTelemetrySource 换成真寄存器读取。

mod singleton;

use clap::Parser;
use saturn_driver::{LinkConfig, ReporterConfig, StatusReporter};
use saturn_hw::{AnalogueChannel, MockTelemetrySource, TunerPort};
use singleton::SingletonLock;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Saturn SDR 桥接守护进程
///
/// 周期性向上位机发送高优先级状态包（键控、ADC 过载、功率遥测、
/// FIFO 健康度、用户 I/O），发射中 ~1ms 一包，空闲 ~200ms 一包。
#[derive(Parser, Debug)]
#[command(name = "saturn-bridged")]
#[command(about = "Saturn SDR bridge daemon - high priority status channel", long_about = None)]
struct Args {
    /// 本地绑定地址
    ///
    /// 格式: IP:PORT。1025 是 protocol 2 的高优先级状态端口
    #[arg(long, default_value = "0.0.0.0:1025")]
    bind: String,

    /// 上位机目的地址
    #[arg(long, default_value = "127.0.0.1:1025")]
    dest: String,

    /// 等待量子（微秒）
    #[arg(long, default_value = "500")]
    quantum_us: u64,

    /// 发射中的最大等待量子数（2 × 500µs ≈ 1ms）
    #[arg(long, default_value = "2")]
    transmit_quanta: u32,

    /// 空闲时的最大等待量子数（400 × 500µs ≈ 200ms）
    #[arg(long, default_value = "400")]
    idle_quanta: u32,

    /// 锁文件路径
    ///
    /// 默认: XDG_RUNTIME_DIR 或 /tmp 下的 saturn-bridged.lock
    #[arg(long)]
    lock_file: Option<String>,

    /// 指标打印间隔（秒），0 关闭
    #[arg(long, default_value = "5")]
    stats_interval: u64,
}

/// 获取默认锁文件路径（优先用户可写目录）
fn get_default_lock_file() -> String {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        let path = std::path::Path::new(&runtime_dir).join("saturn-bridged.lock");
        if let Some(parent) = path.parent()
            && (parent.exists() || std::fs::create_dir_all(parent).is_ok())
        {
            return path.to_string_lossy().to_string();
        }
    }
    "/tmp/saturn-bridged.lock".to_string()
}

/// 调谐器口的日志实现：只记录电平跳变
///
/// 真正的 ATU 驱动（去抖、调谐时序）不在本进程内。
struct LoggingTunerPort {
    last: Option<bool>,
}

impl TunerPort for LoggingTunerPort {
    fn request_tune(&mut self, requested: bool) {
        if self.last != Some(requested) {
            info!(requested, "tune request level changed");
            self.last = Some(requested);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let lock_file = args.lock_file.clone().unwrap_or_else(get_default_lock_file);
    let _lock = match SingletonLock::try_lock(&lock_file) {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("Failed to acquire singleton lock {}: {}", lock_file, e);
            process::exit(1);
        },
    };

    let link_config = LinkConfig {
        bind_addr: match args.bind.parse() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Invalid --bind address '{}': {}", args.bind, e);
                process::exit(1);
            },
        },
        dest_addr: match args.dest.parse() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Invalid --dest address '{}': {}", args.dest, e);
                process::exit(1);
            },
        },
    };
    let reporter_config = ReporterConfig {
        wait_quantum: Duration::from_micros(args.quantum_us),
        transmit_quanta: args.transmit_quanta,
        idle_quanta: args.idle_quanta,
        ..Default::default()
    };

    // 仿真遥测源：给模拟通道一组静态的合理读数
    let (hw, hw_handle) = MockTelemetrySource::new();
    hw_handle.set_analogue(AnalogueChannel::SupplyVoltage, 2950);
    warn!("running with simulated telemetry source, no FPGA registers mapped");

    let reporter = match StatusReporter::spawn(
        hw,
        LoggingTunerPort { last: None },
        link_config,
        reporter_config,
    ) {
        Ok(reporter) => reporter,
        Err(e) => {
            eprintln!("Failed to start status reporter: {}", e);
            process::exit(1);
        },
    };

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::Release);
        }) {
            eprintln!("Failed to install Ctrl-C handler: {}", e);
            process::exit(1);
        }
    }

    info!(bind = %args.bind, dest = %args.dest, "saturn-bridged up, activating status reporting");
    reporter.activate();

    let stats_interval = Duration::from_secs(args.stats_interval.max(1));
    let mut last_stats = std::time::Instant::now();
    while running.load(Ordering::Acquire) {
        if reporter.has_failed() {
            eprintln!("status reporter terminated on transport error, exiting");
            process::exit(2);
        }
        if args.stats_interval > 0 && last_stats.elapsed() >= stats_interval {
            let m = reporter.metrics();
            let s = reporter.last_status();
            info!(
                packets = m.packets_sent,
                early_wakes = m.early_wakes,
                rebinds = m.rebinds,
                sequence = s.sequence,
                faults = format_args!("{:#010b}", s.fifo_faults),
                "reporter stats"
            );
            last_stats = std::time::Instant::now();
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutting down");
    reporter.deactivate();
    // Drop 完成线程 join 与 socket 关闭
}
