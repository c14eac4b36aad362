//! saturn-watch：上位机侧状态包监视器
//!
//! 监听状态端口，逐包解码打印。主要用来对着真桥接程序或
//! 仿真 daemon 肉眼检查键控延迟和 FIFO 健康度。

use clap::Parser;
use saturn_protocol::{HighPriorityStatus, keying};
use std::net::UdpSocket;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Saturn 状态通道监视器
#[derive(Parser, Debug)]
#[command(name = "saturn-watch")]
#[command(about = "Decode and print Saturn high-priority status packets", long_about = None)]
struct Args {
    /// 监听地址
    #[arg(long, default_value = "0.0.0.0:1025")]
    listen: String,

    /// 原始 hex 输出（不解码）
    #[arg(long)]
    raw: bool,
}

fn keying_string(bits: u8) -> String {
    let mut parts = Vec::new();
    if bits & keying::PTT != 0 {
        parts.push("PTT");
    }
    if bits & keying::CW_DOT != 0 {
        parts.push("dot");
    }
    if bits & keying::CW_DASH != 0 {
        parts.push("dash");
    }
    if bits & keying::PLL_LOCK != 0 {
        parts.push("pll");
    }
    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join("+")
    }
}

fn main() {
    let args = Args::parse();

    let socket = match UdpSocket::bind(&args.listen) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", args.listen, e);
            process::exit(1);
        },
    };
    // 周期性醒来检查 Ctrl-C
    if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(500))) {
        eprintln!("Failed to set read timeout: {}", e);
        process::exit(1);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        if let Err(e) = ctrlc::set_handler(move || running.store(false, Ordering::Release)) {
            eprintln!("Failed to install Ctrl-C handler: {}", e);
            process::exit(1);
        }
    }

    eprintln!("listening on {}", args.listen);
    let mut buf = [0u8; 1500];
    while running.load(Ordering::Acquire) {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            },
            Err(e) => {
                eprintln!("recv error: {}", e);
                process::exit(1);
            },
        };

        if args.raw {
            println!("{} {} bytes: {}", from, n, hex::encode(&buf[..n]));
            continue;
        }

        match HighPriorityStatus::decode(&buf[..n]) {
            Ok(status) => {
                println!(
                    "seq {:8}  key[{}] adc={:02x} faults={:#06b}  \
                     fwd={:5} rev={:5} exc={:5} vcc={:5}  \
                     fifo rx={:5} mic={:5} tx={:5} spk={:5}  io={:02x}",
                    status.sequence,
                    keying_string(status.ptt_key_bits),
                    status.adc_overflow,
                    status.fifo_faults,
                    status.forward_power,
                    status.reverse_power,
                    status.exciter_power,
                    status.supply_voltage,
                    status.rx_samples,
                    status.mic_samples,
                    status.tx_samples,
                    status.spk_samples,
                    status.user_io_bits,
                );
            },
            Err(e) => {
                eprintln!("{}: undecodable packet ({} bytes): {}", from, n, e);
            },
        }
    }
}
