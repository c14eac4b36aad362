//! 状态链路：UDP 数据报出口
//!
//! 报告线程对 socket 的全部要求就三件事：发一包、按当前配置
//! 重建并重绑定、激活时刷新目的地址。抽成 trait 是为了让测试
//! 不碰真 socket。

use arc_swap::ArcSwap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// 链路错误
#[derive(Error, Debug)]
pub enum LinkError {
    /// socket 创建 / 绑定失败
    #[error("Failed to bind status socket: {0}")]
    Bind(#[source] std::io::Error),

    /// 数据报发送失败（对报告线程是致命的）
    #[error("Datagram send failed: {0}")]
    Send(#[source] std::io::Error),
}

/// 链路配置
///
/// 通过 `ArcSwap` 共享：控制侧随时替换，链路在重绑定 / 重定目标时消费。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// 本地绑定地址
    pub bind_addr: SocketAddr,
    /// 状态包目的地址（上位机）
    pub dest_addr: SocketAddr,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            // protocol 2 高优先级状态端口
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1025)),
            dest_addr: SocketAddr::from(([127, 0, 0, 1], 1025)),
        }
    }
}

/// 状态包出口
pub trait StatusLink: Send {
    /// 发送一包（阻塞，无超时；失败即致命）
    fn send(&mut self, packet: &[u8]) -> Result<(), LinkError>;

    /// 关闭当前 socket，按当前共享配置重建并重绑定（仅 Idle 态调用）
    fn rebind(&mut self) -> Result<(), LinkError>;

    /// 从共享配置重新取目的地址（每次 Idle → Active 调用）
    fn refresh_target(&mut self);
}

/// 真 UDP 链路
pub struct UdpStatusLink {
    config: Arc<ArcSwap<LinkConfig>>,
    socket: UdpSocket,
    dest: SocketAddr,
}

impl UdpStatusLink {
    /// 按共享配置的当前值建链
    pub fn bind(config: Arc<ArcSwap<LinkConfig>>) -> Result<Self, LinkError> {
        let current = **config.load();
        let socket = UdpSocket::bind(current.bind_addr).map_err(LinkError::Bind)?;
        info!(bind = %current.bind_addr, dest = %current.dest_addr, "status link up");
        Ok(Self {
            config,
            socket,
            dest: current.dest_addr,
        })
    }

    /// 实际绑定到的本地地址（测试用 0 端口时有用）
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl StatusLink for UdpStatusLink {
    fn send(&mut self, packet: &[u8]) -> Result<(), LinkError> {
        self.socket
            .send_to(packet, self.dest)
            .map_err(LinkError::Send)?;
        Ok(())
    }

    fn rebind(&mut self) -> Result<(), LinkError> {
        let current = **self.config.load();
        // 旧 socket 在赋值时关闭
        self.socket = UdpSocket::bind(current.bind_addr).map_err(LinkError::Bind)?;
        self.dest = current.dest_addr;
        info!(bind = %current.bind_addr, dest = %current.dest_addr, "status link rebound");
        Ok(())
    }

    fn refresh_target(&mut self) {
        self.dest = self.config.load().dest_addr;
        debug!(dest = %self.dest, "status link target refreshed");
    }
}

// ============================================================================
// Mock 链路（测试 / 仿真）
// ============================================================================

#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockLinkHandle, MockStatusLink};

#[cfg(any(test, feature = "mock"))]
mod mock {
    use super::{LinkError, StatusLink};
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct MockLinkState {
        /// (发送时刻, 包内容)
        sent: Mutex<Vec<(Instant, Vec<u8>)>>,
        fail_sends: AtomicBool,
        rebinds: AtomicU64,
        target_refreshes: AtomicU64,
    }

    /// 测试侧句柄：读取发包记录、注入发送失败
    #[derive(Clone, Default)]
    pub struct MockLinkHandle {
        state: Arc<MockLinkState>,
    }

    impl MockLinkHandle {
        /// 已发送的包内容，按时间顺序
        pub fn packets(&self) -> Vec<Vec<u8>> {
            self.state
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, p)| p.clone())
                .collect()
        }

        /// 各包的发送时刻
        pub fn timestamps(&self) -> Vec<Instant> {
            self.state
                .sent
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| *t)
                .collect()
        }

        pub fn sent_count(&self) -> usize {
            self.state.sent.lock().unwrap().len()
        }

        /// 之后的每次 send 都返回错误
        pub fn fail_sends(&self, fail: bool) {
            self.state.fail_sends.store(fail, Ordering::Release);
        }

        pub fn rebind_count(&self) -> u64 {
            self.state.rebinds.load(Ordering::Acquire)
        }

        pub fn target_refresh_count(&self) -> u64 {
            self.state.target_refreshes.load(Ordering::Acquire)
        }
    }

    /// 记录型 mock 链路
    pub struct MockStatusLink {
        handle: MockLinkHandle,
    }

    impl MockStatusLink {
        pub fn new() -> (Self, MockLinkHandle) {
            let handle = MockLinkHandle::default();
            (
                Self {
                    handle: handle.clone(),
                },
                handle,
            )
        }
    }

    impl StatusLink for MockStatusLink {
        fn send(&mut self, packet: &[u8]) -> Result<(), LinkError> {
            if self.handle.state.fail_sends.load(Ordering::Acquire) {
                return Err(LinkError::Send(std::io::Error::new(
                    std::io::ErrorKind::NetworkUnreachable,
                    "mock send failure",
                )));
            }
            self.handle
                .state
                .sent
                .lock()
                .unwrap()
                .push((Instant::now(), packet.to_vec()));
            Ok(())
        }

        fn rebind(&mut self) -> Result<(), LinkError> {
            self.handle.state.rebinds.fetch_add(1, Ordering::AcqRel);
            Ok(())
        }

        fn refresh_target(&mut self) {
            self.handle
                .state
                .target_refreshes
                .fetch_add(1, Ordering::AcqRel);
        }
    }
}
