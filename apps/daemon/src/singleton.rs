//! 单例文件锁
//!
//! 一台主机只允许一个桥接守护进程占用状态端口。
//! 用文件锁而不是 pgrep：进程崩溃时锁自动释放。

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};

/// 单例文件锁
pub struct SingletonLock {
    file: File,
    _path: std::path::PathBuf,
}

impl SingletonLock {
    /// 尝试获取单例锁
    ///
    /// # 参数
    /// - `lock_path`: 锁文件路径
    ///
    /// # 返回
    /// - `Ok(Self)`: 成功获取锁
    /// - `Err`: 锁已被其他进程持有，或文件操作失败
    pub fn try_lock(lock_path: impl AsRef<std::path::Path>) -> Result<Self, io::Error> {
        let path = lock_path.as_ref();

        // 拿到锁之前不要截断文件
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .read(true)
            .open(path)?;

        if !file.try_lock_exclusive()? {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "saturn-bridged is already running (locked)",
            ));
        }

        // 拿到锁后清掉旧进程残留，写入当前 PID 便于调试
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(&file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self {
            file,
            _path: path.to_path_buf(),
        })
    }
}

impl Drop for SingletonLock {
    fn drop(&mut self) {
        // File 关闭时锁自动释放，显式 unlock 只是兜底
        let _ = self.file.unlock();
    }
}
