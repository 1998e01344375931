//! 定期清扫过期密钥的后台线程

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{trace, warn};

use super::KeyCache;

/// 后台清扫线程句柄，drop 时停止并 join 线程。
///
/// 线程只持有缓存的弱引用，缓存释放后线程同样会退出。
#[derive(Debug)]
pub struct Sweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// 默认清扫周期
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5 * 60);

    pub fn spawn(cache: &Arc<KeyCache>, interval: Duration) -> io::Result<Self> {
        let (stop, stop_rx) = mpsc::channel();
        let cache = Arc::downgrade(cache);

        let handle = thread::Builder::new()
            .name("sealgcm-key-sweeper".into())
            .spawn(move || run(cache, stop_rx, interval))?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// 停止线程，并等待正在进行的清扫结束
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("key cache sweeper panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(cache: Weak<KeyCache>, stop: Receiver<()>, interval: Duration) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sweep();
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    trace!("key cache sweeper stopped");
}
