use crate::{Error, Rasterizer, RenderConfig, Result, Viewport};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

enum Command {
    Rasterize(String, Viewport, oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly handle to a rasterizer running on a dedicated worker
/// thread.
///
/// The worker thread owns the synchronous `Rasterizer` and executes
/// commands one at a time, so callers get an async interface without the
/// rasterizer having to be `Send`. Cloning the handle shares the same
/// worker.
#[derive(Clone)]
pub struct Backend {
    cmd_tx: Sender<Command>,
    timeout_ms: u64,
    alive: Arc<AtomicBool>,
}

/// Marks the worker dead however its thread exits.
struct AliveGuard(Arc<AtomicBool>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Backend {
    /// Start a worker thread and build the rasterizer on it.
    pub async fn launch<R: Rasterizer + 'static>(config: RenderConfig) -> Result<Self> {
        let timeout_ms = config.render_timeout_ms;
        let alive = Arc::new(AtomicBool::new(true));
        let worker_alive = alive.clone();

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx): (oneshot::Sender<Result<()>>, oneshot::Receiver<Result<()>>) =
            oneshot::channel();

        thread::Builder::new()
            .name("jobcard-raster".into())
            .spawn(move || {
                let _alive = AliveGuard(worker_alive.clone());
                let mut rasterizer = match R::new(config) {
                    Ok(r) => r,
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                        return;
                    }
                };

                let _ = init_tx.send(Ok(()));

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        Command::Rasterize(html, viewport, resp) => {
                            let res = rasterizer.rasterize(&html, viewport);
                            let lost = res.is_err() && !rasterizer.is_alive();
                            if lost {
                                // flag before replying so the caller sees it
                                worker_alive.store(false, Ordering::SeqCst);
                            }
                            if resp.send(res).is_err() {
                                debug!("render result dropped; caller gave up waiting");
                            }
                            if lost {
                                warn!("Rasterizer lost its browser; stopping worker");
                                break;
                            }
                        }
                        Command::Close(resp) => {
                            let res = rasterizer.close();
                            let _ = resp.send(res);
                            return;
                        }
                    }
                }

                // Lost browser, or every handle dropped without an explicit close
                if let Err(e) = rasterizer.close() {
                    warn!("Failed to close rasterizer: {}", e);
                }
            })
            .map_err(|e| Error::InitializationError(format!("Failed to spawn worker: {}", e)))?;

        let init_res = init_rx
            .await
            .map_err(|e| Error::InitializationError(format!("Worker init canceled: {}", e)))?;
        init_res?;

        Ok(Self { cmd_tx, timeout_ms, alive })
    }

    /// `false` once the worker has stopped and can take no more renders.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Rasterize `html` at `viewport` size, bounded by the render timeout.
    ///
    /// On timeout the worker finishes the abandoned page on its own; its
    /// result is discarded.
    pub async fn rasterize(&self, html: String, viewport: Viewport) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Rasterize(html, viewport, tx))
            .map_err(|_| Error::Backend("rasterizer worker has stopped".into()))?;

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), rx).await {
            Ok(res) => res.map_err(|e| Error::Backend(format!("Rasterize canceled: {}", e)))?,
            Err(_) => Err(Error::Timeout(self.timeout_ms)),
        }
    }

    /// Shutdown the background worker and close the rasterizer.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }
}

type Launcher = Box<dyn Fn(RenderConfig) -> BoxFuture<'static, Result<Backend>> + Send + Sync>;

/// A backend that is started on first use and torn down explicitly.
///
/// This is the single process-wide rasterizer shared by every render call.
/// After [`LazyBackend::shutdown`], or once the worker has died, the next
/// call to [`LazyBackend::get`] starts a fresh one.
pub struct LazyBackend {
    config: RenderConfig,
    launcher: Launcher,
    slot: Mutex<Option<Backend>>,
}

impl LazyBackend {
    pub fn new<R: Rasterizer + 'static>(config: RenderConfig) -> Self {
        Self {
            config,
            launcher: Box::new(|cfg| Backend::launch::<R>(cfg).boxed()),
            slot: Mutex::new(None),
        }
    }

    /// Return the running backend, launching it if needed.
    pub async fn get(&self) -> Result<Backend> {
        let mut slot = self.slot.lock().await;
        if let Some(backend) = slot.as_ref() {
            if backend.is_alive() {
                return Ok(backend.clone());
            }
            warn!("Rasterization backend has stopped; relaunching");
        }

        info!("Launching rasterization backend...");
        let backend = (self.launcher)(self.config.clone()).await?;
        *slot = Some(backend.clone());
        Ok(backend)
    }

    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.as_ref().is_some_and(Backend::is_alive)
    }

    /// Close the backend if it is still running.
    pub async fn shutdown(&self) -> Result<()> {
        let backend = self.slot.lock().await.take();
        match backend {
            Some(backend) if backend.is_alive() => {
                info!("Closing rasterization backend");
                backend.close().await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    static LAUNCHES: AtomicUsize = AtomicUsize::new(0);

    struct Echo;

    impl Rasterizer for Echo {
        fn new(_config: RenderConfig) -> Result<Self> {
            LAUNCHES.fetch_add(1, Ordering::SeqCst);
            Ok(Echo)
        }

        fn rasterize(&mut self, html: &str, viewport: Viewport) -> Result<Vec<u8>> {
            if html == "slow" {
                thread::sleep(Duration::from_millis(200));
            }
            Ok(format!("{}x{}:{}", viewport.width, viewport.height, html).into_bytes())
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Rasterizer for Broken {
        fn new(_config: RenderConfig) -> Result<Self> {
            Err(Error::InitializationError("no browser".into()))
        }

        fn rasterize(&mut self, _html: &str, _viewport: Viewport) -> Result<Vec<u8>> {
            unreachable!()
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    static FLAKY_LAUNCHES: AtomicUsize = AtomicUsize::new(0);

    /// Serves one page, then behaves like a browser whose connection closed.
    struct Flaky {
        renders: usize,
    }

    impl Rasterizer for Flaky {
        fn new(_config: RenderConfig) -> Result<Self> {
            FLAKY_LAUNCHES.fetch_add(1, Ordering::SeqCst);
            Ok(Flaky { renders: 0 })
        }

        fn rasterize(&mut self, _html: &str, _viewport: Viewport) -> Result<Vec<u8>> {
            self.renders += 1;
            if self.renders > 1 {
                return Err(Error::Backend("Failed to open tab: connection closed".into()));
            }
            Ok(b"png".to_vec())
        }

        fn is_alive(&mut self) -> bool {
            self.renders <= 1
        }

        fn close(self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn round_trips_through_worker() {
        let backend = Backend::launch::<Echo>(RenderConfig::default()).await.unwrap();
        let out = backend
            .rasterize("<p>hi</p>".into(), Viewport { width: 2, height: 3 })
            .await
            .unwrap();
        assert_eq!(out, b"2x3:<p>hi</p>");
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn render_timeout_is_enforced() {
        let cfg = RenderConfig { render_timeout_ms: 20, font_timeout_ms: 10, ..Default::default() };
        let backend = Backend::launch::<Echo>(cfg).await.unwrap();
        let err = backend.rasterize("slow".into(), Viewport::default()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));
    }

    #[tokio::test]
    async fn init_failure_surfaces() {
        let err = Backend::launch::<Broken>(RenderConfig::default()).await.err().unwrap();
        assert!(matches!(err, Error::InitializationError(_)));
    }

    #[tokio::test]
    async fn lazy_backend_launches_once_and_relaunches_after_shutdown() {
        let lazy = LazyBackend::new::<Echo>(RenderConfig::default());
        assert!(!lazy.is_running().await);

        let before = LAUNCHES.load(Ordering::SeqCst);
        lazy.get().await.unwrap();
        lazy.get().await.unwrap();
        assert!(LAUNCHES.load(Ordering::SeqCst) - before >= 1);
        assert!(lazy.is_running().await);

        lazy.shutdown().await.unwrap();
        assert!(!lazy.is_running().await);
        lazy.shutdown().await.unwrap();

        let backend = lazy.get().await.unwrap();
        assert!(backend.rasterize("x".into(), Viewport::default()).await.is_ok());
    }

    #[tokio::test]
    async fn dead_backend_is_replaced_on_next_get() {
        let lazy = LazyBackend::new::<Flaky>(RenderConfig::default());

        let first = lazy.get().await.unwrap();
        assert!(first.rasterize("a".into(), Viewport::default()).await.is_ok());
        let err = first.rasterize("b".into(), Viewport::default()).await.unwrap_err();
        assert!(err.to_string().contains("connection closed"));
        assert!(!first.is_alive());
        assert!(!lazy.is_running().await);

        let launches = FLAKY_LAUNCHES.load(Ordering::SeqCst);
        let second = lazy.get().await.unwrap();
        assert_eq!(FLAKY_LAUNCHES.load(Ordering::SeqCst), launches + 1);
        assert!(second.rasterize("c".into(), Viewport::default()).await.is_ok());
        assert!(lazy.is_running().await);

        // the dead worker is already gone; shutdown only closes the live one
        lazy.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn ordinary_render_errors_keep_the_backend() {
        let backend = Backend::launch::<Echo>(RenderConfig {
            render_timeout_ms: 20,
            font_timeout_ms: 10,
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(backend.rasterize("slow".into(), Viewport::default()).await.is_err());
        assert!(backend.is_alive());
    }
}
