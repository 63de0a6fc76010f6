//! Runtime - drives frames of a root on a tokio current-thread runtime.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use arbor_core::{FrameDriver, FrameReport, Host, IntoElement, NodeHandle, Root, RootError, RuntimeError};
use arbor_dom::{Document, dispatch_event};
use thiserror::Error;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::config::{RuntimeConfig, init_tracing};

/// Errors from the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to build the tokio runtime: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Root(#[from] RootError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Frame driver that wakes the shell's frame loop.
struct NotifyDriver {
    notify: Arc<Notify>,
}

impl FrameDriver for NotifyDriver {
    fn request_frame(&self) {
        self.notify.notify_one();
    }
}

/// A root mounted into the body of an in-memory [`Document`], with a
/// frame loop.
///
/// Must be used inside a tokio `LocalSet`; [`block_on`] sets one up.
pub struct App {
    root: Root,
    document: Rc<RefCell<Document>>,
    notify: Arc<Notify>,
    config: RuntimeConfig,
}

impl App {
    pub fn new(config: RuntimeConfig) -> Result<Self, ShellError> {
        Self::with_document(Rc::new(RefCell::new(Document::new())), config)
    }

    /// Mount into the body of an existing document, which must be empty.
    pub fn with_document(document: Rc<RefCell<Document>>, config: RuntimeConfig) -> Result<Self, ShellError> {
        let mount = document.borrow().body();
        let host: Rc<RefCell<dyn Host>> = document.clone();
        let root = Root::create(host, mount, config.root_options())?;

        let notify = Arc::new(Notify::new());
        root.set_frame_driver(Rc::new(NotifyDriver { notify: notify.clone() }));
        let wake = notify.clone();
        root.set_wake_hook(Arc::new(move || wake.notify_one()));

        tracing::debug!(frame_interval = ?config.frame_interval, "created app");
        Ok(Self {
            root,
            document,
            notify,
            config,
        })
    }

    #[track_caller]
    pub fn render(&self, element: impl IntoElement) -> Result<(), ShellError> {
        self.root.render(element)?;
        Ok(())
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn document(&self) -> &Rc<RefCell<Document>> {
        &self.document
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Dispatch a DOM-style event; see [`dispatch_event`].
    pub fn dispatch(&self, node: NodeHandle, event: &str) -> bool {
        dispatch_event(&self.document, node, event)
    }

    /// Body markup of the document.
    pub fn html(&self) -> String {
        let document = self.document.borrow();
        document.inner_html(document.body())
    }

    /// Run a single frame immediately.
    pub fn frame(&self) -> Result<FrameReport, ShellError> {
        Ok(self.root.run_frame()?)
    }

    /// Run frames until nothing is queued and no spawned future is
    /// pending, waiting for wakeups while futures are outstanding.
    pub async fn run_until_idle(&self) -> Result<(), ShellError> {
        loop {
            if self.root.needs_frame() {
                self.root.run_frame()?;
                tokio::task::yield_now().await;
                continue;
            }
            if self.root.pending_futures() == 0 || self.root.is_torn_down() {
                return Ok(());
            }
            tracing::trace!(pending = self.root.pending_futures(), "waiting for spawned futures");
            self.notify.notified().await;
        }
    }

    /// Run frames at the configured interval for `duration`.
    pub async fn run_for(&self, duration: Duration) -> Result<(), ShellError> {
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let mut ticks = tokio::time::interval(self.config.frame_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut deadline => return Ok(()),
                _ = ticks.tick() => {
                    if self.root.needs_frame() {
                        self.root.run_frame()?;
                    }
                }
            }
        }
    }

    /// Run frames whenever work is requested, no faster than the frame
    /// interval, until the root is torn down.
    pub async fn run(&self) -> Result<(), ShellError> {
        let mut ticks = tokio::time::interval(self.config.frame_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !self.root.is_torn_down() {
            if !self.root.needs_frame() {
                self.notify.notified().await;
            }
            ticks.tick().await;
            self.root.run_frame()?;
        }
        Ok(())
    }
}

/// Run `future` to completion on a current-thread tokio runtime inside a
/// `LocalSet`, installing tracing first if configured.
///
/// ```ignore
/// fn main() -> anyhow::Result<()> {
///     let config = RuntimeConfig::default();
///     arbor::block_on(&config, async {
///         let app = App::new(config.clone())?;
///         app.render(component(counter, ()))?;
///         app.run_until_idle().await?;
///         Ok::<_, ShellError>(())
///     })??;
///     Ok(())
/// }
/// ```
pub fn block_on<F: Future>(config: &RuntimeConfig, future: F) -> Result<F::Output, ShellError> {
    if config.install_tracing {
        init_tracing(&config.log_filter);
    }
    let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    let local = tokio::task::LocalSet::new();
    Ok(local.block_on(&runtime, future))
}
