//! Synchronous front end over the asynchronous command channel.
//!
//! A dedicated worker thread runs a current-thread tokio runtime and owns the
//! only [`CommandChannel`]. Callers talk to it with [`BridgeCommand`]
//! messages, each carrying a oneshot sender for its result:
//!
//! ```text
//! caller thread                        worker thread
//! -------------                        -------------
//! 1. lock the bridge gate
//! 2. send BridgeCommand       ------>
//!                                      3. connect / exchange / close
//!                                      4. send result on the oneshot
//! 5. blocking_recv the result <------
//! 6. release the gate
//! ```
//!
//! The gate is held for submission and wait, so at most one request is
//! outstanding across all caller threads. A request that times out drops the
//! link. The blocking entry points must not be called from inside an async
//! runtime.

use crate::channel::{CommandChannel, Exchange, Request};
use crate::error::{GtrError, Result};
use crate::transport::Connector;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use url::Url;

/// Command whose reply is replaced by the device dropping the link.
pub const REBOOT_COMMAND: &str = "reboot";

/// Default bound on a single request/reply exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on establishing or closing a link.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing options of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Bound on one request/reply exchange
    pub request_timeout: Duration,
    /// Bound on establishing or closing a link
    pub connect_timeout: Duration,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Messages processed by the worker.
#[derive(Debug)]
pub enum BridgeCommand {
    /// Replace the current link with a new one.
    Connect {
        /// Normalized command URL
        url: Url,
        /// Response channel for the connect result
        response: oneshot::Sender<Result<()>>,
    },
    /// Close the current link.
    Disconnect {
        /// Response channel for the close result
        response: oneshot::Sender<Result<()>>,
    },
    /// Exchange one request on the current link.
    Query {
        /// Request to send
        request: Request,
        /// Response channel for the reply payload
        response: oneshot::Sender<Result<Value>>,
    },
    /// Report whether a link is held.
    IsConnected {
        /// Response channel
        response: oneshot::Sender<bool>,
    },
    /// Close the link and stop the worker.
    Shutdown,
}

impl BridgeCommand {
    /// Create a connect command and its receiver.
    pub fn connect(url: Url) -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Connect { url, response: tx }, rx)
    }

    /// Create a disconnect command and its receiver.
    pub fn disconnect() -> (Self, oneshot::Receiver<Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Disconnect { response: tx }, rx)
    }

    /// Create a query command and its receiver.
    pub fn query(request: Request) -> (Self, oneshot::Receiver<Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::Query {
                request,
                response: tx,
            },
            rx,
        )
    }

    /// Create a connection probe and its receiver.
    pub fn is_connected() -> (Self, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (Self::IsConnected { response: tx }, rx)
    }
}

/// State owned by the worker thread.
struct BridgeActor {
    connector: Arc<dyn Connector>,
    options: BridgeOptions,
    channel: Option<CommandChannel>,
}

impl BridgeActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<BridgeCommand>) {
        debug!("bridge worker started");
        while let Some(command) = commands.recv().await {
            match command {
                BridgeCommand::Connect { url, response } => {
                    let result = self.connect(url).await;
                    let _ = response.send(result);
                }
                BridgeCommand::Disconnect { response } => {
                    let result = self.disconnect().await;
                    let _ = response.send(result);
                }
                BridgeCommand::Query { request, response } => {
                    let result = self.query(request).await;
                    let _ = response.send(result);
                }
                BridgeCommand::IsConnected { response } => {
                    let _ = response.send(self.channel.is_some());
                }
                BridgeCommand::Shutdown => break,
            }
        }
        self.teardown().await;
        debug!("bridge worker stopped");
    }

    /// Best-effort close of the current link; failures are logged and dropped.
    async fn teardown(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        match tokio::time::timeout(self.options.connect_timeout, channel.close()).await {
            Ok(Ok(())) => debug!("link closed"),
            Ok(Err(e)) => warn!(error = %e, "ignoring error while closing link"),
            Err(_) => warn!("timed out closing link"),
        }
    }

    async fn connect(&mut self, url: Url) -> Result<()> {
        self.teardown().await;

        info!(url = %url, "connecting to device");
        let timeout = self.options.connect_timeout;
        let transport = tokio::time::timeout(timeout, self.connector.connect(&url))
            .await
            .map_err(|_| GtrError::ConnectionFailed {
                address: url.to_string(),
                reason: format!("timed out after {timeout:?}"),
            })??;
        self.channel = Some(CommandChannel::new(transport));
        info!(url = %url, "connected to device");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(channel) = self.channel.take() else {
            return Ok(());
        };
        info!("disconnecting from device");
        tokio::time::timeout(self.options.connect_timeout, channel.close())
            .await
            .map_err(|_| GtrError::Transport("timed out closing link".into()))?
    }

    async fn query(&mut self, request: Request) -> Result<Value> {
        let Some(channel) = self.channel.as_mut() else {
            return Err(GtrError::NotConnected);
        };

        let timeout = self.options.request_timeout;
        let outcome = tokio::time::timeout(timeout, channel.exchange(&request)).await;
        match outcome {
            Err(_) => {
                // A late reply would otherwise answer the next request.
                warn!(cmd = request.cmd, ?timeout, "request timed out, dropping link");
                self.teardown().await;
                Err(GtrError::RequestTimeout {
                    command: request.cmd.to_string(),
                    timeout,
                })
            }
            Ok(Ok(Exchange::Reply(payload))) => Ok(payload),
            Ok(Ok(Exchange::Closed)) => {
                self.channel = None;
                if request.cmd == REBOOT_COMMAND {
                    info!("device closed the link to reboot");
                    Ok(Value::Null)
                } else {
                    warn!(cmd = request.cmd, "device closed the link");
                    Err(GtrError::NotConnected)
                }
            }
            Ok(Err(e @ (GtrError::NotConnected | GtrError::Transport(_)))) => {
                warn!(cmd = request.cmd, error = %e, "link lost");
                self.channel = None;
                Err(e)
            }
            Ok(Err(e)) => Err(e),
        }
    }
}

/// Thread-safe handle to the worker.
pub struct Bridge {
    gate: Mutex<()>,
    commands: mpsc::UnboundedSender<BridgeCommand>,
    worker: Option<JoinHandle<()>>,
}

impl Bridge {
    /// Start the worker thread.
    pub fn spawn(connector: Arc<dyn Connector>, options: BridgeOptions) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GtrError::Transport(format!("failed to build runtime: {e}")))?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = BridgeActor {
            connector,
            options,
            channel: None,
        };
        let worker = std::thread::Builder::new()
            .name("gtr-bridge".into())
            .spawn(move || runtime.block_on(actor.run(receiver)))
            .map_err(|e| GtrError::Transport(format!("failed to start worker: {e}")))?;

        Ok(Self {
            gate: Mutex::new(()),
            commands,
            worker: Some(worker),
        })
    }

    fn submit<T>(&self, command: BridgeCommand, rx: oneshot::Receiver<T>) -> Result<T> {
        let _gate = self.gate.lock();
        self.commands
            .send(command)
            .map_err(|_| GtrError::BridgeStopped)?;
        rx.blocking_recv().map_err(|_| GtrError::BridgeStopped)
    }

    /// Replace any current link with a new one to `url`.
    pub fn connect(&self, url: Url) -> Result<()> {
        let (command, rx) = BridgeCommand::connect(url);
        self.submit(command, rx)?
    }

    /// Close the current link, if any.
    pub fn disconnect(&self) -> Result<()> {
        let (command, rx) = BridgeCommand::disconnect();
        self.submit(command, rx)?
    }

    /// Exchange one request and return the reply payload.
    pub fn query(&self, request: Request) -> Result<Value> {
        let (command, rx) = BridgeCommand::query(request);
        self.submit(command, rx)?
    }

    /// Whether the worker currently holds a link. Performs no I/O.
    pub fn is_connected(&self) -> bool {
        let (command, rx) = BridgeCommand::is_connected();
        self.submit(command, rx).unwrap_or(false)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.commands.send(BridgeCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("bridge worker panicked");
            }
        }
    }
}
