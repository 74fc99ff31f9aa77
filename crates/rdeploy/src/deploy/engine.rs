//! Delivery engine
//!
//! A deployment runs in two phases. Preparation turns the file into a single
//! frame (normalize name, read, compress, encode, frame) and is the only
//! phase that can fail. Dispatch then writes that frame to each host of the
//! target, one connection at a time. A host that cannot be reached is logged
//! and skipped, it never fails the deployment.

use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::{Config, Target};
use crate::{Error, Result};

use super::compress::select_payload;
use super::frame::Frame;
use super::host::{DEFAULT_HOST, DEFAULT_PORT, HostAddress};
use super::path::relative_name;
use super::record::RemoteFileRecord;

/// Called before a deployment touches the filesystem or the network
pub type BeforeDeployCallback = Arc<dyn Fn(&Utf8Path, &Target) + Send + Sync>;

/// Called exactly once when a deployment ends
///
/// The error is only set when preparation failed, in which case no host was
/// contacted. Per-host failures are never reported here.
pub type CompletedCallback = Arc<dyn Fn(&Utf8Path, &Target, Option<&Error>) + Send + Sync>;

/// Optional lifecycle hooks for a deployment
#[derive(Clone, Default)]
pub struct DeployHooks {
    pub on_before_deploy: Option<BeforeDeployCallback>,
    pub on_completed: Option<CompletedCallback>,
}

impl DeployHooks {
    /// Set the before-deploy hook
    pub fn on_before_deploy(
        mut self,
        callback: impl Fn(&Utf8Path, &Target) + Send + Sync + 'static,
    ) -> Self {
        self.on_before_deploy = Some(Arc::new(callback));
        self
    }

    /// Set the completion hook
    pub fn on_completed(
        mut self,
        callback: impl Fn(&Utf8Path, &Target, Option<&Error>) + Send + Sync + 'static,
    ) -> Self {
        self.on_completed = Some(Arc::new(callback));
        self
    }
}

/// Everything a deployment needs besides the file and the target
#[derive(Debug, Clone)]
pub struct DeployContext {
    /// Wire names are computed relative to this directory
    pub root: Utf8PathBuf,
    /// Address for specifiers with an empty host part
    pub default_host: String,
    /// Port for specifiers without a usable port
    pub default_port: u16,
    /// Bound on each connect, write and close step
    pub timeout: Option<Duration>,
}

impl DeployContext {
    /// Create a context with built-in defaults and no timeout
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_host: DEFAULT_HOST.to_string(),
            default_port: DEFAULT_PORT,
            timeout: None,
        }
    }

    /// Create a context from the configuration of a workspace
    pub fn from_config(config: &Config, workspace_root: &Utf8Path) -> Self {
        Self {
            root: config.deploy_root(workspace_root),
            default_host: config.defaults.host.clone(),
            default_port: config.defaults.port,
            timeout: config.defaults.timeout(),
        }
    }
}

/// A file ready to be sent
#[derive(Debug, Clone)]
pub struct PreparedFile {
    /// Wire name of the file
    pub name: String,
    /// Size of the file on disk
    pub raw_len: usize,
    /// Whether the payload is gzip data
    pub is_compressed: bool,
    /// The frame written to every host
    pub frame: Frame,
}

/// What happened when sending to one host
#[derive(Debug)]
pub struct HostDeliveryOutcome {
    /// Host specifier as configured
    pub host: String,
    /// Address the specifier resolved to
    pub address: HostAddress,
    /// Connect, write, close or timeout error
    pub error: Option<std::io::Error>,
}

impl HostDeliveryOutcome {
    /// Whether the frame was written and the connection closed cleanly
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-host outcomes of one deployment, in the order hosts were attempted
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub outcomes: Vec<HostDeliveryOutcome>,
}

impl DeliveryReport {
    /// Number of hosts that received the frame
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    /// Number of hosts that could not be reached
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Pushes single files to the hosts of a target
#[derive(Debug, Clone)]
pub struct RemoteDeployer {
    context: DeployContext,
}

impl RemoteDeployer {
    /// Create a new deployer
    pub fn new(context: DeployContext) -> Self {
        Self { context }
    }

    /// Resolve the specifiers of a target to addresses
    pub fn resolve_hosts(&self, target: &Target) -> Vec<HostAddress> {
        target
            .hosts
            .iter()
            .map(|h| self.resolve_host(h))
            .collect()
    }

    fn resolve_host(&self, spec: &str) -> HostAddress {
        HostAddress::parse(spec, &self.context.default_host, self.context.default_port)
    }

    /// Build the frame for a file without sending it
    pub async fn prepare(&self, file: &Utf8Path) -> Result<PreparedFile> {
        let name = relative_name(&self.context.root, file)?;

        let path = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.context.root.join(file)
        };
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::file_read(path.as_str(), e))?;
        let raw_len = raw.len();

        let payload = select_payload(raw)?;
        let record = RemoteFileRecord::new(name.clone(), &payload);
        let frame = Frame::new(record.to_json()?)?;

        tracing::debug!(
            name = %name,
            raw = raw_len,
            compressed = payload.is_compressed,
            frame = frame.wire_len(),
            "Prepared frame"
        );

        Ok(PreparedFile {
            name,
            raw_len,
            is_compressed: payload.is_compressed,
            frame,
        })
    }

    /// Deploy one file to every host of `target`
    ///
    /// Hosts are attempted one after another, starting with the last
    /// configured host. The returned error, which is also passed to the
    /// completion hook, only covers preparation; unreachable hosts show up
    /// in the report instead.
    pub async fn deploy_file(
        &self,
        file: &Utf8Path,
        target: &Target,
        hooks: &DeployHooks,
    ) -> Result<DeliveryReport> {
        if let Some(ref before) = hooks.on_before_deploy {
            before(file, target);
        }

        let result = match self.prepare(file).await {
            Ok(prepared) => {
                tracing::info!(
                    "Deploying '{}' to target '{}' ({} hosts)",
                    prepared.name,
                    target.name,
                    target.hosts.len()
                );
                Ok(self.dispatch(&prepared.frame, target).await)
            }
            Err(e) => {
                tracing::error!("Deploying '{}' failed: {}", file, e);
                Err(e)
            }
        };

        if let Some(ref completed) = hooks.on_completed {
            completed(file, target, result.as_ref().err());
        }

        result
    }

    /// Send `frame` to each host in turn, last configured host first
    async fn dispatch(&self, frame: &Frame, target: &Target) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for host in target.hosts.iter().rev() {
            let address = self.resolve_host(host);
            let error = self.deliver(&address, frame).await.err();

            match error {
                None => tracing::info!(host = %host, "Delivered to {}", address),
                Some(ref e) => tracing::warn!(host = %host, "Delivery to {} failed: {}", address, e),
            }

            report.outcomes.push(HostDeliveryOutcome {
                host: host.clone(),
                address,
                error,
            });
        }

        if report.failed() > 0 {
            tracing::warn!(
                "{} of {} hosts of target '{}' were not reached",
                report.failed(),
                report.outcomes.len(),
                target.name
            );
        }

        report
    }

    /// Open a connection, write the frame and close it again
    async fn deliver(&self, address: &HostAddress, frame: &Frame) -> std::io::Result<()> {
        let timeout = self.context.timeout;

        let mut stream = with_timeout(
            timeout,
            "connect",
            TcpStream::connect((address.address.as_str(), address.port)),
        )
        .await?;

        with_timeout(timeout, "write", frame.write_to(&mut stream)).await?;
        with_timeout(timeout, "close", stream.shutdown()).await
    }
}

/// Run an I/O step, failing with `TimedOut` once `limit` has passed
async fn with_timeout<T>(
    limit: Option<Duration>,
    step: &str,
    fut: impl Future<Output = std::io::Result<T>>,
) -> std::io::Result<T> {
    let Some(limit) = limit else {
        return fut.await;
    };

    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("{} timed out after {:?}", step, limit),
        )),
    }
}
