// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::shared::error::{KruiseError, Result};
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{AttachParams, TerminalSize};
use kube::{Api, Client};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub command: Vec<String>,
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    pub tty: bool,
}

/// Local ends of a remote session.
pub struct ExecStreams {
    pub stdin: Option<InputStream>,
    pub stdout: OutputStream,
    pub stderr: Option<OutputStream>,
    pub resize: Option<mpsc::Receiver<TerminalSize>>,
}

/// Runs a command inside a container and pipes its streams.
#[async_trait::async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, request: &ExecRequest, streams: ExecStreams) -> Result<()>;
}

pub struct DefaultRemoteExecutor {
    client: Client,
}

impl DefaultRemoteExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for DefaultRemoteExecutor {
    async fn execute(&self, request: &ExecRequest, streams: ExecStreams) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let params = AttachParams::default()
            .container(request.container.clone())
            .stdin(request.stdin)
            .stdout(request.stdout)
            .stderr(request.stderr)
            .tty(request.tty);

        tracing::debug!(
            "Executing {:?} in {}/{} container {}",
            request.command,
            request.namespace,
            request.pod,
            request.container
        );
        let mut attached = pods
            .exec(&request.pod, request.command.clone(), &params)
            .await?;

        let ExecStreams {
            stdin,
            mut stdout,
            stderr,
            resize,
        } = streams;

        let stdin_task = match (stdin, attached.stdin()) {
            (Some(mut local), Some(mut remote)) => Some(tokio::spawn(async move {
                if let Err(e) = tokio::io::copy(&mut local, &mut remote).await {
                    tracing::debug!("stdin stream closed: {}", e);
                }
                let _ = remote.shutdown().await;
            })),
            _ => None,
        };

        let stdout_task = attached.stdout().map(|mut remote| {
            tokio::spawn(async move {
                tokio::io::copy(&mut remote, &mut stdout).await?;
                stdout.flush().await
            })
        });

        let stderr_task = match (stderr, attached.stderr()) {
            (Some(mut local), Some(mut remote)) => Some(tokio::spawn(async move {
                tokio::io::copy(&mut remote, &mut local).await?;
                local.flush().await
            })),
            _ => None,
        };

        let resize_task = match (resize, attached.terminal_size()) {
            (Some(mut sizes), Some(mut remote)) => Some(tokio::spawn(async move {
                while let Some(size) = sizes.next().await {
                    if remote.send(size).await.is_err() {
                        break;
                    }
                }
            })),
            _ => None,
        };

        let status = attached.take_status();
        attached
            .join()
            .await
            .map_err(|e| KruiseError::KubeError(e.to_string()))?;

        for task in [stdout_task, stderr_task].into_iter().flatten() {
            task.await
                .map_err(|e| KruiseError::KubeError(e.to_string()))??;
        }
        for task in [stdin_task, resize_task].into_iter().flatten() {
            task.abort();
        }

        let status = match status {
            Some(status) => status.await,
            None => None,
        };
        status_to_result(status)
    }
}

/// Maps the final status of a remote command to an error carrying its exit
/// code when it did not succeed.
pub fn status_to_result(status: Option<Status>) -> Result<()> {
    let Some(status) = status else {
        return Ok(());
    };
    if status.status.as_deref() == Some("Success") {
        return Ok(());
    }

    if status.reason.as_deref() == Some("NonZeroExitCode") {
        let code = status
            .details
            .as_ref()
            .and_then(|d| d.causes.as_ref())
            .and_then(|causes| {
                causes
                    .iter()
                    .find(|c| c.reason.as_deref() == Some("ExitCode"))
            })
            .and_then(|c| c.message.as_deref())
            .and_then(|m| m.parse::<i32>().ok());
        if let Some(code) = code {
            return Err(KruiseError::CommandExit { code });
        }
    }

    Err(KruiseError::KubeError(status.message.unwrap_or_else(|| {
        "remote command failed without a message".to_string()
    })))
}
