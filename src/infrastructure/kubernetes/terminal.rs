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

//! Local terminal handling for interactive sessions.

use super::executor::InputStream;
use crate::shared::error::Result;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use kube::api::TerminalSize;
use std::io::Read;
use tokio_util::io::StreamReader;

pub const TTY_UNAVAILABLE_WARNING: &str =
    "Unable to use a TTY - input is not a terminal or the right kind of file";

/// How the streams of a remote session are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtySetup {
    pub stdin: bool,
    pub tty: bool,
    /// Put the local terminal in raw mode for the session.
    pub raw: bool,
    pub warning: Option<&'static str>,
}

/// Reconciles the `-i`/`-t` flags with what the local stdin actually is.
pub fn setup_tty(stdin: bool, tty: bool, stdin_is_terminal: bool) -> TtySetup {
    if !stdin {
        return TtySetup {
            stdin: false,
            tty: false,
            raw: false,
            warning: None,
        };
    }
    if tty && !stdin_is_terminal {
        return TtySetup {
            stdin: true,
            tty: false,
            raw: false,
            warning: Some(TTY_UNAVAILABLE_WARNING),
        };
    }
    TtySetup {
        stdin: true,
        tty,
        raw: tty,
        warning: None,
    }
}

/// Restores the terminal mode when dropped.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

pub fn terminal_size() -> Option<TerminalSize> {
    crossterm::terminal::size()
        .ok()
        .map(|(width, height)| TerminalSize { width, height })
}

/// Streams the current terminal size, then every change to it.
pub fn monitor_size() -> mpsc::Receiver<TerminalSize> {
    let (mut tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        if let Some(size) = terminal_size() {
            if tx.send(size).await.is_err() {
                return;
            }
        }

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut resized = match signal(SignalKind::window_change()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!("Terminal resize events unavailable: {}", e);
                    return;
                }
            };
            while resized.recv().await.is_some() {
                if let Some(size) = terminal_size() {
                    if tx.send(size).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    rx
}

/// Local stdin for a remote session.
pub fn stdin_stream() -> Result<InputStream> {
    spawn_reader(std::io::stdin())
}

/// Reads `reader` on a dedicated thread. A blocking read there can't be
/// cancelled, and a tokio blocking task would keep the runtime from shutting
/// down after the session ends.
pub fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> Result<InputStream> {
    let (tx, rx) = mpsc::unbounded::<std::io::Result<Bytes>>();

    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                let chunk = match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => Ok(Bytes::copy_from_slice(&buf[..n])),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => Err(e),
                };
                let failed = chunk.is_err();
                if tx.unbounded_send(chunk).is_err() || failed {
                    break;
                }
            }
        })?;

    Ok(Box::new(StreamReader::new(rx)))
}
