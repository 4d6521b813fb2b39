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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, KruiseError>;

/// Exit code used for every failure that is not a remote command exit.
pub const DEFAULT_ERROR_EXIT_CODE: i32 = 1;

#[derive(Error, Debug)]
pub enum KruiseError {
    #[error("{0}")]
    KubeError(String),

    #[error("{message}")]
    Conflict { message: String },

    #[error("{0}")]
    ConfigError(String),

    #[error("{resource_type} \"{name}\" not found")]
    NotFound {
        resource_type: String,
        name: String,
        namespace: String,
    },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("{0}")]
    InvalidResource(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    Usage(String),

    #[error("command terminated with exit code {code}")]
    CommandExit { code: i32 },

    #[error("{}", format_aggregate(.0))]
    Aggregate(Vec<KruiseError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<kube::Error> for KruiseError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 409 => KruiseError::Conflict {
                message: ae.message,
            },
            kube::Error::Api(ae) => KruiseError::KubeError(ae.message),
            other => KruiseError::KubeError(other.to_string()),
        }
    }
}

fn format_aggregate(errs: &[KruiseError]) -> String {
    if errs.len() == 1 {
        return errs[0].to_string();
    }
    let msgs: Vec<String> = errs.iter().map(|e| e.to_string()).collect();
    format!("[{}]", msgs.join(", "))
}

impl KruiseError {
    pub fn config_error(context: impl Into<String>) -> Self {
        Self::ConfigError(context.into())
    }

    pub fn validation(context: impl Into<String>) -> Self {
        Self::ValidationError(context.into())
    }

    pub fn usage(context: impl Into<String>) -> Self {
        Self::Usage(context.into())
    }

    pub fn not_found(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Collapses a list of errors the way kubectl's aggregate does: nothing
    /// for an empty list, the error itself for a single entry.
    pub fn aggregate(mut errs: Vec<KruiseError>) -> Result<()> {
        match errs.len() {
            0 => Ok(()),
            1 => Err(errs.remove(0)),
            _ => Err(Self::Aggregate(errs)),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandExit { code } => *code,
            _ => DEFAULT_ERROR_EXIT_CODE,
        }
    }
}

/// Formats an error message the way kubectl prints fatal errors.
pub fn error_message(msg: &str) -> String {
    let mut msg = if msg.starts_with("error: ") {
        msg.to_string()
    } else {
        format!("error: {}", msg)
    };
    if !msg.ends_with('\n') {
        msg.push('\n');
    }
    msg
}

/// Resolves the exit code for a command failure, looking through `anyhow`
/// wrapping for a remote exit code.
pub fn exit_code_of(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<KruiseError>()
        .map(KruiseError::exit_code)
        .unwrap_or(DEFAULT_ERROR_EXIT_CODE)
}
