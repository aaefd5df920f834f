use serde::{Deserialize, Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use validator::Validate;

use crate::validation;

/// Wrapper for sensitive string material (passwords, secret keys).
///
/// `Debug` always prints a placeholder so plans and credentials can be logged
/// without leaking secrets. Serialization keeps the real value because session
/// records must round-trip through the store; use [`Secret::masked`] before
/// persisting anything intended for audit.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    /// Access the protected value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A copy safe for audit records and status responses.
    pub fn masked() -> Self {
        Secret("[redacted]".to_string())
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("[redacted]")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Secret(value.to_string())
    }
}

/// Destination transfer protocol. Variants differ only in transport and
/// authentication handshake; the chunk-loop logic is shared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DestinationProtocol {
    Ftp,
    Sftp,
    Ftps,
}

impl DestinationProtocol {
    pub fn default_port(&self) -> u16 {
        match self {
            DestinationProtocol::Ftp | DestinationProtocol::Ftps => 21,
            DestinationProtocol::Sftp => 22,
        }
    }
}

impl Display for DestinationProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DestinationProtocol::Ftp => write!(f, "ftp"),
            DestinationProtocol::Sftp => write!(f, "sftp"),
            DestinationProtocol::Ftps => write!(f, "ftps"),
        }
    }
}

impl FromStr for DestinationProtocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ftp" => Ok(DestinationProtocol::Ftp),
            "sftp" => Ok(DestinationProtocol::Sftp),
            "ftps" => Ok(DestinationProtocol::Ftps),
            _ => Err(anyhow::anyhow!("Invalid destination protocol: {}", s)),
        }
    }
}

/// Source object location inside the object store.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
pub struct SourceLocation {
    #[validate(length(min = 1, message = "container must not be empty"))]
    pub container: String,

    #[validate(length(min = 1, message = "object key must not be empty"))]
    pub object_key: String,
}

impl SourceLocation {
    /// Filename component of the object key.
    pub fn filename(&self) -> &str {
        self.object_key
            .rsplit('/')
            .next()
            .unwrap_or(self.object_key.as_str())
    }
}

/// Destination endpoint and credentials.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DestinationSpec {
    pub protocol: DestinationProtocol,

    #[validate(length(min = 1, message = "host must not be empty"))]
    pub host: String,

    #[validate(range(min = 1, message = "port must be between 1 and 65535"))]
    pub port: u16,

    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,

    pub password: Secret,

    /// Remote directory the object lands in.
    #[validate(length(min = 1, message = "remote path must not be empty"))]
    pub remote_path: String,

    /// Optional override for the remote filename; defaults to the source
    /// object key's filename.
    pub remote_filename: Option<String>,
}

/// A validated, immutable description of one transfer. Accepted before any
/// session is requested; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferPlan {
    #[validate(nested)]
    pub source: SourceLocation,

    #[validate(nested)]
    pub destination: DestinationSpec,

    /// Expected checksum of the source object in ferry's chunk-combined
    /// format. Recomputed from the source during verification when absent.
    pub checksum_expected: Option<String>,
}

impl TransferPlan {
    /// Full remote path the object is written to.
    pub fn remote_object_path(&self) -> String {
        let filename = self
            .destination
            .remote_filename
            .as_deref()
            .unwrap_or_else(|| self.source.filename());
        format!(
            "{}/{}",
            self.destination.remote_path.trim_end_matches('/'),
            filename
        )
    }

    /// Format and traversal checks beyond the derive constraints.
    pub fn check(&self) -> Result<(), String> {
        if !validation::is_valid_object_key(&self.source.object_key) {
            return Err(format!(
                "object key {} is not a valid relative key",
                self.source.object_key
            ));
        }
        if !validation::is_valid_remote_path(&self.destination.remote_path) {
            return Err(format!(
                "remote path {} must not traverse upwards",
                self.destination.remote_path
            ));
        }
        if let Some(ref name) = self.destination.remote_filename {
            if name.is_empty() || name.contains('/') {
                return Err(format!("remote filename {} must be a bare filename", name));
            }
        }
        Ok(())
    }

    /// Copy with the destination password masked, for audit records.
    pub fn redacted(&self) -> TransferPlan {
        let mut plan = self.clone();
        plan.destination.password = Secret::masked();
        plan
    }
}
