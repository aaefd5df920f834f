use crate::traits::{DestinationTransport, TransportCapabilities, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::DestinationSpec;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Status};

/// Plain FTP destination
///
/// The blocking `suppaftp` client runs under `spawn_blocking`; the control
/// connection is cached behind a mutex and dropped on any error so the next
/// operation reconnects cleanly. FTP offers append (`APPE`) but no seek, so
/// interrupted transfers resume from the committed size while random-offset
/// writes are unsupported.
pub struct FtpTransport {
    config: FtpConfig,
    conn: Arc<Mutex<Option<FtpStream>>>,
}

#[derive(Clone)]
struct FtpConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
}

fn ftp_err(err: FtpError) -> TransportError {
    match err {
        FtpError::ConnectionError(io) => TransportError::Unreachable(io.to_string()),
        FtpError::UnexpectedResponse(ref resp) if resp.status == Status::NotLoggedIn => {
            TransportError::AuthRejected(format!("{}", err))
        }
        other => TransportError::Io(other.to_string()),
    }
}

fn connect(config: &FtpConfig) -> TransportResult<FtpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    let mut stream = FtpStream::connect(&addr).map_err(|e| match e {
        FtpError::ConnectionError(io) => TransportError::Unreachable(format!(
            "Failed to connect to {}: {}",
            addr, io
        )),
        other => TransportError::Unreachable(other.to_string()),
    })?;

    stream
        .login(&config.username, &config.password)
        .map_err(|e| match e {
            FtpError::UnexpectedResponse(ref resp) if resp.status == Status::NotLoggedIn => {
                TransportError::AuthRejected(format!("Login refused for {}", config.username))
            }
            other => ftp_err(other),
        })?;

    stream.transfer_type(FileType::Binary).map_err(ftp_err)?;

    tracing::debug!(host = %config.host, port = config.port, "FTP connection established");
    Ok(stream)
}

impl FtpTransport {
    pub fn new(destination: &DestinationSpec) -> Self {
        FtpTransport {
            config: FtpConfig {
                host: destination.host.clone(),
                port: destination.port,
                username: destination.username.clone(),
                password: destination.password.expose().to_string(),
            },
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `f` against the cached connection on the blocking pool,
    /// reconnecting first if needed and discarding the connection on error.
    async fn with_conn<T, F>(&self, f: F) -> TransportResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> TransportResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TransportError::Io("FTP connection mutex poisoned".to_string()))?;

            if guard.is_none() {
                *guard = Some(connect(&config)?);
            }
            let stream = match guard.as_mut() {
                Some(stream) => stream,
                None => return Err(TransportError::Io("FTP connection unavailable".to_string())),
            };

            match f(stream) {
                Ok(value) => Ok(value),
                Err(e) => {
                    *guard = None;
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| TransportError::Io(format!("FTP worker task failed: {}", e)))?
    }
}

#[async_trait]
impl DestinationTransport for FtpTransport {
    fn scheme(&self) -> &'static str {
        "ftp"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            resume: true,
            random_write: false,
        }
    }

    async fn verify_auth(&self) -> TransportResult<()> {
        self.with_conn(|_| Ok(())).await
    }

    async fn committed_size(&self, remote_path: &str) -> TransportResult<Option<u64>> {
        let path = remote_path.to_string();
        self.with_conn(move |ftp| match ftp.size(&path) {
            Ok(size) => Ok(Some(size as u64)),
            Err(FtpError::UnexpectedResponse(ref resp))
                if resp.status == Status::FileUnavailable =>
            {
                Ok(None)
            }
            Err(e) => Err(ftp_err(e)),
        })
        .await
    }

    async fn truncate(&self, remote_path: &str) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |ftp| {
            let mut empty = Cursor::new(Vec::new());
            ftp.put_file(&path, &mut empty).map_err(ftp_err)?;
            Ok(())
        })
        .await
    }

    async fn write_chunk(
        &self,
        remote_path: &str,
        offset: u64,
        data: Bytes,
    ) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |ftp| {
            if offset == 0 {
                // STOR creates the object; truncate() has already run when a
                // fresh start was intended.
                let existing = match ftp.size(&path) {
                    Ok(size) => size as u64,
                    Err(FtpError::UnexpectedResponse(ref resp))
                        if resp.status == Status::FileUnavailable =>
                    {
                        0
                    }
                    Err(e) => return Err(ftp_err(e)),
                };
                if existing == 0 {
                    let mut reader = Cursor::new(data);
                    ftp.put_file(&path, &mut reader).map_err(ftp_err)?;
                    return Ok(());
                }
                return Err(TransportError::Unsupported(format!(
                    "FTP cannot overwrite {} bytes already committed to {}",
                    existing, path
                )));
            }

            let committed = ftp.size(&path).map_err(ftp_err)? as u64;
            if committed != offset {
                return Err(TransportError::Unsupported(format!(
                    "FTP supports append-only writes: offset {} does not match committed size {}",
                    offset, committed
                )));
            }
            let mut reader = Cursor::new(data);
            ftp.append_file(&path, &mut reader).map_err(ftp_err)?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, remote_path: &str) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |ftp| match ftp.rm(&path) {
            Ok(()) => Ok(()),
            Err(FtpError::UnexpectedResponse(ref resp))
                if resp.status == Status::FileUnavailable =>
            {
                Ok(())
            }
            Err(e) => Err(ftp_err(e)),
        })
        .await
    }

    async fn close(&self) -> TransportResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = conn.lock() {
                if let Some(mut stream) = guard.take() {
                    let _ = stream.quit();
                }
            }
        })
        .await
        .map_err(|e| TransportError::Io(format!("FTP worker task failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{DestinationProtocol, Secret};

    fn spec() -> DestinationSpec {
        DestinationSpec {
            protocol: DestinationProtocol::Ftp,
            host: "127.0.0.1".to_string(),
            port: 21,
            username: "ferry".to_string(),
            password: Secret::new("pw"),
            remote_path: "/incoming".to_string(),
            remote_filename: None,
        }
    }

    #[test]
    fn capabilities_are_append_only() {
        let transport = FtpTransport::new(&spec());
        let caps = transport.capabilities();
        assert!(caps.resume);
        assert!(!caps.random_write);
        assert_eq!(transport.scheme(), "ftp");
    }

    #[test]
    fn connection_errors_classify_as_retryable() {
        let err = ftp_err(FtpError::ConnectionError(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(err.is_retryable());
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
