use crate::traits::{DestinationTransport, TransportCapabilities, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::DestinationSpec;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, NativeTlsConnector, NativeTlsFtpStream, Status};

/// FTPS destination
///
/// Identical chunk-loop semantics to [`crate::ftp::FtpTransport`]; the only
/// difference is the explicit TLS upgrade before login.
pub struct FtpsTransport {
    config: FtpsConfig,
    conn: Arc<Mutex<Option<NativeTlsFtpStream>>>,
}

#[derive(Clone)]
struct FtpsConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
}

fn ftps_err(err: FtpError) -> TransportError {
    match err {
        FtpError::ConnectionError(io) => TransportError::Unreachable(io.to_string()),
        FtpError::UnexpectedResponse(ref resp) if resp.status == Status::NotLoggedIn => {
            TransportError::AuthRejected(format!("{}", err))
        }
        other => TransportError::Io(other.to_string()),
    }
}

fn connect(config: &FtpsConfig) -> TransportResult<NativeTlsFtpStream> {
    let addr = format!("{}:{}", config.host, config.port);
    let stream = NativeTlsFtpStream::connect(&addr).map_err(|e| {
        TransportError::Unreachable(format!("Failed to connect to {}: {}", addr, e))
    })?;

    let connector = TlsConnector::new()
        .map_err(|e| TransportError::Config(format!("TLS connector unavailable: {}", e)))?;
    let mut stream = stream
        .into_secure(NativeTlsConnector::from(connector), &config.host)
        .map_err(|e| TransportError::Unreachable(format!("TLS upgrade failed: {}", e)))?;

    stream
        .login(&config.username, &config.password)
        .map_err(|e| match e {
            FtpError::UnexpectedResponse(ref resp) if resp.status == Status::NotLoggedIn => {
                TransportError::AuthRejected(format!("Login refused for {}", config.username))
            }
            other => ftps_err(other),
        })?;

    stream.transfer_type(FileType::Binary).map_err(ftps_err)?;

    tracing::debug!(host = %config.host, port = config.port, "FTPS connection established");
    Ok(stream)
}

impl FtpsTransport {
    pub fn new(destination: &DestinationSpec) -> Self {
        FtpsTransport {
            config: FtpsConfig {
                host: destination.host.clone(),
                port: destination.port,
                username: destination.username.clone(),
                password: destination.password.expose().to_string(),
            },
            conn: Arc::new(Mutex::new(None)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> TransportResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut NativeTlsFtpStream) -> TransportResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TransportError::Io("FTPS connection mutex poisoned".to_string()))?;

            if guard.is_none() {
                *guard = Some(connect(&config)?);
            }
            let stream = match guard.as_mut() {
                Some(stream) => stream,
                None => return Err(TransportError::Io("FTPS connection unavailable".to_string())),
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
        .map_err(|e| TransportError::Io(format!("FTPS worker task failed: {}", e)))?
    }
}

#[async_trait]
impl DestinationTransport for FtpsTransport {
    fn scheme(&self) -> &'static str {
        "ftps"
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
            Err(e) => Err(ftps_err(e)),
        })
        .await
    }

    async fn truncate(&self, remote_path: &str) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |ftp| {
            let mut empty = Cursor::new(Vec::new());
            ftp.put_file(&path, &mut empty).map_err(ftps_err)?;
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
                let existing = match ftp.size(&path) {
                    Ok(size) => size as u64,
                    Err(FtpError::UnexpectedResponse(ref resp))
                        if resp.status == Status::FileUnavailable =>
                    {
                        0
                    }
                    Err(e) => return Err(ftps_err(e)),
                };
                if existing == 0 {
                    let mut reader = Cursor::new(data);
                    ftp.put_file(&path, &mut reader).map_err(ftps_err)?;
                    return Ok(());
                }
                return Err(TransportError::Unsupported(format!(
                    "FTPS cannot overwrite {} bytes already committed to {}",
                    existing, path
                )));
            }

            let committed = ftp.size(&path).map_err(ftps_err)? as u64;
            if committed != offset {
                return Err(TransportError::Unsupported(format!(
                    "FTPS supports append-only writes: offset {} does not match committed size {}",
                    offset, committed
                )));
            }
            let mut reader = Cursor::new(data);
            ftp.append_file(&path, &mut reader).map_err(ftps_err)?;
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
            Err(e) => Err(ftps_err(e)),
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
        .map_err(|e| TransportError::Io(format!("FTPS worker task failed: {}", e)))?;
        Ok(())
    }
}
