use crate::traits::{DestinationTransport, TransportCapabilities, TransportError, TransportResult};
use async_trait::async_trait;
use bytes::Bytes;
use ferry_core::DestinationSpec;
use ssh2::{ErrorCode, OpenFlags, OpenType, Session, Sftp};
use std::io::{Seek, SeekFrom, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// SFTP status code for a missing remote file (LIBSSH2_FX_NO_SUCH_FILE).
const SFTP_NO_SUCH_FILE: i32 = 2;

/// SFTP destination
///
/// The blocking `ssh2` session runs under `spawn_blocking` with the channel
/// cached behind a mutex. SFTP files support seek, so both resume and
/// random-offset writes are available and the parallel-chunked strategy can
/// target this backend.
pub struct SftpTransport {
    config: SftpConfig,
    conn: Arc<Mutex<Option<Sftp>>>,
}

#[derive(Clone)]
struct SftpConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
}

fn sftp_err(err: ssh2::Error) -> TransportError {
    TransportError::Io(err.to_string())
}

fn is_missing(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(SFTP_NO_SUCH_FILE))
}

fn connect(config: &SftpConfig) -> TransportResult<Sftp> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Unreachable(e.to_string()))?
        .next()
        .ok_or_else(|| {
            TransportError::Unreachable(format!("No address found for {}", config.host))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|e| {
        TransportError::Unreachable(format!("Failed to connect to {}: {}", addr, e))
    })?;

    let mut session = Session::new().map_err(sftp_err)?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| TransportError::Unreachable(format!("SSH handshake failed: {}", e)))?;

    session
        .userauth_password(&config.username, &config.password)
        .map_err(|e| {
            TransportError::AuthRejected(format!(
                "Password authentication refused for {}: {}",
                config.username, e
            ))
        })?;
    if !session.authenticated() {
        return Err(TransportError::AuthRejected(format!(
            "Authentication incomplete for {}",
            config.username
        )));
    }

    let sftp = session.sftp().map_err(sftp_err)?;
    tracing::debug!(host = %config.host, port = config.port, "SFTP session established");
    Ok(sftp)
}

impl SftpTransport {
    pub fn new(destination: &DestinationSpec) -> Self {
        SftpTransport {
            config: SftpConfig {
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
        F: FnOnce(&Sftp) -> TransportResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TransportError::Io("SFTP session mutex poisoned".to_string()))?;

            if guard.is_none() {
                *guard = Some(connect(&config)?);
            }
            let sftp = match guard.as_ref() {
                Some(sftp) => sftp,
                None => return Err(TransportError::Io("SFTP session unavailable".to_string())),
            };

            match f(sftp) {
                Ok(value) => Ok(value),
                Err(e) => {
                    *guard = None;
                    Err(e)
                }
            }
        })
        .await
        .map_err(|e| TransportError::Io(format!("SFTP worker task failed: {}", e)))?
    }

    fn ensure_parent_dir(sftp: &Sftp, remote_path: &str) {
        // Best effort; the write itself reports a usable error if this fails.
        if let Some(parent) = Path::new(remote_path).parent() {
            if !parent.as_os_str().is_empty() && sftp.stat(parent).is_err() {
                let _ = sftp.mkdir(parent, 0o755);
            }
        }
    }
}

#[async_trait]
impl DestinationTransport for SftpTransport {
    fn scheme(&self) -> &'static str {
        "sftp"
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            resume: true,
            random_write: true,
        }
    }

    async fn verify_auth(&self) -> TransportResult<()> {
        self.with_conn(|_| Ok(())).await
    }

    async fn committed_size(&self, remote_path: &str) -> TransportResult<Option<u64>> {
        let path = remote_path.to_string();
        self.with_conn(move |sftp| match sftp.stat(Path::new(&path)) {
            Ok(stat) => Ok(Some(stat.size.unwrap_or(0))),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(sftp_err(e)),
        })
        .await
    }

    async fn truncate(&self, remote_path: &str) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |sftp| {
            Self::ensure_parent_dir(sftp, &path);
            sftp.open_mode(
                Path::new(&path),
                OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
                0o644,
                OpenType::File,
            )
            .map_err(sftp_err)?;
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
        self.with_conn(move |sftp| {
            Self::ensure_parent_dir(sftp, &path);

            let mut file = sftp
                .open_mode(
                    Path::new(&path),
                    OpenFlags::WRITE | OpenFlags::CREATE,
                    0o644,
                    OpenType::File,
                )
                .map_err(sftp_err)?;

            if offset > 0 {
                file.seek(SeekFrom::Start(offset))
                    .map_err(|e| TransportError::Io(e.to_string()))?;
            }
            file.write_all(&data)
                .map_err(|e| TransportError::Io(e.to_string()))?;

            Ok(())
        })
        .await
    }

    async fn remove(&self, remote_path: &str) -> TransportResult<()> {
        let path = remote_path.to_string();
        self.with_conn(move |sftp| match sftp.unlink(Path::new(&path)) {
            Ok(()) => Ok(()),
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(sftp_err(e)),
        })
        .await
    }

    async fn close(&self) -> TransportResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = conn.lock() {
                guard.take();
            }
        })
        .await
        .map_err(|e| TransportError::Io(format!("SFTP worker task failed: {}", e)))?;
        Ok(())
    }
}
