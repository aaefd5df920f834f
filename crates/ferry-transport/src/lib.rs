//! Ferry Transport Library
//!
//! Write-side abstraction over the destination endpoint. Protocol variants
//! (FTP, SFTP, FTPS) differ only in transport and authentication handshake;
//! the chunk-loop logic upstream is shared and drives every backend through
//! the same offset-write contract:
//!
//! - `truncate` starts the remote object from scratch,
//! - `write_chunk` at the committed size appends (offset 0 creates),
//! - any other offset requires the backend's `random_write` capability.
//!
//! Blocking protocol clients run under `tokio::task::spawn_blocking` with the
//! connection cached behind a mutex, so one transport value is safe to share
//! across async tasks.

pub mod factory;
#[cfg(feature = "transport-ftp")]
pub mod ftp;
#[cfg(feature = "transport-ftps")]
pub mod ftps;
#[cfg(feature = "transport-local")]
pub mod local;
#[cfg(feature = "transport-sftp")]
pub mod sftp;
pub mod traits;

pub use factory::create_transport;
#[cfg(feature = "transport-ftp")]
pub use ftp::FtpTransport;
#[cfg(feature = "transport-ftps")]
pub use ftps::FtpsTransport;
#[cfg(feature = "transport-local")]
pub use local::LocalDestination;
#[cfg(feature = "transport-sftp")]
pub use sftp::SftpTransport;
pub use traits::{
    DestinationTransport, TransportCapabilities, TransportError, TransportResult,
};
