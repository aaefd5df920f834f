use crate::{DestinationTransport, TransportError, TransportResult};
use ferry_core::{DestinationProtocol, DestinationSpec};
use std::sync::Arc;

/// Create a transport for the plan's destination protocol.
pub fn create_transport(
    destination: &DestinationSpec,
) -> TransportResult<Arc<dyn DestinationTransport>> {
    match destination.protocol {
        #[cfg(feature = "transport-ftp")]
        DestinationProtocol::Ftp => Ok(Arc::new(crate::FtpTransport::new(destination))),

        #[cfg(not(feature = "transport-ftp"))]
        DestinationProtocol::Ftp => Err(TransportError::Config(
            "FTP transport not available (transport-ftp feature not enabled)".to_string(),
        )),

        #[cfg(feature = "transport-sftp")]
        DestinationProtocol::Sftp => Ok(Arc::new(crate::SftpTransport::new(destination))),

        #[cfg(not(feature = "transport-sftp"))]
        DestinationProtocol::Sftp => Err(TransportError::Config(
            "SFTP transport not available (transport-sftp feature not enabled)".to_string(),
        )),

        #[cfg(feature = "transport-ftps")]
        DestinationProtocol::Ftps => Ok(Arc::new(crate::FtpsTransport::new(destination))),

        #[cfg(not(feature = "transport-ftps"))]
        DestinationProtocol::Ftps => Err(TransportError::Config(
            "FTPS transport not available (transport-ftps feature not enabled)".to_string(),
        )),
    }
}
