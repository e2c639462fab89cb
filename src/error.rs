use thiserror::Error;

/// Target resolution failures. The scan is aborted before any port is probed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Invalid IP address")]
    InvalidIpAddress,

    #[error("Invalid hostname")]
    InvalidHostname,
}
