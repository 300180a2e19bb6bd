use std::fmt;

use tokio_tungstenite::tungstenite;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Problems found while decoding a pcapng section header block.
///
/// These never reach the caller of the stream editor: any of them switches the
/// editor into pass-through mode.
#[derive(Debug, PartialEq, Eq)]
pub enum PcapngError {
    Truncated { needed: usize, available: usize },
    InvalidBlockType([u8; 4]),
    UnknownByteOrder([u8; 4]),
    BadBlockLength(u32),
    OptionTooLong(usize),
}

impl fmt::Display for PcapngError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PcapngError::Truncated { needed, available } => write!(
                f,
                "Truncated pcapng data: needed {} octets, got {}",
                needed, available
            ),
            PcapngError::InvalidBlockType(t) => {
                write!(f, "Invalid section header block type: {:02x?}", t)
            }
            PcapngError::UnknownByteOrder(m) => write!(f, "Unknown byte-order magic: {:02x?}", m),
            PcapngError::BadBlockLength(l) => write!(f, "Bad section header block length: {}", l),
            PcapngError::OptionTooLong(l) => write!(f, "Option value too long: {} octets", l),
        }
    }
}

impl std::error::Error for PcapngError {}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    MissingTarget,
    TargetNotFound(String),
    InvalidRouting(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MissingTarget => write!(f, "No capture target specified"),
            ResolveError::TargetNotFound(t) => write!(f, "Non-existing capture target {}", t),
            ResolveError::InvalidRouting(t) => write!(
                f,
                "Missing or invalid capture service routing for target {}",
                t
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Errors returned when reading from a gracefully closing websocket.
#[derive(Debug)]
pub enum StreamError {
    /// The websocket has been closed in an orderly fashion; carries the close
    /// code and reason text sent by the peer.
    PeerClosed { code: u16, reason: String },
    UnexpectedMessage(String),
    Transport(tungstenite::Error),
    ConnectionGone,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::PeerClosed { code, reason } => {
                write!(f, "Websocket closed by peer: {} {:?}", code, reason)
            }
            StreamError::UnexpectedMessage(kind) => {
                write!(f, "Unexpected websocket {} message received", kind)
            }
            StreamError::Transport(e) => write!(f, "Websocket transport error: {}", e),
            StreamError::ConnectionGone => write!(f, "Websocket connection is gone"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<tungstenite::Error> for StreamError {
    fn from(err: tungstenite::Error) -> Self {
        StreamError::Transport(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    Resolve(ResolveError),
    Connect(tungstenite::Error),
    ConnectTimeout,
    InvalidRequest(String),
    TargetNotFound(String),
    AmbiguousTarget(String, usize),
    Io(std::io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Resolve(e) => write!(f, "Capture target resolution failed: {}", e),
            CaptureError::Connect(e) => write!(f, "Cannot contact capture service: {}", e),
            CaptureError::ConnectTimeout => write!(f, "Capture service connection timed out"),
            CaptureError::InvalidRequest(e) => write!(f, "Invalid capture service request: {}", e),
            CaptureError::TargetNotFound(t) => write!(f, "Capture target {} not found", t),
            CaptureError::AmbiguousTarget(t, n) => {
                write!(f, "Ambiguous capture target {:?} matches {} targets", t, n)
            }
            CaptureError::Io(e) => write!(f, "Capture output error: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {}

impl From<ResolveError> for CaptureError {
    fn from(err: ResolveError) -> Self {
        CaptureError::Resolve(err)
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err)
    }
}

#[derive(Debug)]
pub enum ClientError {
    InvalidUrl(String),
    NoClientConfigured,
    Http(reqwest::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidUrl(e) => write!(f, "Invalid capture service URL: {}", e),
            ClientError::NoClientConfigured => {
                write!(f, "No capture service configured, use --host")
            }
            ClientError::Http(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    ClientError(ClientError),
    CaptureError(CaptureError),
    InvalidArgument(String),
    OutputFailed(std::io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::ClientError(e) => write!(f, "Client error: {}", e),
            ControllerError::CaptureError(e) => write!(f, "Capture error: {}", e),
            ControllerError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            ControllerError::OutputFailed(e) => write!(f, "Output failed: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<ClientError> for ControllerError {
    fn from(err: ClientError) -> Self {
        ControllerError::ClientError(err)
    }
}

impl From<CaptureError> for ControllerError {
    fn from(err: CaptureError) -> Self {
        ControllerError::CaptureError(err)
    }
}
