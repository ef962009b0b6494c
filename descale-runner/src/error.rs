use descale_config::ConfigError;
use descale_transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to start control input thread: {0}")]
    Control(#[from] std::io::Error),

    #[error("Failed to create frame time histogram: {0}")]
    Stats(#[from] hdrhistogram::CreationError),

    #[error("Sender '{0}' is not available in this build")]
    UnsupportedSender(&'static str),
}
