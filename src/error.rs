use std::error;
use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug)]
pub enum DetectorError {
    MalformedImage(image::ImageError),
    InvalidInput(String),
    Io(io::Error),
    #[cfg(feature = "tflite")]
    Model(tflite::Error),
    /// The worker thread owning the model is no longer running.
    WorkerGone,
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DetectorError::MalformedImage(error) => write!(f, "malformed image: {}", error),
            DetectorError::InvalidInput(message) => write!(f, "invalid input: {}", message),
            DetectorError::Io(error) => write!(f, "io error: {}", error),
            #[cfg(feature = "tflite")]
            DetectorError::Model(error) => write!(f, "model error: {}", error),
            DetectorError::WorkerGone => write!(f, "detector worker is not running"),
        }
    }
}

impl error::Error for DetectorError {}

impl From<image::ImageError> for DetectorError {
    fn from(error: image::ImageError) -> Self {
        DetectorError::MalformedImage(error)
    }
}

impl From<io::Error> for DetectorError {
    fn from(error: io::Error) -> Self {
        DetectorError::Io(error)
    }
}

#[cfg(feature = "tflite")]
impl From<tflite::Error> for DetectorError {
    fn from(error: tflite::Error) -> Self {
        DetectorError::Model(error)
    }
}
