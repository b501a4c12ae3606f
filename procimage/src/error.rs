use std::fmt::{Display, Formatter};

/// Errors that prevent a station from being configured.
///
/// Fatal to that station's startup only; other stations in the same
/// registry are unaffected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// the station name is empty
    EmptyName,
    /// a station with the same name already exists in the registry
    DuplicateName(String),
    /// both image sizes are zero, leaving the station nothing to exchange
    NoImages(String),
    /// the address text could not be parsed as `host:port`
    InvalidAddress(String),
}

impl std::error::Error for ConfigError {}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ConfigError::EmptyName => f.write_str("station name is empty"),
            ConfigError::DuplicateName(name) => {
                write!(f, "station '{name}' is already configured")
            }
            ConfigError::NoImages(name) => {
                write!(f, "station '{name}' has neither an input nor an output image")
            }
            ConfigError::InvalidAddress(text) => {
                write!(f, "invalid station address: '{text}'")
            }
        }
    }
}

/// A requested offset/length combination falls outside the configured
/// image geometry.
///
/// This always indicates a bug in the calling binding layer: it is
/// surfaced synchronously, never retried, and the image is never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeError {
    /// the first element already exceeds the image
    Offset {
        /// requested byte offset
        offset: usize,
        /// requested element width in bytes
        element_size: usize,
        /// configured image size in bytes
        image_size: usize,
    },
    /// the element count extends past the end of the image
    Count {
        /// requested byte offset
        offset: usize,
        /// requested element width in bytes
        element_size: usize,
        /// requested number of elements
        count: usize,
        /// configured image size in bytes
        image_size: usize,
    },
    /// the caller's buffer is too small for the requested element count
    Buffer {
        /// bytes required by the request
        required: usize,
        /// bytes provided by the caller
        provided: usize,
    },
    /// the mask does not cover exactly one element
    Mask {
        /// provided mask length in bytes
        mask_len: usize,
        /// requested element width in bytes
        element_size: usize,
    },
}

impl std::error::Error for RangeError {}

impl Display for RangeError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            RangeError::Offset {
                offset,
                element_size,
                image_size,
            } => write!(
                f,
                "offset {offset} with element size {element_size} exceeds the image size of {image_size}"
            ),
            RangeError::Count {
                offset,
                element_size,
                count,
                image_size,
            } => write!(
                f,
                "{count} elements of size {element_size} at offset {offset} exceed the image size of {image_size}"
            ),
            RangeError::Buffer { required, provided } => write!(
                f,
                "request requires {required} bytes but the buffer holds only {provided}"
            ),
            RangeError::Mask {
                mask_len,
                element_size,
            } => write!(
                f,
                "mask of {mask_len} bytes does not match the element size of {element_size}"
            ),
        }
    }
}

/// Errors returned by the read/write primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessError {
    /// the request falls outside the configured image geometry
    Range(RangeError),
    /// no live connection exists to the remote station
    ///
    /// This is transient and not a data loss: a read still returns the
    /// last good image (stale but valid) and a write is still applied
    /// locally, to be sent if/when the station reconnects.
    NotConnected,
}

impl std::error::Error for AccessError {}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AccessError::Range(err) => err.fmt(f),
            AccessError::NotConnected => {
                f.write_str("no connection exists to the remote station")
            }
        }
    }
}

impl From<RangeError> for AccessError {
    fn from(err: RangeError) -> Self {
        AccessError::Range(err)
    }
}

/// The station's worker tasks have shut down.
///
/// Workers normally run for the lifetime of the process, so a listener
/// only ever observes this while the runtime itself is being torn down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shutdown;

impl std::error::Error for Shutdown {}

impl Display for Shutdown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("the station workers have been shut down")
    }
}
