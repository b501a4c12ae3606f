use tracing::Instrument;

use crate::config::StationConfig;
use crate::error::ConfigError;
use crate::retry::RetryStrategy;
use crate::station::Station;
use crate::tcp::{receive, send};

/// Process-wide, append-only, name-keyed table of stations, built at
/// configuration time and owned by the composition root.
///
/// Adding a station spawns its worker tasks, so [`Self::add`] must be
/// called from within a Tokio runtime. Stations are never removed.
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            stations: Vec::new(),
        }
    }

    /// Validate the configuration, create the station, and spawn its
    /// worker tasks. The returned handle is a clone of the registered one.
    ///
    /// The retry strategy paces reconnect attempts; most callers pass
    /// [`crate::default_retry_strategy`].
    pub fn add(
        &mut self,
        config: StationConfig,
        retry: Box<dyn RetryStrategy>,
    ) -> Result<Station, ConfigError> {
        config.validate()?;
        if self.stations.iter().any(|s| s.name() == config.name) {
            return Err(ConfigError::DuplicateName(config.name));
        }

        let station = Station::new(config);
        let shared = station.shared().clone();
        let span = tracing::info_span!("station", name = %shared.name);
        tokio::spawn(receive::run(shared.clone(), retry).instrument(span.clone()));
        if shared.out_size > 0 {
            tokio::spawn(send::run(shared).instrument(span));
        }

        self.stations.push(station.clone());
        Ok(station)
    }

    /// Look a station up by name; `None` if no such station was configured
    pub fn get(&self, name: &str) -> Option<Station> {
        self.stations.iter().find(|s| s.name() == name).cloned()
    }

    /// All configured stations, in configuration order
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    /// Number of configured stations
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// True when no station has been configured
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl Default for StationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
