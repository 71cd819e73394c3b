use std::sync::Arc;
use std::thread;

use anyhow::{bail, Result};
use crossbeam_channel::Sender;

use crate::model::Coordinate;

pub trait GeolocationProvider: Send + Sync {
    fn locate(&self) -> Result<Coordinate>;
}

/// Reports a configured position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinate);

impl GeolocationProvider for FixedLocation {
    fn locate(&self) -> Result<Coordinate> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl GeolocationProvider for Unavailable {
    fn locate(&self) -> Result<Coordinate> {
        bail!("geolocation is not available")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LocationState {
    #[default]
    Pending,
    Loading,
    Located(Coordinate),
}

impl LocationState {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            LocationState::Located(coord) => Some(*coord),
            _ => None,
        }
    }
}

/// Single-shot lookup. Failures are logged and leave the state loading.
#[derive(Debug, Default)]
pub struct Locator {
    state: LocationState,
}

impl Locator {
    pub fn state(&self) -> LocationState {
        self.state
    }

    /// Starts the lookup on a background thread the first time it is called.
    /// The answer is delivered through `tx` wrapped by `wrap`.
    pub fn request<T, F>(&mut self, provider: Arc<dyn GeolocationProvider>, tx: Sender<T>, wrap: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<Coordinate>) -> T + Send + 'static,
    {
        if self.state != LocationState::Pending {
            return;
        }
        self.state = LocationState::Loading;
        thread::spawn(move || {
            let result = provider.locate();
            let _ = tx.send(wrap(result));
        });
    }

    /// Records a lookup result. Returns true when the state changed.
    pub fn resolve(&mut self, result: Result<Coordinate>) -> bool {
        match result {
            Ok(coord) => {
                tracing::info!(lat = coord.lat, lng = coord.lng, "located user");
                self.state = LocationState::Located(coord);
                true
            }
            Err(err) => {
                tracing::warn!("error getting user location: {err:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Duration;

    #[test]
    fn fixed_location_resolves_once() {
        let mut locator = Locator::default();
        let (tx, rx) = unbounded();
        let provider: Arc<dyn GeolocationProvider> =
            Arc::new(FixedLocation(Coordinate::new(48.85, 2.35)));
        locator.request(provider.clone(), tx.clone(), |result| result);
        assert_eq!(locator.state(), LocationState::Loading);
        locator.request(provider, tx, |result| result);

        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(locator.resolve(result));
        assert_eq!(
            locator.state().coordinate(),
            Some(Coordinate::new(48.85, 2.35))
        );
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn failure_leaves_loading() {
        let mut locator = Locator::default();
        let (tx, rx) = unbounded();
        locator.request(Arc::new(Unavailable), tx, |result| result);
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!locator.resolve(result));
        assert_eq!(locator.state(), LocationState::Loading);
        assert!(locator.state().coordinate().is_none());
    }
}
