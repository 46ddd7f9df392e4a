use std::sync::Arc;

use crate::events::{self, EventSender};
use crate::geo::Coordinate;
use crate::location::{BrowserGeolocation, FixedPosition, GeolocationProvider, NoGeolocation};
use crate::map::leaflet::{LeafletFactory, SharedMapView};
use crate::session::SessionHandle;
use crate::settings::Settings;

/// Where the user's location comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationSource {
    /// The page asks `navigator.geolocation` and posts the answer back.
    Browser,
    Fixed(Coordinate),
    Disabled,
}

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub settings: Arc<Settings>,
    pub event_sender: EventSender,
    pub map_factory: Arc<LeafletFactory>,
    pub map_view: SharedMapView,
    pub browser_geolocation: Option<Arc<BrowserGeolocation>>,
}

impl AppState {
    pub fn new(settings: Settings, source: LocationSource) -> Self {
        let event_sender = events::channel();
        let browser_geolocation = match source {
            LocationSource::Browser => Some(Arc::new(BrowserGeolocation::new())),
            _ => None,
        };
        let provider: Arc<dyn GeolocationProvider> = match (source, &browser_geolocation) {
            (_, Some(browser)) => browser.clone(),
            (LocationSource::Fixed(coordinate), None) => Arc::new(FixedPosition(coordinate)),
            _ => Arc::new(NoGeolocation),
        };

        let map_factory = Arc::new(LeafletFactory::new());
        let map_view = map_factory.view();
        let session = SessionHandle::from_settings(settings.clone(), provider, event_sender.clone());

        AppState {
            session,
            settings: Arc::new(settings),
            event_sender,
            map_factory,
            map_view,
            browser_geolocation,
        }
    }
}
