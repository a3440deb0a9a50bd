use crate::assemble::assemble;
use crate::config::Config;
use crate::db;
use crate::detector::{Detector, RoboflowDetector};
use crate::error::{Error, Result};
use crate::ocr::{crop, OcrEngine, TesseractOcr};
use crate::registry::{AuthorizationRegistry, CsvReferenceList, ReferenceListLoader};
use crate::render::{annotate, Renderer};
use crate::types::{DetectionResult, SessionLogEntry};
use image::DynamicImage;
use log::{error, info, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::{Arc, Mutex, RwLock};

/// Outcome of one image: one result per detected region, in detector order.
#[derive(Debug, Serialize)]
pub struct Recognition {
    pub results: Vec<DetectionResult>,
    pub annotated_url: Option<String>,
}

/// Everything a request needs: collaborator handles, the optional plate log
/// and the current authorization registry.
pub struct Session {
    detector: Box<dyn Detector>,
    ocr: Box<dyn OcrEngine>,
    registry: RwLock<Arc<AuthorizationRegistry>>,
    log: Option<Mutex<Connection>>,
    renderer: Option<Renderer>,
    location: String,
}

impl Session {
    pub fn new(detector: Box<dyn Detector>, ocr: Box<dyn OcrEngine>, location: String) -> Self {
        Session {
            detector,
            ocr,
            registry: RwLock::new(Arc::new(AuthorizationRegistry::empty())),
            log: None,
            renderer: None,
            location,
        }
    }

    pub fn with_log(mut self, conn: Connection) -> Self {
        self.log = Some(Mutex::new(conn));
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[cfg(test)]
    pub fn with_registry(self, registry: AuthorizationRegistry) -> Self {
        self.replace_registry(registry);
        self
    }

    /// Builds the production collaborators. Must run outside the async
    /// runtime, since the detector uses a blocking HTTP client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut session = Session::new(
            Box::new(RoboflowDetector::new(&config.detector)?),
            Box::new(TesseractOcr::new(&config.ocr)),
            config.location.clone(),
        );
        if let Some(path) = &config.database {
            info!("Logging plates to {:?}", path);
            session = session.with_log(db::open(path).map_err(|e| Error::unavailable("persistence", e))?);
        }
        if let Some(url) = &config.plates_url {
            session = session.with_renderer(Renderer::new(config.plates_dir.clone(), url.clone()));
        }
        if let Some(path) = &config.reference_list {
            let bytes = std::fs::read(path).map_err(|e| {
                Error::invalid_input(format!("unable to read reference list {:?}: {}", path, e))
            })?;
            session.rebuild_registry(&CsvReferenceList, &bytes)?;
        }
        Ok(session)
    }

    /// Snapshot of the current registry. Stays valid across later rebuilds.
    pub fn registry(&self) -> Arc<AuthorizationRegistry> {
        match self.registry.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Swaps in a new registry. Requests already running keep their snapshot.
    pub fn replace_registry(&self, registry: AuthorizationRegistry) {
        info!("Loaded {} authorized plates", registry.len());
        let registry = Arc::new(registry);
        match self.registry.write() {
            Ok(mut guard) => *guard = registry,
            Err(poisoned) => *poisoned.into_inner() = registry,
        }
    }

    /// Rebuilds the registry from an uploaded reference list. A list that
    /// fails to load leaves an empty registry in place, so no plate is
    /// authorized until a valid list arrives.
    pub fn rebuild_registry(&self, loader: &dyn ReferenceListLoader, bytes: &[u8]) -> Result<usize> {
        match loader.load(bytes).and_then(|table| AuthorizationRegistry::build(&table)) {
            Ok(registry) => {
                if registry.is_empty() {
                    warn!("Reference list has no plates");
                }
                let plates = registry.len();
                self.replace_registry(registry);
                Ok(plates)
            }
            Err(e) => {
                error!("Rejected reference list, authorizing nothing: {}", e);
                self.replace_registry(AuthorizationRegistry::empty());
                Err(e)
            }
        }
    }

    pub fn recognize(&self, image: &DynamicImage, location: Option<&str>) -> Result<Recognition> {
        let regions = self.detector.detect(image)?;
        info!("Detected {} plate regions", regions.len());

        let registry = self.registry();
        let ocr = &self.ocr;
        let results = assemble(
            &regions,
            |region| match crop(image, region) {
                Some(plate) => ocr.read(&plate),
                None => Ok(None),
            },
            &registry,
        );

        if let Some(log) = &self.log {
            let location = location.unwrap_or(self.location.as_str());
            let entries: Vec<SessionLogEntry> = results
                .iter()
                .filter(|r| !r.canonical.is_empty())
                .map(|r| SessionLogEntry {
                    timestamp: db::now(),
                    location: location.to_string(),
                    plate_number: r.canonical.to_string(),
                    authorized: r.authorized,
                })
                .collect();
            let mut conn = match log.lock() {
                Ok(conn) => conn,
                Err(poisoned) => poisoned.into_inner(),
            };
            db::append_all(&mut conn, &entries).map_err(|e| {
                error!("Error logging {} plates: {:?}", entries.len(), e);
                Error::unavailable("persistence", e)
            })?;
        }

        let annotated_url = self
            .renderer
            .as_ref()
            .and_then(|renderer| renderer.publish(&annotate(image, &results)));

        Ok(Recognition {
            results,
            annotated_url,
        })
    }

    /// Closes the plate log. Dropping the session has the same effect but
    /// swallows errors.
    pub fn close(self) -> Result<()> {
        if let Some(log) = self.log {
            let conn = match log.into_inner() {
                Ok(conn) => conn,
                Err(poisoned) => poisoned.into_inner(),
            };
            conn.close()
                .map_err(|(_, e)| Error::unavailable("persistence", e))?;
        }
        Ok(())
    }
}
