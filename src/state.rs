use crate::cache::CacheStore;
use crate::carousel::{CarouselSnapshot, RotationState};
use crate::config::{CarouselSource, Config};
use crate::error::{PromoScreenError, Result};
use crate::events::DisplayEvent;
use crate::slides::{ticker_text, SlideItem};
use crate::sponsors::{FetchReport, SponsorResolver};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Display events buffered per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 64;

/// Shared state for the display
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub config_file_path: PathBuf,
    pub carousel: RwLock<RotationState>,
    pub sponsors: RwLock<Vec<SlideItem>>,
    pub last_report: RwLock<Option<FetchReport>>,
    /// One store per cache file, so every resolver shares its write lock
    pub cache_store: Mutex<CacheStore>,
    pub client: reqwest::Client,
    pub events: broadcast::Sender<DisplayEvent>,
    /// Wakes the sponsor poller ahead of schedule
    pub refresh: Notify,
    pub shutdown_token: CancellationToken,
}

fn poisoned(what: &str) -> PromoScreenError {
    PromoScreenError::from(format!("{what} lock poisoned"))
}

/// Items the carousel starts from for a given configuration
fn carousel_items(config: &Config, sponsors: &[SlideItem]) -> Vec<SlideItem> {
    match config.carousel.source {
        CarouselSource::Sponsors => sponsors.to_vec(),
        CarouselSource::Static if config.slides.is_empty() => SlideItem::builtin(),
        CarouselSource::Static => config.slides.clone(),
    }
}

impl AppState {
    /// Build the initial state. Sponsors start as the placeholder list until the
    /// first resolution completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the carousel window in `config` is zero
    pub fn new(
        config: Config,
        config_file_path: PathBuf,
        shutdown_token: CancellationToken,
    ) -> Result<Arc<Self>> {
        let sponsors = SlideItem::default_sponsors();
        let carousel = RotationState::new(
            carousel_items(&config, &sponsors),
            config.carousel.window_size,
        )?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cache_store = Mutex::new(CacheStore::new(&config.cache_file));

        Ok(Arc::new(Self {
            config: Arc::new(RwLock::new(config)),
            config_file_path,
            carousel: RwLock::new(carousel),
            sponsors: RwLock::new(sponsors),
            last_report: RwLock::new(None),
            cache_store,
            client: reqwest::Client::new(),
            events,
            refresh: Notify::new(),
            shutdown_token,
        }))
    }

    /// Clone of the current configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the config lock is poisoned
    pub fn config_snapshot(&self) -> Result<Config> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| poisoned("Configuration"))
    }

    /// Resolver for the current configuration, backed by the shared cache store
    ///
    /// # Errors
    ///
    /// Returns an error if a lock is poisoned
    pub fn resolver(&self) -> Result<SponsorResolver> {
        let config = self.config_snapshot()?;
        let store = {
            let mut store = self.cache_store.lock().map_err(|_| poisoned("Cache store"))?;
            if store.path() != config.cache_file.as_path() {
                *store = CacheStore::new(&config.cache_file);
            }
            store.clone()
        };
        Ok(SponsorResolver::new(
            self.client.clone(),
            config.sponsor_endpoint.clone(),
            config.sample_data_path(),
            store,
        ))
    }

    /// # Errors
    ///
    /// Returns an error if the carousel lock is poisoned
    pub fn carousel_snapshot(&self) -> Result<CarouselSnapshot> {
        self.carousel
            .read()
            .map(|carousel| carousel.snapshot())
            .map_err(|_| poisoned("Carousel"))
    }

    /// Advance the carousel one position and tell the display.
    ///
    /// Timer ticks and the prev/next buttons both land here.
    ///
    /// # Errors
    ///
    /// Returns an error if the carousel lock is poisoned
    pub fn advance_carousel(&self) -> Result<CarouselSnapshot> {
        let snapshot = {
            let mut carousel = self.carousel.write().map_err(|_| poisoned("Carousel"))?;
            carousel.advance_in_place();
            carousel.snapshot()
        };
        debug!("Carousel advanced to counter {}", snapshot.counter);
        self.publish(DisplayEvent::Carousel(snapshot.clone()));
        Ok(snapshot)
    }

    /// # Errors
    ///
    /// Returns an error if the sponsors lock is poisoned
    pub fn sponsors(&self) -> Result<Vec<SlideItem>> {
        self.sponsors
            .read()
            .map(|sponsors| sponsors.clone())
            .map_err(|_| poisoned("Sponsors"))
    }

    /// Most recent resolution report, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the report lock is poisoned
    pub fn last_report(&self) -> Result<Option<FetchReport>> {
        self.last_report
            .read()
            .map(|report| report.clone())
            .map_err(|_| poisoned("Report"))
    }

    /// Resolve sponsors and swap them in.
    ///
    /// When the carousel runs off sponsor data and the list changed, the carousel
    /// is rebuilt from the new list.
    ///
    /// # Errors
    ///
    /// Returns an error if a lock is poisoned; resolution itself never fails
    pub async fn refresh_sponsors(&self) -> Result<FetchReport> {
        let resolver = self.resolver()?;
        let resolution = resolver.resolve().await;

        let changed = {
            let mut sponsors = self.sponsors.write().map_err(|_| poisoned("Sponsors"))?;
            let changed = *sponsors != resolution.items;
            if changed {
                sponsors.clone_from(&resolution.items);
            }
            changed
        };

        if changed {
            info!("Sponsor list updated with {} items", resolution.items.len());
            self.publish(DisplayEvent::Sponsors {
                ticker: ticker_text(&resolution.items),
                items: resolution.items.clone(),
            });
            let config = self.config_snapshot()?;
            if config.carousel.source == CarouselSource::Sponsors {
                self.reload_carousel(&config)?;
            }
        }

        *self.last_report.write().map_err(|_| poisoned("Report"))? =
            Some(resolution.report.clone());
        Ok(resolution.report)
    }

    /// Install a new configuration, rebuilding the carousel when its settings changed
    ///
    /// # Errors
    ///
    /// Returns an error if a lock is poisoned or the new window size is zero
    pub fn replace_config(&self, config: Config) -> Result<()> {
        let carousel_changed = {
            let mut current = self.config.write().map_err(|_| poisoned("Configuration"))?;
            let changed = current.carousel.window_size != config.carousel.window_size
                || current.carousel.source != config.carousel.source
                || current.slides != config.slides;
            *current = config.clone();
            changed
        };

        if carousel_changed {
            self.reload_carousel(&config)?;
        }
        info!("Configuration updated in memory");
        Ok(())
    }

    /// Full reload: new items, counter back to zero
    fn reload_carousel(&self, config: &Config) -> Result<()> {
        let items = carousel_items(config, &self.sponsors()?);
        let rotation = RotationState::new(items, config.carousel.window_size)?;
        let snapshot = rotation.snapshot();
        *self.carousel.write().map_err(|_| poisoned("Carousel"))? = rotation;
        info!("Carousel reloaded with window {}", snapshot.window);
        self.publish(DisplayEvent::Carousel(snapshot));
        Ok(())
    }

    /// Send an event to every connected display; no subscribers is fine
    pub fn publish(&self, event: DisplayEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CarouselConfig;

    fn test_config(dir: &std::path::Path, source: CarouselSource) -> Config {
        Config {
            public_dir: dir.to_path_buf(),
            cache_file: dir.join("cache.json"),
            carousel: CarouselConfig {
                source,
                ..CarouselConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_static_source_uses_builtin_slides() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            test_config(dir.path(), CarouselSource::Static),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();

        let snapshot = state.carousel_snapshot().unwrap();
        assert_eq!(snapshot.visible.len(), 6);
        assert_eq!(snapshot.visible[0], SlideItem::builtin()[0]);
    }

    #[test]
    fn test_advance_publishes_event() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            test_config(dir.path(), CarouselSource::Static),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();
        let mut events = state.events.subscribe();

        let snapshot = state.advance_carousel().unwrap();
        assert_eq!(snapshot.counter, 1);
        match events.try_recv().unwrap() {
            DisplayEvent::Carousel(published) => assert_eq!(published, snapshot),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sponsor_source_follows_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let sponsors_dir = dir.path().join("assets").join("sponsors");
        std::fs::create_dir_all(&sponsors_dir).unwrap();
        std::fs::write(
            sponsors_dir.join("sample-data.json"),
            r#"{"data":[{"heading":"Sample","content":"From disk"}]}"#,
        )
        .unwrap();

        let state = AppState::new(
            test_config(dir.path(), CarouselSource::Sponsors),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(state.carousel_snapshot().unwrap().visible.len(), 2);

        let report = state.refresh_sponsors().await.unwrap();
        assert_eq!(report.item_count, 1);
        let visible = state.carousel_snapshot().unwrap().visible;
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "Sample");
        assert!(state.last_report().unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_refreshes_all_persist() {
        let dir = tempfile::tempdir().unwrap();
        let sponsors_dir = dir.path().join("assets").join("sponsors");
        std::fs::create_dir_all(&sponsors_dir).unwrap();
        std::fs::write(
            sponsors_dir.join("sample-data.json"),
            r#"{"data":[{"heading":"Sample","content":"From disk"}]}"#,
        )
        .unwrap();
        let state = AppState::new(
            test_config(dir.path(), CarouselSource::Static),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let state = state.clone();
                tokio::spawn(async move { state.refresh_sponsors().await.unwrap() })
            })
            .collect();
        for task in tasks {
            let report = task.await.unwrap();
            assert!(report
                .log
                .iter()
                .all(|entry| entry.message != "Failed to save to cache"));
        }

        let resolver = state.resolver().unwrap();
        assert_eq!(resolver.store().load().unwrap().data[0].title, "Sample");
    }

    #[test]
    fn test_resolvers_follow_cache_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), CarouselSource::Static);
        let state = AppState::new(
            config.clone(),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(
            state.resolver().unwrap().store().path(),
            dir.path().join("cache.json").as_path()
        );

        let mut moved = config;
        moved.cache_file = dir.path().join("other.json");
        state.replace_config(moved).unwrap();
        assert_eq!(
            state.resolver().unwrap().store().path(),
            dir.path().join("other.json").as_path()
        );
    }

    #[test]
    fn test_replace_config_resets_carousel_on_window_change() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), CarouselSource::Static);
        let state = AppState::new(
            config.clone(),
            dir.path().join("config.json5"),
            CancellationToken::new(),
        )
        .unwrap();
        state.advance_carousel().unwrap();

        let mut updated = config;
        updated.carousel.window_size = 4;
        state.replace_config(updated).unwrap();

        let snapshot = state.carousel_snapshot().unwrap();
        assert_eq!(snapshot.counter, 0);
        assert_eq!(snapshot.visible.len(), 4);
    }
}
