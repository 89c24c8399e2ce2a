use crate::config::Config;
use crate::error::{PromoScreenError, Result};
use crate::state::AppState;
use notify::{RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Editors often write a file in several steps; wait for them to settle
const DEBOUNCE: Duration = Duration::from_millis(250);

/// Reload the config file into `state` and ask for a sponsor refresh.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or validated, leaving the
/// current configuration in place
pub fn reload_config(state: &AppState) -> Result<()> {
    let config = Config::load(Some(&state.config_file_path))?;
    state.replace_config(config)?;
    state.refresh.notify_one();
    Ok(())
}

/// A write to, creation of, or rename onto the watched file name
fn is_config_change(event: &notify::Event, file_name: &OsStr) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

/// Watch the configuration file and hot-reload it on change.
///
/// Returns `None` when there is no file to watch.
///
/// # Errors
///
/// Returns an error if the file watcher cannot be created
pub fn spawn_config_watcher(state: Arc<AppState>) -> Result<Option<JoinHandle<()>>> {
    let path = state.config_file_path.clone();
    if !path.exists() {
        info!(
            "Configuration file {} does not exist; hot reload disabled",
            path.display()
        );
        return Ok(None);
    }

    // Editors and deploy tools often save by renaming a new file over the old
    // one, which replaces the inode; watch the directory and match the name.
    let Some(file_name) = path.file_name().map(OsStr::to_os_string) else {
        return Err(PromoScreenError::from(format!(
            "Configuration path {} has no file name",
            path.display()
        )));
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) if is_config_change(&event, &file_name) => {
                let _ = tx.send(());
            }
            Ok(_) => {}
            Err(e) => error!("Configuration watch error: {e}"),
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    info!("Watching {} for changes", path.display());

    let handle = tokio::spawn(async move {
        // dropping the watcher stops notifications
        let _watcher = watcher;
        loop {
            tokio::select! {
                () = state.shutdown_token.cancelled() => break,
                changed = rx.recv() => {
                    if changed.is_none() {
                        break;
                    }
                }
            }

            tokio::time::sleep(DEBOUNCE).await;
            while rx.try_recv().is_ok() {}

            debug!("Configuration file changed, reloading");
            match reload_config(&state) {
                Ok(()) => info!("Configuration reloaded"),
                Err(e) => warn!("Ignoring configuration change: {e}"),
            }
        }
        debug!("Configuration watcher stopped");
    });

    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Clock;
    use tokio_util::sync::CancellationToken;

    fn state_for(path: std::path::PathBuf) -> Arc<AppState> {
        let config = Config::load(Some(&path)).unwrap();
        AppState::new(config, path, CancellationToken::new()).unwrap()
    }

    #[test]
    fn test_reload_applies_new_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ site_name: 'Before' }").unwrap();
        let state = state_for(path.clone());

        std::fs::write(&path, "{ site_name: 'After', clock: 'TwentyFourHour' }").unwrap();
        reload_config(&state).unwrap();

        let config = state.config_snapshot().unwrap();
        assert_eq!(config.site_name, "After");
        assert_eq!(config.clock, Clock::TwentyFourHour);
    }

    #[test]
    fn test_invalid_reload_keeps_current_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ site_name: 'Before' }").unwrap();
        let state = state_for(path.clone());

        std::fs::write(&path, "{ carousel: { window_size: 0 } }").unwrap();
        assert!(reload_config(&state).is_err());
        assert_eq!(state.config_snapshot().unwrap().site_name, "Before");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watcher_reloads_after_rename_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(&path, "{ site_name: 'Before' }").unwrap();
        let state = state_for(path.clone());
        let handle = spawn_config_watcher(state.clone()).unwrap().unwrap();

        // first save replaces the inode, the second only works if the
        // directory is still being watched
        for name in ["Renamed", "Renamed Again"] {
            let staged = dir.path().join("config.json5.new");
            std::fs::write(&staged, format!("{{ site_name: '{name}' }}")).unwrap();
            std::fs::rename(&staged, &path).unwrap();

            let mut reloaded = false;
            for _ in 0..50 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if state.config_snapshot().unwrap().site_name == name {
                    reloaded = true;
                    break;
                }
            }
            assert!(reloaded, "config was not reloaded to {name}");
        }

        state.shutdown_token.cancel();
        handle.await.unwrap();
    }

    #[test]
    fn test_only_matching_file_name_counts() {
        use notify::event::{CreateKind, EventKind, ModifyKind};

        let config = OsStr::new("config.json5");
        let event = |kind, path: &str| notify::Event::new(kind).add_path(PathBuf::from(path));

        assert!(is_config_change(
            &event(EventKind::Modify(ModifyKind::Any), "/srv/config.json5"),
            config
        ));
        assert!(is_config_change(
            &event(EventKind::Create(CreateKind::File), "/srv/config.json5"),
            config
        ));
        assert!(!is_config_change(
            &event(EventKind::Modify(ModifyKind::Any), "/srv/other.json5"),
            config
        ));
        assert!(!is_config_change(
            &event(EventKind::Remove(notify::event::RemoveKind::File), "/srv/config.json5"),
            config
        ));
    }

    #[tokio::test]
    async fn test_missing_file_disables_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path().join("absent.json5"));
        assert!(spawn_config_watcher(state).unwrap().is_none());
    }
}
