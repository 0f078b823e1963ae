//! Command implementations for search-sync.
//!
//! Handles:
//! - start: run the reindex and purge schedules until Ctrl+C/SIGTERM
//! - reindex / purge: one pass now, for one index or all of them
//! - hook: save/delete notifications from the content layer
//! - status: tracking and deletion counts per index

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tracing::{info, warn};

use sync_indexing::{
    IndexDefinitions, IndexRegistry, MutationHooks, PassResult, PurgeEngine, ReconcileEngine,
    SyncConfig,
};
use sync_remote::{AlgoliaClient, AlgoliaConfig, SearchIndexClient};
use sync_scheduler::{
    create_purge_job, create_reindex_job, EngineSource, SchedulerConfig, SchedulerService,
    SyncJobConfig,
};
use sync_storage::{SqliteContentSource, Storage};
use sync_types::{ContentSource, InMemoryContentSource, Settings};

use crate::cli::HookCommands;

/// Load configuration, then apply the CLI log level override.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn prepare_db_path(settings: &Settings) -> Result<PathBuf> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    Ok(db_path)
}

/// Open the tracking store, waiting while a daemon pass holds it.
fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = prepare_db_path(settings)?;
    let storage = Storage::open_with_retry(&db_path, Duration::from_secs(settings.lock_wait_secs))
        .context("Failed to open tracking store")?;
    Ok(Arc::new(storage))
}

fn load_definitions(settings: &Settings) -> Result<IndexDefinitions> {
    let definitions = IndexRegistry::from_settings(settings)
        .and_then(|registry| registry.load_definitions())
        .context("Invalid index declarations")?;
    if definitions.is_empty() {
        warn!("No indexes declared; add [indexes.<name>] tables to the config file");
    }
    Ok(definitions)
}

/// The content database, if one is configured.
fn open_content(settings: &Settings) -> Result<Option<Arc<SqliteContentSource>>> {
    let Some(path) = settings.content.db_path.as_deref() else {
        return Ok(None);
    };
    let source = SqliteContentSource::open(Path::new(path), &settings.content.table_prefix)
        .context("Failed to open content database")?;
    Ok(Some(Arc::new(source)))
}

fn require_content(settings: &Settings) -> Result<Arc<SqliteContentSource>> {
    open_content(settings)?.context("content.db_path is not set")
}

fn build_client(settings: &Settings) -> Result<Arc<dyn SearchIndexClient>> {
    let config = AlgoliaConfig::from_settings(&settings.remote)
        .context("Remote search service is not configured")?;
    let client = AlgoliaClient::new(config).context("Failed to build HTTP client")?;
    Ok(Arc::new(client))
}

/// Builds engines over a freshly opened tracking store.
///
/// Only one process at a time can hold the store, so the daemon keeps a
/// factory rather than an open store: each pass opens it, and closes it
/// when its engine is dropped.
#[derive(Clone)]
struct EngineFactory {
    db_path: PathBuf,
    lock_wait: Duration,
    definitions: IndexDefinitions,
    content: Arc<SqliteContentSource>,
    client: Arc<dyn SearchIndexClient>,
    config: SyncConfig,
}

impl EngineFactory {
    fn new(settings: &Settings) -> Result<Self> {
        let config = SyncConfig::from_settings(settings).context("Invalid sync settings")?;
        Ok(Self {
            db_path: prepare_db_path(settings)?,
            lock_wait: Duration::from_secs(settings.lock_wait_secs),
            definitions: load_definitions(settings)?,
            content: require_content(settings)?,
            client: build_client(settings)?,
            config,
        })
    }

    fn storage(&self) -> Result<Arc<Storage>> {
        let storage = Storage::open_with_retry(&self.db_path, self.lock_wait)
            .context("Failed to open tracking store")?;
        Ok(Arc::new(storage))
    }

    fn reconcile(&self) -> Result<ReconcileEngine> {
        Ok(ReconcileEngine::new(
            self.definitions.clone(),
            self.storage()?,
            self.content.clone(),
            self.client.clone(),
            self.config.clone(),
        ))
    }

    fn purge(&self) -> Result<PurgeEngine> {
        Ok(PurgeEngine::new(
            self.definitions.clone(),
            self.storage()?,
            self.client.clone(),
            self.config.clone(),
        ))
    }
}

impl EngineSource<ReconcileEngine> for EngineFactory {
    fn acquire(&self) -> Result<Arc<ReconcileEngine>, String> {
        self.reconcile().map(Arc::new).map_err(|e| format!("{:#}", e))
    }
}

impl EngineSource<PurgeEngine> for EngineFactory {
    fn acquire(&self) -> Result<Arc<PurgeEngine>, String> {
        self.purge().map(Arc::new).map_err(|e| format!("{:#}", e))
    }
}

/// Start the scheduler.
///
/// 1. Open the content database and remote client, check the tracking store
/// 2. Register the reindex and purge jobs; each run opens the store
/// 3. Run until SIGINT/SIGTERM, then shut the scheduler down
///
/// Between runs the store is closed, so `hook` and `status` work while the
/// daemon is up.
pub async fn start_daemon(settings: &Settings) -> Result<()> {
    info!("search-sync starting...");
    info!("  Tracking store: {}", settings.db_path);
    info!("  Reindex schedule: {}", settings.schedule.reindex_cron);
    info!("  Purge schedule: {}", settings.schedule.purge_cron);
    info!("  Timezone: {}", settings.schedule.timezone);

    let factory = EngineFactory::new(settings)?;
    drop(factory.storage()?);

    let scheduler_config =
        SchedulerConfig::default().with_timezone(settings.schedule.timezone.clone());
    let mut scheduler = SchedulerService::new(scheduler_config)
        .await
        .context("Failed to create scheduler")?;

    let jobs = SyncJobConfig::from_settings(&settings.schedule);
    create_reindex_job(&scheduler, factory.clone(), &jobs).await?;
    create_purge_job(&scheduler, factory, &jobs).await?;

    scheduler.start().await.context("Failed to start scheduler")?;

    shutdown_signal().await;

    scheduler.shutdown().await?;
    info!("search-sync stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

fn print_pass(result: &PassResult) {
    println!(
        "{}: {} candidates, {} to sync, {} dispatched, {} skipped{}",
        result.index,
        result.candidates,
        result.eligible,
        result.dispatched,
        result.skipped,
        if result.settings_pushed {
            ", settings pushed"
        } else {
            ""
        }
    );
}

/// Run one reindex pass. Fails when any index failed.
pub async fn run_reindex(settings: &Settings, index: Option<&str>) -> Result<()> {
    let engine = EngineFactory::new(settings)?.reconcile()?;

    if let Some(name) = index {
        let result = engine
            .reindex_one(name)
            .await
            .with_context(|| format!("Reindex of {} failed", name))?;
        print_pass(&result);
        return Ok(());
    }

    let summary = engine.reindex_all().await;
    for result in &summary.results {
        print_pass(result);
    }
    for (name, e) in &summary.errors {
        eprintln!("{}: FAILED: {}", name, e);
    }
    if summary.has_errors() {
        bail!("{} index(es) failed to reindex", summary.errors.len());
    }
    Ok(())
}

/// Run one purge pass. Fails when any index failed.
pub async fn run_purge(settings: &Settings, index: Option<&str>) -> Result<()> {
    let engine = EngineFactory::new(settings)?.purge()?;

    if let Some(name) = index {
        let result = engine
            .purge_one(name)
            .await
            .with_context(|| format!("Purge of {} failed", name))?;
        println!("{}: {} purged", result.index, result.purged);
        return Ok(());
    }

    let summary = engine.purge_all().await;
    for result in &summary.results {
        println!("{}: {} purged", result.index, result.purged);
    }
    for (name, e) in &summary.errors {
        eprintln!("{}: FAILED: {}", name, e);
    }
    if summary.has_errors() {
        bail!("{} index(es) failed to purge", summary.errors.len());
    }
    Ok(())
}

/// Record a save or delete. Touches the tracking store only.
pub fn handle_hook(settings: &Settings, command: HookCommands) -> Result<()> {
    let definitions = load_definitions(settings)?;
    let storage = open_storage(settings)?;

    let needs_content = matches!(command, HookCommands::Delete { item_type: None, .. });
    let content: Arc<dyn ContentSource> = if needs_content {
        require_content(settings)?
    } else {
        match open_content(settings)? {
            Some(source) => source,
            None => Arc::new(InMemoryContentSource::new()),
        }
    };

    let hooks = MutationHooks::new(definitions, storage.clone(), content);
    let affected = match command {
        HookCommands::Save {
            id,
            item_type,
            update,
        } => hooks.on_save(id, &item_type, update)?,
        HookCommands::Delete { id, item_type } => hooks.on_delete(id, item_type.as_deref())?,
    };
    storage.flush()?;

    if affected.is_empty() {
        println!("No index tracks this item");
    } else {
        println!("Updated: {}", affected.join(", "));
    }
    Ok(())
}

/// Print per-index counters from the tracking store.
pub fn show_status(settings: &Settings) -> Result<()> {
    let definitions = load_definitions(settings)?;
    let storage = open_storage(settings)?;
    let stats = storage.stats()?;

    println!("Tracking store: {}", settings.expanded_db_path().display());
    println!(
        "{:<24} {:>8} {:>8} {:>8} {:>10}",
        "INDEX", "TRACKED", "SYNCED", "STALE", "DELETIONS"
    );

    let mut names = definitions.names();
    for name in stats.indexes.keys() {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    for name in names {
        let counts = stats.indexes.get(&name).cloned().unwrap_or_default();
        let marker = if definitions.get(&name).is_some() {
            ""
        } else {
            " (not registered)"
        };
        println!(
            "{:<24} {:>8} {:>8} {:>8} {:>10}{}",
            name,
            counts.tracked,
            counts.synced,
            counts.stale,
            counts.pending_deletions,
            marker
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use sync_types::{ContentItem, IndexDeclaration};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(temp: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.db_path = temp.path().join("tracking").to_string_lossy().to_string();
        settings
            .indexes
            .insert("posts".to_string(), IndexDeclaration::new());
        settings
    }

    #[test]
    fn test_load_settings_log_override() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "log_level = \"warn\"\nbatch_limit = 7").unwrap();

        let settings = load_settings(path.to_str(), None).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.batch_limit, 7);

        let settings = load_settings(path.to_str(), Some("trace")).unwrap();
        assert_eq!(settings.log_level, "trace");
    }

    #[test]
    fn test_hook_save_then_status() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);

        handle_hook(
            &settings,
            HookCommands::Save {
                id: 5,
                item_type: "post".to_string(),
                update: false,
            },
        )
        .unwrap();
        show_status(&settings).unwrap();

        let storage = Storage::open(&settings.expanded_db_path()).unwrap();
        let record = storage.get_tracking("posts", 5).unwrap().unwrap();
        assert!(!record.synced);
    }

    #[test]
    fn test_hook_delete_without_type_needs_content() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);

        let result = handle_hook(
            &settings,
            HookCommands::Delete {
                id: 5,
                item_type: None,
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reindex_requires_remote_settings() {
        let temp = TempDir::new().unwrap();
        let settings = settings(&temp);
        assert!(run_reindex(&settings, None).await.is_err());
    }

    fn save(id: u64) -> HookCommands {
        HookCommands::Save {
            id,
            item_type: "post".to_string(),
            update: true,
        }
    }

    #[test]
    fn test_hook_waits_for_store_held_by_pass() {
        let temp = TempDir::new().unwrap();
        let mut settings = settings(&temp);
        settings.lock_wait_secs = 10;

        let held = open_storage(&settings).unwrap();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            drop(held);
        });

        handle_hook(&settings, save(5)).unwrap();
        releaser.join().unwrap();

        let storage = open_storage(&settings).unwrap();
        assert!(!storage.get_tracking("posts", 5).unwrap().unwrap().synced);
    }

    #[test]
    fn test_hook_gives_up_on_held_store() {
        let temp = TempDir::new().unwrap();
        let mut settings = settings(&temp);
        settings.lock_wait_secs = 0;

        let _held = open_storage(&settings).unwrap();
        let err = handle_hook(&settings, save(5)).unwrap_err();
        assert!(format!("{:#}", err).contains("locked"), "unexpected error: {err:#}");
    }

    async fn mock_service() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/1/indexes/test_posts/batch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "taskID": 1,
                "objectIDs": ["1"]
            })))
            .mount(&server)
            .await;
        server
    }

    fn service_settings(temp: &TempDir, server: &MockServer) -> Settings {
        let content_path = temp.path().join("content.db");
        let content = SqliteContentSource::open(&content_path, "wp_").unwrap();
        content.create_schema().unwrap();
        content
            .insert_item(&ContentItem::new(1, "post", "Hello", "publish"))
            .unwrap();
        content
            .insert_item(&ContentItem::new(2, "post", "Draft", "draft"))
            .unwrap();

        let mut settings = settings(temp);
        settings.content.db_path = Some(content_path.to_string_lossy().to_string());
        settings.remote.app_id = Some("APPID".to_string());
        settings.remote.api_key_admin = Some("admin-key".to_string());
        settings.remote.db_prefix = Some("test_".to_string());
        settings.remote.base_url = Some(server.uri());
        settings
    }

    #[tokio::test]
    async fn test_reindex_against_mock_service() {
        let server = mock_service().await;
        let temp = TempDir::new().unwrap();
        let settings = service_settings(&temp, &server);

        run_reindex(&settings, None).await.unwrap();

        let storage = Storage::open(&settings.expanded_db_path()).unwrap();
        assert!(storage.get_tracking("posts", 1).unwrap().unwrap().synced);
        assert!(storage.get_tracking("posts", 2).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hook_runs_between_daemon_passes() {
        let server = mock_service().await;
        let temp = TempDir::new().unwrap();
        let mut settings = service_settings(&temp, &server);
        settings.lock_wait_secs = 0;
        let factory = EngineFactory::new(&settings).unwrap();

        // A pass in flight holds the store
        let engine: Arc<ReconcileEngine> =
            EngineSource::<ReconcileEngine>::acquire(&factory).unwrap();
        assert!(handle_hook(&settings, save(1)).is_err());
        engine.reindex_all().await;
        drop(engine);

        // Between passes the hook gets through, and the next pass ships it
        handle_hook(&settings, save(1)).unwrap();
        {
            let storage = open_storage(&settings).unwrap();
            assert!(!storage.get_tracking("posts", 1).unwrap().unwrap().synced);
        }

        let engine: Arc<ReconcileEngine> =
            EngineSource::<ReconcileEngine>::acquire(&factory).unwrap();
        let summary = engine.reindex_all().await;
        assert_eq!(summary.total_dispatched(), 1);
        drop(engine);

        let storage = open_storage(&settings).unwrap();
        assert!(storage.get_tracking("posts", 1).unwrap().unwrap().synced);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }
}
