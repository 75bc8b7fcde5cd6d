use anyhow::{Context as _, Result};
use clap::Args;
use std::path::Path;
use sweep_core::config::{CONFIG_FILE, LOCKS_DIR, SWEEP_DIR, StoreConfig};
use sweep_core::db;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite config and `.gitignore` even if `.sweep/` already exists.
    /// Existing records are kept.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[cleanup]\n\
    # Notifications older than this many days are never inspected.\n\
    lookback_days = 30\n\
    # Gap between repeats still treated as one send.\n\
    merge_threshold_minutes = 60\n\
    # \"collapse\" keeps only the oldest record per group;\n\
    # \"within-threshold\" keeps one record per burst.\n\
    merge_policy = \"collapse\"\n\
    lock_timeout_ms = 5000\n\
    \n\
    [store]\n\
    path = \"sweep.db\"\n";

const GITIGNORE: &str = "sweep.db\nsweep.db-wal\nsweep.db-shm\nlocks/\n";

/// Execute `sweep init`. Creates the project skeleton:
///
/// ```text
/// .sweep/
///   config.toml   (default cleanup config)
///   .gitignore    (database files and locks/)
///   locks/
///   sweep.db      (empty, migrated record store)
/// ```
///
/// # Errors
///
/// Returns an error if `.sweep/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, project_root: &Path, quiet: bool) -> Result<()> {
    let sweep_dir = project_root.join(SWEEP_DIR);

    if sweep_dir.exists() && !args.force {
        anyhow::bail!(".sweep/ already exists. Use `sweep init --force` to reinitialize.");
    }

    let locks_dir = sweep_dir.join(LOCKS_DIR);
    std::fs::create_dir_all(&locks_dir)
        .with_context(|| format!("Failed to create locks directory: {}", locks_dir.display()))?;

    let config_path = sweep_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let gitignore_path = sweep_dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write .gitignore: {}", gitignore_path.display()))?;

    let db_path = StoreConfig::default().resolve(&sweep_dir);
    db::open_store(&db_path)?;
    tracing::debug!(store = %db_path.display(), "initialized record store");

    if !quiet {
        println!("✓ Initialized .sweep/ project structure.");
        println!();
        println!("  Config: .sweep/{CONFIG_FILE}");
        println!("  Store:  .sweep/sweep.db");
        println!();
        println!("Next steps:");
        println!("  Preview what a cleanup would remove:");
        println!("    sweep cleanup --dry-run");
    }

    Ok(())
}
