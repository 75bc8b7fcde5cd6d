//! `sweep cleanup`: remove duplicate campaigns and notifications.
//!
//! Runs the campaign pass over the full history, then the notification pass
//! over the lookback window, under the `cleanup` operation lock.

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use sweep_core::config::{LOCKS_DIR, SWEEP_DIR, find_sweep_root, load_project_config};
use sweep_core::db::{self, SqliteCampaignStore, SqliteNotificationStore};
use sweep_core::dedup::MergePolicy;
use sweep_core::error::ErrorCode;
use sweep_core::{CleanupOptions, CleanupReport, CleanupReporter};

/// Generic message for any failed cleanup; the cause goes in `error`.
const FAILURE_SUMMARY: &str = "Cleanup failed";

#[derive(Args, Debug)]
#[command(
    about = "Remove duplicate campaigns and notifications",
    long_about = "Remove duplicate campaigns and notifications.\n\n\
                  Campaigns sharing title, body, type and class target are collapsed to the\n\
                  oldest record. Notifications sharing recipient, title, body and type are\n\
                  collapsed inside the lookback window only.",
    after_help = "EXAMPLES:\n    # Preview what would be removed\n    sweep cleanup --dry-run\n\n\
                  # Run and emit machine-readable output\n    sweep cleanup --json\n\n\
                  # Keep one notification per burst instead of one per group\n    \
                  sweep cleanup --merge-policy within-threshold"
)]
pub struct CleanupArgs {
    /// Count duplicates without deleting anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[cleanup].merge_policy` (collapse | within-threshold).
    #[arg(long)]
    pub merge_policy: Option<MergePolicy>,

    /// Override `[cleanup].lookback_days`.
    #[arg(long)]
    pub lookback_days: Option<u32>,

    /// Override `[cleanup].lock_timeout_ms`.
    #[arg(long)]
    pub lock_timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupData {
    deleted_campaigns: usize,
    deleted_notifications: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CleanupOutput {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    dry_run: bool,
    data: CleanupData,
}

impl From<CleanupReport> for CleanupOutput {
    fn from(report: CleanupReport) -> Self {
        Self {
            success: report.success,
            message: report.message,
            dry_run: report.dry_run,
            data: CleanupData {
                deleted_campaigns: report.deleted_campaigns,
                deleted_notifications: report.deleted_notifications,
            },
        }
    }
}

/// Render `error`, then return it as the command failure.
fn fail(output: OutputMode, code: ErrorCode, err: anyhow::Error) -> anyhow::Result<()> {
    render_error(output, FAILURE_SUMMARY, &CliError::from_code(code, format!("{err:#}")))?;
    Err(err)
}

/// Execute `sweep cleanup`.
///
/// # Errors
///
/// Returns an error if the workspace is missing or unreadable, the store
/// cannot be opened, the lock is held elsewhere, or a store operation fails.
/// The error has already been rendered to stderr.
pub fn run_cleanup(
    args: &CleanupArgs,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let Some(root) = find_sweep_root(project_root) else {
        return fail(
            output,
            ErrorCode::NotInitialized,
            anyhow::anyhow!("no .sweep/ directory found at or above {}", project_root.display()),
        );
    };
    let sweep_dir = root.join(SWEEP_DIR);

    let config = match load_project_config(&root) {
        Ok(config) => config,
        Err(err) => return fail(output, ErrorCode::ConfigParseError, err),
    };

    let conn = match db::open_store(&config.store.resolve(&sweep_dir)) {
        Ok(conn) => conn,
        Err(err) => return fail(output, ErrorCode::StoreOpenFailed, err),
    };

    let mut cleanup = config.cleanup;
    if let Some(days) = args.lookback_days {
        cleanup.lookback_days = days;
    }
    if let Some(policy) = args.merge_policy {
        cleanup.merge_policy = policy;
    }
    if let Some(ms) = args.lock_timeout_ms {
        cleanup.lock_timeout_ms = ms;
    }
    if let Err(err) = cleanup.validate() {
        return fail(output, ErrorCode::ConfigParseError, err);
    }
    let options = CleanupOptions {
        dry_run: args.dry_run,
        ..CleanupOptions::from(&cleanup)
    };

    let reporter = CleanupReporter::new(
        SqliteCampaignStore::new(&conn),
        SqliteNotificationStore::new(&conn),
        options,
    );

    match reporter.run_exclusive(&sweep_dir.join(LOCKS_DIR), cleanup.lock_timeout(), Utc::now()) {
        Ok(report) => render_mode(
            output,
            &CleanupOutput::from(report),
            render_cleanup_text,
            render_cleanup_human,
        ),
        Err(err) => {
            tracing::error!(code = %err.code(), "{err}");
            render_error(output, FAILURE_SUMMARY, &CliError::from(&err))?;
            Err(err.into())
        }
    }
}

fn render_cleanup_text(out: &CleanupOutput, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "deleted_campaigns={} deleted_notifications={} dry_run={}",
        out.data.deleted_campaigns, out.data.deleted_notifications, out.dry_run
    )
}

fn render_cleanup_human(out: &CleanupOutput, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, if out.dry_run { "Cleanup (dry run)" } else { "Cleanup" })?;
    pretty_kv(w, "Duplicate campaigns", out.data.deleted_campaigns.to_string())?;
    pretty_kv(w, "Duplicate notifications", out.data.deleted_notifications.to_string())?;
    writeln!(w)?;
    writeln!(w, "{}", out.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dry_run: bool) -> CleanupOutput {
        CleanupOutput {
            success: true,
            message: "Removed 2 duplicate campaign(s) and 1 duplicate notification(s)".into(),
            dry_run,
            data: CleanupData {
                deleted_campaigns: 2,
                deleted_notifications: 1,
            },
        }
    }

    #[test]
    fn json_shape_nests_counts_under_data() {
        let json = serde_json::to_value(sample(false)).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["deletedCampaigns"], 2);
        assert_eq!(json["data"]["deletedNotifications"], 1);
        assert!(json.get("dryRun").is_none());
    }

    #[test]
    fn text_output_is_single_line() {
        let mut buf = Vec::new();
        render_cleanup_text(&sample(true), &mut buf).expect("render");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "deleted_campaigns=2 deleted_notifications=1 dry_run=true\n"
        );
    }

    #[test]
    fn human_output_labels_dry_run() {
        let mut buf = Vec::new();
        render_cleanup_human(&sample(true), &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("Cleanup (dry run)"));
        assert!(text.contains("Duplicate campaigns:"));
    }

    #[test]
    fn uninitialized_directory_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = CleanupArgs {
            dry_run: false,
            merge_policy: None,
            lookback_days: None,
            lock_timeout_ms: None,
        };

        let err = run_cleanup(&args, OutputMode::Text, dir.path()).expect_err("not initialized");
        assert!(err.to_string().contains("no .sweep/ directory"));
    }
}
