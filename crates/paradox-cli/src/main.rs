// ============================================================================
// paradox-admin — CLI for the Paradox Engine subscriber database
// ============================================================================
// Usage:
//   paradox-admin subscriber set --email E --tier T   Create or change a subscription
//   paradox-admin subscriber list [--tier T]          List subscribers
//   paradox-admin check --type chapter --id 4 [--email E]
//                                                     Show an access decision
//   paradox-admin summary [--email E]                 Dashboard summary
//   paradox-admin progress record|list                Reading progress
//   paradox-admin policy show|save|reset              Access policy
//   paradox-admin stats | export | prune              Maintenance
// ============================================================================

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use paradox_core::db::{cutoff_for_days, expiry_after_days};
use paradox_core::{
    AccessGate, AccessPolicy, ContentItem, ContentType, ErrorTracker, ParadoxConfig, Principal,
    ProgressSummary, SubscriberDb, SubscriptionStatus, SubscriptionTier,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Paradox Engine subscriber administration tool
#[derive(Parser)]
#[command(name = "paradox-admin", version, about = "Inspect and manage Paradox Engine subscribers and access")]
struct Cli {
    /// Path to the database file (default: PARADOX_DB_PATH or ~/.paradox/subscribers.redb)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage subscriber records
    Subscriber {
        #[command(subcommand)]
        action: SubscriberAction,
    },

    /// Evaluate access to a content item
    Check {
        /// Content type: chapter, article, exercise, community, download
        #[arg(long = "type")]
        content_type: String,

        /// Content id (chapter number for chapters)
        #[arg(long)]
        id: String,

        /// Viewer email; omit for an anonymous viewer
        #[arg(long)]
        email: Option<String>,

        /// Treat the viewer as an admin
        #[arg(long)]
        admin: bool,

        /// Minimum tier for this item, overriding the content-type default
        #[arg(long)]
        required_tier: Option<String>,

        /// Preview percentage for this item, overriding the content-type default
        #[arg(long)]
        preview: Option<u8>,

        /// Item is unlocked for everyone
        #[arg(long)]
        unlocked: bool,

        /// Item requires a signed-in viewer
        #[arg(long)]
        early_access: bool,
    },

    /// Print the dashboard access summary for a viewer
    Summary {
        /// Viewer email; omit for an anonymous viewer
        #[arg(long)]
        email: Option<String>,
    },

    /// Reading progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Access policy stored in the database
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },

    /// Show database statistics (subscribers per tier and status, progress)
    Stats,

    /// Export full database contents as JSON
    Export {
        /// Output format (currently only json is supported)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Prune lapsed subscribers and stale progress
    Prune {
        /// Delete canceled/expired subscribers untouched for this many days
        #[arg(long, default_value = "90")]
        older_than: i64,

        /// Delete unfinished progress untouched for this many days
        #[arg(long, default_value = "180")]
        progress_days: i64,

        /// Show what would be pruned without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum SubscriberAction {
    /// Create a subscriber or move them to a tier (reactivates the subscription)
    Set {
        #[arg(long)]
        email: String,
        /// free, premium or vip
        #[arg(long)]
        tier: String,
        /// Subscription ends after this many days
        #[arg(long)]
        expires_in_days: Option<i64>,
    },
    /// Change billing status: active, past-due, canceled
    Status {
        #[arg(long)]
        email: String,
        #[arg(long)]
        status: String,
    },
    /// List subscribers, optionally filtered by stored tier
    List {
        #[arg(long)]
        tier: Option<String>,
    },
    /// Delete a subscriber and their progress
    Remove {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Record a reading position (capped by what the reader can see)
    Record {
        #[arg(long)]
        email: String,
        #[arg(long = "type")]
        content_type: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        percent: u8,
    },
    /// List progress entries
    List {
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Print the policy in effect
    Show,
    /// Store the policy built from the current environment
    Save,
    /// Store the built-in default policy
    Reset,
}

fn init_logging() -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new("paradox_core=warn,paradox_admin=info")?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("(invalid: {})", ts))
}

/// Subscription end date for `--expires-in-days`
fn expires_at(days: Option<i64>, now: i64) -> Result<Option<i64>> {
    days.map(|days| expiry_after_days(now, days)).transpose()
}

fn principal_for(email: Option<&str>, admin: bool) -> Result<Option<Principal>> {
    match (email, admin) {
        (Some(email), true) => Ok(Some(Principal::admin(email)?)),
        (Some(email), false) => Ok(Some(Principal::reader(email)?)),
        (None, true) => anyhow::bail!("--admin requires --email"),
        (None, false) => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {}", e);
        }
    }
    init_logging()?;

    let cli = Cli::parse();
    let mut config = ParadoxConfig::from_env()?;
    if cli.db_path.is_some() {
        config.db_path = cli.db_path;
    }

    let db = Arc::new(SubscriberDb::open_with_config(&config)?);
    let tracker = Arc::new(ErrorTracker::new(config.error_buffer));
    let gate = AccessGate::from_config(db.clone(), &config, tracker.clone())?;

    let result = match cli.command {
        Commands::Subscriber { action } => cmd_subscriber(&db, action),
        Commands::Check {
            content_type,
            id,
            email,
            admin,
            required_tier,
            preview,
            unlocked,
            early_access,
        } => {
            let mut item = ContentItem::new(id, content_type.parse::<ContentType>()?);
            if let Some(tier) = required_tier {
                item = item.with_required_tier(tier.parse()?);
            }
            if let Some(preview) = preview {
                item = item.with_preview_percentage(preview)?;
            }
            if unlocked {
                item = item.unlocked();
            }
            if early_access {
                item = item.requiring_signup();
            }
            cmd_check(&gate, principal_for(email.as_deref(), admin)?, &item).await
        }
        Commands::Summary { email } => cmd_summary(&db, &gate, email.as_deref()).await,
        Commands::Progress { action } => cmd_progress(&gate, &db, action).await,
        Commands::Policy { action } => cmd_policy(&db, &gate, &config, action),
        Commands::Stats => cmd_stats(&db),
        Commands::Export { format } => cmd_export(&db, &gate, &format),
        Commands::Prune {
            older_than,
            progress_days,
            dry_run,
        } => cmd_prune(&db, older_than, progress_days, dry_run),
    };

    if !tracker.is_empty() {
        for captured in tracker.recent(config.error_buffer) {
            eprintln!(
                "error [{}] {} at {}",
                captured.context,
                captured.message,
                format_timestamp(captured.captured_at)
            );
        }
    }

    result
}

fn cmd_subscriber(db: &SubscriberDb, action: SubscriberAction) -> Result<()> {
    match action {
        SubscriberAction::Set {
            email,
            tier,
            expires_in_days,
        } => {
            let tier: SubscriptionTier = tier.parse()?;
            let expires_at = expires_at(expires_in_days, Utc::now().timestamp())?;
            let record = db.set_tier(&email, tier, expires_at)?;
            println!(
                "{} -> {} ({}, expires: {})",
                record.email,
                record.tier,
                record.status,
                record
                    .expires_at
                    .map(format_timestamp)
                    .unwrap_or_else(|| "never".into())
            );
        }
        SubscriberAction::Status { email, status } => {
            let status: SubscriptionStatus = status.parse()?;
            let record = db.set_status(&email, status)?;
            println!("{} is now {}", record.email, record.status);
        }
        SubscriberAction::List { tier } => {
            let filter = tier.as_deref().map(str::parse::<SubscriptionTier>).transpose()?;
            let subscribers = db.list_subscribers(filter)?;

            if subscribers.is_empty() {
                println!("No subscribers found.");
                return Ok(());
            }

            let now = Utc::now().timestamp();
            println!(
                "{:<36}  {:<8}  {:<9}  {:<9}  {}",
                "EMAIL", "TIER", "STATUS", "EFFECTIVE", "EXPIRES"
            );
            println!("{}", "-".repeat(96));
            for record in &subscribers {
                println!(
                    "{:<36}  {:<8}  {:<9}  {:<9}  {}",
                    record.email,
                    record.tier.to_string(),
                    record.status.to_string(),
                    record.effective_tier(now).to_string(),
                    record
                        .expires_at
                        .map(format_timestamp)
                        .unwrap_or_else(|| "-".into())
                );
            }
            println!("\nTotal: {} subscribers", subscribers.len());
        }
        SubscriberAction::Remove { email } => {
            if db.delete_subscriber(&email)? {
                println!("Removed {}", email);
            } else {
                println!("No subscriber {}", email);
            }
        }
    }
    Ok(())
}

async fn cmd_check(gate: &AccessGate, principal: Option<Principal>, item: &ContentItem) -> Result<()> {
    let decision = gate.evaluate(principal.as_ref(), item).await;
    let viewer = gate.viewer_for(principal.as_ref()).await;

    let output = serde_json::json!({
        "viewer": viewer,
        "item": item,
        "decision": decision,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_summary(db: &SubscriberDb, gate: &AccessGate, email: Option<&str>) -> Result<()> {
    let principal = principal_for(email, false)?;
    let summary = gate.access_summary(principal.as_ref()).await;

    let progress = match &principal {
        Some(p) => ProgressSummary::from_entries(&db.list_progress(Some(&p.email))?),
        None => ProgressSummary::default(),
    };

    let output = serde_json::json!({
        "access": summary,
        "progress": progress,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_progress(gate: &AccessGate, db: &SubscriberDb, action: ProgressAction) -> Result<()> {
    match action {
        ProgressAction::Record {
            email,
            content_type,
            id,
            percent,
        } => {
            let principal = Principal::reader(&email)?;
            let item = ContentItem::new(id, content_type.parse::<ContentType>()?);
            let progress = gate.record_progress(&principal, &item, percent).await?;
            println!(
                "{} {} {}: {}%{}",
                progress.email,
                progress.content_type,
                progress.content_id,
                progress.percent,
                if progress.completed { " (completed)" } else { "" }
            );
            if progress.percent < percent.min(100) {
                println!("Capped at the preview available on the reader's tier.");
            }
        }
        ProgressAction::List { email } => {
            let entries = db.list_progress(email.as_deref())?;
            if entries.is_empty() {
                println!("No progress recorded.");
                return Ok(());
            }

            println!(
                "{:<36}  {:<10}  {:<16}  {:>4}  {:<5}  {}",
                "EMAIL", "TYPE", "ID", "PCT", "DONE", "UPDATED"
            );
            println!("{}", "-".repeat(100));
            for entry in &entries {
                let id = entry.content_id.chars().take(16).collect::<String>();
                println!(
                    "{:<36}  {:<10}  {:<16}  {:>3}%  {:<5}  {}",
                    entry.email,
                    entry.content_type.to_string(),
                    id,
                    entry.percent,
                    if entry.completed { "yes" } else { "no" },
                    format_timestamp(entry.updated_at)
                );
            }
            println!("\nTotal: {} entries", entries.len());
        }
    }
    Ok(())
}

fn cmd_policy(db: &SubscriberDb, gate: &AccessGate, config: &ParadoxConfig, action: PolicyAction) -> Result<()> {
    match action {
        PolicyAction::Show => {
            println!("{}", serde_json::to_string_pretty(gate.policy())?);
        }
        PolicyAction::Save => {
            let policy = AccessPolicy::from_config(config);
            db.store_policy(&policy)?;
            info!("Stored access policy from environment");
            println!("{}", serde_json::to_string_pretty(&policy)?);
        }
        PolicyAction::Reset => {
            db.store_policy(&AccessPolicy::default())?;
            println!("Stored default access policy");
        }
    }
    Ok(())
}

fn cmd_stats(db: &SubscriberDb) -> Result<()> {
    let stats = db.stats()?;

    println!("=== Paradox Engine Subscriber Stats ===");
    println!("Database: {}", db.path().display());
    println!();
    println!("Subscribers: {} total", stats.total_subscribers);
    println!("  by effective tier:");
    for tier in paradox_core::access::TIER_ORDER {
        let count = stats.tier_counts.get(&tier.to_string()).copied().unwrap_or(0);
        println!("    {:10} {}", tier.display_name(), count);
    }
    println!("  by status:");
    for (status, count) in &stats.status_counts {
        println!("    {:10} {}", status, count);
    }
    println!(
        "Progress:    {} entries ({} completed)",
        stats.total_progress_entries, stats.completed_progress_entries
    );

    Ok(())
}

fn cmd_export(db: &SubscriberDb, gate: &AccessGate, format: &str) -> Result<()> {
    if format != "json" {
        anyhow::bail!("Unsupported format '{}'. Only 'json' is supported.", format);
    }

    let export = serde_json::json!({
        "exported_at": Utc::now().to_rfc3339(),
        "stats": db.stats()?,
        "policy": gate.policy(),
        "subscribers": db.list_subscribers(None)?,
        "progress": db.list_progress(None)?,
    });

    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

fn cmd_prune(db: &SubscriberDb, older_than: i64, progress_days: i64, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("=== DRY RUN — no data will be deleted ===\n");

        let now = Utc::now().timestamp();
        let cutoff_subscribers = cutoff_for_days(now, older_than)?;
        let cutoff_progress = cutoff_for_days(now, progress_days)?;

        let subscribers = db.list_subscribers(None)?;
        let pruneable_subscribers: Vec<_> = subscribers
            .iter()
            .filter(|s| s.is_lapsed(now) && s.updated_at < cutoff_subscribers)
            .collect();

        let progress = db.list_progress(None)?;
        let pruneable_progress: Vec<_> = progress
            .iter()
            .filter(|p| !p.completed && p.updated_at < cutoff_progress)
            .collect();

        println!(
            "Would prune {} lapsed subscribers older than {} days",
            pruneable_subscribers.len(),
            older_than
        );
        for record in &pruneable_subscribers {
            println!(
                "  - {} ({}, last updated: {})",
                record.email,
                record.status,
                format_timestamp(record.updated_at)
            );
        }

        println!(
            "\nWould prune {} unfinished progress entries older than {} days",
            pruneable_progress.len(),
            progress_days
        );
        for entry in &pruneable_progress {
            println!(
                "  - {} (last updated: {})",
                entry.key(),
                format_timestamp(entry.updated_at)
            );
        }
    } else {
        let pruned_subscribers = db.prune_lapsed_subscribers(older_than)?;
        let pruned_progress = db.prune_stale_progress(progress_days)?;

        println!(
            "Pruned {} lapsed subscribers (older than {} days)",
            pruned_subscribers, older_than
        );
        println!(
            "Pruned {} unfinished progress entries (older than {} days)",
            pruned_progress, progress_days
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_check() {
        let cli = Cli::try_parse_from([
            "paradox-admin",
            "check",
            "--type",
            "chapter",
            "--id",
            "4",
            "--email",
            "reader@example.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Check {
                content_type, id, email, admin, ..
            } => {
                assert_eq!(content_type, "chapter");
                assert_eq!(id, "4");
                assert_eq!(email.as_deref(), Some("reader@example.com"));
                assert!(!admin);
            }
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_cli_parses_subscriber_set() {
        let cli = Cli::try_parse_from([
            "paradox-admin",
            "--db-path",
            "/tmp/x.redb",
            "subscriber",
            "set",
            "--email",
            "a@example.com",
            "--tier",
            "vip",
            "--expires-in-days",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.redb")));
        assert!(matches!(
            cli.command,
            Commands::Subscriber {
                action: SubscriberAction::Set {
                    expires_in_days: Some(30),
                    ..
                }
            }
        ));
    }

    #[test]
    fn test_expires_at_rejects_out_of_range_days() {
        assert_eq!(expires_at(None, 1_000).unwrap(), None);
        assert_eq!(expires_at(Some(1), 1_000).unwrap(), Some(1_000 + 86_400));
        assert!(expires_at(Some(i64::MAX / 1000), 1_000).is_err());
        assert!(expires_at(Some(-5), 1_000).is_err());
    }

    #[test]
    fn test_dry_run_prune_rejects_overflowing_days() {
        let dir = tempfile::tempdir().unwrap();
        let db = SubscriberDb::open(Some(&dir.path().join("cli.redb"))).unwrap();
        assert!(cmd_prune(&db, i64::MAX, 180, true).is_err());
        assert!(cmd_prune(&db, 90, -1, true).is_err());
        assert!(cmd_prune(&db, 90, 180, true).is_ok());
    }

    #[test]
    fn test_principal_for() {
        assert_eq!(principal_for(None, false).unwrap(), None);
        assert!(principal_for(None, true).is_err());
        let admin = principal_for(Some("Ed@Example.com"), true).unwrap().unwrap();
        assert!(admin.is_admin());
        assert_eq!(admin.email, "ed@example.com");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
