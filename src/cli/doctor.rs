//! CLI `doctor` command: check each collaborator and print a health report.

use anyhow::Result;

use crate::config::{default_config_path, AlterConfig};
use crate::db;
use crate::model::ollama::OllamaProvider;
use crate::retrieval::index;
use crate::scoring::ScoringService;

/// Run diagnostics and print a report. Problems are reported, not returned.
pub async fn doctor(config: &AlterConfig) -> Result<()> {
    println!("Alter Health Report");
    println!("===================");
    println!();
    let config_path = default_config_path();
    println!(
        "Config:            {} ({})",
        config_path.display(),
        if config_path.exists() { "found" } else { "defaults" }
    );
    let user_path = config.resolved_user_config_path();
    match crate::user::UserProfile::load(&user_path) {
        Ok(user) => println!("User:              {} ({})", user.name, user_path.display()),
        Err(_) => println!("User:              not configured (run `alter chat` to create it)"),
    }

    println!();
    println!("Model:");
    println!("  Endpoint:        {}", config.model.base_url);
    println!("  Configured:      {}", config.model.model);
    match OllamaProvider::new(&config.model)?.list_models().await {
        Ok(models) => {
            println!("  Reachable:       yes ({} model(s) pulled)", models.len());
            if !models.iter().any(|m| m == &config.model.model) {
                println!(
                    "  WARNING: {} is not pulled. Run `ollama pull {}`.",
                    config.model.model, config.model.model
                );
            }
        }
        Err(e) => println!("  Reachable:       NO ({e:#})"),
    }

    println!();
    println!("Memory:");
    println!("  Backend:         {}", config.memory.backend);
    match config.memory.backend.as_str() {
        "sqlite" => sqlite_report(config),
        "file" => {
            let path = config.resolved_profile_path();
            let state = if path.exists() { "exists" } else { "not created yet" };
            println!("  File:            {} ({state})", path.display());
        }
        "service" => println!("  Service:         {}", config.memory.service_url),
        other => println!("  WARNING: unknown backend {other:?}"),
    }

    println!();
    println!("Documents:");
    let docs_dir = config.resolved_docs_dir();
    if !config.retrieval.enabled {
        println!("  Retrieval:       disabled");
    } else if docs_dir.is_dir() {
        let files = index::collect_files(&docs_dir).map(|f| f.len()).unwrap_or(0);
        println!("  Directory:       {}", docs_dir.display());
        println!("  Files:           {files}");
    } else {
        println!("  Directory:       {} (missing, created on first run)", docs_dir.display());
    }

    println!();
    println!("Scheduler:");
    println!(
        "  Reminder:        {} (after {}:00, every {}s)",
        on_off(config.reminder.enabled),
        config.reminder.hour,
        config.reminder.poll_secs
    );
    println!(
        "  Daily summary:   {} (01:00-01:05, every {}s)",
        on_off(config.summary.enabled),
        config.summary.poll_secs
    );
    println!("  Notifications:   {}", if config.notify.enabled { "desktop" } else { "log only" });

    println!();
    let mut scoring = config.scoring.clone();
    scoring.apply_env();
    let health = ScoringService::new(scoring)?.health();
    println!("Speaking scorer:");
    println!("  Transcription:   {}", health.transcription);
    println!("  Scoring:         {}", health.scoring);

    Ok(())
}

fn sqlite_report(config: &AlterConfig) {
    let db_path = config.resolved_db_path();
    if !db_path.exists() {
        println!("  Database:        not found at {}", db_path.display());
        return;
    }
    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    println!("  Database:        {}", db_path.display());
    println!("  File size:       {}", format_bytes(file_size));

    let report = db::open_database(&db_path).and_then(|conn| db::check_database_health(&conn));
    match report {
        Ok(report) => {
            println!("  Schema version:  {}", report.schema_version);
            println!("  Entries:         {}", report.entry_count);
            println!("  Daily summaries: {}", report.summary_count);
            if report.integrity_ok {
                println!("  Integrity:       PASSED");
            } else {
                println!("  Integrity:       FAILED ({})", report.integrity_details);
            }
        }
        Err(e) => println!("  WARNING: database unreadable ({e:#})"),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
