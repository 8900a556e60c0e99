// ==========================================
// Roofline Ops - batch runner entry point
// ==========================================
// Runs the scheduled jobs against the operations database:
//   roofline-ops daily-check
//   roofline-ops reconcile <start YYYY-MM-DD> <end YYYY-MM-DD>
// ==========================================

use chrono::{NaiveDate, TimeZone, Utc};
use roofline_ops::domain::permission::Actor;
use roofline_ops::domain::types::Role;
use roofline_ops::{logging, PortalApi};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use tracing::{error, info};

/// DB path resolution: explicit env var first, then the user data directory,
/// then the working directory.
fn default_db_path() -> String {
    if let Ok(path) = std::env::var("ROOFLINE_OPS_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./roofline_ops.db");
    if let Some(data_dir) = dirs::data_dir() {
        let app_dir = data_dir.join(roofline_ops::APP_NAME);
        if std::fs::create_dir_all(&app_dir).is_ok() {
            path = app_dir.join("roofline_ops.db");
        }
    }
    path.to_string_lossy().to_string()
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

fn usage() -> ExitCode {
    eprintln!("usage: roofline-ops daily-check");
    eprintln!("       roofline-ops reconcile <start YYYY-MM-DD> <end YYYY-MM-DD>");
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    info!("==================================================");
    info!("Roofline Ops batch runner v{}", roofline_ops::VERSION);
    info!("==================================================");

    let db_path = default_db_path();
    info!("using database: {}", db_path);

    let api = match PortalApi::open(&db_path) {
        Ok(api) => api,
        Err(e) => {
            error!("failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let now = Utc::now();
    let cancel = AtomicBool::new(false);

    match args.first().map(String::as_str) {
        Some("daily-check") => {
            match api.run_daily_check(now, &cancel).await {
                Ok(summary) => {
                    info!(
                        alerts_created = summary.alerts_created,
                        overdue_items = summary.overdue_items,
                        "daily check finished"
                    );
                    for issue in &summary.issues {
                        error!("daily check issue: {}", issue);
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("daily check failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Some("reconcile") => {
            let (start, end) = match (args.get(1), args.get(2)) {
                (Some(s), Some(e)) => match (parse_day(s), parse_day(e)) {
                    (Some(s), Some(e)) => (s, e),
                    _ => return usage(),
                },
                _ => return usage(),
            };
            let period_start = Utc.from_utc_datetime(
                &start.and_hms_opt(0, 0, 0).expect("midnight is always valid"),
            );
            let period_end = Utc.from_utc_datetime(
                &end.and_hms_opt(23, 59, 59).expect("end of day is always valid"),
            );
            let operator = Actor::new("batch", Role::Admin);

            match api
                .run_reconciliation(period_start, period_end, &operator, now, &cancel)
                .await
            {
                Ok(report) => {
                    info!(
                        report_id = %report.report_id,
                        deliveries = report.delivery_count,
                        returns = report.return_count,
                        discrepancies = report.discrepancies.len(),
                        "reconciliation finished"
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("reconciliation failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        _ => usage(),
    }
}
