//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tasktree_core` linkage.
//! - Optionally open a database file and report sentinel and stuck-project
//!   status for quick local sanity checks.
//!
//! Usage: `tasktree_cli [DB_PATH]`. Set `TASKTREE_LOG_DIR` to an absolute
//! directory to enable file logging.

use log::{error, info};
use std::process::ExitCode;
use tasktree_core::db::migrations::schema_version;
use tasktree_core::db::open_db;
use tasktree_core::{
    default_log_level, init_logging, Sentinel, SqliteTreeRepository, StuckProjects, TreeService,
};

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("TASKTREE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level().as_str(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    println!("tasktree_core ping={}", tasktree_core::ping());
    println!("tasktree_core version={}", tasktree_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match inspect_database(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_inspect module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn inspect_database(db_path: &str) -> Result<(), String> {
    let conn = open_db(db_path).map_err(|err| err.to_string())?;
    let version = schema_version(&conn).map_err(|err| err.to_string())?;
    println!("schema_version={version}");
    let repo = SqliteTreeRepository::try_new(&conn).map_err(|err| err.to_string())?;
    let service = TreeService::new(repo);

    let sentinels = service.resolve_sentinels().map_err(|err| err.to_string())?;
    for sentinel in Sentinel::ALL {
        let status = sentinels.get(sentinel).map_or("missing", |_| "present");
        println!("sentinel {sentinel}={status}");
    }

    match service
        .find_stuck_projects(None)
        .map_err(|err| err.to_string())?
    {
        StuckProjects::Computed(stuck) => {
            println!("stuck_projects={}", stuck.len());
            for project in &stuck {
                println!("  {} {}", project.id, project.title);
            }
        }
        StuckProjects::NotComputable { missing_tag } => {
            println!("stuck_projects=unknown missing_tag={missing_tag}");
        }
    }
    info!("event=cli_inspect module=cli status=ok");
    Ok(())
}
