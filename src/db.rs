use std::fs::{self, OpenOptions};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

use crate::config::AppConfig;

const SCHEMA_SQLITE: &str = include_str!("../schema-sqlite.sql");

pub async fn connect_db(config: &AppConfig) -> Result<DatabaseConnection, DbErr> {
    let url = config.database_url.as_str();
    let mut opt = ConnectOptions::new(url.to_string());
    opt.connect_timeout(config.upstream_timeout)
        .acquire_timeout(config.upstream_timeout)
        .idle_timeout(Duration::from_secs(300))
        .sqlx_logging(false);

    if config.is_sqlite() {
        if is_memory(url) {
            // Every pooled connection would get its own empty database.
            opt.max_connections(1).min_connections(1);
        } else {
            ensure_sqlite_path(url);
        }
    }

    let db = Database::connect(opt).await?;
    if config.is_sqlite() {
        init_sqlite_schema(&db).await?;
    }
    info!("database connected");
    Ok(db)
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

fn ensure_sqlite_path(url: &str) {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let _ = OpenOptions::new().create(true).append(true).open(path);
}

async fn init_sqlite_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    for stmt in split_sql(SCHEMA_SQLITE) {
        db.execute(Statement::from_string(backend, stmt)).await?;
    }
    debug!("sqlite schema applied");
    Ok(())
}

fn split_sql(input: &str) -> Vec<String> {
    let mut buf = String::new();
    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }
        buf.push_str(line);
        buf.push('\n');
    }
    buf.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    connect_db(&crate::config::test_config())
        .await
        .expect("in-memory sqlite")
}
