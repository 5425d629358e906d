//! Creates the directory database if it does not exist yet.

use tokio_postgres::NoTls;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let conn_str = std::env::var("PG_ADMIN_CONN")
        .unwrap_or_else(|_| "host=127.0.0.1 user=postgres dbname=postgres".into());
    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "city_directory".into());

    if !is_valid_database_name(&db_name) {
        log::error!("Refusing to create database: invalid database name '{}'", db_name);
        return Ok(());
    }

    log::info!("Connecting to Postgres to manage databases...");
    let (client, connection) = tokio_postgres::connect(&conn_str, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("connection error: {}", e);
        }
    });

    let row = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])
        .await?;

    if row.is_some() {
        log::info!("Database '{}' already exists", db_name);
        return Ok(());
    }

    let create_sql = format!("CREATE DATABASE \"{}\"", db_name);
    match client.execute(create_sql.as_str(), &[]).await {
        Ok(_) => log::info!("Database '{}' created", db_name),
        Err(e) => log::error!("Failed to create database '{}': {}", db_name, e),
    }

    Ok(())
}

fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
