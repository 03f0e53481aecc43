//! querycsv - Export SQL query results to CSV files.

mod cli;

use cli::Cli;
use querycsv::config::{Config, ConnectionConfig};
use querycsv::error::{ExportError, Result};
use querycsv::{db, logging, QueryToCsv};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    let config = match Config::load_from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", e.category(), e.user_message());
            std::process::exit(1);
        }
    };

    let log_dir = if config.export.enable_logging {
        config.export.log_dir().ok()
    } else {
        None
    };
    let _guard = logging::init_logging(log_dir.as_deref());
    info!("Loaded config from: {}", config_path.display());

    if let Err(e) = run(&cli, config).await {
        error!("{}: {}", e.category(), e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, config: Config) -> Result<()> {
    let connection = resolve_connection(cli, &config)?;
    info!("Connection: {}", connection.display_string());

    let client = db::connect(&connection).await?;

    let result = async {
        let export = match cli.select_builder() {
            Some(builder) => {
                QueryToCsv::from_builder(client.clone(), config.export.clone(), &builder).await?
            }
            None => QueryToCsv::from_raw_query(
                client.clone(),
                config.export.clone(),
                cli.query.as_deref().unwrap_or_default(),
            )?,
        };

        export
            .set_output_file(cli.file.as_deref(), cli.folder.as_deref())?
            .set_column_headers(cli.header_row())
            .generate()
            .await
    }
    .await;

    client.close().await?;
    let export = result?;

    if cli.json {
        let report = export
            .report()
            .ok_or_else(|| ExportError::io("Export did not produce a file"))?;
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| ExportError::io(format!("Cannot encode report: {e}")))?;
        println!("{json}");
    } else if let Some(path) = export.export_file_path() {
        println!("{path}");
    }

    Ok(())
}

/// Resolves the final connection configuration from CLI args, config file, and environment.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    // Precedence: CLI arguments, named connection, default connection, environment
    let mut connection = cli.to_connection_config()?;

    if connection.is_none() {
        if let Some(name) = cli.connection_name() {
            connection = config.get_connection(Some(name)).cloned();
            if connection.is_none() {
                return Err(ExportError::config(format!(
                    "Connection '{name}' not found in config file"
                )));
            }
        }
    }

    if connection.is_none() {
        connection = config.get_connection(None).cloned();
    }

    let mut connection = connection.unwrap_or_default();
    connection.apply_env_defaults();

    if connection.database.is_none() {
        return Err(ExportError::config(
            "No database configured. Pass a connection string, --database, or set MYSQL_DATABASE",
        ));
    }

    Ok(connection)
}
