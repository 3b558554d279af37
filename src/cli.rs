use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;

use crate::config::Config;
use crate::database::Database;
use crate::entities::PORTAL_CATALOG;
use crate::error::SocietyError;
use crate::query::{paginate_on, JoinKind, PaginationRequest, TableDescriptor};

#[derive(Parser, Debug)]
#[command(
    name = "societydb",
    version,
    about = "societydb: listing and query engine for a residential-society portal"
)]
pub struct Cli {
    /// Database file (overrides database.path from config)
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no command specified)
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a listing request and print the result as JSON
    List {
        /// Entity name (flats, residents, payments, expenses)
        entity: String,

        /// Full request body as JSON
        #[arg(long)]
        request: Option<String>,

        /// Page number (overrides the request body)
        #[arg(long)]
        page: Option<i64>,

        /// Page size (overrides the request body)
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show the columns and relations of an entity
    Describe {
        /// Entity name
        entity: String,
    },
}

impl Cli {
    pub fn handle_command_line(config: Config, data_dir: PathBuf) -> Result<(), SocietyError> {
        let args = Cli::parse();
        let db_path = args
            .db
            .clone()
            .unwrap_or_else(|| config.database.resolve_path(&data_dir));

        match args.command.unwrap_or(Command::Serve {
            host: None,
            port: None,
        }) {
            Command::Serve { host, port } => {
                let host = host.unwrap_or_else(|| config.server.host.clone());
                let port = port.unwrap_or(config.server.port);
                Self::start_server(&config, db_path, host, port)
            }
            Command::List {
                entity,
                request,
                page,
                limit,
            } => {
                let request = build_request(request.as_deref(), page, limit)?;
                Self::list(&config, db_path, &entity, &request)
            }
            Command::Describe { entity } => {
                let table = PORTAL_CATALOG.table(&entity)?;
                print!("{}", describe_table(table));
                Ok(())
            }
        }
    }

    fn start_server(
        config: &Config,
        db_path: PathBuf,
        host: String,
        port: u16,
    ) -> Result<(), SocietyError> {
        info!("Starting server on {}:{}", host, port);

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SocietyError::Error(format!("Failed to create runtime: {}", e)))?;

        let pool = Database::open_pool(&db_path, config.database.pool_size)?;
        let max_limit = config.pagination.max_limit;

        rt.block_on(async {
            let web_server = crate::server::WebServer::new(host, port, pool, max_limit);
            web_server.start().await
        })
    }

    fn list(
        config: &Config,
        db_path: PathBuf,
        entity: &str,
        request: &PaginationRequest,
    ) -> Result<(), SocietyError> {
        let pool = Database::open_pool(&db_path, 1)?;
        let conn = pool.get()?;

        let result = paginate_on(
            &conn,
            &PORTAL_CATALOG,
            entity,
            request,
            config.pagination.max_limit,
        )?;

        let output = serde_json::to_string_pretty(&result)
            .map_err(|e| SocietyError::Error(format!("Failed to serialize result: {}", e)))?;
        println!("{output}");
        Ok(())
    }
}

fn build_request(
    body: Option<&str>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<PaginationRequest, SocietyError> {
    let mut request = match body {
        Some(body) => serde_json::from_str::<PaginationRequest>(body)
            .map_err(|e| SocietyError::InvalidRequest(format!("Malformed request: {}", e)))?,
        None => PaginationRequest::default(),
    };

    if let Some(page) = page {
        request.page = page;
    }
    if let Some(limit) = limit {
        request.limit = limit;
    }

    Ok(request)
}

fn describe_table(table: &TableDescriptor) -> String {
    let mut out = format!("{} (table \"{}\")\n", table.name, table.table_db);

    for (field, col_spec) in table.entries() {
        let mut line = format!("  {:<16} {}", field, col_spec.col_type.type_name());
        if let Some(values) = col_spec.col_type.enum_values() {
            line.push_str(&format!(" [{}]", values.join(", ")));
        }
        if col_spec.nullable {
            line.push_str(" (nullable)");
        }
        if *field == table.primary_key {
            line.push_str(" (primary key)");
        }
        out.push_str(&line);
        out.push('\n');
    }

    for (name, rel_spec) in table.relations.entries() {
        let kind = match rel_spec.join_kind {
            JoinKind::BelongsTo => "belongsTo",
            JoinKind::HasMany => "hasMany",
        };
        out.push_str(&format!(
            "  {} -> {} {} ({} = {}.{})\n",
            name, kind, rel_spec.target_table, rel_spec.local_key, rel_spec.target_table, rel_spec.foreign_key
        ));
    }

    out
}
