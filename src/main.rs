use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checkin::config::{self, Config};
use checkin::models::{FieldDraft, FieldType};
use checkin::store::memory::MemoryStore;
use checkin::store::postgres::PgStore;
use checkin::store::DocumentStore;
use checkin::{api, jobs, report, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LOG_FORMAT=json switches to structured output for log shippers
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let (pretty_layer, json_layer) = if json_logs {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "checkin=debug,tower_http=debug".into()),
        ))
        .with(pretty_layer)
        .with(json_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Token { command }) => {
            let state = connect_state(cfg).await?;
            handle_token_command(command, &state).await
        }
        Some(cli::Commands::Field { command }) => {
            let state = connect_state(cfg).await?;
            handle_field_command(command, &state).await
        }
        Some(cli::Commands::Record { command }) => {
            let state = connect_state(cfg).await?;
            handle_record_command(command, &state).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url).await?;
            tracing::info!("Running migrations...");
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store, data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Admin commands act on the shared database; an in-memory store would
/// vanish with the process.
async fn connect_state(cfg: Config) -> anyhow::Result<Arc<AppState>> {
    if cfg.database_url.is_none() {
        anyhow::bail!("DATABASE_URL must be set for admin commands");
    }
    let store = open_store(&cfg).await?;
    Ok(AppState::bootstrap(store, cfg).await?)
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let store = open_store(&cfg).await?;
    let refresh_secs = cfg.refresh_interval_secs;

    let state = AppState::bootstrap(store, cfg)
        .await
        .context("failed to load check-in state")?;

    if refresh_secs > 0 {
        jobs::refresh::spawn(state.clone(), Duration::from_secs(refresh_secs));
        tracing::info!("Background refresh job started (every {}s)", refresh_secs);
    }

    if let Some(url) = state.distributable_url() {
        tracing::info!("Kiosk URL: {}", url);
    }

    let app = api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("checkin listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn handle_token_command(cmd: cli::TokenCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Show => {
            let token = state.tokens.current().context("no active token")?;
            println!("Token:      {}", token.value);
            println!("Rotated at: {}", token.rotated_at);
            if let Some(url) = state.distributable_url() {
                println!("URL:        {}", url);
            }
        }
        cli::TokenCommands::Rotate => {
            let token = state.tokens.rotate().await?;
            println!("Token rotated. Previously distributed codes no longer work.");
            println!("Token: {}", token.value);
            if let Some(url) = state.distributable_url() {
                println!("URL:   {}", url);
            }
        }
    }
    Ok(())
}

fn field_draft(text: String, kind: &str, options: String, required: bool) -> anyhow::Result<FieldDraft> {
    let kind = FieldType::parse(kind)
        .with_context(|| format!("unknown field type '{}' (binary, choice, free_text)", kind))?;
    Ok(FieldDraft {
        text,
        kind,
        options,
        required,
    })
}

fn parse_id(id: &str) -> anyhow::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(id).context("Invalid id")
}

async fn handle_field_command(cmd: cli::FieldCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::FieldCommands::List => {
            let fields = state.schema.list();
            if fields.is_empty() {
                println!("No fields defined.");
                return Ok(());
            }
            println!("{:<38} {:<10} {:<9} {}", "ID", "TYPE", "REQUIRED", "TEXT");
            for f in fields {
                let text = if f.options.is_empty() {
                    f.text.clone()
                } else {
                    format!("{} [{}]", f.text, f.options.join(", "))
                };
                println!("{:<38} {:<10} {:<9} {}", f.id, f.kind, f.required, text);
            }
        }
        cli::FieldCommands::Add {
            text,
            kind,
            options,
            required,
        } => {
            let field = state
                .schema
                .upsert(field_draft(text, &kind, options, required)?, None)
                .await?;
            println!("Field added:");
            println!("  ID:       {}", field.id);
            println!("  Type:     {}", field.kind);
            println!("  Required: {}", field.required);
        }
        cli::FieldCommands::Edit {
            id,
            text,
            kind,
            options,
            required,
        } => {
            let id = parse_id(&id)?;
            let field = state
                .schema
                .upsert(field_draft(text, &kind, options, required)?, Some(id))
                .await?;
            println!("Field {} updated.", field.id);
        }
        cli::FieldCommands::Remove { id } => {
            state.schema.remove(parse_id(&id)?).await?;
            println!("Field removed. Existing answers to it are kept in the log.");
        }
    }
    Ok(())
}

async fn handle_record_command(cmd: cli::RecordCommands, state: &AppState) -> anyhow::Result<()> {
    match cmd {
        cli::RecordCommands::List { search } => {
            let logs = state.logbook.list();
            let hits = report::filter(&logs, search.as_deref().unwrap_or(""));
            if hits.is_empty() {
                println!("No records found.");
                return Ok(());
            }
            println!("{:<38} {:<24} {:<8} SUBMITTED", "ID", "TRAINEE", "ANSWERS");
            for r in hits {
                let trainee: String = r.trainee.chars().take(22).collect();
                println!(
                    "{:<38} {:<24} {:<8} {}",
                    r.id,
                    trainee,
                    r.answers.len(),
                    r.submitted_at
                );
            }
        }
        cli::RecordCommands::Remove { id } => {
            state.logbook.remove(parse_id(&id)?).await?;
            println!("Record deleted.");
        }
        cli::RecordCommands::Export { search } => {
            let logs = state.logbook.list();
            let hits = report::filter(&logs, search.as_deref().unwrap_or(""));
            let table = report::export_table(hits, &state.schema.list());
            println!("{}", table.headers.join("\t"));
            for row in table.rows {
                println!("{}", row.join("\t"));
            }
        }
    }
    Ok(())
}
