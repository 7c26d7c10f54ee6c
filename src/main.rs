use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use noteboard::config::{ConfigError, DbConfig, SessionConfig};
use noteboard::identity::{Identity, LocalIdentity};
use noteboard::remote::pg::PgStore;
use noteboard::remote::{FeedMessage, RemoteError, RemoteStore};
use noteboard::session::{BoardSession, FeedOutcome, SessionError};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

const RECONNECT_BASE_MS: u64 = 500;
const RECONNECT_MAX_MS: u64 = 30_000;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("missing user id; pass --user or set NOTEBOARD_USER")]
    MissingUser,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "noteboard", about = "Note board store and live-sync CLI")]
struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Acting user; owner of created boards.
    #[arg(long, env = "NOTEBOARD_USER")]
    user: Option<Uuid>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Board(BoardCommand),
    /// Follow a board's change feed until Ctrl-C.
    Watch {
        board_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct BoardCommand {
    #[command(subcommand)]
    command: BoardSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardSubcommand {
    List {
        #[arg(long)]
        owner: Option<Uuid>,
    },
    Create {
        #[arg(long, default_value = "Untitled Board")]
        title: String,
    },
    Show {
        board_id: Uuid,
    },
    Delete {
        board_id: Uuid,
    },
    Publish {
        board_id: Uuid,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        public: bool,
    },
}

struct CliContext {
    store: Arc<dyn RemoteStore>,
    identity: LocalIdentity,
    config: SessionConfig,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to load .env: {e}");
        }
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let db = match cli.database_url {
        Some(url) => DbConfig::new(url),
        None => DbConfig::from_env()?,
    };
    let pool = noteboard::db::init_pool(&db).await?;
    let config = SessionConfig::from_env()?;
    let ctx = CliContext {
        store: Arc::new(PgStore::new(pool).with_feed_capacity(config.feed_capacity)),
        identity: cli.user.map_or_else(LocalIdentity::anonymous, LocalIdentity::signed_in),
        config,
    };

    match cli.command {
        Command::Board(board) => run_board(&ctx, board).await,
        Command::Watch { board_id } => run_watch(&ctx, board_id).await,
    }
}

async fn run_board(ctx: &CliContext, board: BoardCommand) -> Result<(), CliError> {
    let viewer = ctx.identity.current_user();
    match board.command {
        BoardSubcommand::List { owner } => {
            let owner = owner.or(viewer).ok_or(CliError::MissingUser)?;
            let boards = BoardSession::list_boards(ctx.store.as_ref(), owner).await?;
            print_json(&serde_json::to_value(boards)?)
        }
        BoardSubcommand::Create { title } => {
            let board = BoardSession::create_board(ctx.store.as_ref(), viewer, Some(title.as_str())).await?;
            print_json(&serde_json::to_value(board)?)
        }
        BoardSubcommand::Show { board_id } => {
            let session = open(ctx, board_id).await?;
            let body = json!({
                "board": session.board(),
                "read_only": session.is_read_only(),
                "contents": session.pipeline().doc().snapshot(),
            });
            session.close().await;
            print_json(&body)
        }
        BoardSubcommand::Delete { board_id } => {
            open(ctx, board_id).await?.delete_board().await?;
            print_json(&json!({ "deleted": board_id }))
        }
        BoardSubcommand::Publish { board_id, public } => {
            let mut session = open(ctx, board_id).await?;
            let result = if session.board().is_public == public {
                Ok(public)
            } else {
                session.toggle_public().await
            };
            session.close().await;
            print_json(&json!({ "id": board_id, "is_public": result? }))
        }
    }
}

async fn open(ctx: &CliContext, board_id: Uuid) -> Result<BoardSession, CliError> {
    let viewer = ctx.identity.current_user();
    Ok(BoardSession::open(Arc::clone(&ctx.store), board_id, viewer, ctx.config).await?)
}

async fn run_watch(ctx: &CliContext, board_id: Uuid) -> Result<(), CliError> {
    let mut session = open(ctx, board_id).await?;
    info!(
        %board_id,
        title = %session.board().title,
        notes = session.pipeline().doc().notes().len(),
        read_only = session.is_read_only(),
        "watching board"
    );
    let mut backoff_ms = RECONNECT_BASE_MS;
    let mut synced = session.connect().await.is_ok();

    loop {
        if !synced {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
                _ = tokio::signal::ctrl_c() => break,
            }
            backoff_ms = (backoff_ms * 2).min(RECONNECT_MAX_MS);
            synced = match session.resync().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(%board_id, error = %e, backoff_ms, "resync failed");
                    false
                }
            };
            continue;
        }

        let msg = tokio::select! {
            msg = session.next_feed() => msg,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(msg) = msg else {
            synced = false;
            continue;
        };
        let disconnected = msg == FeedMessage::Disconnected;
        match session.handle_feed(msg) {
            FeedOutcome::Change(outcome) => {
                info!(%board_id, ?outcome, notes = session.pipeline().doc().notes().len(), "change");
            }
            FeedOutcome::Status(status) => {
                if status == canvas::reconcile::ConnectionStatus::Connected {
                    backoff_ms = RECONNECT_BASE_MS;
                }
            }
            FeedOutcome::Ignored => {}
        }
        if disconnected {
            synced = false;
        }
    }

    info!(%board_id, "stopping");
    let failures = session.close().await;
    if !failures.is_empty() {
        warn!(%board_id, count = failures.len(), "writes failed during session");
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
