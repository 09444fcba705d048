mod config;
mod credentials;
mod db;
mod error;
mod google;
mod identity;
mod mcp;
mod web;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use google::{CalendarService, OAuthClient};
use identity::{GOOGLE, IdentityProvider, SqliteIdentityProvider};
use mcp::tools::ToolRegistry;

#[derive(Parser)]
#[command(name = "gcal-mcp-server", about = "MCP server for Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (default)
    Serve,

    /// Create an MCP API token for a user
    CreateToken {
        /// Email address of the token owner
        #[arg(short, long)]
        email: String,
        /// A descriptive name for this token
        #[arg(short, long)]
        name: String,
    },

    /// List all users
    ListUsers,

    /// List MCP tokens for a user
    ListTokens {
        /// Email address
        #[arg(short, long)]
        email: String,
    },

    /// Delete an MCP token by ID
    DeleteToken {
        /// Token ID to delete
        #[arg(short, long)]
        id: String,
    },

    /// Forget a user's stored Google tokens so they must sign in again
    Unlink {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::CreateToken { email, name } => cmd_create_token(&email, &name).await,
        Commands::ListUsers => cmd_list_users().await,
        Commands::ListTokens { email } => cmd_list_tokens(&email).await,
        Commands::DeleteToken { id } => cmd_delete_token(&id).await,
        Commands::Unlink { email } => cmd_unlink(&email).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        mcp_port = config.mcp_port,
        base_url = %config.base_url,
        max_duration_secs = config.max_duration.as_secs(),
        "Starting Google Calendar MCP server"
    );

    let pool = db::init_pool(&config.database_url).await?;
    tracing::info!("Database initialized");

    let http = reqwest::Client::builder()
        .user_agent(concat!("gcal-mcp-server/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let oauth = OAuthClient::new(http.clone(), &config.google);
    let calendar = CalendarService::new(http, &config.google, oauth.clone())?;

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(SqliteIdentityProvider::new(pool.clone(), oauth.clone()));
    let registry = ToolRegistry::new(
        identity.clone(),
        calendar,
        oauth.client_id(),
        config.default_timezone.clone(),
    );

    let mcp_state = mcp::McpState::new(
        identity,
        Arc::new(registry),
        config.max_duration,
        config.base_url.clone(),
    );
    let app = mcp::router(mcp_state).merge(web::router(web::WebState::new(
        pool,
        oauth,
        config.base_url.clone(),
    )));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.mcp_port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, login_url = %format!("{}/login", config.base_url), "MCP server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Helper: init a DB pool from env for CLI commands.
async fn cli_pool() -> anyhow::Result<sqlx::SqlitePool> {
    Ok(db::init_pool(&config::Config::database_url_from_env()).await?)
}

async fn find_user(pool: &sqlx::SqlitePool, email: &str) -> anyhow::Result<db::models::User> {
    db::users::get_user_by_email(pool, email)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user with email '{email}'. Sign in at /login first."))
}

/// Create an MCP token for a user.
async fn cmd_create_token(email: &str, name: &str) -> anyhow::Result<()> {
    let pool = cli_pool().await?;
    let user = find_user(&pool, email).await?;

    let (raw_token, record) = db::tokens::create_token(&pool, &user.id, name).await?;
    println!("MCP token created:");
    println!("  ID:    {}", record.id);
    println!("  Name:  {}", record.name);
    println!("  Token: {raw_token}");
    println!();
    println!("Save this token. It cannot be retrieved again.");
    Ok(())
}

/// List all users and whether their Google account is usable.
async fn cmd_list_users() -> anyhow::Result<()> {
    let pool = cli_pool().await?;
    let users = db::users::list_users(&pool).await?;

    if users.is_empty() {
        println!("No users found.");
        return Ok(());
    }

    println!("{:<38} {:<32} Google", "ID", "Email");
    println!("{}", "-".repeat(110));
    for u in &users {
        let google = db::accounts::get_account(&pool, &u.id, GOOGLE)
            .await?
            .map(|a| a.link_status())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<38} {:<32} {google}", u.id, u.email);
    }
    Ok(())
}

/// List MCP tokens for a user.
async fn cmd_list_tokens(email: &str) -> anyhow::Result<()> {
    let pool = cli_pool().await?;
    let user = find_user(&pool, email).await?;

    let tokens = db::tokens::list_tokens_for_user(&pool, &user.id).await?;
    if tokens.is_empty() {
        println!("No tokens found for '{email}'.");
        return Ok(());
    }

    println!("{:<38} {:<20} {:<20} Last used", "ID", "Name", "Created");
    println!("{}", "-".repeat(100));
    for t in &tokens {
        let last_used = t
            .last_used_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{:<38} {:<20} {:<20} {last_used}", t.id, t.name, t.created_at.to_string());
    }
    Ok(())
}

/// Delete an MCP token by ID.
async fn cmd_delete_token(token_id: &str) -> anyhow::Result<()> {
    let pool = cli_pool().await?;
    db::tokens::delete_token(&pool, token_id).await?;
    println!("Token {token_id} deleted.");
    Ok(())
}

/// Clear a user's stored Google tokens.
async fn cmd_unlink(email: &str) -> anyhow::Result<()> {
    let pool = cli_pool().await?;
    let user = find_user(&pool, email).await?;

    if db::accounts::clear_tokens(&pool, &user.id, GOOGLE).await? {
        println!("Google tokens cleared for '{email}'. They must sign in again at /login.");
    } else {
        println!("'{email}' has no linked Google account.");
    }
    Ok(())
}
