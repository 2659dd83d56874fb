use anyhow::{bail, Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use veda_cli::{init_tracing, validate_admin_input};
use veda_core::password::hash_password;
use veda_core::{NewUser, UserRole, UserStatus};
use veda_db::UserRepository;

#[derive(Parser, Debug)]
#[command(name = "create_admin")]
#[command(about = "Create an active, verified administrator account")]
struct Args {
    #[arg(long)]
    username: String,

    #[arg(long)]
    email: String,

    /// Read from ADMIN_PASSWORD when not given on the command line
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let username = args.username.trim();
    let email = args.email.trim();

    if let Err(message) = validate_admin_input(username, email, &args.password) {
        bail!(message);
    }

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    let users = UserRepository::new(pool);

    let admins = users.count_admins().await?;
    if admins > 0 {
        tracing::warn!(admins, "Admin users already exist; creating another");
    }

    if users.exists_username_or_email(username, email).await? {
        bail!("Username or email already registered: {} / {}", username, email);
    }

    let admin = users
        .create(NewUser {
            email: email.to_string(),
            username: username.to_string(),
            first_name: args.first_name,
            last_name: args.last_name,
            mobile: None,
            password_hash: hash_password(&args.password)?,
            role: UserRole::Admin,
            status: UserStatus::Active,
            email_verified: true,
        })
        .await?;

    tracing::info!(user_id = %admin.id, username = %admin.username, "Admin user created");
    println!("{}", admin.id);
    Ok(())
}
