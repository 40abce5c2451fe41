//! SalonHub CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! salon-cli migrate
//!
//! # Create the first system admin
//! salon-cli user create -e owner@example.com -n "Owner" -r system_admin --password '...'
//!
//! # Create a stylist at branch 2
//! salon-cli user create -e sam@example.com -n "Sam" -r stylist --branch 2 --password '...'
//!
//! # Load demo branches, services, a supplier and products
//! salon-cli seed demo
//! ```
//!
//! # Environment Variables
//!
//! - `SALON_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "salon-cli")]
#[command(author, version, about = "SalonHub CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load sample data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a staff or client account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Role (`system_admin`, `operational_manager`, `branch_admin`,
        /// `branch_manager`, `stylist`, `client`)
        #[arg(short, long)]
        role: String,

        /// Branch for branch-scoped roles
        #[arg(short, long)]
        branch: Option<i32>,

        /// Initial password
        #[arg(long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Two branches, a service menu, a supplier and retail products
    Demo,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                name,
                role,
                branch,
                password,
            } => {
                commands::user::create(&email, &name, &role, branch, &password).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Demo => commands::seed::demo().await?,
        },
    }
    Ok(())
}
