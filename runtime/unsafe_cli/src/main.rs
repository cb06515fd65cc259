use anyhow::Context;
use clap::Parser;
use unsafe_cli::command::{Cli, Command};
use unsafe_cli::{configuration, database, sessions, users};
use unsafe_tracing::{get_subscriber, init_subscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_subscriber(get_subscriber("info".into(), std::io::stderr))?;
    let config = configuration::load(cli.config.as_deref())?;

    match cli.command {
        Command::Sessions { db, command } => {
            let db = db.unwrap_or(config.db.sessions);
            let count = sessions::run(&db, command)
                .await
                .context("Failed to clean up the session store")?;
            println!("Purged {count} sessions from {}", db.display());
        }
        Command::Users { db, command } => {
            let db = db.unwrap_or(config.db.app);
            let user = users::run(&db, command).await?;
            println!("Created user `{}` with id {}", user.username, user.user_id);
        }
        Command::Initdb { reset, db } => {
            let app_db = db.unwrap_or(config.db.app);
            database::init(&app_db, &config.db.sessions, reset).await?;
            println!(
                "Initialized {} and {}",
                app_db.display(),
                config.db.sessions.display()
            );
        }
    }
    Ok(())
}
