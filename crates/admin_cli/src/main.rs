use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand};
use engine::{Committed, EngineError, Ledger, SqliteStore};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

mod settings;

#[derive(Parser, Debug)]
#[command(name = "aamon_admin")]
#[command(about = "Offline inspection and adjustment of the Aamon ledger")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./aamon.db?mode=rwc"
    )]
    database_url: String,

    /// Settings file whose `[ledger]` table the bot also reads.
    #[arg(long, env = "AAMON_CONFIG", default_value = "config/settings.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Totals over every account.
    Stats,
    /// Richest accounts.
    Top {
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Balance and daily bonus state of one account.
    Balance { user: String },
    Give(Adjust),
    Take(Adjust),
    Set(Adjust),
}

#[derive(Args, Debug)]
struct Adjust {
    user: String,
    amount: i64,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

fn report(user: &str, result: Result<Committed<i64>, EngineError>) {
    match result {
        Ok(done) => {
            if let Some(err) = &done.persistence {
                eprintln!("balance changed in memory but was not saved: {err}");
                std::process::exit(1);
            }
            println!("{user}: {}", done.value);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let settings = settings::Settings::load(&cli.config)?;
    let config = settings.ledger.ledger_config()?;

    let db = connect_db(&cli.database_url).await?;
    let ledger = Ledger::builder()
        .store(Arc::new(SqliteStore::new(db)))
        .config(config)
        .build()
        .await?;

    match cli.command {
        Command::Stats => {
            let stats = ledger.stats();
            println!("users:        {}", stats.total_users);
            println!("total:        {}", stats.total_balance);
            println!("average:      {}", stats.average_balance);
            println!("daily claims: {}", stats.total_daily_claims);
        }
        Command::Top { limit } => {
            for (rank, (user, balance)) in ledger.top_accounts(limit).iter().enumerate() {
                println!("{:>3}. {user} {balance}", rank + 1);
            }
        }
        Command::Balance { user } => match ledger.account(&user) {
            Some(account) => {
                println!("{user}: {}", account.balance);
                println!("daily claims: {}", account.daily_claims);
                match ledger.next_daily_claim_at(&user) {
                    Some(at) => println!(
                        "next daily claim: {}",
                        at.with_timezone(&ledger.config().timezone)
                    ),
                    None => println!("daily bonus available"),
                }
            }
            None => {
                eprintln!("no account for {user}");
                std::process::exit(1);
            }
        },
        Command::Give(args) => report(&args.user, ledger.credit(&args.user, args.amount).await),
        Command::Take(args) => report(&args.user, ledger.debit(&args.user, args.amount).await),
        Command::Set(args) => report(
            &args.user,
            ledger.set_balance(&args.user, args.amount).await,
        ),
    }

    Ok(())
}
