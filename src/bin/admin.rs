use std::{error::Error, fs};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use home_budget::{
    AppState, Backend, DEFAULT_CURRENCY, EnvOverrides, Expense, Income, RecordService, ScopeId,
    Settings, delete_flag, initialize_db, list_flags, open_connection, set_flag,
};

/// Operator tools for feature flags and for migrating records between the
/// flat store and the database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update a feature flag.
    SetFlag {
        /// The flag name, e.g. USE_DATABASE_STORAGE.
        name: String,
        /// Whether the flag is on.
        #[arg(action = ArgAction::Set)]
        enabled: bool,
        /// Only apply the flag to this identity instead of globally.
        #[arg(long)]
        scope: Option<ScopeId>,
        /// What the flag controls.
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a feature flag.
    DeleteFlag {
        /// The flag name.
        name: String,
        /// The identity the flag applies to, omit for the global flag.
        #[arg(long)]
        scope: Option<ScopeId>,
    },
    /// List all feature flags stored in the database.
    ListFlags,
    /// Report the records that differ between the two stores.
    Compare {
        #[arg(value_enum)]
        kind: Kind,
    },
    /// Copy the records the other store is missing into it.
    Backfill {
        #[arg(value_enum)]
        kind: Kind,
        /// The store to copy records from.
        #[arg(long, value_enum)]
        from: Store,
    },
    /// Add sample records if no records exist yet.
    Seed,
    /// Summarize the expenses in the authoritative store.
    Summary,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Expense,
    Income,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Store {
    Flat,
    Relational,
}

impl From<Store> for Backend {
    fn from(store: Store) -> Self {
        match store {
            Store::Flat => Backend::Flat,
            Store::Relational => Backend::Relational,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    fs::create_dir_all(&args.settings.data_dir)?;
    let conn = open_connection(&args.settings.database_url)?;
    initialize_db(&conn)?;

    match args.command {
        Command::SetFlag {
            name,
            enabled,
            scope,
            description,
        } => {
            let flag = set_flag(&name, enabled, scope, description.as_deref(), &conn)?;
            println!("{} = {} ({})", flag.name, flag.enabled, scope_label(flag.scope_id));
        }
        Command::DeleteFlag { name, scope } => {
            if delete_flag(&name, scope, &conn)? {
                println!("Deleted {name} ({})", scope_label(scope));
            } else {
                println!("No flag {name} ({})", scope_label(scope));
            }
        }
        Command::ListFlags => {
            for flag in list_flags(&conn)? {
                println!(
                    "{:<24} {:<6} {:<10} {}",
                    flag.name,
                    flag.enabled,
                    scope_label(flag.scope_id),
                    flag.description.unwrap_or_default()
                );
            }
        }
        command => {
            let state = AppState::new(conn, args.settings, EnvOverrides::from_env())?;
            run_storage_command(&state.service, command)?;
        }
    }

    Ok(())
}

fn run_storage_command(service: &RecordService, command: Command) -> Result<(), Box<dyn Error>> {
    let controller = service.controller();

    match command {
        Command::Compare { kind } => {
            let report = match kind {
                Kind::Expense => controller.compare::<Expense>()?,
                Kind::Income => controller.compare::<Income>()?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Backfill { kind, from } => {
            let summary = match kind {
                Kind::Expense => controller.backfill::<Expense>(from.into())?,
                Kind::Income => controller.backfill::<Income>(from.into())?,
            };
            println!(
                "Copied {} records, {} were already present",
                summary.copied, summary.already_present
            );
        }
        Command::Seed => {
            let count = service.seed()?;
            println!("Seeded {count} records in {} mode", service.storage_mode());
        }
        Command::Summary => {
            let summary = service.expense_summary()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);

            if let Some(max) = summary.max {
                println!(
                    "Largest expense: {}",
                    service.format_amount(max, DEFAULT_CURRENCY)
                );
            }
        }
        Command::SetFlag { .. } | Command::DeleteFlag { .. } | Command::ListFlags => {
            unreachable!("flag commands are handled before the stores are opened")
        }
    }

    Ok(())
}

fn scope_label(scope_id: Option<ScopeId>) -> String {
    scope_id.map_or_else(|| "global".to_owned(), |id| format!("scope {id}"))
}
