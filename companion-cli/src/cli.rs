//! Subcommands and their execution.
//!
//! Each command returns the text to print on success. Notices raised along
//! the way are printed by the console notifier as they happen.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use companion_client::{
    ClientError, NewTrip, Notifier, PackingItem, Place, ResourceId, SessionState, SessionStore, TripId, TripsApi,
};
use companion_sync::{Category, CategoryOutcome, ListResource, ResourceList, SuggestionEngine, SyncError};
use tracing::debug;

/// A failure the user has already seen, as a notice or as the
/// re-authentication prompt. Exits non-zero without a second message.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Reported(&'static str);

/// Whether `err` was already shown to the user.
///
/// Auth errors are covered by the re-authentication prompt. Client errors
/// from list and suggestion operations were turned into notices.
pub fn is_reported(err: &anyhow::Error) -> bool {
    if err.is::<Reported>() {
        return true;
    }
    if let Some(e) = err.downcast_ref::<SyncError>() {
        return matches!(e, SyncError::Client(_));
    }
    err.downcast_ref::<ClientError>().is_some_and(ClientError::is_auth)
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        username: String,
        #[arg(long, env = "COMPANION_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account (does not log in)
    Register {
        username: String,
        #[arg(long, env = "COMPANION_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the persisted session
    Logout,

    /// Show who is logged in
    Whoami,

    /// Account settings
    #[command(subcommand)]
    Account(AccountCommands),

    /// Manage trips
    #[command(subcommand)]
    Trips(TripCommands),

    /// Places to visit on a trip
    Places(ListArgs),

    /// Packing list of a trip
    Items(ListArgs),

    /// Generate AI suggestions for a trip and optionally accept them
    Suggest {
        trip: i64,
        /// Accept every suggestion
        #[arg(long)]
        accept_all: bool,
        /// Accept one suggested place
        #[arg(long = "place", value_name = "NAME")]
        places: Vec<String>,
        /// Accept one suggested item
        #[arg(long = "item", value_name = "NAME")]
        items: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AccountCommands {
    /// Change the username; requires logging in again
    ChangeUsername { new_username: String },

    /// Change the password
    ChangePassword {
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TripCommands {
    List,
    Show {
        id: i64,
    },
    Create {
        name: String,
        #[arg(short, long)]
        destination: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Trip id
    pub trip: i64,
    #[command(subcommand)]
    pub action: Option<ListAction>,
}

#[derive(Debug, Subcommand)]
pub enum ListAction {
    List,
    Add { name: String },
    Toggle { id: i64 },
    Remove { id: i64 },
}

pub async fn execute_command(
    session: &SessionStore,
    notifier: Arc<dyn Notifier>,
    cmd: Commands,
) -> anyhow::Result<String> {
    match cmd {
        Commands::Login { username, password } => {
            if session.login(&username, &password).await? {
                Ok(format!("Logged in as {}", username))
            } else {
                Err(Reported("login failed").into())
            }
        }
        Commands::Register { username, password } => {
            if session.register(&username, &password).await {
                Ok(String::new())
            } else {
                Err(Reported("registration failed").into())
            }
        }
        Commands::Logout => {
            session.logout()?;
            Ok(String::new())
        }
        Commands::Whoami => Ok(match session.state() {
            SessionState::Authenticated(identity) => identity.username,
            SessionState::Unauthenticated => "Not logged in".to_string(),
        }),
        Commands::Account(cmd) => {
            require_login(session)?;
            execute_account(session, cmd).await
        }
        Commands::Trips(cmd) => {
            require_login(session)?;
            execute_trips(&TripsApi::new(session.transport()), cmd).await
        }
        Commands::Places(args) => {
            require_login(session)?;
            let list = ResourceList::<Place>::new(TripId(args.trip), session.transport(), notifier);
            execute_list(&list, args.action.unwrap_or(ListAction::List)).await
        }
        Commands::Items(args) => {
            require_login(session)?;
            let list = ResourceList::<PackingItem>::new(TripId(args.trip), session.transport(), notifier);
            execute_list(&list, args.action.unwrap_or(ListAction::List)).await
        }
        Commands::Suggest {
            trip,
            accept_all,
            places,
            items,
        } => {
            require_login(session)?;
            let engine = SuggestionEngine::new(TripId(trip), session.transport(), notifier);
            execute_suggest(&engine, accept_all, places, items).await
        }
    }
}

fn require_login(session: &SessionStore) -> anyhow::Result<()> {
    if !session.is_authenticated() {
        bail!("not logged in; run `companion login <username>` first");
    }
    Ok(())
}

async fn execute_account(session: &SessionStore, cmd: AccountCommands) -> anyhow::Result<String> {
    let changed = match cmd {
        AccountCommands::ChangeUsername { new_username } => session.change_username(&new_username).await?,
        AccountCommands::ChangePassword { old, new, confirm } => session.change_password(&old, &new, &confirm).await,
    };
    if !changed {
        return Err(Reported("account was not changed").into());
    }
    Ok(String::new())
}

async fn execute_trips(api: &TripsApi, cmd: TripCommands) -> anyhow::Result<String> {
    match cmd {
        TripCommands::List => {
            let trips = api.list().await?;
            if trips.is_empty() {
                return Ok("No trips yet".to_string());
            }
            let mut out = String::new();
            for trip in trips {
                writeln!(
                    out,
                    "#{} {} to {} ({} to {}, {} days)",
                    trip.id,
                    trip.name,
                    trip.destination,
                    trip.from_date,
                    trip.to_date,
                    trip.duration_days()
                )?;
            }
            Ok(out.trim_end().to_string())
        }
        TripCommands::Show { id } => {
            let trip = api.get(TripId(id)).await?;
            Ok(format!(
                "{}\n  Destination: {}\n  Dates: {} to {} ({} days)",
                trip.name,
                trip.destination,
                trip.from_date,
                trip.to_date,
                trip.duration_days()
            ))
        }
        TripCommands::Create {
            name,
            destination,
            from,
            to,
        } => {
            let trip = api
                .create(&NewTrip {
                    name,
                    destination,
                    from_date: from,
                    to_date: to,
                })
                .await?;
            Ok(format!("Created trip #{}", trip.id))
        }
        TripCommands::Delete { id } => {
            api.delete(TripId(id)).await?;
            Ok(format!("Deleted trip #{}", id))
        }
    }
}

fn render<R: ListResource>(items: &[R]) -> String {
    if items.is_empty() {
        return "(empty)".to_string();
    }
    items
        .iter()
        .map(|item| {
            let mark = if item.status() { "x" } else { " " };
            format!("[{}] {} (#{})", mark, item.name(), item.id())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn execute_list<R: ListResource>(list: &ResourceList<R>, action: ListAction) -> anyhow::Result<String> {
    list.load().await?;
    match action {
        ListAction::List => {}
        ListAction::Add { name } => {
            list.add(&name).await?;
        }
        ListAction::Toggle { id } => {
            list.toggle_status(ResourceId(id)).await?;
        }
        ListAction::Remove { id } => {
            list.remove(ResourceId(id)).await?;
        }
    }
    Ok(render(&list.items().await))
}

async fn execute_suggest(
    engine: &SuggestionEngine,
    accept_all: bool,
    places: Vec<String>,
    items: Vec<String>,
) -> anyhow::Result<String> {
    engine.generate().await?;

    let picks = places
        .into_iter()
        .map(|v| (Category::Places, v))
        .chain(items.into_iter().map(|v| (Category::Items, v)));
    for (category, value) in picks {
        match engine.accept_one(category, &value).await {
            Ok(()) => {}
            Err(e @ SyncError::UnknownSuggestion { .. }) => eprintln!("{}", e),
            Err(e) if e.is_auth() => return Err(e.into()),
            Err(e) => debug!(error = %e, "Suggestion not accepted"),
        }
    }

    if accept_all {
        match engine.accept_all().await {
            Ok(report) => {
                for category in Category::ALL {
                    if let CategoryOutcome::Failed(e) = report.outcome(category) {
                        debug!(%category, error = %e, "Category not accepted");
                        if e.is_auth() {
                            return Err(Reported("session expired").into());
                        }
                    }
                }
            }
            Err(SyncError::NoSuggestions) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let set = engine.suggestions().await.context("no suggestions were generated")?;
    let mut out = String::new();
    writeln!(out, "Places:")?;
    for place in &set.places {
        writeln!(out, "  - {}", place)?;
    }
    writeln!(out, "Packing items:")?;
    for item in &set.items {
        writeln!(out, "  - {}", item)?;
    }
    Ok(out.trim_end().to_string())
}
