//! Calview command-line entry point.
//!
//! Presentation glue only: each subcommand triggers exactly one pass through
//! the auth or sync machinery, which keeps sync invocations serialized.

use anyhow::Result;
use calview_auth::{authenticate, GoogleAuthProvider, TokenStore};
use calview_calendar::{
    AuthFetcher, DirectoryClient, EventTime, NormalizedEvent, StateStore, SyncEngine,
};
use calview_core::error::ConfigError;
use calview_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    calview_core::init()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("help");

    match command {
        "signin" => signin().await,
        "signout" => signout(),
        "calendars" => calendars().await,
        "select" => select(&args[1..]),
        "sync" => sync().await,
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("Calview - Google Calendar viewer");
    println!();
    println!("Usage: calview <command>");
    println!();
    println!("Commands:");
    println!("  signin            Sign in with Google");
    println!("  signout           Remove stored tokens");
    println!("  calendars         List available calendars");
    println!("  select <id>...    Choose calendars to display");
    println!("  sync              Fetch events for the selected calendars");
}

fn provider_from_config(config: &Config) -> Result<GoogleAuthProvider> {
    if !config.google.is_configured() {
        anyhow::bail!(ConfigError::CredentialsMissing.user_message());
    }
    Ok(GoogleAuthProvider::new(
        config.google.client_id.clone(),
        config.google.client_secret.clone(),
        config.google.redirect_uri.clone(),
    ))
}

async fn signin() -> Result<()> {
    let (config, _) = Config::load_validated()?;
    let provider = provider_from_config(&config)?;
    let store = TokenStore::new()?;

    match authenticate(&provider, &store, config.google.callback_port).await {
        Ok(_) => {
            println!("Signed in.");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Sign-in failed: {}", e);
            anyhow::bail!(e.user_message())
        }
    }
}

fn signout() -> Result<()> {
    let store = TokenStore::new()?;
    store.clear()?;
    println!("Signed out.");
    Ok(())
}

async fn calendars() -> Result<()> {
    let (config, _) = Config::load_validated()?;
    let provider = provider_from_config(&config)?;
    let store = TokenStore::new()?;

    if !store.is_signed_in() {
        println!("Not signed in. Run `calview signin` first.");
        return Ok(());
    }

    let state = StateStore::new()?;
    let client = DirectoryClient::new(AuthFetcher::new(store, provider), state);

    let mut listing = client.list().await;
    if listing.is_empty() {
        // Directory fetch degraded; show the previous snapshot if any
        listing = client.cached();
        if !listing.is_empty() {
            println!("(showing cached calendar list)");
        }
    }

    if listing.is_empty() {
        println!("No calendars available.");
    }
    for calendar in listing {
        println!("{}\t{}", calendar.id, calendar.display_name);
    }
    Ok(())
}

fn select(ids: &[String]) -> Result<()> {
    if ids.is_empty() {
        println!("Usage: calview select <calendar-id>...");
        return Ok(());
    }

    let state = StateStore::new()?;
    state.save_selection(ids)?;
    println!("Selected {} calendar(s).", ids.len());
    Ok(())
}

async fn sync() -> Result<()> {
    let (config, _) = Config::load_validated()?;
    let provider = provider_from_config(&config)?;
    let store = TokenStore::new()?;
    let state = StateStore::new()?;

    let selection = state.load_selection();
    if selection.is_empty() {
        println!("No calendars selected. Run `calview select <id>...` first.");
        return Ok(());
    }

    let engine = SyncEngine::new(AuthFetcher::new(store, provider), state);
    let report = engine.sync(&selection).await;

    for event in &report.events {
        print_event(event);
    }

    if !report.failed_calendars.is_empty() {
        eprintln!(
            "Warning: sync incomplete for: {}",
            report.failed_calendars.join(", ")
        );
    }
    if report.auth_required {
        eprintln!("Authentication required. Run `calview signin` and sync again.");
    }
    Ok(())
}

fn print_event(event: &NormalizedEvent) {
    let marker = if event.all_day { "[all day]" } else { "" };
    println!(
        "{} .. {}  {} {}",
        format_time(&event.start),
        format_time(&event.end),
        event.title,
        marker
    );
}

fn format_time(time: &EventTime) -> String {
    match time {
        EventTime::DateTime(dt) => dt.to_rfc3339(),
        EventTime::Date(date) => date.to_string(),
    }
}
