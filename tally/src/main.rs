use anyhow::{Context, Result};
use tally::cache::Cache;
use tally::store::ApiStore;
use tally::EditSession;

/// Push a saved draft to the backend: `tally [draft-name]`
#[tokio::main]
async fn main() -> Result<()> {
    let log_path = tally::logging::init_logging()?;
    tracing::info!("tally starting, logging to {}", log_path.display());

    let (settings, auth) = tally_auth::load_auth_state().context("Failed to load settings")?;

    let name = std::env::args().nth(1).unwrap_or_else(|| "default".to_string());
    let cache = Cache::new().await?;
    let Some(changes) = cache.get_draft(&name).await? else {
        println!("No saved draft named '{}'", name);
        return Ok(());
    };

    let store = ApiStore::connect(&settings, &auth).context("Not signed in")?;
    let mut session = EditSession::from_changes(changes);
    session
        .refresh_listing(&store)
        .await
        .context("Failed to load row positions")?;

    let report = session.commit(&store, &auth).await?;
    println!(
        "Saved {} rows ({} created, {} deleted)",
        report.committed.len(),
        report.created.len(),
        report.deleted.len()
    );
    for failure in &report.failures {
        println!("  not saved: {}", failure);
    }

    cache.set_draft(&name, session.changes()).await?;
    if session.has_pending_changes() {
        println!(
            "{} rows kept in draft '{}'",
            session.changes().len(),
            name
        );
    }
    Ok(())
}
