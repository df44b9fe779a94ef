use bookshelf::catalog::{Book, BookId, CatalogSource, InMemoryCatalog};
use bookshelf::config::Config;
use bookshelf::controller::{LoggingObserver, SessionController, SessionSnapshot};
use bookshelf::playback::ServiceHost;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Progress reports to listen for before tearing the controller down
const LISTEN_TICKS: usize = 5;

#[tokio::main]
async fn main() {
    // Use RUST_LOG env var if set, otherwise default to info level
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    if let Err(e) = run().await {
        error!("bookshelf failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let query = std::env::args().nth(1).unwrap_or_default();

    let source = match &config.catalog_path {
        Some(path) => InMemoryCatalog::from_file(path).await?,
        None => InMemoryCatalog::new(sample_books()),
    };
    let library = source.search("").await?;
    let host = ServiceHost::new(
        &config,
        Arc::new(library),
        tokio::runtime::Handle::current(),
    );

    let snapshot = SessionSnapshot::load(&config.snapshot_path).await?;
    let mut controller =
        SessionController::restore(Arc::new(host.clone()), Arc::new(LoggingObserver), snapshot);

    if controller.catalog().is_empty() || !query.is_empty() {
        let results = source.search(&query).await?;
        info!("Search '{}' returned {} books", query, results.len());
        controller.apply_search_results(results);
    }
    if controller.selected_book().is_none() && controller.select_book(0).is_none() {
        warn!("Nothing to play");
        return Ok(());
    }

    controller.start();
    while !controller.is_connected() {
        if !controller.next_event().await {
            return Err("binding closed before it connected".into());
        }
    }

    if let Some(book) = controller.selected_book() {
        info!("Selected: {} by {}", book.title, book.author);
        let book_id = book.id.clone();
        controller.request_play(&book_id);
    }

    let wait = config.progress_interval * 3;
    for _ in 0..LISTEN_TICKS {
        match tokio::time::timeout(wait, controller.next_event()).await {
            Ok(true) => {}
            Ok(false) | Err(_) => break,
        }
    }

    // Taken while still bound so the next run resumes where this one left off
    let snapshot = controller.snapshot();
    controller.stop();
    snapshot.save(&config.snapshot_path).await?;

    Ok(())
}

fn sample_books() -> Vec<Book> {
    [
        ("1", "Pride and Prejudice", "Jane Austen", 42_480),
        ("2", "The Time Machine", "H. G. Wells", 12_660),
        ("3", "Moby Dick", "Herman Melville", 86_040),
    ]
    .into_iter()
    .map(|(id, title, author, duration)| Book {
        id: BookId::new(id),
        title: title.to_string(),
        author: author.to_string(),
        cover_url: None,
        duration,
    })
    .collect()
}
