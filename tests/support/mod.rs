use bookshelf::catalog::Catalog;
use bookshelf::config::Config;
use bookshelf::playback::ServiceHost;
use bookshelf::test_support::book;
use std::sync::Arc;
use std::time::Duration;

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[allow(unused)] // Used in tests
pub const TICK: Duration = Duration::from_millis(10);

/// Host whose service knows book-1 (10 minutes) and book-7 (1 hour)
pub fn test_host() -> (ServiceHost, Catalog) {
    tracing_init();
    let catalog = Catalog::new(vec![book("book-1", 600), book("book-7", 3600)]);
    let config = Config {
        progress_interval: TICK,
        ..Config::default()
    };
    let host = ServiceHost::new(
        &config,
        Arc::new(catalog.clone()),
        tokio::runtime::Handle::current(),
    );
    (host, catalog)
}
