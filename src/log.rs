use slog::{o, Discard, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, TermDecorator};

/// Terminal logger for one part of the acquisition stack.
pub fn create_logger(for_module: &str) -> Logger {
    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator)
        .use_utc_timestamp()
        .use_original_order()
        .build()
        .fuse();
    let async_drain = Async::new(drain).build().fuse();
    Logger::root(
        async_drain,
        o!("component" => "EcgCore", "module" => for_module.to_string()),
    )
}

/// Resolves an optional caller-supplied logger, discarding records when none is given.
pub(crate) fn or_discard(log: Option<Logger>) -> Logger {
    log.unwrap_or_else(|| Logger::root(Discard, o!()))
}
