/// Logs a line tagged with the component that produced it.
/// Usage:
/// ```ignore
/// agent_log!(Level::Info, "identity", "volume {} on {}", vol, dev);
/// agent_log!(Level::Warn, "exporter", "poll skipped: {}", err);
/// ```
/// Timestamp, level, pid and tid are added by the fern dispatcher, so a line
/// ends up as:
/// [2025-04-25T16:32:10+02:00][WARN ][agent::exporter][pid=4568][tid=ThreadId(3)] [exporter] poll skipped: …
#[macro_export]
macro_rules! agent_log {
    ($level:expr, $component:expr, $($arg:tt)+) => {
        log::log!(
            $level,
            "[{}] {}",
            $component,
            format_args!($($arg)+)
        )
    };
}
