use crate::odbc::{ConnectOptions, Error};
use std::time::Instant;

const TARGET: &str = "async_odbc::statement";

/// Logs one statement execution at the configured level, or at the slow
/// statement level once it exceeds the threshold.
pub(crate) struct StatementLogger<'a> {
    sql: &'a str,
    options: &'a ConnectOptions,
    connection_id: u64,
    started: Instant,
}

impl<'a> StatementLogger<'a> {
    pub(crate) fn new(sql: &'a str, options: &'a ConnectOptions, connection_id: u64) -> Self {
        Self {
            sql,
            options,
            connection_id,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish(&self, rows_affected: u64, rows_returned: usize) {
        self.emit(format_args!(
            "rows affected: {rows_affected}, rows returned: {rows_returned}"
        ));
    }

    pub(crate) fn fail(&self, error: &Error) {
        self.emit(format_args!("failed: {error}"));
    }

    fn emit(&self, outcome: std::fmt::Arguments<'_>) {
        let elapsed = self.started.elapsed();
        let (slow_level, slow_threshold) = self.options.log_slow_statements;
        let slow = elapsed >= slow_threshold;
        let level = if slow {
            slow_level
        } else {
            self.options.statement_level()
        };

        let Some(level) = level.to_level() else {
            return;
        };
        if !log::log_enabled!(target: TARGET, level) {
            return;
        }

        log::log!(
            target: TARGET,
            level,
            "[conn {}] {}{}; {outcome}, elapsed: {elapsed:.3?}",
            self.connection_id,
            if slow { "slow statement: " } else { "" },
            summarize(self.sql),
        );
    }
}

/// Collapse whitespace and cut long statements for the log line.
fn summarize(sql: &str) -> String {
    const MAX_CHARS: usize = 200;
    let mut summary = String::with_capacity(sql.len().min(MAX_CHARS));
    for (i, word) in sql.split_whitespace().enumerate() {
        if i > 0 {
            summary.push(' ');
        }
        summary.push_str(word);
    }
    if summary.chars().count() > MAX_CHARS {
        let cut: String = summary.chars().take(MAX_CHARS).collect();
        return format!("{cut}…");
    }
    summary
}
