use log::{LevelFilter, Log, Metadata, Record};

/// Writes `[level][target] message` lines to stderr so script output on stdout
/// stays clean.
pub struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("{}", format_record(record));
        }
    }

    fn flush(&self) {}
}

fn format_record(record: &Record) -> String {
    format!(
        "[{level}][{target}] {message}",
        level = record.level(),
        target = record.target(),
        message = record.args()
    )
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    static LOGGER: SimpleLogger = SimpleLogger;
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_record() {
        let line = format_record(
            &Record::builder()
                .args(format_args!("firing task {}", 3))
                .level(log::Level::Debug)
                .target("tasks")
                .build(),
        );
        assert_eq!(line, "[DEBUG][tasks] firing task 3");
    }
}
