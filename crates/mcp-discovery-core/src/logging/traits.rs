//! Logger trait definition

/// Logger abstraction for runtime-agnostic logging
///
/// Implementations:
/// - `NoOpLogger`: Silent logger for testing
/// - `ConsoleLogger`: Logs to stdout/stderr
/// - `FileLogger`: Appends to a file
///
/// Components take an `Arc<dyn Logger>` at construction and prefix their
/// messages with their own name, e.g. `[ToolExecutionProxy] ...`.
pub trait Logger: Send + Sync {
    fn debug(&self, message: &str);

    fn info(&self, message: &str);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

/// Convenience macros for logging
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
    }

    impl Logger for Recorder {
        fn debug(&self, message: &str) {
            self.lines.lock().push(format!("debug {}", message));
        }
        fn info(&self, message: &str) {
            self.lines.lock().push(format!("info {}", message));
        }
        fn warn(&self, message: &str) {
            self.lines.lock().push(format!("warn {}", message));
        }
        fn error(&self, message: &str) {
            self.lines.lock().push(format!("error {}", message));
        }
    }

    #[test]
    fn test_macros_format_arguments() {
        let logger = Recorder::default();
        log_debug!(logger, "[Cache] hit {}", "tools:github");
        log_info!(logger, "[Engine] {} servers", 3);
        log_warn!(logger, "[Proxy] {} timed out after {}s", "jira", 30);
        log_error!(logger, "[Proxy] failed");

        assert_eq!(
            *logger.lines.lock(),
            vec![
                "debug [Cache] hit tools:github",
                "info [Engine] 3 servers",
                "warn [Proxy] jira timed out after 30s",
                "error [Proxy] failed",
            ]
        );
    }
}
