use anyhow::Result;
use std::ffi::CString;
use tracing::Level;

/// Set up logging based on the verbose flag. Diagnostics go to stderr so
/// they never mix with the report on stdout.
pub fn setup_logger(verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(get_log_level(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

/// Get the appropriate log level for the verbose flag
pub fn get_log_level(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

/// Format a fatal error the way it is printed on stderr
pub fn format_error(message: &str) -> String {
    format!("ERROR: {message}")
}

/// Report a fatal error: syslog when running unattended, stderr otherwise
pub fn log_error(client_name: &str, message: &str, use_syslog: bool) {
    tracing::debug!(use_syslog, "fatal: {}", message);
    if use_syslog {
        write_syslog(client_name, message);
    } else {
        eprintln!("{}", format_error(message));
    }
}

/// Interior NUL bytes would truncate the C string, so they are replaced
fn to_c_string(text: &str) -> CString {
    CString::new(text.replace('\0', " ")).unwrap_or_default()
}

fn write_syslog(ident: &str, message: &str) {
    let ident = to_c_string(ident);
    let format = to_c_string("%s");
    let message = to_c_string(message);

    // SAFETY: all pointers are valid NUL-terminated strings that outlive the
    // openlog/closelog pair, and the format string consumes exactly one argument.
    unsafe {
        libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_USER);
        libc::syslog(libc::LOG_ERR, format.as_ptr(), message.as_ptr());
        libc::closelog();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_at(level: Level) -> (CaptureWriter, impl tracing::Subscriber + Send + Sync) {
        let capture = CaptureWriter::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(move || writer.clone())
            .with_target(false)
            .finish();
        (capture, subscriber)
    }

    #[test]
    fn test_fatal_error_goes_to_syslog_only() {
        let (capture, subscriber) = capture_at(get_log_level(false));
        tracing::subscriber::with_default(subscriber, || {
            log_error("CloudWatch-PutInstanceData", "disk path is not specified", true);
        });
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fatal_error_is_printed_once_on_stderr() {
        let (capture, subscriber) = capture_at(get_log_level(false));
        tracing::subscriber::with_default(subscriber, || {
            log_error("CloudWatch-PutInstanceData", "disk path is not specified", false);
        });
        assert!(capture.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fatal_error_traced_when_verbose() {
        let (capture, subscriber) = capture_at(get_log_level(true));
        tracing::subscriber::with_default(subscriber, || {
            log_error("CloudWatch-GetInstanceStats", "Cannot obtain EC2 metadata.", false);
        });
        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Cannot obtain EC2 metadata."));
    }

    #[test]
    fn test_get_log_level() {
        assert_eq!(get_log_level(false), Level::WARN);
        assert_eq!(get_log_level(true), Level::DEBUG);
    }

    #[test]
    fn test_format_error() {
        assert_eq!(format_error("Cannot obtain EC2 metadata."), "ERROR: Cannot obtain EC2 metadata.");
    }

    #[test]
    fn test_c_string_strips_nul() {
        assert_eq!(to_c_string("a\0b").to_str().unwrap(), "a b");
    }
}
