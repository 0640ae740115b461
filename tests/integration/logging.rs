//! Integration tests for logging and tracing

use serde_json::json;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use srcom_dump::output::{self, OutputFormat};

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_crate_events_reach_subscriber() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("srcom_dump=info"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let records = vec![json!({"id": "a", "times": {"primary_t": 1.5}})];
    let mut buf = Vec::new();
    tracing::subscriber::with_default(subscriber, || {
        output::write_to(&records, OutputFormat::Csv, &mut buf).unwrap();
    });

    let csv = String::from_utf8(buf).unwrap();
    assert!(csv.starts_with("id,times_primary_t"));

    let logged = logs.contents();
    assert!(logged.contains("INFO"), "{logged}");
    assert!(logged.contains("srcom_dump::output::csv"), "{logged}");
    assert!(logged.contains("Writing a CSV with headers id, times_primary_t"), "{logged}");
}
