use super::*;
use std::sync::Arc;
use tempfile::TempDir;

async fn setup_test_log() -> (CsvUsageLog, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let log = CsvUsageLog::open(temp_dir.path().join("usage_log.csv")).await.unwrap();
    (log, temp_dir)
}

#[tokio::test]
async fn test_open_writes_header_once() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested/dir/usage_log.csv");

    let log = CsvUsageLog::open(&path).await.unwrap();
    log.append(UsageRecord::new("k", "free", "q", "r"));
    log.flush().await;
    drop(log);

    // Reopening must not write a second header
    let log = CsvUsageLog::open(&path).await.unwrap();
    log.flush().await;

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with(USAGE_LOG_HEADER));
    assert_eq!(raw.matches("timestamp,apiKey").count(), 1);
    assert_eq!(log.summarize().await.unwrap().total_requests, 1);
}

#[tokio::test]
async fn test_summarize_empty_log() {
    let (log, _temp_dir) = setup_test_log().await;
    let summary = log.summarize().await.unwrap();
    assert_eq!(summary.total_requests, 0);
    assert!(summary.counts_by_tier.is_empty());
}

#[tokio::test]
async fn test_summarize_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let summary = usage_log::summarize_file(&temp_dir.path().join("absent.csv"))
        .await
        .unwrap();
    assert_eq!(summary, UsageSummary::default());
}

#[tokio::test]
async fn test_summarize_counts_by_tier() {
    let (log, _temp_dir) = setup_test_log().await;
    log.append(UsageRecord::new("atlas-demo-key", "free", "q1", "r1"));
    log.append(UsageRecord::new("atlas-demo-key", "free", "q2", "r2"));
    log.append(UsageRecord::new("atlas-paid-key", "paid", "q3", "r3"));
    log.flush().await;

    let summary = log.summarize().await.unwrap();
    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.counts_by_tier.get("free"), Some(&2));
    assert_eq!(summary.counts_by_tier.get("paid"), Some(&1));

    // Summarizing again without appends gives the same answer
    assert_eq!(log.summarize().await.unwrap(), summary);
}

#[tokio::test]
async fn test_reply_with_quotes_round_trips() {
    let (log, _temp_dir) = setup_test_log().await;
    let question = "Is the \"premium\" oil, like, worth it?";
    let reply = "We use \"full synthetic\" oil,\nand \"\" is just two quotes.";
    log.append(UsageRecord::new("atlas-demo-key", "free", question, reply));
    log.append(UsageRecord::new("atlas-demo-key", "free", "next", "row"));
    log.flush().await;

    let raw = std::fs::read_to_string(log.path()).unwrap();
    let rows = csv::parse(&raw).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][3], question);
    assert_eq!(rows[1][4], reply);
    // The following row is intact
    assert_eq!(rows[2][3], "next");
    assert_eq!(rows[2][4], "row");
}

#[tokio::test]
async fn test_timestamp_is_iso8601() {
    let (log, _temp_dir) = setup_test_log().await;
    log.append(UsageRecord::new("k", "free", "q", "r"));
    log.flush().await;

    let raw = std::fs::read_to_string(log.path()).unwrap();
    let rows = csv::parse(&raw).unwrap();
    let parsed = chrono::DateTime::parse_from_rfc3339(&rows[1][0]).unwrap();
    assert_eq!(parsed.offset().local_minus_utc(), 0);
    assert!(rows[1][0].ends_with('Z'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_do_not_interleave() {
    let (log, _temp_dir) = setup_test_log().await;
    let log = Arc::new(log);
    let mut handles = vec![];

    for i in 0..50 {
        let log = Arc::clone(&log);
        handles.push(tokio::spawn(async move {
            let reply = format!("reply {} {}", i, "x".repeat(500));
            log.append(UsageRecord::new("k", "free", &format!("question {}", i), &reply));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    log.flush().await;

    let raw = std::fs::read_to_string(log.path()).unwrap();
    let rows = csv::parse(&raw).unwrap();
    assert_eq!(rows.len(), 51);
    for row in rows.iter().skip(1) {
        assert_eq!(row.len(), 5);
        let n = row[3].strip_prefix("question ").unwrap();
        assert!(row[4].starts_with(&format!("reply {} ", n)));
    }
}

#[tokio::test]
async fn test_torn_row_does_not_break_later_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("usage_log.csv");

    // Header, one good row, then a row cut off mid-field
    let good = UsageRecord::new("atlas-demo-key", "free", "Do you rotate tires?", "Yes.");
    let torn = UsageRecord::new("atlas-paid-key", "paid", "Do you do brake work?", "Yes.");
    let mut contents = String::from(USAGE_LOG_HEADER);
    contents.push_str(&good.to_csv_row());
    contents.push_str(&torn.to_csv_row()[..40]);
    std::fs::write(&path, contents).unwrap();

    let log = CsvUsageLog::open(&path).await.unwrap();
    log.append(UsageRecord::new("atlas-paid-key", "paid", "When do you open?", "At 9."));
    log.flush().await;

    let summary = log.summarize().await.unwrap();
    assert_eq!(summary.total_requests, 2);
    assert_eq!(summary.counts_by_tier.get("free"), Some(&1));
    assert_eq!(summary.counts_by_tier.get("paid"), Some(&1));

    // The appended row landed on its own line, intact
    let raw = std::fs::read_to_string(&path).unwrap();
    let (rows, errors) = csv::parse_lossy(&raw);
    assert_eq!(errors.len(), 1);
    assert_eq!(rows.last().unwrap()[3], "When do you open?");
}

#[tokio::test]
async fn test_summarize_skips_garbage_lines() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("usage_log.csv");
    let mut contents = String::from(USAGE_LOG_HEADER);
    contents.push_str(&UsageRecord::new("k", "free", "q", "r").to_csv_row());
    contents.push_str("\"broken\"row,here\n");
    contents.push_str(&UsageRecord::new("k", "paid", "q", "r").to_csv_row());
    std::fs::write(&path, contents).unwrap();

    let summary = usage_log::summarize_file(&path).await.unwrap();
    assert_eq!(summary.total_requests, 2);
    // Same answer on a second read
    assert_eq!(usage_log::summarize_file(&path).await.unwrap(), summary);
}
