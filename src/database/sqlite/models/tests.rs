use super::*;
use chrono::Utc;

const FINGERPRINT: &str = "5f2b";

fn document(status: DocumentStatus, total: i64, committed: i64) -> Document {
    let now = Utc::now().naive_utc();
    Document {
        id: 1,
        namespace: "ns1".to_string(),
        name: "notes.md".to_string(),
        status,
        total_chunks: total,
        committed_chunks: committed,
        content_fingerprint: Some(FINGERPRINT.to_string()),
        error_message: None,
        created_date: now,
        updated_date: now,
    }
}

#[test]
fn status_display_and_storage_names() {
    assert_eq!(DocumentStatus::Indexing.to_string(), "Indexing");
    assert_eq!(DocumentStatus::Failed.as_str(), "failed");
    assert_eq!(DocumentStatus::Completed.as_str(), "completed");
}

#[test]
fn progress_percent() {
    assert_eq!(document(DocumentStatus::Indexing, 250, 100).progress_percent(), 40);
    assert_eq!(document(DocumentStatus::Completed, 3, 3).progress_percent(), 100);
    assert_eq!(document(DocumentStatus::Completed, 0, 0).progress_percent(), 100);
    assert_eq!(document(DocumentStatus::Pending, 0, 0).progress_percent(), 0);
}

#[test]
fn resume_offset_requires_interrupted_attempt_over_same_chunks() {
    let failed = document(DocumentStatus::Failed, 250, 100);
    assert_eq!(failed.resume_offset(250, FINGERPRINT), Some(100));
    assert_eq!(
        document(DocumentStatus::Indexing, 250, 200).resume_offset(250, FINGERPRINT),
        Some(200)
    );
    // A resumed attempt that died before its first batch
    assert_eq!(
        document(DocumentStatus::Pending, 250, 100).resume_offset(250, FINGERPRINT),
        Some(100)
    );

    // Different chunk count or edited content: the cursor no longer lines up
    assert_eq!(failed.resume_offset(300, FINGERPRINT), None);
    assert_eq!(failed.resume_offset(250, "9c01"), None);
    // Nothing to skip, or nothing left
    assert_eq!(
        document(DocumentStatus::Failed, 250, 0).resume_offset(250, FINGERPRINT),
        None
    );
    assert_eq!(
        document(DocumentStatus::Completed, 250, 250).resume_offset(250, FINGERPRINT),
        None
    );
}

#[test]
fn entries_without_fingerprint_never_resume() {
    let legacy = Document {
        content_fingerprint: None,
        ..document(DocumentStatus::Failed, 250, 100)
    };
    assert_eq!(legacy.resume_offset(250, FINGERPRINT), None);
}

#[test]
fn statistics_total() {
    let stats = RegistryStatistics {
        pending: 1,
        indexing: 2,
        completed: 3,
        failed: 4,
        committed_chunks: 0,
    };
    assert_eq!(stats.total_documents(), 10);
}
