use super::*;

#[test]
fn record_id_format() {
    assert_eq!(record_id("notes.pdf", 0), "notes.pdf-0");
    assert_eq!(record_id("notes.pdf", 2), "notes.pdf-2");
    assert_eq!(record_id("Week 3 - Slides.pptx", 41), "Week 3 - Slides.pptx-41");
}

#[test]
fn record_id_is_stable_and_unique_per_ordinal() {
    assert_eq!(record_id("big.docx", 7), record_id("big.docx", 7));

    let ids: std::collections::HashSet<String> =
        (0..250).map(|i| record_id("big.docx", i)).collect();
    assert_eq!(ids.len(), 250);
}

#[test]
fn vector_record_from_chunk() {
    let chunk = Chunk {
        text: "Photosynthesis converts light into chemical energy.".to_string(),
        ordinal: 3,
    };
    let record = VectorRecord::from_chunk("biology.pdf", &chunk, vec![0.1, 0.2]);

    assert_eq!(record.id, "biology.pdf-3");
    assert_eq!(record.metadata.document_name, "biology.pdf");
    assert_eq!(record.metadata.text, chunk.text);
    assert_eq!(record.values, vec![0.1, 0.2]);
    assert_eq!(record.ordinal(), Some(3));
}

#[test]
fn ordinal_handles_dashes_in_document_name() {
    let record = VectorRecord::new("lecture-01-intro.md", 12, "text".to_string(), vec![1.0]);
    assert_eq!(record.id, "lecture-01-intro.md-12");
    assert_eq!(record.ordinal(), Some(12));
}

#[test]
fn record_serializes_with_metadata() {
    let record = VectorRecord::new("a.pdf", 0, "X".to_string(), vec![0.5]);
    let json = serde_json::to_value(&record).expect("record should serialize");
    assert_eq!(json["id"], "a.pdf-0");
    assert_eq!(json["metadata"]["text"], "X");
    assert_eq!(json["metadata"]["document_name"], "a.pdf");
}
