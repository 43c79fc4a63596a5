use std::fs;

use pretty_assertions::assert_eq;
use subsweep_core::ChannelRecord;
use subsweep_engine::{
    export_filename, parse_records, select_targets, write_export, write_records, CsvError,
    ExportError, CSV_HEADERS,
};
use tempfile::TempDir;

fn record(name: &str, url: &str, unsubscribe: &str) -> ChannelRecord {
    ChannelRecord {
        channel_name: name.to_string(),
        channel_url: url.to_string(),
        subscriber_count: "1K subscribers".to_string(),
        description: "desc".to_string(),
        unsubscribe: unsubscribe.to_string(),
        date_collected: "2024-05-01".to_string(),
    }
}

#[test]
fn header_row_comes_first_and_fields_are_quoted() {
    let text = write_records(&[record("A", "https://v.example/@a", "")]);
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADERS.join(",").as_str()));
    assert_eq!(
        lines.next(),
        Some(r#""A","https://v.example/@a","1K subscribers","desc","","2024-05-01""#)
    );
}

#[test]
fn awkward_text_survives_export_and_import() {
    let records = vec![
        ChannelRecord {
            description: "Line one\nline \"two\", with comma".to_string(),
            ..record("Quote \"Q\"", "https://v.example/@q", "yes")
        },
        ChannelRecord {
            subscriber_count: String::new(),
            description: String::new(),
            ..record("   padded   ", "https://v.example/@p", "")
        },
    ];

    let parsed = parse_records(&write_records(&records)).unwrap();
    assert_eq!(parsed, records);
}

#[test]
fn import_matches_columns_by_name_and_ignores_extras() {
    let text = "\u{feff}unsubscribe,notes,Channel_URL,channel_name\r\n\
                YES,keep me?,https://v.example/@one,One\r\n\
                \r\n\
                ,,https://v.example/@two,Two\r\n";
    let parsed = parse_records(text).unwrap();

    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[0].channel_name, "One");
    assert_eq!(parsed[0].unsubscribe, "YES");
    assert_eq!(parsed[0].description, "");
    assert_eq!(parsed[1].channel_url, "https://v.example/@two");
}

#[test]
fn import_requires_core_columns() {
    assert_eq!(
        parse_records("channel_name,channel_url\nA,https://v.example/@a").unwrap_err(),
        CsvError::MissingColumn("unsubscribe")
    );
    assert_eq!(parse_records("").unwrap_err(), CsvError::Empty);
}

#[test]
fn selection_accepts_only_affirmative_tokens() {
    let records: Vec<ChannelRecord> = ["yes", " Y ", "1", "TRUE", "no", "", "maybe", "0"]
        .iter()
        .enumerate()
        .map(|(i, token)| record(&format!("c{i}"), &format!("https://v.example/@c{i}"), token))
        .collect();

    let names: Vec<String> = select_targets(&records)
        .into_iter()
        .map(|target| target.name)
        .collect();
    assert_eq!(names, vec!["c0", "c1", "c2", "c3"]);
}

#[test]
fn selection_dedupes_by_normalized_url_and_skips_blank_urls() {
    let records = vec![
        record("First", "https://v.example/@dup", "yes"),
        record("Again", "HTTPS://V.EXAMPLE/@dup/", "yes"),
        record("Fragment", "https://v.example/@dup#about", "yes"),
        record("Blank", "  ", "yes"),
        record("Other", "https://v.example/@other", "y"),
    ];

    let targets = select_targets(&records);
    let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["First", "Other"]);
    assert_eq!(targets[0].description.as_deref(), Some("desc"));
}

#[test]
fn selection_keeps_channel_ids_that_differ_only_in_case() {
    let records = vec![
        record("Lower", "https://v.example/channel/UCabcDEF", "yes"),
        record("Upper", "https://v.example/channel/UCABCdef", "yes"),
    ];

    let names: Vec<String> = select_targets(&records)
        .into_iter()
        .map(|target| target.name)
        .collect();
    assert_eq!(names, vec!["Lower", "Upper"]);
}

#[test]
fn export_writes_dated_file_and_replaces_same_day() {
    let temp = TempDir::new().unwrap();
    let first = write_export(temp.path(), &[record("A", "https://v.example/@a", "")], "2024-05-01")
        .unwrap();
    assert_eq!(first.count, 1);
    assert_eq!(
        first.path.file_name().unwrap().to_str(),
        Some(export_filename("2024-05-01").as_str())
    );

    let records = vec![
        record("A", "https://v.example/@a", ""),
        record("B", "https://v.example/@b", ""),
    ];
    let second = write_export(temp.path(), &records, "2024-05-01").unwrap();
    assert_eq!(second.path, first.path);
    assert_eq!(
        parse_records(&fs::read_to_string(&second.path).unwrap()).unwrap(),
        records
    );
}

#[test]
fn export_without_rows_is_refused() {
    let temp = TempDir::new().unwrap();
    assert!(matches!(
        write_export(temp.path(), &[], "2024-05-01"),
        Err(ExportError::NoSubscriptions)
    ));
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
}
