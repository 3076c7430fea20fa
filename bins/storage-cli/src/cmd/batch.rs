use storage_core::StorageConfig;
use table_client::batch::MAX_BATCH_OPERATIONS;
use table_client::{TableClient, TableRecord};

use super::transport;
use crate::config::BatchArgs;
use crate::error::CliError;

/// Reads every record first, then submits them in batches of at most
/// `MAX_BATCH_OPERATIONS`. Each batch is atomic; batches are not.
pub async fn run(settings: &StorageConfig, args: BatchArgs) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(&args.file).await.map_err(|source| CliError::Io {
        path: args.file.clone(),
        source,
    })?;
    let records = parse_records(&args.file, &content)?;
    if records.is_empty() {
        return Err(CliError::Input {
            path: args.file.clone(),
            line: 0,
            detail: "no records".into(),
        });
    }

    let client = TableClient::new(transport(settings)?);
    for (n, chunk) in records.chunks(MAX_BATCH_OPERATIONS).enumerate() {
        client.insert_batch(&args.table, &args.partition_key, chunk).await?;
        tracing::info!(batch = n + 1, records = chunk.len(), "batch committed");
    }
    println!("{}", records.len());
    Ok(())
}

/// One JSON record per non-blank line.
fn parse_records(path: &str, content: &str) -> Result<Vec<TableRecord>, CliError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| CliError::Input {
                path: path.to_string(),
                line: i + 1,
                detail: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use table_client::PropertyValue;

    use super::*;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let content = r#"{"row_key":"a","properties":{"Name":{"string":"x"}}}

{"properties":{"At":{"date_time":"2020-01-01T00:00:00Z"}}}
"#;
        let records = parse_records("in.jsonl", content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_key(), "a");
        assert_eq!(records[0].get("Name"), Some(&PropertyValue::from("x")));
        assert!(records[1].get("At").and_then(PropertyValue::as_datetime).is_some());
        assert!(!records[1].row_key().is_empty());
    }

    #[test]
    fn reports_failing_line() {
        let err = parse_records("in.jsonl", "{\"row_key\":\"a\"}\nnot json\n").unwrap_err();
        assert!(matches!(err, CliError::Input { line: 2, .. }));
    }
}
