use std::collections::BTreeMap;

use storage_core::StorageConfig;
use table_client::value::parse_datetime;
use table_client::{PropertyValue, TableClient, TableRecord};

use super::{split_assignment, transport};
use crate::config::InsertArgs;
use crate::error::CliError;

pub async fn run(settings: &StorageConfig, args: InsertArgs) -> Result<(), CliError> {
    let record = build_record(&args)?;
    let client = TableClient::new(transport(settings)?);
    client.insert(&args.table, &args.partition_key, &record).await?;
    println!("{}", record.row_key());
    Ok(())
}

fn build_record(args: &InsertArgs) -> Result<TableRecord, CliError> {
    let mut properties = BTreeMap::new();
    for raw in &args.props {
        let (name, value) = split_assignment("--prop", raw)?;
        properties.insert(name, PropertyValue::String(value));
    }
    for raw in &args.datetimes {
        let (name, value) = split_assignment("--datetime", raw)?;
        properties.insert(name, PropertyValue::DateTime(parse_datetime(&value)?));
    }
    Ok(match &args.row_key {
        Some(rk) => TableRecord::with_row_key(rk.clone(), properties),
        None => TableRecord::new(properties),
    })
}
