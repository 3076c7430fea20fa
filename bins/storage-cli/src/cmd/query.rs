use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use storage_core::StorageConfig;
use table_client::filter::format_filter;
use table_client::{TableClient, TableQuery, TableRecord};

use super::{filter_arg, transport};
use crate::config::QueryArgs;
use crate::error::CliError;

pub async fn run(settings: &StorageConfig, args: QueryArgs) -> Result<(), CliError> {
    let client = TableClient::new(transport(settings)?);
    let query = build_query(&args)?;

    if !args.all {
        for record in client.query_entities(&args.table, &query).await? {
            print_record(&record)?;
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, stopping after the current page");
            on_signal.cancel();
        }
    });

    let mut pages = client.query_pages(&args.table, query, cancel);
    let mut total = 0usize;
    let outcome = async {
        while let Some(page) = pages.next().await {
            let page = page?;
            total += page.len();
            for record in &page.records {
                print_record(record)?;
            }
        }
        Ok::<_, CliError>(())
    }
    .await;
    watcher.abort();

    tracing::info!(table = %args.table, entities = total, "query finished");
    outcome
}

fn build_query(args: &QueryArgs) -> Result<TableQuery, CliError> {
    let mut query = TableQuery::new();
    match &args.filter {
        Some(template) => {
            let values = args.args.iter().map(|a| filter_arg(a)).collect::<Result<Vec<_>, _>>()?;
            query = query.filter(format_filter(template, &values)?);
        }
        None if !args.args.is_empty() => {
            return Err(CliError::Argument {
                arg: "--arg",
                detail: "given without --filter".into(),
            });
        }
        None => {}
    }
    if let Some(top) = args.top {
        query = query.top(top);
    }
    if !args.select.is_empty() {
        query = query.select(&args.select);
    }
    Ok(query)
}

fn print_record(record: &TableRecord) -> Result<(), CliError> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}
