use newsagg_core::{Aggregator, CacheMode, Preferences, RawQuery};

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::{result_document, CommandOutput};

pub async fn run(
    args: &FetchArgs,
    aggregator: &Aggregator,
    mode: CacheMode,
    meta: bool,
) -> Result<CommandOutput, CliError> {
    let mut raw = RawQuery {
        keyword: Some(args.keyword.join(" ")),
        date: args.date.clone(),
        category: args.category.clone(),
        source: args.source.clone(),
    };
    if let Some(path) = &args.preferences {
        raw = Preferences::load(path)?.apply(raw);
    }

    let result = aggregator.fetch_raw_with(&raw, mode).await?;
    let failed = result.failures().count();

    Ok(CommandOutput::ok(result_document(&result, meta)).with_failed_providers(failed))
}
