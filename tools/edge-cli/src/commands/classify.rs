//! Request classification.

use anyhow::Result;
use edge_cache::{PartitionSet, RequestClassifier, ResourceClass, Strategy};
use edge_core::{Destination, FetchRequest, Url};
use serde::Serialize;

use super::ClassifyArgs;
use crate::context::Context;

#[derive(Debug, Serialize)]
struct Classification {
    url: String,
    class: ResourceClass,
    strategy: Strategy,
    partition: String,
}

/// Run the classify command.
pub async fn run(args: ClassifyArgs, ctx: &Context) -> Result<()> {
    let destination: Destination = args.destination.parse()?;
    let classifier = RequestClassifier::from_config(&ctx.config.worker);
    let partitions = PartitionSet::from_config(&ctx.config.worker);
    let origin = ctx.config.worker.origin_url().or_else(|| ctx.origin(None).ok());

    let results = classify_all(&classifier, &partitions, origin.as_ref(), &args.urls, destination);

    if ctx.output.is_json() {
        ctx.output.json(&results);
        return Ok(());
    }

    ctx.output.header("Classification");
    let widths = [8, 24, 20];
    ctx.output.table_row(&["CLASS", "STRATEGY", "PARTITION", "URL"], &widths);
    for result in &results {
        ctx.output.table_row(
            &[
                result.class.as_str(),
                result.strategy.as_str(),
                result.partition.as_str(),
                result.url.as_str(),
            ],
            &widths,
        );
    }

    Ok(())
}

fn classify_all(
    classifier: &RequestClassifier,
    partitions: &PartitionSet,
    origin: Option<&Url>,
    urls: &[String],
    destination: Destination,
) -> Vec<Classification> {
    urls.iter()
        .map(|url| {
            let mut request = FetchRequest::get(url.as_str()).with_destination(destination);
            if let Some(origin) = origin {
                request = request.scoped_to(origin);
            }
            let class = classifier.classify(&request);
            Classification {
                url: url.clone(),
                class,
                strategy: class.strategy(),
                partition: partitions.for_class(class).to_string(),
            }
        })
        .collect()
}
