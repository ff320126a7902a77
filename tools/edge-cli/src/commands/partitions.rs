//! Partition whitelist for a worker version.

use anyhow::Result;
use edge_cache::{PartitionSet, ResourceClass};

use super::PartitionsArgs;
use crate::context::Context;

/// Run the partitions command.
pub async fn run(args: PartitionsArgs, ctx: &Context) -> Result<()> {
    let mut worker = ctx.config.worker.clone();
    if let Some(version) = args.version {
        worker.version = version;
    }
    worker.validate()?;

    let partitions = PartitionSet::from_config(&worker);

    if ctx.output.is_json() {
        ctx.output.json(&partitions);
        return Ok(());
    }

    ctx.output.header(&format!("Partitions for version {}", worker.version));
    for class in ResourceClass::ALL {
        ctx.output.kv(class.as_str(), partitions.for_class(class));
    }

    ctx.output.info("");
    ctx.output
        .info("Any other partition is deleted on activation and by the periodic sweep.");

    Ok(())
}
