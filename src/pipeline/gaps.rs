// Gap recalculation — rewrite every region's stored gap from its scores.

use anyhow::Result;
use tracing::{debug, info};

use crate::db::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcOutcome {
    /// The store has no regions.
    Empty,
    /// Number of regions whose gap was written back.
    Updated(usize),
}

/// Recompute and persist the gap of every stored region.
pub async fn recalculate_all(db: &dyn Database) -> Result<RecalcOutcome> {
    let regions = db.list_regions().await?;
    if regions.is_empty() {
        return Ok(RecalcOutcome::Empty);
    }

    let mut updated = 0;
    for mut region in regions {
        let gap = region.recalculate();
        if db.update_gap(&region.region_name, gap).await? {
            updated += 1;
        }
        debug!(region = %region.region_name, gap, "Recalculated gap");
    }

    info!(updated, "Gap recalculation complete");
    Ok(RecalcOutcome::Updated(updated))
}
