//! Credit-card statement import

use tracing::info;

use super::{begin_write, commit_write, Database};
use crate::error::{Error, Result};
use crate::import::stamp_statement_rows;
use crate::models::{ImportSummary, NewTransaction};
use crate::reconcile::BillingCycle;

impl Database {
    /// Insert a parsed statement as pending rows of one billing cycle
    ///
    /// The cycle defaults to the month of the most recent row. All rows are
    /// written in one transaction; rows already imported (same hash) are skipped.
    pub fn import_statement(
        &self,
        owner_id: &str,
        cycle: Option<BillingCycle>,
        rows: &[NewTransaction],
    ) -> Result<ImportSummary> {
        let cycle = match cycle {
            Some(cycle) => cycle,
            None => rows
                .iter()
                .map(|r| r.date)
                .max()
                .map(BillingCycle::of)
                .ok_or_else(|| Error::Import("Statement has no rows".to_string()))?,
        };

        let stamped = stamp_statement_rows(owner_id, cycle, rows);

        let mut conn = self.conn()?;
        let tx = begin_write(&mut conn)?;

        let mut imported = 0;
        let mut skipped = 0;
        for row in &stamped {
            match Self::insert_transaction_with_conn(&tx, owner_id, row)? {
                Some(_) => imported += 1,
                None => skipped += 1,
            }
        }

        commit_write(tx)?;

        info!(
            owner = owner_id,
            cycle = %cycle,
            imported,
            skipped,
            "Imported statement"
        );

        Ok(ImportSummary {
            billing_cycle: cycle,
            imported,
            skipped,
        })
    }
}
