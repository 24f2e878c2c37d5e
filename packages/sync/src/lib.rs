#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Two-way observation sync with iNaturalist.
//!
//! Pull walks the iNaturalist observations of every tracked taxon in
//! ascending ID order and upserts them by `inaturalist_id`. Observations that
//! were pushed from here only get their community identification refreshed.
//! Push creates or updates the remote copy of every locally created
//! observation. A failing record is logged and skipped; records already
//! written stay written.

pub mod convert;
pub mod progress;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use switchy_database::Database;
use vespawatch_database::{observations, pictures, taxa};
use vespawatch_database_models::{ObservationQuery, Scope, TaxonRow};
use vespawatch_inaturalist::{InatClient, InatError, parse};
use vespawatch_inaturalist_models::InatObservation;

use crate::progress::ProgressCallback;

/// Errors that can occur during a sync.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] vespawatch_database::DbError),

    /// iNaturalist request failed.
    #[error("iNaturalist error: {0}")]
    Inat(#[from] InatError),

    /// No local taxon pulls the given iNaturalist taxon.
    #[error("No local species matches iNaturalist taxon {inat_taxon_id}")]
    SpeciesMatch {
        /// iNaturalist taxon ID.
        inat_taxon_id: i64,
    },

    /// A pulled observation lacks required data.
    #[error("iNaturalist observation {inaturalist_id}: {message}")]
    Invalid {
        /// iNaturalist observation ID.
        inaturalist_id: i64,
        /// What was missing.
        message: String,
    },
}

/// Counters reported at the end of a sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Observations fetched from iNaturalist.
    pub fetched: u64,
    /// Pulled observations inserted locally.
    pub created: u64,
    /// Pulled observations refreshed locally.
    pub updated: u64,
    /// Locally created observations whose taxon followed the community.
    pub identifications_updated: u64,
    /// Observations created on iNaturalist.
    pub pushed_created: u64,
    /// Observations updated on iNaturalist.
    pub pushed_updated: u64,
    /// Records skipped because they were unusable.
    pub skipped: u64,
    /// Records that failed with an error.
    pub failed: u64,
}

impl SyncStats {
    /// Adds the counters of another run.
    pub const fn merge(&mut self, other: &Self) {
        self.fetched += other.fetched;
        self.created += other.created;
        self.updated += other.updated;
        self.identifications_updated += other.identifications_updated;
        self.pushed_created += other.pushed_created;
        self.pushed_updated += other.pushed_updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {}, created {}, updated {}, identifications updated {}, \
             pushed {} new / {} updated, skipped {}, failed {}",
            self.fetched,
            self.created,
            self.updated,
            self.identifications_updated,
            self.pushed_created,
            self.pushed_updated,
            self.skipped,
            self.failed,
        )
    }
}

/// Outcome of applying one pulled observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullOutcome {
    Created,
    Updated,
    IdentificationUpdated,
    Unchanged,
    Skipped,
}

/// Pulls observations of every tracked taxon from iNaturalist.
///
/// `limit` caps the number of observations fetched.
///
/// # Errors
///
/// Returns [`SyncError`] if the taxa cannot be read or a page cannot be
/// fetched. Per-record failures are counted, not returned.
pub async fn pull(
    db: &dyn Database,
    client: &InatClient,
    limit: Option<u64>,
    progress: Arc<dyn ProgressCallback>,
) -> Result<SyncStats, SyncError> {
    let start = Instant::now();
    let taxa = taxa::list_taxa(db).await?;
    let taxon_ids = taxa::all_pull_ids(&taxa);
    let per_page = client.settings().per_page.max(1);

    log::info!("Pulling iNaturalist observations for taxa {taxon_ids:?}");

    let mut stats = SyncStats::default();
    let mut id_above = 0i64;

    loop {
        let page = client.fetch_page(&taxon_ids, id_above, per_page).await?;
        if stats.fetched == 0 {
            let total = limit.map_or(page.total_results, |l| l.min(page.total_results));
            progress.set_total(total);
        }

        let Some(last) = page.results.last() else {
            break;
        };
        id_above = last.id;

        for obs in &page.results {
            if limit.is_some_and(|l| stats.fetched >= l) {
                break;
            }
            stats.fetched += 1;
            progress.inc(1);

            match apply_pulled(db, client, &taxa, obs).await {
                Ok(PullOutcome::Created) => stats.created += 1,
                Ok(PullOutcome::Updated) => stats.updated += 1,
                Ok(PullOutcome::IdentificationUpdated) => stats.identifications_updated += 1,
                Ok(PullOutcome::Unchanged) => {}
                Ok(PullOutcome::Skipped) => stats.skipped += 1,
                Err(e @ (SyncError::SpeciesMatch { .. } | SyncError::Invalid { .. })) => {
                    log::warn!("Skipping iNaturalist observation {}: {e}", obs.id);
                    stats.skipped += 1;
                }
                Err(e) => {
                    log::error!("Failed to import iNaturalist observation {}: {e}", obs.id);
                    stats.failed += 1;
                }
            }
        }

        progress.set_message(format!("pulled {} observations", stats.fetched));

        if limit.is_some_and(|l| stats.fetched >= l) {
            break;
        }
    }

    progress.finish(format!("Pull complete: {stats}"));
    log::info!(
        "Pull complete: {stats}, took {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

async fn apply_pulled(
    db: &dyn Database,
    client: &InatClient,
    taxa: &[TaxonRow],
    obs: &InatObservation,
) -> Result<PullOutcome, SyncError> {
    let settings = client.settings();

    if let Some(local_id) = parse::vespawatch_id(obs, settings.vespawatch_id_field_id) {
        let local = match observations::find_by_inaturalist_id(db, obs.id).await? {
            Some(local) => local,
            None => {
                let Some(local) = observations::get_observation(db, local_id, Scope::Everything)
                    .await?
                    .filter(|o| o.originates_in_vespawatch && o.inaturalist_id.is_none())
                else {
                    log::debug!(
                        "iNaturalist observation {} points to missing local observation {local_id}",
                        obs.id
                    );
                    return Ok(PullOutcome::Skipped);
                };
                observations::set_inaturalist_id(db, local.id, obs.id).await?;
                local
            }
        };

        let new_taxon = convert::community_taxon_change(&local, obs, taxa)?;
        let species = obs.taxon.as_ref().and_then(|t| t.name.as_deref());
        let confirmed = convert::target_confirmed(taxa, obs);

        observations::update_inaturalist_identification(db, local.id, new_taxon, species, confirmed)
            .await?;

        return Ok(if new_taxon.is_some() {
            log::info!(
                "Observation {} follows community identification of iNaturalist {}",
                local.id,
                obs.id
            );
            PullOutcome::IdentificationUpdated
        } else {
            PullOutcome::Unchanged
        });
    }

    let new = convert::to_new_observation(obs, taxa, settings)?;
    let (id, inserted) = observations::upsert_inaturalist_observation(db, &new).await?;

    for photo in &obs.photos {
        if let Some(url) = photo.medium_url() {
            pictures::add_remote_picture(db, new.kind, id, &url).await?;
        }
    }

    Ok(if inserted {
        PullOutcome::Created
    } else {
        PullOutcome::Updated
    })
}

/// Pushes every locally created observation to iNaturalist.
///
/// Requires an authenticated client.
///
/// # Errors
///
/// Returns [`SyncError`] if the local observations cannot be read.
/// Per-record failures are counted, not returned.
pub async fn push(
    db: &dyn Database,
    client: &InatClient,
    progress: Arc<dyn ProgressCallback>,
) -> Result<SyncStats, SyncError> {
    let start = Instant::now();
    let taxa = taxa::list_taxa(db).await?;
    let query = ObservationQuery {
        originates_in_vespawatch: Some(true),
        ..ObservationQuery::default()
    };
    let local = observations::list_observations(db, &query, Scope::Everything).await?;

    log::info!("Pushing {} local observations to iNaturalist", local.len());
    progress.set_total(local.len() as u64);

    let mut stats = SyncStats::default();

    for row in &local {
        progress.inc(1);

        let result = match row.inaturalist_id {
            None => {
                let payload = convert::to_push_observation(row, &taxa, client.settings(), true);
                match client.create_observation(&payload).await {
                    Ok(inat_id) => observations::set_inaturalist_id(db, row.id, inat_id)
                        .await
                        .map(|()| {
                            log::debug!("Created iNaturalist observation {inat_id} for {}", row.id);
                            stats.pushed_created += 1;
                        })
                        .map_err(SyncError::from),
                    Err(e) => Err(e.into()),
                }
            }
            Some(inat_id) => {
                let payload = convert::to_push_observation(row, &taxa, client.settings(), false);
                client
                    .update_observation(inat_id, &payload)
                    .await
                    .map(|()| stats.pushed_updated += 1)
                    .map_err(SyncError::from)
            }
        };

        if let Err(e) = result {
            log::error!("Failed to push observation {}: {e}", row.id);
            stats.failed += 1;
        }
    }

    progress.finish(format!("Push complete: {stats}"));
    log::info!(
        "Push complete: {stats}, took {:.1}s",
        start.elapsed().as_secs_f64()
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_merge_and_display() {
        let mut total = SyncStats {
            fetched: 10,
            created: 4,
            ..SyncStats::default()
        };
        total.merge(&SyncStats {
            pushed_created: 2,
            failed: 1,
            ..SyncStats::default()
        });

        assert_eq!(total.fetched, 10);
        assert_eq!(total.pushed_created, 2);
        assert_eq!(total.failed, 1);
        let text = total.to_string();
        assert!(text.contains("fetched 10"));
        assert!(text.contains("pushed 2 new / 0 updated"));
    }
}
