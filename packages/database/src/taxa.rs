//! Taxon lookups.

use std::collections::BTreeMap;

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::Database;
use vespawatch_database_models::TaxonRow;

use crate::DbError;

/// Returns every taxon with its iNaturalist pull IDs.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_taxa(db: &dyn Database) -> Result<Vec<TaxonRow>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT t.id, t.name, t.vernacular_name, t.is_target,
                    t.inaturalist_push_taxon_id,
                    string_agg(p.inaturalist_taxon_id::TEXT, ',') AS pull_ids
             FROM taxa t
             LEFT JOIN taxon_pull_ids p ON p.taxon_id = t.id
             GROUP BY t.id
             ORDER BY t.id",
            &[],
        )
        .await?;

    let mut taxa = Vec::with_capacity(rows.len());
    for row in &rows {
        let pull_ids: Option<String> = row.to_value("pull_ids").unwrap_or(None);
        taxa.push(TaxonRow {
            id: row.to_value("id").unwrap_or(0),
            name: row.to_value("name").unwrap_or_default(),
            vernacular_name: row.to_value("vernacular_name").unwrap_or_default(),
            is_target: row.to_value("is_target").unwrap_or(false),
            inaturalist_push_taxon_id: row.to_value("inaturalist_push_taxon_id").unwrap_or(None),
            inaturalist_pull_taxon_ids: pull_ids
                .as_deref()
                .map(parse_id_list)
                .unwrap_or_default(),
        });
    }

    Ok(taxa)
}

fn parse_id_list(s: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = s.split(',').filter_map(|p| p.trim().parse().ok()).collect();
    ids.sort_unstable();
    ids
}

/// Maps each iNaturalist pull taxon ID to the local taxon it reconciles to.
#[must_use]
pub fn pull_index(taxa: &[TaxonRow]) -> BTreeMap<i64, &TaxonRow> {
    taxa.iter()
        .flat_map(|t| t.inaturalist_pull_taxon_ids.iter().map(move |&id| (id, t)))
        .collect()
}

/// Returns every pull taxon ID across all taxa.
#[must_use]
pub fn all_pull_ids(taxa: &[TaxonRow]) -> Vec<i64> {
    pull_index(taxa).into_keys().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxa() -> Vec<TaxonRow> {
        vec![
            TaxonRow {
                id: 1,
                name: "Vespa velutina".to_string(),
                vernacular_name: "Asian hornet".to_string(),
                is_target: true,
                inaturalist_push_taxon_id: Some(119_019),
                inaturalist_pull_taxon_ids: vec![119_019, 560_197],
            },
            TaxonRow {
                id: 2,
                name: "Vespa crabro".to_string(),
                vernacular_name: "European hornet".to_string(),
                is_target: false,
                inaturalist_push_taxon_id: Some(54_327),
                inaturalist_pull_taxon_ids: vec![54_327],
            },
        ]
    }

    #[test]
    fn pull_ids_reconcile_to_local_taxon() {
        let taxa = taxa();
        let index = pull_index(&taxa);
        assert_eq!(index.get(&560_197).map(|t| t.id), Some(1));
        assert_eq!(index.get(&54_327).map(|t| t.id), Some(2));
        assert!(!index.contains_key(&1));
    }

    #[test]
    fn all_pull_ids_sorted() {
        assert_eq!(all_pull_ids(&taxa()), vec![54_327, 119_019, 560_197]);
    }

    #[test]
    fn parses_aggregated_ids() {
        assert_eq!(parse_id_list("560197,119019"), vec![119_019, 560_197]);
        assert!(parse_id_list("").is_empty());
    }
}
