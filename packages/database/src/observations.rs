//! Observation queries.
//!
//! Individuals and nests share the `observations` table and are told apart
//! by the `kind` column. Zone scoping is a single `PostGIS` containment
//! predicate appended by [`build_observation_query`].

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};
use vespawatch_database_models::{
    NewObservation, ObservationQuery, ObservationRow, ObserverInfo, Scope,
};
use vespawatch_observation_models::{Choice as _, ObservationKind};

use crate::DbError;
use crate::sql::{SqlBuilder, opt_bool, opt_i32, opt_i64, opt_string, utc};

const SELECT_OBSERVATIONS: &str = "SELECT o.id, o.kind, o.taxon_id, t.name AS taxon_name,
        o.location, o.observation_time, o.comments, o.latitude, o.longitude,
        o.zone_id, z.name AS zone_name, o.inaturalist_id, o.inaturalist_species,
        o.inat_vv_confirmed, o.originates_in_vespawatch,
        o.observer_name, o.observer_email, o.observer_phone, o.observer_is_beekeeper,
        o.individual_count, o.behaviour, o.nest_height, o.nest_size, o.duplicate_of_id,
        a.id AS action_id, a.result AS action_result,
        (SELECT string_agg(p.path, ',' ORDER BY p.id) FROM pictures p
          WHERE p.observation_id = o.id) AS picture_paths,
        o.created_at
 FROM observations o
 LEFT JOIN taxa t ON t.id = o.taxon_id
 LEFT JOIN zones z ON z.id = o.zone_id
 LEFT JOIN management_actions a ON a.nest_id = o.id
 WHERE 1=1";

/// Zone lookup for the point bound at `$lon`/`$lat`.
fn zone_for_point(lon: &str, lat: &str) -> String {
    format!(
        "(SELECT z.id FROM zones z
          WHERE ST_Covers(z.mpolygon, ST_SetSRID(ST_MakePoint({lon}, {lat}), 4326))
          ORDER BY z.id LIMIT 1)"
    )
}

/// Appends the access restriction for `scope`.
pub fn apply_scope(builder: &mut SqlBuilder, scope: Scope) {
    match scope {
        Scope::Everything => {}
        Scope::Zone(zone_id) => {
            let p = builder.bind(DatabaseValue::Int64(zone_id));
            builder.push(&format!(
                " AND EXISTS (SELECT 1 FROM zones sz WHERE sz.id = {p}
                   AND ST_Covers(sz.mpolygon, o.point::geometry))"
            ));
        }
    }
}

/// Builds the listing statement for `query` as seen under `scope`.
#[must_use]
pub fn build_observation_query(query: &ObservationQuery, scope: Scope) -> SqlBuilder {
    let mut b = SqlBuilder::new(SELECT_OBSERVATIONS);

    if let Some(kind) = query.kind {
        b.and("o.kind", "=", DatabaseValue::String(kind.code().to_string()));
    }

    if let Some(bbox) = &query.bbox {
        let w = b.bind(DatabaseValue::Real64(bbox.west));
        let s = b.bind(DatabaseValue::Real64(bbox.south));
        let e = b.bind(DatabaseValue::Real64(bbox.east));
        let n = b.bind(DatabaseValue::Real64(bbox.north));
        b.push(&format!(
            " AND o.point && ST_MakeEnvelope({w}, {s}, {e}, {n}, 4326)::geography"
        ));
    }

    if let Some(from) = &query.from {
        b.and(
            "o.observation_time",
            ">=",
            DatabaseValue::DateTime(from.naive_utc()),
        );
    }

    if let Some(to) = &query.to {
        b.and(
            "o.observation_time",
            "<=",
            DatabaseValue::DateTime(to.naive_utc()),
        );
    }

    if query.vv_only {
        b.push(" AND t.is_target = TRUE");
    }

    if query.confirmed_only {
        b.push(" AND o.inat_vv_confirmed = TRUE");
    }

    if let Some(zone_id) = query.zone_id {
        b.and("o.zone_id", "=", DatabaseValue::Int64(zone_id));
    }

    if query.in_any_zone {
        b.push(" AND o.zone_id IS NOT NULL");
    }

    if let Some(originates) = query.originates_in_vespawatch {
        b.and(
            "o.originates_in_vespawatch",
            "=",
            DatabaseValue::Bool(originates),
        );
    }

    apply_scope(&mut b, scope);

    b.push(" ORDER BY o.observation_time DESC, o.id DESC");

    if let Some(limit) = query.limit {
        let p = b.bind(DatabaseValue::Int64(i64::from(limit)));
        b.push(&format!(" LIMIT {p}"));
    }

    if query.offset > 0 {
        let p = b.bind(DatabaseValue::Int64(i64::from(query.offset)));
        b.push(&format!(" OFFSET {p}"));
    }

    b
}

fn parse_code<C: vespawatch_observation_models::Choice>(row: &Row, column: &str) -> Option<C> {
    let code: Option<String> = row.to_value(column).unwrap_or(None);
    code.as_deref().and_then(C::from_code)
}

/// Maps a row selected with the observation column list.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the `kind` column holds an unknown code.
pub fn observation_from_row(row: &Row) -> Result<ObservationRow, DbError> {
    let kind_code: String = row.to_value("kind").unwrap_or_default();
    let kind = ObservationKind::from_code(&kind_code).ok_or_else(|| DbError::Conversion {
        message: format!("Unknown observation kind: {kind_code}"),
    })?;

    let picture_paths: Option<String> = row.to_value("picture_paths").unwrap_or(None);

    Ok(ObservationRow {
        id: row.to_value("id").unwrap_or(0),
        kind,
        taxon_id: row.to_value("taxon_id").unwrap_or(None),
        taxon_name: row.to_value("taxon_name").unwrap_or(None),
        location: row.to_value("location").unwrap_or_default(),
        observation_time: utc(row.to_value("observation_time").unwrap_or_default()),
        comments: row.to_value("comments").unwrap_or_default(),
        latitude: row.to_value("latitude").unwrap_or(0.0),
        longitude: row.to_value("longitude").unwrap_or(0.0),
        zone_id: row.to_value("zone_id").unwrap_or(None),
        zone_name: row.to_value("zone_name").unwrap_or(None),
        inaturalist_id: row.to_value("inaturalist_id").unwrap_or(None),
        inaturalist_species: row.to_value("inaturalist_species").unwrap_or(None),
        inat_vv_confirmed: row.to_value("inat_vv_confirmed").unwrap_or(None),
        originates_in_vespawatch: row.to_value("originates_in_vespawatch").unwrap_or(true),
        observer: ObserverInfo {
            name: row.to_value("observer_name").unwrap_or(None),
            email: row.to_value("observer_email").unwrap_or(None),
            phone: row.to_value("observer_phone").unwrap_or(None),
            is_beekeeper: row.to_value("observer_is_beekeeper").unwrap_or(None),
        },
        individual_count: row.to_value("individual_count").unwrap_or(None),
        behaviour: parse_code(row, "behaviour"),
        nest_height: parse_code(row, "nest_height"),
        nest_size: parse_code(row, "nest_size"),
        duplicate_of_id: row.to_value("duplicate_of_id").unwrap_or(None),
        action_result: parse_code(row, "action_result"),
        action_id: row.to_value("action_id").unwrap_or(None),
        picture_paths: picture_paths
            .map(|p| p.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        created_at: utc(row.to_value("created_at").unwrap_or_default()),
    })
}

/// Queries observations matching `query`, restricted to `scope`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_observations(
    db: &dyn Database,
    query: &ObservationQuery,
    scope: Scope,
) -> Result<Vec<ObservationRow>, DbError> {
    let (sql, params) = build_observation_query(query, scope).into_parts();
    let rows = db.query_raw_params(&sql, &params).await?;

    let mut observations = Vec::with_capacity(rows.len());
    for row in &rows {
        match observation_from_row(row) {
            Ok(obs) => observations.push(obs),
            Err(e) => log::warn!("Skipping unreadable observation row: {e}"),
        }
    }

    Ok(observations)
}

/// Fetches one observation by ID if it is visible under `scope`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_observation(
    db: &dyn Database,
    id: i64,
    scope: Scope,
) -> Result<Option<ObservationRow>, DbError> {
    let mut b = SqlBuilder::new(SELECT_OBSERVATIONS);
    b.and("o.id", "=", DatabaseValue::Int64(id));
    apply_scope(&mut b, scope);

    let rows = db.query_raw_params(b.sql(), b.params()).await?;
    rows.first().map(observation_from_row).transpose()
}

/// Finds the local observation mirroring an iNaturalist observation.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn find_by_inaturalist_id(
    db: &dyn Database,
    inaturalist_id: i64,
) -> Result<Option<ObservationRow>, DbError> {
    let mut b = SqlBuilder::new(SELECT_OBSERVATIONS);
    b.and("o.inaturalist_id", "=", DatabaseValue::Int64(inaturalist_id));

    let rows = db.query_raw_params(b.sql(), b.params()).await?;
    rows.first().map(observation_from_row).transpose()
}

/// Column values `$1..$21` shared by insert, update, and upsert.
fn observation_params(obs: &NewObservation) -> Vec<DatabaseValue> {
    vec![
        DatabaseValue::String(obs.kind.code().to_string()),
        opt_i64(obs.taxon_id),
        DatabaseValue::String(obs.location.clone()),
        DatabaseValue::Real64(obs.latitude),
        DatabaseValue::Real64(obs.longitude),
        DatabaseValue::DateTime(obs.observation_time.naive_utc()),
        DatabaseValue::String(obs.comments.clone()),
        opt_i64(obs.zone_id),
        opt_i64(obs.inaturalist_id),
        opt_string(obs.inaturalist_species.as_deref()),
        opt_bool(obs.inat_vv_confirmed),
        DatabaseValue::Bool(obs.originates_in_vespawatch),
        opt_string(obs.observer.name.as_deref()),
        opt_string(obs.observer.email.as_deref()),
        opt_string(obs.observer.phone.as_deref()),
        opt_bool(obs.observer.is_beekeeper),
        opt_i32(obs.individual_count),
        opt_string(obs.behaviour.map(|b| b.code())),
        opt_string(obs.nest_height.map(|h| h.code())),
        opt_string(obs.nest_size.map(|s| s.code())),
        opt_i64(obs.duplicate_of_id),
    ]
}

fn insert_sql(on_conflict: &str) -> String {
    format!(
        "INSERT INTO observations (
            kind, taxon_id, location, latitude, longitude, point,
            observation_time, comments, zone_id,
            inaturalist_id, inaturalist_species, inat_vv_confirmed,
            originates_in_vespawatch,
            observer_name, observer_email, observer_phone, observer_is_beekeeper,
            individual_count, behaviour, nest_height, nest_size, duplicate_of_id
        ) VALUES (
            $1, $2, $3, $4, $5,
            ST_SetSRID(ST_MakePoint($5, $4), 4326)::geography,
            $6, $7, COALESCE($8::BIGINT, {zone}),
            $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
        ){on_conflict}
        RETURNING id",
        zone = zone_for_point("$5", "$4"),
    )
}

/// Inserts an observation, assigning its zone from the point when none is
/// given.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn insert_observation(db: &dyn Database, obs: &NewObservation) -> Result<i64, DbError> {
    let rows = db
        .query_raw_params(&insert_sql(""), &observation_params(obs))
        .await?;
    crate::returned_id(&rows, "observation")
}

/// Replaces the editable fields of an observation.
///
/// Returns the number of rows updated (0 when the ID does not exist).
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_observation(
    db: &dyn Database,
    id: i64,
    obs: &NewObservation,
) -> Result<u64, DbError> {
    let mut params = observation_params(obs);
    params.push(DatabaseValue::Int64(id));

    let sql = format!(
        "UPDATE observations SET
            kind = $1, taxon_id = $2, location = $3, latitude = $4, longitude = $5,
            point = ST_SetSRID(ST_MakePoint($5, $4), 4326)::geography,
            observation_time = $6, comments = $7,
            zone_id = COALESCE($8::BIGINT, {zone}),
            inaturalist_id = $9, inaturalist_species = $10, inat_vv_confirmed = $11,
            originates_in_vespawatch = $12,
            observer_name = $13, observer_email = $14, observer_phone = $15,
            observer_is_beekeeper = $16,
            individual_count = $17, behaviour = $18,
            nest_height = $19, nest_size = $20, duplicate_of_id = $21
         WHERE id = $22",
        zone = zone_for_point("$5", "$4"),
    );

    Ok(db.exec_raw_params(&sql, &params).await?)
}

/// Inserts or refreshes an observation pulled from iNaturalist, keyed on
/// `inaturalist_id`. The remote copy wins for every synced field.
///
/// Returns the local ID and whether a new row was created.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn upsert_inaturalist_observation(
    db: &dyn Database,
    obs: &NewObservation,
) -> Result<(i64, bool), DbError> {
    if obs.inaturalist_id.is_none() {
        return Err(DbError::Conversion {
            message: "Cannot upsert an observation without an iNaturalist ID".to_string(),
        });
    }

    let sql = insert_sql(
        " ON CONFLICT (inaturalist_id) DO UPDATE SET
            taxon_id = EXCLUDED.taxon_id,
            location = EXCLUDED.location,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            point = EXCLUDED.point,
            observation_time = EXCLUDED.observation_time,
            comments = EXCLUDED.comments,
            zone_id = EXCLUDED.zone_id,
            inaturalist_species = EXCLUDED.inaturalist_species,
            inat_vv_confirmed = EXCLUDED.inat_vv_confirmed",
    )
    .replace("RETURNING id", "RETURNING id, (xmax = 0) AS inserted");

    let rows = db.query_raw_params(&sql, &observation_params(obs)).await?;
    let id = crate::returned_id(&rows, "observation")?;
    let inserted: bool = rows
        .first()
        .and_then(|r| r.to_value("inserted").ok())
        .unwrap_or(false);

    Ok((id, inserted))
}

/// Records the community identification of an observation that was pushed
/// from here and later pulled back.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn update_inaturalist_identification(
    db: &dyn Database,
    id: i64,
    taxon_id: Option<i64>,
    inaturalist_species: Option<&str>,
    inat_vv_confirmed: Option<bool>,
) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "UPDATE observations SET
                taxon_id = COALESCE($2, taxon_id),
                inaturalist_species = $3,
                inat_vv_confirmed = $4
             WHERE id = $1",
            &[
                DatabaseValue::Int64(id),
                opt_i64(taxon_id),
                opt_string(inaturalist_species),
                opt_bool(inat_vv_confirmed),
            ],
        )
        .await?)
}

/// Links a local observation to the iNaturalist observation created for it.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn set_inaturalist_id(
    db: &dyn Database,
    id: i64,
    inaturalist_id: i64,
) -> Result<(), DbError> {
    db.exec_raw_params(
        "UPDATE observations SET inaturalist_id = $2 WHERE id = $1",
        &[DatabaseValue::Int64(id), DatabaseValue::Int64(inaturalist_id)],
    )
    .await?;
    Ok(())
}

/// Deletes an observation. Pictures and the management action cascade.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn delete_observation(db: &dyn Database, id: i64) -> Result<u64, DbError> {
    Ok(db
        .exec_raw_params(
            "DELETE FROM observations WHERE id = $1",
            &[DatabaseValue::Int64(id)],
        )
        .await?)
}

/// Assigns a zone to every observation that has none and whose point lies
/// inside a zone.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn assign_missing_zones(db: &dyn Database) -> Result<u64, DbError> {
    let updated = db
        .exec_raw_params(
            "UPDATE observations o SET zone_id = (
                SELECT z.id FROM zones z
                WHERE ST_Covers(z.mpolygon, o.point::geometry)
                ORDER BY z.id LIMIT 1
             )
             WHERE o.zone_id IS NULL
               AND EXISTS (
                SELECT 1 FROM zones z WHERE ST_Covers(z.mpolygon, o.point::geometry)
             )",
            &[],
        )
        .await?;

    log::info!("Assigned zones to {updated} observations");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use vespawatch_database_models::BoundingBox;

    use super::*;

    #[test]
    fn public_scope_adds_no_zone_predicate() {
        let b = build_observation_query(&ObservationQuery::default(), Scope::Everything);
        assert!(!b.sql().contains("ST_Covers(sz.mpolygon"));
        assert!(b.params().is_empty());
        assert!(b.sql().ends_with("ORDER BY o.observation_time DESC, o.id DESC"));
    }

    #[test]
    fn zone_scope_adds_containment_predicate() {
        let b = build_observation_query(&ObservationQuery::default(), Scope::Zone(7));
        assert!(b.sql().contains("sz.id = $1"));
        assert!(b.sql().contains("ST_Covers(sz.mpolygon, o.point::geometry)"));
        assert!(matches!(b.params(), [DatabaseValue::Int64(7)]));
    }

    #[test]
    fn filters_bind_in_order() {
        let query = ObservationQuery {
            kind: Some(ObservationKind::Nest),
            bbox: Some(BoundingBox::new(2.5, 50.6, 5.9, 51.5)),
            from: Some(chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            confirmed_only: true,
            vv_only: true,
            limit: Some(40),
            ..ObservationQuery::default()
        };
        let b = build_observation_query(&query, Scope::Zone(3));
        let sql = b.sql();

        assert!(sql.contains("o.kind = $1"));
        assert!(sql.contains("ST_MakeEnvelope($2, $3, $4, $5, 4326)"));
        assert!(sql.contains("o.observation_time >= $6"));
        assert!(sql.contains("t.is_target = TRUE"));
        assert!(sql.contains("o.inat_vv_confirmed = TRUE"));
        assert!(sql.contains("sz.id = $7"));
        assert!(sql.ends_with("LIMIT $8"));
        assert_eq!(b.params().len(), 8);
        assert!(matches!(&b.params()[0], DatabaseValue::String(k) if k == "NEST"));
    }

    #[test]
    fn in_any_zone_needs_no_params() {
        let query = ObservationQuery {
            in_any_zone: true,
            ..ObservationQuery::default()
        };
        let b = build_observation_query(&query, Scope::Everything);
        assert!(b.sql().contains("o.zone_id IS NOT NULL"));
        assert!(b.params().is_empty());
    }

    #[test]
    fn offset_only_when_nonzero() {
        let query = ObservationQuery {
            offset: 20,
            ..ObservationQuery::default()
        };
        let b = build_observation_query(&query, Scope::Everything);
        assert!(b.sql().ends_with("OFFSET $1"));
    }

    #[test]
    fn insert_assigns_zone_from_point() {
        let sql = insert_sql("");
        assert!(sql.contains("COALESCE($8::BIGINT, (SELECT z.id FROM zones z"));
        assert!(sql.contains("ST_MakePoint($5, $4)"));
    }
}
