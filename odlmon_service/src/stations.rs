/// Station identifiers for the BfS ODL monitoring network.
///
/// The federal network has roughly 1,700 sensors, each addressed by a
/// "Kennung": a 9-digit numeric id such as `031520061`, where the leading
/// digits encode the district. Both upstream sources (the station page and
/// the WFS `viewparams=kenn:` filter) take that id verbatim, so this module
/// only checks that an id is safe to place into a URL.

use crate::model::QueryError;

/// Length of a BfS station Kennung.
pub const KENNUNG_LEN: usize = 9;

/// Checks that a station id is usable in a request URL.
///
/// Accepts any non-empty ASCII alphanumeric string (surrounding whitespace
/// is ignored). Ids that don't look like a Kennung are still accepted; the
/// upstream simply returns no data for them.
pub fn validate_station_id(station_id: &str) -> Result<(), QueryError> {
    let id = station_id.trim();
    if id.is_empty() {
        return Err(QueryError::EmptyStationId);
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(QueryError::InvalidStationId(id.to_string()));
    }
    Ok(())
}

/// Returns `true` if the id has the shape of a BfS Kennung (9 digits).
pub fn is_bfs_kennung(station_id: &str) -> bool {
    station_id.len() == KENNUNG_LEN && station_id.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
