use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument};

use crate::db;
use crate::error::AppError;

/// Minimal change set that turns one discipline selection into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisciplineDiff {
    pub to_insert: BTreeSet<i64>,
    pub to_delete: BTreeSet<i64>,
}

impl DisciplineDiff {
    pub fn compute(previous: &BTreeSet<i64>, next: &BTreeSet<i64>) -> Self {
        Self {
            to_insert: next.difference(previous).copied().collect(),
            to_delete: previous.difference(next).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_delete.is_empty()
    }

    /// `previous` with the diff applied.
    pub fn apply_to(&self, previous: &BTreeSet<i64>) -> BTreeSet<i64> {
        previous
            .iter()
            .filter(|id| !self.to_delete.contains(id))
            .chain(self.to_insert.iter())
            .copied()
            .collect()
    }
}

/// Writes the diff between `previous` and `next` for one person on one
/// project: inserts first, then deletes.
#[instrument(skip(conn, previous, next))]
pub async fn sync(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
    previous: &BTreeSet<i64>,
    next: &BTreeSet<i64>,
) -> Result<DisciplineDiff, AppError> {
    let diff = DisciplineDiff::compute(previous, next);

    if diff.is_empty() {
        debug!("Discipline selection unchanged");
        return Ok(diff);
    }

    info!(
        inserts = diff.to_insert.len(),
        deletes = diff.to_delete.len(),
        "Syncing discipline assignments"
    );

    for discipline_id in &diff.to_insert {
        db::insert_person_discipline(conn, person_id, *discipline_id, project_id).await?;
    }

    for discipline_id in &diff.to_delete {
        db::delete_person_discipline(conn, person_id, *discipline_id, project_id).await?;
    }

    Ok(diff)
}

/// Like [`sync`], reading the previous selection from storage.
#[instrument(skip(conn, next))]
pub async fn replace_selection(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
    next: &BTreeSet<i64>,
) -> Result<DisciplineDiff, AppError> {
    let previous: BTreeSet<i64> = db::get_person_discipline_ids(conn, person_id, project_id)
        .await?
        .into_iter()
        .collect();

    sync(conn, person_id, project_id, &previous, next).await
}
