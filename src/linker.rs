use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::db;
use crate::error::AppError;
use crate::hierarchy::{ContractorTree, MainContractorKind};
use crate::models::{ContractorAssignment, PersonAssignment};
use crate::roles::StaffRole;

/// Whether the main contractor itself is of the person's role, in which case
/// the person hangs directly off the root.
fn attaches_to_root(role: StaffRole, kind: &MainContractorKind) -> bool {
    match role {
        StaffRole::Contractor => *kind == MainContractorKind::Contractor,
        StaffRole::SubContractor => *kind == MainContractorKind::SubContractor,
        _ => true,
    }
}

/// True when a person of `role` must name the company they work for.
pub fn requires_company(role: StaffRole, kind: &MainContractorKind) -> bool {
    !attaches_to_root(role, kind)
}

/// Tree node a person of `role` is attached to.
#[instrument(skip(tree), fields(project_id = tree.project_id()))]
pub fn resolve_target_node(
    tree: &ContractorTree,
    role: StaffRole,
    assigned_company_id: Option<i64>,
) -> Result<&ContractorAssignment, AppError> {
    let kind = tree.main_contractor_kind();

    if attaches_to_root(role, &kind) {
        return Ok(tree.root());
    }

    let contractor_id = assigned_company_id.ok_or(AppError::NoCompanySelected(role))?;

    tree.find_by_contractor(contractor_id)
        .ok_or(AppError::AssignmentNotFound {
            project_id: tree.project_id(),
            contractor_id,
        })
}

/// Puts the person on `target`. A person holds one node per project, so
/// any other active node of theirs in the same project is deactivated.
#[instrument(skip(conn))]
pub async fn attach(
    conn: &mut SqliteConnection,
    person_id: i64,
    target: &ContractorAssignment,
) -> Result<PersonAssignment, AppError> {
    let moved = db::deactivate_other_person_assignments_for_project(
        conn,
        person_id,
        target.project_id,
        target.id,
    )
    .await?;
    if moved > 0 {
        info!(moved, target = target.id, "Moved person to another contractor assignment");
    }
    db::upsert_person_assignment(conn, person_id, target.id).await
}

/// Deactivates every assignment the person holds anywhere in the project.
#[instrument(skip(conn))]
pub async fn detach(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
) -> Result<u64, AppError> {
    let deactivated = db::deactivate_person_assignments_for_project(conn, person_id, project_id)
        .await?;
    info!(deactivated, "Detached person from project");
    Ok(deactivated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Removal {
    pub assignments_deactivated: u64,
    pub disciplines_removed: u64,
}

/// Full removal from a project: detach plus the project-scoped disciplines.
#[instrument(skip(pool))]
pub async fn remove_from_project(
    pool: &Pool<Sqlite>,
    person_id: i64,
    project_id: i64,
) -> Result<Removal, AppError> {
    let mut tx = pool.begin().await?;

    let assignments_deactivated = detach(&mut *tx, person_id, project_id).await?;
    let disciplines_removed =
        db::delete_person_disciplines_for_project(&mut *tx, person_id, project_id).await?;

    tx.commit().await?;

    Ok(Removal {
        assignments_deactivated,
        disciplines_removed,
    })
}
