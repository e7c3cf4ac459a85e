//! Multi-person staffing submissions.
//!
//! A submission is validated as a whole before anything is written. People
//! are then saved one at a time in form order, each inside its own
//! transaction, and the run stops at the first person that fails. People
//! saved before the failure stay committed.

use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::collections::{BTreeSet, HashSet};
use tracing::{error, info, instrument, warn};

use crate::db::{self, NewPerson};
use crate::disciplines::{self, DisciplineDiff};
use crate::error::AppError;
use crate::hierarchy::ContractorTree;
use crate::linker::{self, requires_company};
use crate::resolver::{RoleSection, SectionPlan};
use crate::roles::{self, StaffRole, parse_roles};
use crate::validation::{FieldErrors, validate_section};

#[derive(Debug, Clone, Serialize)]
pub struct SavedPerson {
    pub index: usize,
    pub person_id: i64,
    pub role: StaffRole,
    pub created: bool,
    pub contractor_assignment_id: i64,
    pub disciplines: DisciplineDiff,
}

#[derive(Debug, Clone, Serialize)]
pub struct StaffingFailure {
    pub index: usize,
    pub role: StaffRole,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StaffingReport {
    pub saved: Vec<SavedPerson>,
    pub failure: Option<StaffingFailure>,
}

impl StaffingReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleAvailability {
    pub available: Vec<StaffRole>,
    pub preferred: Option<StaffRole>,
}

#[instrument(skip(conn))]
pub async fn load_tree(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<ContractorTree, AppError> {
    let edges = db::get_project_edges(conn, project_id).await?;
    if edges.is_empty() {
        db::get_project(conn, project_id).await?;
    }
    ContractorTree::build(project_id, edges)
}

#[instrument(skip(conn))]
pub async fn existing_roles(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<HashSet<StaffRole>, AppError> {
    let names = db::get_project_role_names(conn, project_id).await?;
    Ok(parse_roles(names.iter().map(String::as_str))
        .into_iter()
        .collect())
}

#[instrument(skip(conn))]
pub async fn role_availability(
    conn: &mut SqliteConnection,
    project_id: i64,
    in_progress: &[StaffRole],
) -> Result<RoleAvailability, AppError> {
    let existing = existing_roles(conn, project_id).await?;
    let available = roles::available_roles(&existing, in_progress);
    let preferred = roles::first_available(&existing)
        .filter(|role| available.contains(role))
        .or_else(|| available.first().copied());

    Ok(RoleAvailability {
        available,
        preferred,
    })
}

fn form_prefix(index: usize) -> String {
    format!("people[{}]", index)
}

/// Field errors for the given sections, keyed `people[<index>].<field>`:
/// person fields, disciplines, company selection and role cardinality across
/// both the persisted staff and the earlier sections of the same submission.
pub fn submission_errors<'a>(
    tree: &ContractorTree,
    existing: &HashSet<StaffRole>,
    sections: impl IntoIterator<Item = (usize, &'a RoleSection)>,
) -> FieldErrors {
    let kind = tree.main_contractor_kind();
    let mut errors = FieldErrors::new();
    let mut claimed: Vec<StaffRole> = Vec::new();

    for (index, section) in sections {
        let role = section.role();
        let mut section_errors = validate_section(section, &kind);

        if !roles::is_available(role, existing, &claimed) {
            section_errors.add("role", format!("{} is already staffed on this project", role));
        }
        claimed.push(role);

        if let Some(company_id) = section.attributes().assigned_company_id {
            if requires_company(role, &kind)
                && !tree.assignable_companies(role).contains(&company_id)
            {
                section_errors.add(
                    "assigned_company_id",
                    "That company cannot take people of this role",
                );
            }
        }

        errors.merge_prefixed(&form_prefix(index), section_errors);
    }

    errors
}

pub async fn submit(
    pool: &Pool<Sqlite>,
    project_id: i64,
    sections: &[RoleSection],
) -> Result<StaffingReport, AppError> {
    let indexed: Vec<(usize, &RoleSection)> = sections.iter().enumerate().collect();
    submit_indexed(pool, project_id, &indexed, FieldErrors::new()).await
}

/// Like `submit`, for person-forms that may have failed before becoming a
/// section. Their errors are reported next to the other forms' field errors
/// and nothing is saved.
pub async fn submit_forms(
    pool: &Pool<Sqlite>,
    project_id: i64,
    forms: &[Result<RoleSection, FieldErrors>],
) -> Result<StaffingReport, AppError> {
    let mut errors = FieldErrors::new();
    let mut indexed = Vec::with_capacity(forms.len());

    for (index, form) in forms.iter().enumerate() {
        match form {
            Ok(section) => indexed.push((index, section)),
            Err(form_errors) => errors.merge_prefixed(&form_prefix(index), form_errors.clone()),
        }
    }

    submit_indexed(pool, project_id, &indexed, errors).await
}

#[instrument(skip(pool, sections, errors), fields(people = sections.len()))]
async fn submit_indexed(
    pool: &Pool<Sqlite>,
    project_id: i64,
    sections: &[(usize, &RoleSection)],
    mut errors: FieldErrors,
) -> Result<StaffingReport, AppError> {
    info!("Processing staffing submission");
    let mut conn = pool.acquire().await?;

    let tree = load_tree(&mut *conn, project_id).await?;
    let existing = existing_roles(&mut *conn, project_id).await?;
    drop(conn);

    let section_errors = submission_errors(&tree, &existing, sections.iter().copied());
    errors.merge(section_errors);
    if sections.is_empty() && errors.is_empty() {
        errors.add("people", "Add at least one person");
    }
    errors.into_result()?;

    let mut report = StaffingReport::default();

    for &(index, section) in sections {
        match save_section(pool, &tree, index, section).await {
            Ok(saved) => report.saved.push(saved),
            Err(e) => {
                e.log_and_record(&format!("Saving person {} of staffing submission", index));
                report.failure = Some(StaffingFailure {
                    index,
                    role: section.role(),
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    if let Some(failure) = &report.failure {
        warn!(
            saved = report.saved.len(),
            failed_index = failure.index,
            "Staffing submission stopped early"
        );
    } else {
        info!(saved = report.saved.len(), "Staffing submission complete");
    }

    Ok(report)
}

/// Create or look up the person, attach them to their node and write their
/// disciplines, all in one transaction.
#[instrument(skip(pool, tree, section), fields(role = %section.role()))]
async fn save_section(
    pool: &Pool<Sqlite>,
    tree: &ContractorTree,
    index: usize,
    section: &RoleSection,
) -> Result<SavedPerson, AppError> {
    let role = section.role();
    let project_id = tree.project_id();

    let (plan_attributes, draft, linked_person) = match section.plan() {
        SectionPlan::CreateAndLink { draft, attributes } => (attributes, Some(draft), None),
        SectionPlan::LinkOnly {
            person_id,
            attributes,
        } => (attributes, None, Some(person_id)),
        SectionPlan::Nothing => {
            return Err(AppError::Validation(format!(
                "No person selected or entered for {}",
                role
            )));
        }
    };

    let target = linker::resolve_target_node(tree, role, plan_attributes.assigned_company_id)?;
    let company_id = role.is_company_bound().then_some(target.contractor_id);

    let mut tx = pool.begin().await?;

    let (person_id, created) = match (draft, linked_person) {
        (Some(draft), _) => {
            let person_id = db::create_person(
                &mut *tx,
                &NewPerson {
                    first_name: draft.first_name,
                    last_name: draft.last_name,
                    email: draft.email,
                    contact_number: draft.contact_number,
                    role,
                    assigned_contractor_id: company_id,
                },
            )
            .await?;
            (person_id, true)
        }
        (None, Some(person_id)) => {
            let person = db::get_person(&mut *tx, person_id).await?;
            if person.role != Some(role) {
                return Err(AppError::Validation(format!(
                    "{} does not hold the {} role",
                    person.full_name(),
                    role
                )));
            }
            if company_id.is_some() && person.assigned_contractor_id != company_id {
                db::set_person_company(&mut *tx, person_id, company_id).await?;
            }
            (person_id, false)
        }
        (None, None) => {
            error!("Section plan carried neither a draft nor a person");
            return Err(AppError::Internal("empty section plan".to_string()));
        }
    };

    let assignment = linker::attach(&mut *tx, person_id, target).await?;

    let previous: BTreeSet<i64> = if created {
        BTreeSet::new()
    } else {
        db::get_person_discipline_ids(&mut *tx, person_id, project_id)
            .await?
            .into_iter()
            .collect()
    };
    let diff = disciplines::sync(
        &mut *tx,
        person_id,
        project_id,
        &previous,
        &plan_attributes.discipline_ids,
    )
    .await?;

    tx.commit().await?;

    info!(person_id, created, "Saved staffed person");

    Ok(SavedPerson {
        index,
        person_id,
        role,
        created,
        contractor_assignment_id: assignment.contractor_assignment_id,
        disciplines: diff,
    })
}
