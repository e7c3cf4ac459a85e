use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Request, State, catch, delete, get, post, put};
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolConnection;
use sqlx::{Pool, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use tracing::info;
use validator::Validate;

use crate::db::{self, NewProject};
use crate::disciplines::{self, DisciplineDiff};
use crate::error::AppError;
use crate::hierarchy::{ContractorTree, HierarchyView};
use crate::linker::{self, Removal, requires_company};
use crate::models::{
    Contractor, ContractorAssignment, ContractorType, Discipline, Person, Project, StaffMember,
    UserRole,
};
use crate::resolver::{PersonDraft, RoleSection};
use crate::roles::{StaffRole, parse_roles};
use crate::staffing::{self, RoleAvailability, StaffingReport};
use crate::validation::{
    AppErrorExt, FieldErrors, JsonValidateExt, ToValidationResponse, ValidationResponse,
};

type ApiResult<T> = Result<T, Custom<Json<ValidationResponse>>>;

async fn connection(pool: &Pool<Sqlite>) -> ApiResult<PoolConnection<Sqlite>> {
    pool.acquire()
        .await
        .map_err(AppError::from)
        .validate_custom()
}

fn parse_role(name: &str) -> Result<StaffRole, AppError> {
    StaffRole::from_str(name).map_err(|e| AppError::Validation(e.to_string()))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedResponse {
    pub id: i64,
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[get("/roles")]
pub async fn api_get_roles(db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<UserRole>>> {
    let mut conn = connection(db).await?;
    let roles = db::list_user_roles(&mut conn).await.validate_custom()?;
    Ok(Json(roles))
}

#[get("/contractor_types")]
pub async fn api_get_contractor_types(
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<ContractorType>>> {
    let mut conn = connection(db).await?;
    let types = db::list_contractor_types(&mut conn).await.validate_custom()?;
    Ok(Json(types))
}

#[get("/disciplines")]
pub async fn api_get_disciplines(db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<Discipline>>> {
    let mut conn = connection(db).await?;
    let disciplines = db::list_disciplines(&mut conn).await.validate_custom()?;
    Ok(Json(disciplines))
}

#[derive(Deserialize, Validate)]
pub struct CreateDisciplineRequest {
    #[validate(length(min = 1, message = "Discipline name is required"))]
    name: String,
}

#[post("/disciplines", data = "<request>")]
pub async fn api_create_discipline(
    request: Json<CreateDisciplineRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedResponse>>> {
    let validated = request.validate_custom()?;
    let mut conn = connection(db).await?;
    let id = db::create_discipline(&mut conn, &validated.name)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(CreatedResponse { id })))
}

#[derive(Deserialize, Validate)]
pub struct CreateContractorRequest {
    #[validate(length(min = 1, message = "Contractor name is required"))]
    name: String,
    #[validate(length(min = 1, message = "Select at least one contractor type"))]
    contractor_type_ids: Vec<i64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ContractorResponse {
    pub contractor: Contractor,
    pub types: Vec<Contractor>,
}

#[post("/contractors", data = "<request>")]
pub async fn api_create_contractor(
    request: Json<CreateContractorRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<Vec<i64>>>> {
    let validated = request.validate_custom()?;
    let ids = db::create_contractor(db, &validated.name, &validated.contractor_type_ids)
        .await
        .validate_custom()?;
    Ok(Custom(Status::Created, Json(ids)))
}

#[get("/contractors/<id>")]
pub async fn api_get_contractor(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<ContractorResponse>> {
    let mut conn = connection(db).await?;
    let contractor = db::get_contractor(&mut conn, id).await.validate_custom()?;
    let types = db::get_contractor_types_in_group(&mut conn, &contractor)
        .await
        .validate_custom()?;
    Ok(Json(ContractorResponse { contractor, types }))
}

#[derive(Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, message = "Project name is required"))]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[validate(range(min = 1, max = 365, message = "Notification frequency must be 1-365 days"))]
    notification_frequency_days: Option<i64>,
    main_contractor_id: i64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedProjectResponse {
    pub id: i64,
    pub root_assignment_id: i64,
}

#[post("/projects", data = "<request>")]
pub async fn api_create_project(
    request: Json<CreateProjectRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedProjectResponse>>> {
    let validated = request.validate_custom()?;
    let (id, root_assignment_id) = db::create_project(
        db,
        &NewProject {
            name: validated.name,
            description: validated.description,
            location: validated.location,
            notification_frequency_days: validated.notification_frequency_days.unwrap_or(7),
            main_contractor_id: validated.main_contractor_id,
        },
    )
    .await
    .validate_custom()?;

    Ok(Custom(
        Status::Created,
        Json(CreatedProjectResponse {
            id,
            root_assignment_id,
        }),
    ))
}

#[get("/projects")]
pub async fn api_get_projects(db: &State<Pool<Sqlite>>) -> ApiResult<Json<Vec<Project>>> {
    let mut conn = connection(db).await?;
    let projects = db::list_projects(&mut conn).await.validate_custom()?;
    Ok(Json(projects))
}

#[get("/projects/<id>")]
pub async fn api_get_project(id: i64, db: &State<Pool<Sqlite>>) -> ApiResult<Json<Project>> {
    let mut conn = connection(db).await?;
    let project = db::get_project(&mut conn, id).await.validate_custom()?;
    Ok(Json(project))
}

#[get("/projects/<id>/hierarchy")]
pub async fn api_get_hierarchy(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<HierarchyView>> {
    let mut conn = connection(db).await?;
    let tree = staffing::load_tree(&mut conn, id).await.validate_custom()?;
    Ok(Json(tree.view()))
}

#[derive(Deserialize)]
pub struct AddContractorRequest {
    contractor_id: i64,
    parent_assignment_id: i64,
}

#[post("/projects/<id>/contractors", data = "<request>")]
pub async fn api_add_project_contractor(
    id: i64,
    request: Json<AddContractorRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Custom<Json<CreatedResponse>>> {
    let mut conn = connection(db).await?;
    let assignment_id = db::add_contractor_assignment(
        &mut conn,
        id,
        request.contractor_id,
        request.parent_assignment_id,
    )
    .await
    .validate_custom()?;
    Ok(Custom(Status::Created, Json(CreatedResponse { id: assignment_id })))
}

#[get("/projects/<id>/roles/available?<in_progress>")]
pub async fn api_get_available_roles(
    id: i64,
    in_progress: Option<String>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<RoleAvailability>> {
    let claimed = in_progress
        .as_deref()
        .map(|list| parse_roles(list.split(',')))
        .unwrap_or_default();

    let mut conn = connection(db).await?;
    db::get_project(&mut conn, id).await.validate_custom()?;
    let availability = staffing::role_availability(&mut conn, id, &claimed)
        .await
        .validate_custom()?;
    Ok(Json(availability))
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompaniesResponse {
    pub role: StaffRole,
    pub main_contractor_kind: String,
    pub company_required: bool,
    pub companies: Vec<ContractorAssignment>,
}

#[get("/projects/<id>/companies?<role>")]
pub async fn api_get_assignable_companies(
    id: i64,
    role: &str,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<CompaniesResponse>> {
    let role = parse_role(role).validate_custom()?;
    let mut conn = connection(db).await?;
    let tree = staffing::load_tree(&mut conn, id).await.validate_custom()?;
    let kind = tree.main_contractor_kind();

    Ok(Json(CompaniesResponse {
        role,
        main_contractor_kind: kind.as_str().to_string(),
        company_required: requires_company(role, &kind),
        companies: tree
            .assignable_company_nodes(role)
            .into_iter()
            .cloned()
            .collect(),
    }))
}

#[get("/people?<role>&<search>")]
pub async fn api_search_people(
    role: Option<&str>,
    search: Option<&str>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<Person>>> {
    let roles = match role {
        Some(role) => vec![parse_role(role).validate_custom()?],
        None => Vec::new(),
    };
    let mut conn = connection(db).await?;
    let people = db::search_people(&mut conn, &roles, search)
        .await
        .validate_custom()?;
    Ok(Json(people))
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    #[default]
    Link,
    Create,
}

/// One person-form of a staffing submission.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PersonFormRequest {
    pub role: String,
    #[serde(default)]
    pub mode: FormMode,
    pub person_id: Option<i64>,
    pub person: Option<PersonDraft>,
    #[serde(default)]
    pub discipline_ids: Vec<i64>,
    pub assigned_company_id: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StaffingRequest {
    pub people: Vec<PersonFormRequest>,
}

/// Message of an error that belongs to a single person-form. Anything else
/// fails the whole request.
fn form_message(e: AppError) -> Result<String, AppError> {
    match e {
        AppError::Validation(msg) => Ok(msg),
        AppError::NotFound(msg) => Ok(format!("Not found: {}", msg)),
        other => Err(other),
    }
}

/// Replays a submitted person-form through the section state machine.
/// Problems with the form itself come back as its own field errors.
async fn build_section(
    conn: &mut SqliteConnection,
    tree: &ContractorTree,
    form: &PersonFormRequest,
) -> Result<Result<RoleSection, FieldErrors>, AppError> {
    let mut errors = FieldErrors::new();

    let role = match parse_role(&form.role) {
        Ok(role) => role,
        Err(e) => {
            errors.add("role", form_message(e)?);
            return Ok(Err(errors));
        }
    };
    let mut section = RoleSection::new(role);

    match form.mode {
        FormMode::Link => {
            // No selection leaves the section linking; validation reports it.
            if let Some(person_id) = form.person_id {
                let selected = match db::get_person(conn, person_id).await {
                    Ok(person) => section.select(person),
                    Err(e) => Err(e),
                };
                if let Err(e) = selected {
                    errors.add("person", form_message(e)?);
                    return Ok(Err(errors));
                }
                if form.assigned_company_id.is_none() {
                    section.prefill_company(&tree.assignable_companies(role));
                }
            }
        }
        FormMode::Create => {
            let draft = section.start_creating()?;
            if let Some(person) = &form.person {
                *draft = person.clone();
            }
        }
    }

    if section.is_linking() {
        return Ok(Ok(section));
    }

    section.set_disciplines(form.discipline_ids.iter().copied())?;
    if form.assigned_company_id.is_some() {
        if let Err(e) = section.set_company(form.assigned_company_id) {
            errors.add("assigned_company_id", form_message(e)?);
            return Ok(Err(errors));
        }
    }

    Ok(Ok(section))
}

#[post("/projects/<id>/staffing", data = "<request>")]
pub async fn api_submit_staffing(
    id: i64,
    request: Json<StaffingRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<StaffingReport>> {
    let mut conn = connection(db).await?;
    let tree = staffing::load_tree(&mut conn, id).await.validate_custom()?;

    let mut forms = Vec::with_capacity(request.people.len());
    for form in &request.people {
        forms.push(build_section(&mut conn, &tree, form).await.validate_custom()?);
    }
    drop(conn);

    info!(project_id = id, people = forms.len(), "Received staffing submission");
    let report = staffing::submit_forms(db, id, &forms)
        .await
        .validate_custom()?;
    Ok(Json(report))
}

#[get("/projects/<id>/staff")]
pub async fn api_get_project_staff(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Vec<StaffMember>>> {
    let mut conn = connection(db).await?;
    db::get_project(&mut conn, id).await.validate_custom()?;
    let staff = db::list_project_staff(&mut conn, id).await.validate_custom()?;
    Ok(Json(staff))
}

#[derive(Deserialize)]
pub struct DisciplineSelectionRequest {
    discipline_ids: Vec<i64>,
}

#[put("/projects/<id>/people/<person_id>/disciplines", data = "<request>")]
pub async fn api_update_person_disciplines(
    id: i64,
    person_id: i64,
    request: Json<DisciplineSelectionRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<DisciplineDiff>> {
    let next: BTreeSet<i64> = request.discipline_ids.iter().copied().collect();

    let mut tx = db.begin().await.map_err(AppError::from).validate_custom()?;

    let person = db::get_person(&mut tx, person_id).await.validate_custom()?;
    let active = db::get_person_assignments_for_project(&mut tx, person_id, id)
        .await
        .validate_custom()?
        .into_iter()
        .any(|assignment| assignment.is_active);
    if !active {
        return Err(AppError::NotFound(format!(
            "{} is not staffed on project {}",
            person.full_name(),
            id
        ))
        .to_validation_response());
    }
    if next.is_empty() && person.role.is_some_and(|role| role.requires_disciplines()) {
        return Err(Custom(
            Status::UnprocessableEntity,
            Json(ValidationResponse::with_error(
                "disciplines",
                "Select at least one discipline",
            )),
        ));
    }

    let diff = disciplines::replace_selection(&mut tx, person_id, id, &next)
        .await
        .validate_custom()?;
    tx.commit().await.map_err(AppError::from).validate_custom()?;

    Ok(Json(diff))
}

#[delete("/projects/<id>/people/<person_id>")]
pub async fn api_remove_person(
    id: i64,
    person_id: i64,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Json<Removal>> {
    let removal = linker::remove_from_project(db, person_id, id)
        .await
        .validate_custom()?;
    Ok(Json(removal))
}

#[catch(default)]
pub fn json_catcher(status: Status, _req: &Request) -> Custom<Json<ValidationResponse>> {
    status.to_validation_response()
}
