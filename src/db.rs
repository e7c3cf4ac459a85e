use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    Contractor, ContractorAssignment, ContractorType, DbContractor, DbContractorAssignment,
    DbContractorType, DbDiscipline, DbPerson, DbPersonAssignment, DbProject, DbStaffMember,
    DbUserRole, Discipline, Person, PersonAssignment, Project, StaffMember, UserRole,
};
use crate::roles::StaffRole;

const PERSON_COLUMNS: &str = "u.id, u.first_name, u.last_name, u.email, u.contact_number, \
     r.role_name, u.assigned_contractor_id";

const EDGE_COLUMNS: &str = "pc.id, pc.project_id, pc.contractor_id, pc.parent_contractor_id, \
     c.name AS contractor_name, ct.name AS contractor_type";

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub location: String,
    pub notification_frequency_days: i64,
    pub main_contractor_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub assigned_contractor_id: Option<i64>,
}

#[instrument]
pub async fn connect(database_url: &str) -> Result<Pool<Sqlite>, AppError> {
    info!("Connecting to database");
    let pool = sqlx::SqlitePool::connect(database_url).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

// Projects

/// Creates the project together with its root `project_contractors` edge.
#[instrument(skip(pool))]
pub async fn create_project(
    pool: &Pool<Sqlite>,
    project: &NewProject,
) -> Result<(i64, i64), AppError> {
    info!("Creating project");
    let mut tx = pool.begin().await?;

    get_contractor(&mut *tx, project.main_contractor_id).await?;

    let res = sqlx::query(
        "INSERT INTO projects (name, description, location, notification_frequency_days)
         VALUES (?, ?, ?, ?)",
    )
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.location)
    .bind(project.notification_frequency_days)
    .execute(&mut *tx)
    .await?;
    let project_id = res.last_insert_rowid();

    let res = sqlx::query(
        "INSERT INTO project_contractors (project_id, contractor_id, parent_contractor_id)
         VALUES (?, ?, NULL)",
    )
    .bind(project_id)
    .bind(project.main_contractor_id)
    .execute(&mut *tx)
    .await?;
    let root_assignment_id = res.last_insert_rowid();

    tx.commit().await?;

    Ok((project_id, root_assignment_id))
}

#[instrument(skip(conn))]
pub async fn get_project(conn: &mut SqliteConnection, id: i64) -> Result<Project, AppError> {
    info!("Fetching project by ID");
    let row = sqlx::query_as::<_, DbProject>(
        "SELECT id, name, description, location, notification_frequency_days, created_at
         FROM projects WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(project) => Ok(Project::from(project)),
        _ => Err(AppError::NotFound(format!(
            "Project with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(conn))]
pub async fn list_projects(conn: &mut SqliteConnection) -> Result<Vec<Project>, AppError> {
    let rows = sqlx::query_as::<_, DbProject>(
        "SELECT id, name, description, location, notification_frequency_days, created_at
         FROM projects ORDER BY name",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Project::from).collect())
}

// Contractors

/// Creates one contractor row per type. Rows of a multi-typed contractor
/// share `contractor_multiple_types_id`, which is the first row's id.
#[instrument(skip(pool))]
pub async fn create_contractor(
    pool: &Pool<Sqlite>,
    name: &str,
    contractor_type_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    info!("Creating contractor");
    let Some((first_type, other_types)) = contractor_type_ids.split_first() else {
        return Err(AppError::Validation(
            "A contractor needs at least one contractor type".to_string(),
        ));
    };

    let mut tx = pool.begin().await?;

    let res = sqlx::query("INSERT INTO contractors (name, contractor_type_id) VALUES (?, ?)")
        .bind(name)
        .bind(*first_type)
        .execute(&mut *tx)
        .await?;
    let first_id = res.last_insert_rowid();
    let mut ids = vec![first_id];

    if !other_types.is_empty() {
        sqlx::query("UPDATE contractors SET contractor_multiple_types_id = ? WHERE id = ?")
            .bind(first_id)
            .bind(first_id)
            .execute(&mut *tx)
            .await?;

        for type_id in other_types {
            let res = sqlx::query(
                "INSERT INTO contractors (name, contractor_type_id, contractor_multiple_types_id)
                 VALUES (?, ?, ?)",
            )
            .bind(name)
            .bind(*type_id)
            .bind(first_id)
            .execute(&mut *tx)
            .await?;
            ids.push(res.last_insert_rowid());
        }
    }

    tx.commit().await?;

    Ok(ids)
}

#[instrument(skip(conn))]
pub async fn get_contractor(conn: &mut SqliteConnection, id: i64) -> Result<Contractor, AppError> {
    let row = sqlx::query_as::<_, DbContractor>(
        "SELECT c.id, c.name, c.contractor_type_id, ct.name AS contractor_type,
                c.contractor_multiple_types_id
         FROM contractors c
         JOIN contractor_types ct ON ct.id = c.contractor_type_id
         WHERE c.id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(contractor) => Ok(Contractor::from(contractor)),
        _ => Err(AppError::NotFound(format!(
            "Contractor with id {} not found in database",
            id
        ))),
    }
}

/// Every contractor row in the same multiple-types group, the contractor
/// itself included.
#[instrument(skip(conn))]
pub async fn get_contractor_types_in_group(
    conn: &mut SqliteConnection,
    contractor: &Contractor,
) -> Result<Vec<Contractor>, AppError> {
    let Some(group_id) = contractor.multiple_types_group_id else {
        return Ok(vec![contractor.clone()]);
    };

    let rows = sqlx::query_as::<_, DbContractor>(
        "SELECT c.id, c.name, c.contractor_type_id, ct.name AS contractor_type,
                c.contractor_multiple_types_id
         FROM contractors c
         JOIN contractor_types ct ON ct.id = c.contractor_type_id
         WHERE c.contractor_multiple_types_id = ?
         ORDER BY c.id",
    )
    .bind(group_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Contractor::from).collect())
}

#[instrument(skip(conn))]
pub async fn list_contractor_types(
    conn: &mut SqliteConnection,
) -> Result<Vec<ContractorType>, AppError> {
    let rows = sqlx::query_as::<_, DbContractorType>(
        "SELECT id, name FROM contractor_types ORDER BY id",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(ContractorType::from).collect())
}

#[instrument(skip(conn))]
pub async fn get_contractor_type_id(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<i64, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM contractor_types WHERE name = ? COLLATE NOCASE")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|(id,)| id)
        .ok_or_else(|| AppError::NotFound(format!("Contractor type '{}' not found", name)))
}

// Hierarchy edges

#[instrument(skip(conn))]
pub async fn get_project_edges(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<Vec<ContractorAssignment>, AppError> {
    info!("Fetching project contractor edges");
    let query = format!(
        "SELECT {EDGE_COLUMNS}
         FROM project_contractors pc
         JOIN contractors c ON c.id = pc.contractor_id
         JOIN contractor_types ct ON ct.id = c.contractor_type_id
         WHERE pc.project_id = ?
         ORDER BY pc.id"
    );

    let rows = sqlx::query_as::<_, DbContractorAssignment>(&query)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(ContractorAssignment::from).collect())
}

/// Adds a non-root edge. The parent must already belong to the same project.
#[instrument(skip(conn))]
pub async fn add_contractor_assignment(
    conn: &mut SqliteConnection,
    project_id: i64,
    contractor_id: i64,
    parent_assignment_id: i64,
) -> Result<i64, AppError> {
    info!("Adding contractor assignment");
    let parent: Option<(i64,)> =
        sqlx::query_as("SELECT project_id FROM project_contractors WHERE id = ?")
            .bind(parent_assignment_id)
            .fetch_optional(&mut *conn)
            .await?;

    match parent {
        Some((parent_project,)) if parent_project == project_id => {}
        Some((parent_project,)) => {
            return Err(AppError::MalformedHierarchy(format!(
                "parent assignment {} belongs to project {}, not {}",
                parent_assignment_id, parent_project, project_id
            )));
        }
        None => {
            return Err(AppError::NotFound(format!(
                "Parent assignment {} not found in database",
                parent_assignment_id
            )));
        }
    }

    get_contractor(conn, contractor_id).await?;

    let res = sqlx::query(
        "INSERT INTO project_contractors (project_id, contractor_id, parent_contractor_id)
         VALUES (?, ?, ?)",
    )
    .bind(project_id)
    .bind(contractor_id)
    .bind(parent_assignment_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

// People

#[instrument(skip(conn))]
pub async fn list_user_roles(conn: &mut SqliteConnection) -> Result<Vec<UserRole>, AppError> {
    let rows = sqlx::query_as::<_, DbUserRole>("SELECT id, role_name FROM user_roles ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(UserRole::from).collect())
}

#[instrument(skip(conn))]
pub async fn get_role_id(conn: &mut SqliteConnection, role: StaffRole) -> Result<i64, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM user_roles WHERE role_name = ? COLLATE NOCASE")
            .bind(role.as_str())
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|(id,)| id)
        .ok_or_else(|| AppError::NotFound(format!("Role '{}' not found in user_roles", role)))
}

#[instrument(skip_all, fields(role = %person.role))]
pub async fn create_person(
    conn: &mut SqliteConnection,
    person: &NewPerson,
) -> Result<i64, AppError> {
    info!("Creating new person");
    let role_id = get_role_id(conn, person.role).await?;

    let res = sqlx::query(
        "INSERT INTO users (first_name, last_name, email, contact_number, role, assigned_contractor_id)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(person.first_name.trim())
    .bind(person.last_name.trim())
    .bind(person.email.trim())
    .bind(person.contact_number.trim())
    .bind(role_id)
    .bind(person.assigned_contractor_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn))]
pub async fn get_person(conn: &mut SqliteConnection, id: i64) -> Result<Person, AppError> {
    let query = format!(
        "SELECT {PERSON_COLUMNS}
         FROM users u
         JOIN user_roles r ON r.id = u.role
         WHERE u.id = ?"
    );

    let row = sqlx::query_as::<_, DbPerson>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(person) => Ok(Person::from(person)),
        _ => Err(AppError::NotFound(format!(
            "Person with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(conn))]
pub async fn set_person_company(
    conn: &mut SqliteConnection,
    person_id: i64,
    contractor_id: Option<i64>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET assigned_contractor_id = ? WHERE id = ?")
        .bind(contractor_id)
        .bind(person_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Linking search: people holding one of `roles`, optionally narrowed by a
/// text pattern over first name, last name and email.
#[instrument(skip(conn))]
pub async fn search_people(
    conn: &mut SqliteConnection,
    roles: &[StaffRole],
    text: Option<&str>,
) -> Result<Vec<Person>, AppError> {
    info!("Searching people");
    let mut query = format!(
        "SELECT {PERSON_COLUMNS}
         FROM users u
         JOIN user_roles r ON r.id = u.role
         WHERE 1 = 1"
    );

    if !roles.is_empty() {
        let placeholders = vec!["?"; roles.len()].join(", ");
        query.push_str(&format!(" AND r.role_name IN ({placeholders})"));
    }

    let pattern = text
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t));
    if pattern.is_some() {
        query.push_str(" AND (u.first_name LIKE ? OR u.last_name LIKE ? OR u.email LIKE ?)");
    }
    query.push_str(" ORDER BY u.first_name, u.last_name");

    let mut q = sqlx::query_as::<_, DbPerson>(&query);
    for role in roles {
        q = q.bind(role.as_str());
    }
    if let Some(pattern) = &pattern {
        q = q.bind(pattern).bind(pattern).bind(pattern);
    }

    let rows = q.fetch_all(&mut *conn).await?;

    Ok(rows.into_iter().map(Person::from).collect())
}

// Person assignments

/// Upsert keyed on `(user_id, project_contractor_id)`; an inactive row is
/// reactivated rather than duplicated.
#[instrument(skip(conn))]
pub async fn upsert_person_assignment(
    conn: &mut SqliteConnection,
    person_id: i64,
    contractor_assignment_id: i64,
) -> Result<PersonAssignment, AppError> {
    info!("Attaching person to contractor assignment");
    sqlx::query(
        "INSERT INTO user_project_contractors (user_id, project_contractor_id, is_active)
         VALUES (?, ?, TRUE)
         ON CONFLICT (user_id, project_contractor_id) DO UPDATE SET is_active = TRUE",
    )
    .bind(person_id)
    .bind(contractor_assignment_id)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query_as::<_, DbPersonAssignment>(
        "SELECT id, user_id, project_contractor_id, is_active
         FROM user_project_contractors
         WHERE user_id = ? AND project_contractor_id = ?",
    )
    .bind(person_id)
    .bind(contractor_assignment_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(PersonAssignment::from(row))
}

#[instrument(skip(conn))]
pub async fn get_person_assignments_for_project(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
) -> Result<Vec<PersonAssignment>, AppError> {
    let rows = sqlx::query_as::<_, DbPersonAssignment>(
        "SELECT upc.id, upc.user_id, upc.project_contractor_id, upc.is_active
         FROM user_project_contractors upc
         JOIN project_contractors pc ON pc.id = upc.project_contractor_id
         WHERE upc.user_id = ? AND pc.project_id = ?
         ORDER BY upc.id",
    )
    .bind(person_id)
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(PersonAssignment::from).collect())
}

/// Marks every active assignment of the person under the project inactive.
#[instrument(skip(conn))]
pub async fn deactivate_person_assignments_for_project(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
) -> Result<u64, AppError> {
    info!("Deactivating person assignments for project");
    let res = sqlx::query(
        "UPDATE user_project_contractors SET is_active = FALSE
         WHERE user_id = ?
           AND is_active = TRUE
           AND project_contractor_id IN (SELECT id FROM project_contractors WHERE project_id = ?)",
    )
    .bind(person_id)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected())
}

/// Same as above but leaves `keep_assignment_id` alone. Used when a person
/// moves to another node of the same project.
#[instrument(skip(conn))]
pub async fn deactivate_other_person_assignments_for_project(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
    keep_assignment_id: i64,
) -> Result<u64, AppError> {
    info!("Deactivating other person assignments for project");
    let res = sqlx::query(
        "UPDATE user_project_contractors SET is_active = FALSE
         WHERE user_id = ?
           AND is_active = TRUE
           AND project_contractor_id <> ?
           AND project_contractor_id IN (SELECT id FROM project_contractors WHERE project_id = ?)",
    )
    .bind(person_id)
    .bind(keep_assignment_id)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    Ok(res.rows_affected())
}

/// Role labels of everybody actively staffed on the project.
#[instrument(skip(conn))]
pub async fn get_project_role_names(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<Vec<String>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT r.role_name
         FROM user_project_contractors upc
         JOIN project_contractors pc ON pc.id = upc.project_contractor_id
         JOIN users u ON u.id = upc.user_id
         JOIN user_roles r ON r.id = u.role
         WHERE pc.project_id = ? AND upc.is_active = TRUE",
    )
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

#[instrument(skip(conn))]
pub async fn list_project_staff(
    conn: &mut SqliteConnection,
    project_id: i64,
) -> Result<Vec<StaffMember>, AppError> {
    let query = format!(
        "SELECT {PERSON_COLUMNS}, upc.project_contractor_id, pc.contractor_id,
                c.name AS contractor_name
         FROM user_project_contractors upc
         JOIN project_contractors pc ON pc.id = upc.project_contractor_id
         JOIN contractors c ON c.id = pc.contractor_id
         JOIN users u ON u.id = upc.user_id
         JOIN user_roles r ON r.id = u.role
         WHERE pc.project_id = ? AND upc.is_active = TRUE
         ORDER BY r.id, u.first_name, u.last_name"
    );

    let rows = sqlx::query_as::<_, DbStaffMember>(&query)
        .bind(project_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(StaffMember::from).collect())
}

// Disciplines

#[instrument(skip(conn))]
pub async fn list_disciplines(conn: &mut SqliteConnection) -> Result<Vec<Discipline>, AppError> {
    let rows = sqlx::query_as::<_, DbDiscipline>("SELECT id, name FROM disciplines ORDER BY name")
        .fetch_all(&mut *conn)
        .await?;

    Ok(rows.into_iter().map(Discipline::from).collect())
}

#[instrument(skip(conn))]
pub async fn create_discipline(conn: &mut SqliteConnection, name: &str) -> Result<i64, AppError> {
    info!("Creating discipline");
    let res = sqlx::query("INSERT INTO disciplines (name) VALUES (?)")
        .bind(name.trim())
        .execute(&mut *conn)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(conn))]
pub async fn get_person_discipline_ids(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
) -> Result<Vec<i64>, AppError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT discipline_id FROM user_disciplines
         WHERE user_id = ? AND project_id = ?
         ORDER BY discipline_id",
    )
    .bind(person_id)
    .bind(project_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[instrument(skip(conn))]
pub async fn insert_person_discipline(
    conn: &mut SqliteConnection,
    person_id: i64,
    discipline_id: i64,
    project_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT OR IGNORE INTO user_disciplines (user_id, discipline_id, project_id)
         VALUES (?, ?, ?)",
    )
    .bind(person_id)
    .bind(discipline_id)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete_person_discipline(
    conn: &mut SqliteConnection,
    person_id: i64,
    discipline_id: i64,
    project_id: i64,
) -> Result<(), AppError> {
    sqlx::query(
        "DELETE FROM user_disciplines
         WHERE user_id = ? AND discipline_id = ? AND project_id = ?",
    )
    .bind(person_id)
    .bind(discipline_id)
    .bind(project_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn delete_person_disciplines_for_project(
    conn: &mut SqliteConnection,
    person_id: i64,
    project_id: i64,
) -> Result<u64, AppError> {
    info!("Removing project-scoped disciplines");
    let res = sqlx::query("DELETE FROM user_disciplines WHERE user_id = ? AND project_id = ?")
        .bind(person_id)
        .bind(project_id)
        .execute(&mut *conn)
        .await?;

    Ok(res.rows_affected())
}
