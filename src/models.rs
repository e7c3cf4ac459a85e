use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roles::StaffRole;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub notification_frequency_days: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbProject {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub notification_frequency_days: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbProject> for Project {
    fn from(db: DbProject) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            location: db.location.unwrap_or_default(),
            notification_frequency_days: db.notification_frequency_days.unwrap_or_default(),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContractorType {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbContractorType {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl From<DbContractorType> for ContractorType {
    fn from(db: DbContractorType) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Contractor {
    pub id: i64,
    pub name: String,
    pub contractor_type_id: i64,
    pub contractor_type: String,
    pub multiple_types_group_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbContractor {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub contractor_type_id: Option<i64>,
    pub contractor_type: Option<String>,
    pub contractor_multiple_types_id: Option<i64>,
}

impl From<DbContractor> for Contractor {
    fn from(db: DbContractor) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            contractor_type_id: db.contractor_type_id.unwrap_or_default(),
            contractor_type: db.contractor_type.unwrap_or_default(),
            multiple_types_group_id: db.contractor_multiple_types_id,
        }
    }
}

/// One `project_contractors` edge. The contractor name and type are joined in
/// so the tree can be rendered and classified without further lookups.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ContractorAssignment {
    pub id: i64,
    pub project_id: i64,
    pub contractor_id: i64,
    pub parent_assignment_id: Option<i64>,
    pub contractor_name: String,
    pub contractor_type: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbContractorAssignment {
    pub id: Option<i64>,
    pub project_id: Option<i64>,
    pub contractor_id: Option<i64>,
    pub parent_contractor_id: Option<i64>,
    pub contractor_name: Option<String>,
    pub contractor_type: Option<String>,
}

impl From<DbContractorAssignment> for ContractorAssignment {
    fn from(db: DbContractorAssignment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            project_id: db.project_id.unwrap_or_default(),
            contractor_id: db.contractor_id.unwrap_or_default(),
            parent_assignment_id: db.parent_contractor_id,
            contractor_name: db.contractor_name.unwrap_or_default(),
            contractor_type: db.contractor_type.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub contact_number: String,
    pub role: Option<StaffRole>,
    pub role_name: String,
    pub assigned_contractor_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPerson {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub role_name: Option<String>,
    pub assigned_contractor_id: Option<i64>,
}

impl From<DbPerson> for Person {
    fn from(db: DbPerson) -> Self {
        let role_name = db.role_name.unwrap_or_default();
        Self {
            id: db.id.unwrap_or_default(),
            first_name: db.first_name.unwrap_or_default(),
            last_name: db.last_name.unwrap_or_default(),
            email: db.email.unwrap_or_default(),
            contact_number: db.contact_number.unwrap_or_default(),
            role: StaffRole::from_str(&role_name).ok(),
            role_name,
            assigned_contractor_id: db.assigned_contractor_id,
        }
    }
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PersonAssignment {
    pub id: i64,
    pub person_id: i64,
    pub contractor_assignment_id: i64,
    pub is_active: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbPersonAssignment {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub project_contractor_id: Option<i64>,
    pub is_active: Option<bool>,
}

impl From<DbPersonAssignment> for PersonAssignment {
    fn from(db: DbPersonAssignment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            person_id: db.user_id.unwrap_or_default(),
            contractor_assignment_id: db.project_contractor_id.unwrap_or_default(),
            is_active: db.is_active.unwrap_or_default(),
        }
    }
}

/// A person actively staffed on a project, with the node they hang off.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaffMember {
    pub person: Person,
    pub contractor_assignment_id: i64,
    pub contractor_id: i64,
    pub contractor_name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStaffMember {
    pub id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub contact_number: Option<String>,
    pub role_name: Option<String>,
    pub assigned_contractor_id: Option<i64>,
    pub project_contractor_id: Option<i64>,
    pub contractor_id: Option<i64>,
    pub contractor_name: Option<String>,
}

impl From<DbStaffMember> for StaffMember {
    fn from(db: DbStaffMember) -> Self {
        Self {
            contractor_assignment_id: db.project_contractor_id.unwrap_or_default(),
            contractor_id: db.contractor_id.unwrap_or_default(),
            contractor_name: db.contractor_name.clone().unwrap_or_default(),
            person: Person::from(DbPerson {
                id: db.id,
                first_name: db.first_name,
                last_name: db.last_name,
                email: db.email,
                contact_number: db.contact_number,
                role_name: db.role_name,
                assigned_contractor_id: db.assigned_contractor_id,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Discipline {
    pub id: i64,
    pub name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbDiscipline {
    pub id: Option<i64>,
    pub name: Option<String>,
}

impl From<DbDiscipline> for Discipline {
    fn from(db: DbDiscipline) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserRole {
    pub id: i64,
    pub role_name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserRole {
    pub id: Option<i64>,
    pub role_name: Option<String>,
}

impl From<DbUserRole> for UserRole {
    fn from(db: DbUserRole) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            role_name: db.role_name.unwrap_or_default(),
        }
    }
}
