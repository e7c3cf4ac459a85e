use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Role a person holds on a project. Mirrors the `user_roles` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StaffRole {
    Consultant,
    ProjectManager,
    ConstructionManager,
    SafetyOfficer,
    Contractor,
    SubContractor,
    PrincipalContractor,
}

/// Pre-selection order for a freshly added person-form.
pub const ROLE_PREFERENCE: [StaffRole; 7] = [
    StaffRole::Consultant,
    StaffRole::ProjectManager,
    StaffRole::ConstructionManager,
    StaffRole::SafetyOfficer,
    StaffRole::Contractor,
    StaffRole::SubContractor,
    StaffRole::PrincipalContractor,
];

impl StaffRole {
    /// Single-instance roles may be held by at most one active person per project.
    pub fn is_single_instance(&self) -> bool {
        !self.is_company_bound()
    }

    /// Contractor and Sub-contractor people belong to a specific company in the tree.
    pub fn is_company_bound(&self) -> bool {
        matches!(self, StaffRole::Contractor | StaffRole::SubContractor)
    }

    pub fn requires_disciplines(&self) -> bool {
        matches!(
            self,
            StaffRole::Contractor
                | StaffRole::SubContractor
                | StaffRole::PrincipalContractor
                | StaffRole::SafetyOfficer
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Consultant => "Consultant",
            StaffRole::ProjectManager => "Project manager",
            StaffRole::ConstructionManager => "Construction manager",
            StaffRole::SafetyOfficer => "Safety officer",
            StaffRole::Contractor => "Contractor",
            StaffRole::SubContractor => "Sub-contractor",
            StaffRole::PrincipalContractor => "Principal contractor",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "consultant" => Ok(StaffRole::Consultant),
            "project-manager" => Ok(StaffRole::ProjectManager),
            "construction-manager" => Ok(StaffRole::ConstructionManager),
            "safety-officer" => Ok(StaffRole::SafetyOfficer),
            "contractor" => Ok(StaffRole::Contractor),
            "sub-contractor" | "subcontractor" => Ok(StaffRole::SubContractor),
            "principal-contractor" => Ok(StaffRole::PrincipalContractor),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parses a list of role labels, skipping anything that isn't a known role.
pub fn parse_roles<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<StaffRole> {
    names
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .filter_map(|name| match StaffRole::from_str(name) {
            Ok(role) => Some(role),
            Err(e) => {
                debug!(error = %e, "Ignoring unknown role label");
                None
            }
        })
        .collect()
}

pub fn is_available(
    role: StaffRole,
    existing_roles: &HashSet<StaffRole>,
    in_progress_roles: &[StaffRole],
) -> bool {
    if !role.is_single_instance() {
        return true;
    }

    !existing_roles.contains(&role) && !in_progress_roles.contains(&role)
}

/// All roles still selectable, in preference order.
pub fn available_roles(
    existing_roles: &HashSet<StaffRole>,
    in_progress_roles: &[StaffRole],
) -> Vec<StaffRole> {
    ROLE_PREFERENCE
        .iter()
        .copied()
        .filter(|role| is_available(*role, existing_roles, in_progress_roles))
        .collect()
}

pub fn first_available(existing_roles: &HashSet<StaffRole>) -> Option<StaffRole> {
    ROLE_PREFERENCE
        .iter()
        .copied()
        .find(|role| is_available(*role, existing_roles, &[]))
}

/// Roles a given person-form may choose from. The form's own current choice
/// stays selectable even though it counts as claimed for its siblings.
pub fn roles_for_form(
    existing_roles: &HashSet<StaffRole>,
    form_roles: &[StaffRole],
    form_index: usize,
) -> Vec<StaffRole> {
    let siblings: Vec<StaffRole> = form_roles
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != form_index)
        .map(|(_, role)| *role)
        .collect();

    available_roles(existing_roles, &siblings)
}
