//! Link-or-create state machine for one role-section of the staffing form.
//!
//! Every role shares the same three states; what differs per role is the
//! [`RoleSchema`] (which per-project fields are required) and the
//! [`PersonLookup`] used while linking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::models::Person;
use crate::roles::StaffRole;
use crate::validation::MOBILE_NUMBER;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSchema {
    pub role: StaffRole,
    pub disciplines_required: bool,
    pub company_assignable: bool,
    pub lookup_roles: Vec<StaffRole>,
}

impl RoleSchema {
    pub fn for_role(role: StaffRole) -> Self {
        Self {
            role,
            disciplines_required: role.requires_disciplines(),
            company_assignable: role.is_company_bound(),
            lookup_roles: vec![role],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonLookup {
    pub roles: Vec<StaffRole>,
    pub text: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("This field is required".into()));
    }
    Ok(())
}

/// Fields entered for a brand-new person.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PersonDraft {
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(regex(path = *MOBILE_NUMBER, message = "Enter a valid mobile number"))]
    pub contact_number: String,
}

/// Per-project attributes that are not fixed to the person record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectAttributes {
    pub discipline_ids: BTreeSet<i64>,
    pub assigned_company_id: Option<i64>,
}

static NO_ATTRIBUTES: ProjectAttributes = ProjectAttributes {
    discipline_ids: BTreeSet::new(),
    assigned_company_id: None,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SectionState {
    Linking {
        lookup: PersonLookup,
    },
    Creating {
        draft: PersonDraft,
        attributes: ProjectAttributes,
    },
    Confirming {
        person: Box<Person>,
        attributes: ProjectAttributes,
    },
}

/// What the save step must do for a section.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionPlan {
    Nothing,
    CreateAndLink {
        draft: PersonDraft,
        attributes: ProjectAttributes,
    },
    LinkOnly {
        person_id: i64,
        attributes: ProjectAttributes,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoleSection {
    schema: RoleSchema,
    state: SectionState,
}

impl RoleSection {
    pub fn new(role: StaffRole) -> Self {
        let schema = RoleSchema::for_role(role);
        let state = SectionState::Linking {
            lookup: PersonLookup {
                roles: schema.lookup_roles.clone(),
                text: None,
            },
        };
        Self { schema, state }
    }

    pub fn role(&self) -> StaffRole {
        self.schema.role
    }

    pub fn schema(&self) -> &RoleSchema {
        &self.schema
    }

    pub fn state(&self) -> &SectionState {
        &self.state
    }

    pub fn is_linking(&self) -> bool {
        matches!(self.state, SectionState::Linking { .. })
    }

    pub fn lookup(&self) -> Option<&PersonLookup> {
        match &self.state {
            SectionState::Linking { lookup } => Some(lookup),
            _ => None,
        }
    }

    pub fn selected_person(&self) -> Option<&Person> {
        match &self.state {
            SectionState::Confirming { person, .. } => Some(person.as_ref()),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &ProjectAttributes {
        match &self.state {
            SectionState::Linking { .. } => &NO_ATTRIBUTES,
            SectionState::Creating { attributes, .. }
            | SectionState::Confirming { attributes, .. } => attributes,
        }
    }

    pub fn search(&mut self, text: &str) -> Result<&PersonLookup, AppError> {
        if !self.is_linking() {
            return Err(self.invalid_transition("search"));
        }

        let text = text.trim();
        let text = (!text.is_empty()).then(|| text.to_string());
        match &mut self.state {
            SectionState::Linking { lookup } => {
                lookup.text = text;
                Ok(lookup)
            }
            _ => Err(AppError::Internal(
                "section changed state while searching".to_string(),
            )),
        }
    }

    /// Linking → Confirming. The person must hold the section's role.
    pub fn select(&mut self, person: Person) -> Result<(), AppError> {
        if !self.is_linking() {
            return Err(self.invalid_transition("select a person"));
        }

        if person.role != Some(self.schema.role) {
            return Err(AppError::Validation(format!(
                "{} is a {}, not a {}",
                person.full_name(),
                person.role_name,
                self.schema.role
            )));
        }

        debug!(person_id = person.id, role = %self.schema.role, "Selected existing person");
        self.state = SectionState::Confirming {
            person: Box::new(person),
            attributes: ProjectAttributes::default(),
        };
        Ok(())
    }

    /// Starts a confirmed company-bound person from their current company,
    /// but only when this project can actually take them there.
    pub fn prefill_company(&mut self, assignable: &[i64]) -> Option<i64> {
        if !self.schema.company_assignable {
            return None;
        }

        let SectionState::Confirming { person, attributes } = &mut self.state else {
            return None;
        };
        let current = person
            .assigned_contractor_id
            .filter(|id| assignable.contains(id))?;
        attributes.assigned_company_id = Some(current);
        Some(current)
    }

    /// Linking → Creating with a blank draft.
    pub fn start_creating(&mut self) -> Result<&mut PersonDraft, AppError> {
        if !self.is_linking() {
            return Err(self.invalid_transition("create a new person"));
        }

        self.state = SectionState::Creating {
            draft: PersonDraft::default(),
            attributes: ProjectAttributes::default(),
        };
        self.draft_mut()
    }

    /// Any state → Linking. Drops the selection or draft and every
    /// project-scoped edit.
    pub fn back_to_linking(&mut self) {
        self.state = SectionState::Linking {
            lookup: PersonLookup {
                roles: self.schema.lookup_roles.clone(),
                text: None,
            },
        };
    }

    pub fn draft_mut(&mut self) -> Result<&mut PersonDraft, AppError> {
        if !matches!(self.state, SectionState::Creating { .. }) {
            return Err(self.invalid_transition("edit the new person"));
        }

        match &mut self.state {
            SectionState::Creating { draft, .. } => Ok(draft),
            _ => Err(AppError::Internal(
                "section changed state while editing".to_string(),
            )),
        }
    }

    pub fn set_disciplines(
        &mut self,
        discipline_ids: impl IntoIterator<Item = i64>,
    ) -> Result<(), AppError> {
        let attributes = self.attributes_mut("assign disciplines")?;
        attributes.discipline_ids = discipline_ids.into_iter().collect();
        Ok(())
    }

    pub fn set_company(&mut self, contractor_id: Option<i64>) -> Result<(), AppError> {
        if !self.schema.company_assignable && contractor_id.is_some() {
            return Err(AppError::Validation(format!(
                "A {} is not assigned to a company",
                self.schema.role
            )));
        }

        let attributes = self.attributes_mut("assign a company")?;
        attributes.assigned_company_id = contractor_id;
        Ok(())
    }

    pub fn plan(&self) -> SectionPlan {
        match &self.state {
            SectionState::Linking { .. } => SectionPlan::Nothing,
            SectionState::Creating { draft, attributes } => SectionPlan::CreateAndLink {
                draft: draft.clone(),
                attributes: attributes.clone(),
            },
            SectionState::Confirming { person, attributes } => SectionPlan::LinkOnly {
                person_id: person.id,
                attributes: attributes.clone(),
            },
        }
    }

    fn attributes_mut(&mut self, action: &str) -> Result<&mut ProjectAttributes, AppError> {
        if self.is_linking() {
            return Err(self.invalid_transition(action));
        }

        match &mut self.state {
            SectionState::Creating { attributes, .. }
            | SectionState::Confirming { attributes, .. } => Ok(attributes),
            SectionState::Linking { .. } => Err(AppError::Internal(
                "section changed state while editing".to_string(),
            )),
        }
    }

    fn invalid_transition(&self, action: &str) -> AppError {
        let state = match self.state {
            SectionState::Linking { .. } => "linking",
            SectionState::Creating { .. } => "creating",
            SectionState::Confirming { .. } => "confirming",
        };
        AppError::Validation(format!(
            "Cannot {} for {} while {}",
            action, self.schema.role, state
        ))
    }
}
