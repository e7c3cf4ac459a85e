#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::hierarchy::MainContractorKind;
    use crate::models::Person;
    use crate::resolver::{PersonDraft, RoleSection, SectionPlan, SectionState};
    use crate::roles::StaffRole;
    use crate::validation::{FieldErrors, ToValidationResponse, validate_section};
    use rocket::http::Status;
    use std::collections::BTreeSet;
    use validator::Validate;

    fn person(id: i64, role: StaffRole, company: Option<i64>) -> Person {
        Person {
            id,
            first_name: "Thandi".to_string(),
            last_name: "Nkosi".to_string(),
            email: "thandi@example.com".to_string(),
            contact_number: "0821234567".to_string(),
            role: Some(role),
            role_name: role.as_str().to_string(),
            assigned_contractor_id: company,
        }
    }

    fn draft() -> PersonDraft {
        PersonDraft {
            first_name: "Lerato".to_string(),
            last_name: "Molefe".to_string(),
            email: "lerato@example.com".to_string(),
            contact_number: "+27731234567".to_string(),
        }
    }

    #[test]
    fn test_new_section_starts_linking() {
        let mut section = RoleSection::new(StaffRole::SafetyOfficer);

        assert!(section.is_linking());
        assert_eq!(section.plan(), SectionPlan::Nothing);

        let lookup = section.search("  thandi ").unwrap();
        assert_eq!(lookup.roles, vec![StaffRole::SafetyOfficer]);
        assert_eq!(lookup.text.as_deref(), Some("thandi"));
    }

    #[test]
    fn test_select_moves_to_confirming() {
        let mut section = RoleSection::new(StaffRole::Contractor);
        section.select(person(7, StaffRole::Contractor, Some(42))).unwrap();

        assert_eq!(section.selected_person().map(|p| p.id), Some(7));
        assert_eq!(section.attributes().assigned_company_id, None);

        section.set_disciplines([3, 1, 3]).unwrap();
        match section.plan() {
            SectionPlan::LinkOnly {
                person_id,
                attributes,
            } => {
                assert_eq!(person_id, 7);
                assert_eq!(attributes.discipline_ids, BTreeSet::from([1, 3]));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_prefill_company_only_from_assignable_companies() {
        let mut elsewhere = RoleSection::new(StaffRole::Contractor);
        elsewhere.select(person(7, StaffRole::Contractor, Some(42))).unwrap();
        assert_eq!(elsewhere.prefill_company(&[5, 6]), None);
        assert_eq!(elsewhere.attributes().assigned_company_id, None);

        let mut here = RoleSection::new(StaffRole::Contractor);
        here.select(person(7, StaffRole::Contractor, Some(42))).unwrap();
        assert_eq!(here.prefill_company(&[5, 42]), Some(42));
        assert_eq!(here.attributes().assigned_company_id, Some(42));

        let mut officer = RoleSection::new(StaffRole::SafetyOfficer);
        officer.select(person(8, StaffRole::SafetyOfficer, Some(42))).unwrap();
        assert_eq!(officer.prefill_company(&[42]), None);
    }

    #[test]
    fn test_select_rejects_person_of_another_role() {
        let mut section = RoleSection::new(StaffRole::SafetyOfficer);
        let result = section.select(person(1, StaffRole::Consultant, None));

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(section.is_linking());
    }

    #[test]
    fn test_creating_and_back_to_linking() {
        let mut section = RoleSection::new(StaffRole::ProjectManager);
        *section.start_creating().unwrap() = draft();
        section.set_disciplines([5]).unwrap();

        assert!(matches!(section.state(), SectionState::Creating { .. }));
        assert!(matches!(section.plan(), SectionPlan::CreateAndLink { .. }));

        section.back_to_linking();
        assert!(section.is_linking());
        assert!(section.attributes().discipline_ids.is_empty());
        assert!(section.lookup().unwrap().text.is_none());
    }

    #[test]
    fn test_invalid_transitions() {
        let mut section = RoleSection::new(StaffRole::Consultant);
        assert!(section.set_disciplines([1]).is_err());
        assert!(section.draft_mut().is_err());

        section.start_creating().unwrap();
        assert!(section.start_creating().is_err());
        assert!(section.search("x").is_err());
        assert!(section.select(person(1, StaffRole::Consultant, None)).is_err());
        // Only company-bound roles take a company.
        assert!(section.set_company(Some(9)).is_err());
        assert!(section.set_company(None).is_ok());
    }

    #[test]
    fn test_draft_field_rules() {
        assert!(draft().validate().is_ok());

        for number in ["0821234567", "+27821234567", "0611234567"] {
            let mut d = draft();
            d.contact_number = number.to_string();
            assert!(d.validate().is_ok(), "{} should be accepted", number);
        }

        for number in ["0521234567", "082123456", "27821234567", "08212345678", ""] {
            let mut d = draft();
            d.contact_number = number.to_string();
            assert!(d.validate().is_err(), "{} should be rejected", number);
        }

        let mut d = draft();
        d.email = "not-an-email".to_string();
        d.first_name = "   ".to_string();
        let errors = FieldErrors::from(d.validate().unwrap_err());
        assert!(errors.contains("email"));
        assert!(errors.contains("first_name"));
        assert!(!errors.contains("last_name"));
    }

    #[test]
    fn test_validate_section_linking_needs_a_person() {
        let section = RoleSection::new(StaffRole::Consultant);
        let errors = validate_section(&section, &MainContractorKind::Contractor);

        assert!(errors.contains("person"));
    }

    #[test]
    fn test_validate_section_requires_disciplines() {
        let mut section = RoleSection::new(StaffRole::SafetyOfficer);
        *section.start_creating().unwrap() = draft();

        let kind = MainContractorKind::Other("Principal contractor".to_string());
        assert!(validate_section(&section, &kind).contains("disciplines"));

        section.set_disciplines([2]).unwrap();
        assert!(validate_section(&section, &kind).is_empty());

        let mut consultant = RoleSection::new(StaffRole::Consultant);
        *consultant.start_creating().unwrap() = draft();
        assert!(validate_section(&consultant, &kind).is_empty());
    }

    #[test]
    fn test_validate_section_company_requirement() {
        let principal = MainContractorKind::Other("Principal contractor".to_string());

        let mut section = RoleSection::new(StaffRole::Contractor);
        *section.start_creating().unwrap() = draft();
        section.set_disciplines([1]).unwrap();
        assert!(validate_section(&section, &principal).contains("assigned_company_id"));

        // A Contractor-led tree takes Contractor people at its root.
        assert!(validate_section(&section, &MainContractorKind::Contractor).is_empty());

        section.set_company(Some(12)).unwrap();
        assert!(validate_section(&section, &principal).is_empty());
    }

    #[test]
    fn test_status_maps_to_json_error_field() {
        let not_found = Status::NotFound.to_validation_response();
        assert_eq!(not_found.0, Status::NotFound);
        assert!(not_found.1.errors.contains_key("resource"));

        let teapot = Status::ImATeapot.to_validation_response();
        assert_eq!(teapot.1.errors["error"], vec!["An error occurred".to_string()]);
    }

    #[test]
    fn test_field_errors_merge_prefixed() {
        let mut inner = FieldErrors::new();
        inner.add("email", "Enter a valid email address");

        let mut outer = FieldErrors::new();
        outer.merge_prefixed("people[1]", inner);

        assert!(outer.contains("people[1].email"));
        assert!(matches!(
            outer.into_result(),
            Err(AppError::ValidationFailed(_))
        ));
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
