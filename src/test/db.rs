#[cfg(test)]
mod tests {
    use crate::db::{
        NewProject, add_contractor_assignment, create_contractor, create_project,
        get_contractor, get_contractor_types_in_group, get_person, get_project,
        get_project_edges, get_project_role_names, list_project_staff, search_people,
        upsert_person_assignment,
    };
    use crate::error::AppError;
    use crate::roles::StaffRole;
    use crate::staffing::load_tree;
    use crate::test::utils::{TestDbBuilder, create_standard_test_db};
    use rocket::tokio;

    #[tokio::test]
    async fn test_create_project_adds_root_edge() {
        let db = create_standard_test_db().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let project = get_project(&mut conn, db.project("Harbour")).await.unwrap();
        assert_eq!(project.name, "Harbour");
        assert_eq!(project.notification_frequency_days, 7);

        let edges = get_project_edges(&mut conn, db.project("Harbour")).await.unwrap();
        assert_eq!(edges.len(), 4);
        let root = edges.iter().find(|e| e.parent_assignment_id.is_none()).unwrap();
        assert_eq!(root.contractor_id, db.contractor("Acme Principal"));
        assert_eq!(root.contractor_type, "Principal contractor");
    }

    #[tokio::test]
    async fn test_create_project_with_unknown_contractor_fails() {
        let db = TestDbBuilder::new().build().await.unwrap();

        let result = create_project(
            &db.pool,
            &NewProject {
                name: "Nowhere".to_string(),
                description: String::new(),
                location: String::new(),
                notification_frequency_days: 7,
                main_contractor_id: 999,
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(db.count("projects").await, 0);
    }

    #[tokio::test]
    async fn test_contractor_with_several_types_shares_group() {
        let db = TestDbBuilder::new().build().await.unwrap();

        let ids = create_contractor(&db.pool, "Golf Group", &[2, 3]).await.unwrap();
        assert_eq!(ids.len(), 2);

        let mut conn = db.pool.acquire().await.unwrap();
        let first = get_contractor(&mut conn, ids[0]).await.unwrap();
        assert_eq!(first.multiple_types_group_id, Some(ids[0]));

        let group = get_contractor_types_in_group(&mut conn, &first).await.unwrap();
        let types: Vec<&str> = group.iter().map(|c| c.contractor_type.as_str()).collect();
        assert_eq!(types, vec!["Contractor", "Sub-contractor"]);

        assert!(matches!(
            create_contractor(&db.pool, "Typeless", &[]).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_assignment_checks_parent_project() {
        let db = create_standard_test_db().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let foreign_parent = db.assignment("Depot", "Bravo Builders");
        let result = add_contractor_assignment(
            &mut conn,
            db.project("Harbour"),
            db.contractor("Echo Roofing"),
            foreign_parent,
        )
        .await;
        assert!(matches!(result, Err(AppError::MalformedHierarchy(_))));

        let result = add_contractor_assignment(
            &mut conn,
            db.project("Harbour"),
            db.contractor("Echo Roofing"),
            12345,
        )
        .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let id = add_contractor_assignment(
            &mut conn,
            db.project("Harbour"),
            db.contractor("Echo Roofing"),
            db.assignment("Harbour", "Delta Civils"),
        )
        .await
        .unwrap();
        drop(conn);

        let mut conn = db.pool.acquire().await.unwrap();
        let tree = load_tree(&mut conn, db.project("Harbour")).await.unwrap();
        assert_eq!(
            tree.parent_of(id).map(|a| a.contractor_id),
            Some(db.contractor("Delta Civils"))
        );
    }

    #[tokio::test]
    async fn test_load_tree_for_missing_project() {
        let db = create_standard_test_db().await;
        let mut conn = db.pool.acquire().await.unwrap();

        assert!(matches!(
            load_tree(&mut conn, 999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_person_roles_resolve_from_labels() {
        let db = create_standard_test_db().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let connie = get_person(&mut conn, db.person("Connie")).await.unwrap();
        assert_eq!(connie.role, Some(StaffRole::Contractor));
        assert_eq!(connie.role_name, "Contractor");
        assert_eq!(connie.assigned_contractor_id, Some(db.contractor("Bravo Builders")));
        assert_eq!(connie.full_name(), "Connie Tester");
    }

    #[tokio::test]
    async fn test_search_people_by_role_and_text() {
        let db = create_standard_test_db().await;
        let mut conn = db.pool.acquire().await.unwrap();

        let officers = search_people(&mut conn, &[StaffRole::SafetyOfficer], None)
            .await
            .unwrap();
        assert_eq!(officers.len(), 1);
        assert_eq!(officers[0].first_name, "Sam");

        let by_email = search_people(&mut conn, &[], Some("sipho@"))
            .await
            .unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].role, Some(StaffRole::SubContractor));

        let mismatch = search_people(&mut conn, &[StaffRole::Consultant], Some("Sam"))
            .await
            .unwrap();
        assert!(mismatch.is_empty());

        let everyone = search_people(&mut conn, &[], Some("   ")).await.unwrap();
        assert_eq!(everyone.len(), 5);
    }

    #[tokio::test]
    async fn test_project_roles_only_count_active_staff() {
        let db = TestDbBuilder::new()
            .contractor("Acme Principal", "Principal contractor")
            .project("Harbour", "Acme Principal")
            .person("Sam", StaffRole::SafetyOfficer, None)
            .person("Mandla", StaffRole::ProjectManager, None)
            .staff("Sam", "Harbour", "Acme Principal")
            .build()
            .await
            .unwrap();
        let mut conn = db.pool.acquire().await.unwrap();

        let names = get_project_role_names(&mut conn, db.project("Harbour")).await.unwrap();
        assert_eq!(names, vec!["Safety officer".to_string()]);

        let staff = list_project_staff(&mut conn, db.project("Harbour")).await.unwrap();
        assert_eq!(staff.len(), 1);
        assert_eq!(staff[0].person.first_name, "Sam");
        assert_eq!(staff[0].contractor_name, "Acme Principal");

        // Attaching twice keeps a single row.
        let root = db.assignment("Harbour", "Acme Principal");
        let first = upsert_person_assignment(&mut conn, db.person("Sam"), root).await.unwrap();
        let second = upsert_person_assignment(&mut conn, db.person("Sam"), root).await.unwrap();
        assert_eq!(first.id, second.id);
        drop(conn);
        assert_eq!(db.count("user_project_contractors").await, 1);
    }
}
