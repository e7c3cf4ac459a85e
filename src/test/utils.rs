use crate::db::{
    self, NewPerson, NewProject, add_contractor_assignment, create_contractor, create_discipline,
    create_person, create_project, get_contractor_type_id, upsert_person_assignment,
};
use crate::error::AppError;
use crate::init_rocket;
use crate::roles::StaffRole;
use rocket::local::asynchronous::Client;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::sync::Once;

static INIT: Once = Once::new();

pub const PRINCIPAL: &str = "Principal contractor";
pub const CONTRACTOR: &str = "Contractor";
pub const SUB_CONTRACTOR: &str = "Sub-contractor";

#[derive(Default)]
pub struct TestDbBuilder {
    contractors: Vec<TestContractor>,
    projects: Vec<TestProject>,
    edges: Vec<TestEdge>,
    disciplines: Vec<String>,
    people: Vec<TestPerson>,
    staffings: Vec<TestStaffing>,
}

pub struct TestContractor {
    pub name: String,
    pub contractor_type: String,
}

pub struct TestProject {
    pub name: String,
    pub main_contractor: String,
}

pub struct TestEdge {
    pub project: String,
    pub contractor: String,
    pub parent: String,
}

pub struct TestPerson {
    pub first_name: String,
    pub role: StaffRole,
    pub company: Option<String>,
}

pub struct TestStaffing {
    pub person: String,
    pub project: String,
    pub contractor: String,
}

impl TestDbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contractor(mut self, name: &str, contractor_type: &str) -> Self {
        self.contractors.push(TestContractor {
            name: name.to_string(),
            contractor_type: contractor_type.to_string(),
        });
        self
    }

    pub fn project(mut self, name: &str, main_contractor: &str) -> Self {
        self.projects.push(TestProject {
            name: name.to_string(),
            main_contractor: main_contractor.to_string(),
        });
        self
    }

    /// Hangs `contractor` under the edge of `parent` in `project`.
    pub fn edge(mut self, project: &str, contractor: &str, parent: &str) -> Self {
        self.edges.push(TestEdge {
            project: project.to_string(),
            contractor: contractor.to_string(),
            parent: parent.to_string(),
        });
        self
    }

    pub fn discipline(mut self, name: &str) -> Self {
        self.disciplines.push(name.to_string());
        self
    }

    pub fn person(mut self, first_name: &str, role: StaffRole, company: Option<&str>) -> Self {
        self.people.push(TestPerson {
            first_name: first_name.to_string(),
            role,
            company: company.map(String::from),
        });
        self
    }

    pub fn staff(mut self, person: &str, project: &str, contractor: &str) -> Self {
        self.staffings.push(TestStaffing {
            person: person.to_string(),
            project: project.to_string(),
            contractor: contractor.to_string(),
        });
        self
    }

    pub async fn build(self) -> Result<TestDb, AppError> {
        INIT.call_once(|| {
            let _ = env_logger::builder()
                .parse_filters("debug")
                .is_test(true)
                .try_init();
        });

        let pool = SqlitePool::connect("sqlite::memory:").await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let mut contractor_ids: HashMap<String, i64> = HashMap::new();
        let mut project_ids: HashMap<String, i64> = HashMap::new();
        let mut assignment_ids: HashMap<(String, String), i64> = HashMap::new();
        let mut discipline_ids: HashMap<String, i64> = HashMap::new();
        let mut person_ids: HashMap<String, i64> = HashMap::new();

        let mut conn = pool.acquire().await?;

        for contractor in &self.contractors {
            let type_id = get_contractor_type_id(&mut conn, &contractor.contractor_type).await?;
            let ids = create_contractor(&pool, &contractor.name, &[type_id]).await?;
            contractor_ids.insert(contractor.name.clone(), ids[0]);
        }

        for discipline in &self.disciplines {
            let id = create_discipline(&mut conn, discipline).await?;
            discipline_ids.insert(discipline.clone(), id);
        }

        for person in &self.people {
            let company = person
                .company
                .as_ref()
                .map(|name| lookup(&contractor_ids, name))
                .transpose()?;
            let id = create_person(
                &mut conn,
                &NewPerson {
                    first_name: person.first_name.clone(),
                    last_name: "Tester".to_string(),
                    email: format!("{}@example.com", person.first_name.to_lowercase()),
                    contact_number: "0821234567".to_string(),
                    role: person.role,
                    assigned_contractor_id: company,
                },
            )
            .await?;
            person_ids.insert(person.first_name.clone(), id);
        }
        drop(conn);

        for project in &self.projects {
            let main_contractor_id = lookup(&contractor_ids, &project.main_contractor)?;
            let (project_id, root_id) = create_project(
                &pool,
                &NewProject {
                    name: project.name.clone(),
                    description: format!("{} description", project.name),
                    location: "Cape Town".to_string(),
                    notification_frequency_days: 7,
                    main_contractor_id,
                },
            )
            .await?;
            project_ids.insert(project.name.clone(), project_id);
            assignment_ids.insert(
                (project.name.clone(), project.main_contractor.clone()),
                root_id,
            );
        }

        let mut conn = pool.acquire().await?;

        for edge in &self.edges {
            let project_id = lookup(&project_ids, &edge.project)?;
            let contractor_id = lookup(&contractor_ids, &edge.contractor)?;
            let parent_id = assignment_ids
                .get(&(edge.project.clone(), edge.parent.clone()))
                .copied()
                .ok_or_else(|| AppError::NotFound(format!("edge for {}", edge.parent)))?;
            let id = add_contractor_assignment(&mut conn, project_id, contractor_id, parent_id)
                .await?;
            assignment_ids.insert((edge.project.clone(), edge.contractor.clone()), id);
        }

        for staffing in &self.staffings {
            let person_id = lookup(&person_ids, &staffing.person)?;
            let assignment_id = assignment_ids
                .get(&(staffing.project.clone(), staffing.contractor.clone()))
                .copied()
                .ok_or_else(|| AppError::NotFound(format!("edge for {}", staffing.contractor)))?;
            upsert_person_assignment(&mut conn, person_id, assignment_id).await?;
        }
        drop(conn);

        Ok(TestDb {
            pool,
            contractor_ids,
            project_ids,
            assignment_ids,
            discipline_ids,
            person_ids,
        })
    }
}

fn lookup(map: &HashMap<String, i64>, key: &str) -> Result<i64, AppError> {
    map.get(key)
        .copied()
        .ok_or_else(|| AppError::NotFound(format!("test fixture {}", key)))
}

pub struct TestDb {
    pub pool: Pool<Sqlite>,
    pub contractor_ids: HashMap<String, i64>,
    pub project_ids: HashMap<String, i64>,
    pub assignment_ids: HashMap<(String, String), i64>,
    pub discipline_ids: HashMap<String, i64>,
    pub person_ids: HashMap<String, i64>,
}

impl TestDb {
    pub fn contractor(&self, name: &str) -> i64 {
        self.contractor_ids[name]
    }

    pub fn project(&self, name: &str) -> i64 {
        self.project_ids[name]
    }

    pub fn assignment(&self, project: &str, contractor: &str) -> i64 {
        self.assignment_ids[&(project.to_string(), contractor.to_string())]
    }

    pub fn discipline(&self, name: &str) -> i64 {
        self.discipline_ids[name]
    }

    pub fn person(&self, first_name: &str) -> i64 {
        self.person_ids[first_name]
    }

    pub async fn active_assignments(&self, person: &str, project: &str) -> Vec<i64> {
        let mut conn = self.pool.acquire().await.unwrap();
        db::get_person_assignments_for_project(&mut conn, self.person(person), self.project(project))
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_active)
            .map(|a| a.contractor_assignment_id)
            .collect()
    }

    pub async fn discipline_ids_for(&self, person: &str, project: &str) -> Vec<i64> {
        let mut conn = self.pool.acquire().await.unwrap();
        db::get_person_discipline_ids(&mut conn, self.person(person), self.project(project))
            .await
            .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        let query = format!("SELECT COUNT(*) FROM {}", table);
        let (count,): (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .unwrap();
        count
    }
}

/// Three projects over one shared contractor pool:
///
/// * `Harbour` is led by a principal contractor with two contractors, one of
///   which has a sub-contractor.
/// * `Depot` is led by a contractor with a sub-contractor chain below it.
/// * `Kiosk` is led by a sub-contractor.
pub async fn create_standard_test_db() -> TestDb {
    TestDbBuilder::new()
        .contractor("Acme Principal", PRINCIPAL)
        .contractor("Bravo Builders", CONTRACTOR)
        .contractor("Delta Civils", CONTRACTOR)
        .contractor("Charlie Electrical", SUB_CONTRACTOR)
        .contractor("Echo Roofing", SUB_CONTRACTOR)
        .contractor("Foxtrot Glazing", SUB_CONTRACTOR)
        .project("Harbour", "Acme Principal")
        .edge("Harbour", "Bravo Builders", "Acme Principal")
        .edge("Harbour", "Delta Civils", "Acme Principal")
        .edge("Harbour", "Charlie Electrical", "Bravo Builders")
        .project("Depot", "Bravo Builders")
        .edge("Depot", "Echo Roofing", "Bravo Builders")
        .edge("Depot", "Foxtrot Glazing", "Echo Roofing")
        .project("Kiosk", "Charlie Electrical")
        .discipline("Electrical")
        .discipline("Plumbing")
        .discipline("Scaffolding")
        .person("Sam", StaffRole::SafetyOfficer, None)
        .person("Priya", StaffRole::PrincipalContractor, None)
        .person("Connie", StaffRole::Contractor, Some("Bravo Builders"))
        .person("Sipho", StaffRole::SubContractor, Some("Charlie Electrical"))
        .person("Mandla", StaffRole::ProjectManager, None)
        .build()
        .await
        .expect("Failed to build standard test database")
}

pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
    let rocket = init_rocket(test_db.pool.clone());
    let client = Client::tracked(rocket)
        .await
        .expect("valid rocket instance");

    (client, test_db)
}
