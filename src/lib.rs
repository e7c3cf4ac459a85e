pub mod api;
pub mod db;
pub mod disciplines;
pub mod env;
pub mod error;
pub mod hierarchy;
pub mod linker;
pub mod models;
pub mod resolver;
pub mod roles;
pub mod staffing;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use api::{
    api_add_project_contractor, api_create_contractor, api_create_discipline, api_create_project,
    api_get_assignable_companies, api_get_available_roles, api_get_contractor,
    api_get_contractor_types, api_get_disciplines, api_get_hierarchy, api_get_project,
    api_get_project_staff, api_get_projects, api_get_roles, api_remove_person, api_search_people,
    api_submit_staffing, api_update_person_disciplines, health, json_catcher,
};
use rocket::{Build, Rocket, catchers, routes};
use sqlx::SqlitePool;
use telemetry::TelemetryFairing;
use tracing::info;

pub fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting safety file staffing service");

    rocket::build()
        .manage(pool)
        .mount(
            "/api",
            routes![
                api_get_roles,
                api_get_contractor_types,
                api_get_disciplines,
                api_create_discipline,
                api_create_contractor,
                api_get_contractor,
                api_create_project,
                api_get_projects,
                api_get_project,
                api_get_hierarchy,
                api_add_project_contractor,
                api_get_available_roles,
                api_get_assignable_companies,
                api_search_people,
                api_submit_staffing,
                api_get_project_staff,
                api_update_person_disciplines,
                api_remove_person,
            ],
        )
        .register("/api", catchers![json_catcher])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
