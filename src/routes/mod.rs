mod auth;
mod clients;
mod health_check;

pub use auth::{get_current_user, login, refresh_token, register};
pub use clients::{
    create_client, delete_client, generate_client_procedure, get_checklist, get_client,
    list_clients, update_checklist_item, update_client, update_onboarding_status,
};
pub use health_check::health_check;
