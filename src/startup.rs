use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::ai::AiService;
use crate::configuration::Settings;
use crate::middleware::{JwtMiddleware, RequestLogger};
use crate::routes::{
    create_client, delete_client, generate_client_procedure, get_checklist, get_client,
    get_current_user, health_check, list_clients, login, refresh_token, register,
    update_checklist_item, update_client, update_onboarding_status,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config = settings.jwt.clone();
    let jwt_config_data = web::Data::new(settings.jwt.clone());
    let ai_service = web::Data::new(AiService::from_settings(&settings.ai));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)

            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(ai_service.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh-token", web::post().to(refresh_token))

            // Protected routes (require JWT authentication)
            .service(
                web::resource("/auth/me")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route(web::get().to(get_current_user)),
            )
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/clients", web::get().to(list_clients))
                    .route("/clients", web::post().to(create_client))
                    .route("/clients/{id}", web::get().to(get_client))
                    .route("/clients/{id}", web::put().to(update_client))
                    .route("/clients/{id}", web::delete().to(delete_client))
                    .route(
                        "/clients/{id}/onboarding/status",
                        web::put().to(update_onboarding_status),
                    )
                    .route("/clients/{id}/checklist", web::get().to(get_checklist))
                    .route(
                        "/clients/{id}/checklist/{item_id}",
                        web::put().to(update_checklist_item),
                    )
                    .route(
                        "/clients/{id}/procedure",
                        web::post().to(generate_client_procedure),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
