// Route exports
pub mod crush;

use actix_web::web;

pub use crush::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(crush::configure));
}
