use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::middleware::Logger;
use actix_web::{delete, get, post, web, App, HttpRequest, HttpResponse, HttpServer};

mod actions;
mod config;
mod dtos;
mod errors;
mod logger;
mod models;
mod photos;
mod schema;

use actions::DbPool;
use config::Config;
use dtos::DeleteSummaryDto;
use errors::AppError;

const ACCESS_PASSWORD_HEADER: &str = "access-password";

#[post("/")]
async fn create_member(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let (form, staged) = photos::read_registration(payload, &config.tmp_dir).await?;

    // Everything is validated before the photo or the member is written.
    let photo_name = staged.as_ref().map(|photo| photo.stored_name());
    let member = form.into_member(photo_name)?;

    let img_dir = config.img_dir.clone();
    let member = web::block(move || {
        let mut conn = pool
            .get()
            .map_err(|e| AppError::internal("Failed to create member!", e))?;
        if let Some(photo) = staged {
            photos::store_photo(photo, &img_dir, &mut conn)?;
        }
        actions::insert_member(&member, &mut conn)
            .map_err(|e| AppError::internal("Failed to create member!", e))?;
        Ok::<_, AppError>(member)
    })
    .await
    .map_err(|e| AppError::internal("Failed to create member!", e))??;

    tracing::info!("created member {} with photo {:?}", member.id, member.photo);
    Ok(HttpResponse::Ok().json(member))
}

#[get("/")]
async fn list_members(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let given = req
        .headers()
        .get(ACCESS_PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok());
    if body.is_empty() || !header_matches(config.view_password.as_deref(), given) {
        return Err(AppError::Unauthorized);
    }

    let members = web::block(move || {
        let mut conn = pool
            .get()
            .map_err(|e| AppError::internal("Failed to fetch members!", e))?;
        actions::list_members(&mut conn)
            .map_err(|e| AppError::internal("Failed to fetch members!", e))
    })
    .await
    .map_err(|e| AppError::internal("Failed to fetch members!", e))??;

    Ok(HttpResponse::Ok().json(members))
}

#[delete("/")]
async fn delete_members(
    body: web::Bytes,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    if !body_matches(config.delete_password.as_deref(), &body) {
        return Err(AppError::Unauthorized);
    }

    tracing::info!("Deleting records...");
    let config = config.into_inner();
    let summary = web::block(move || {
        let mut conn = pool.get().map_err(|e| AppError::internal("Failed to delete members!", e))?;
        let (deleted_count, deleted_photos) = actions::delete_all(&mut conn)
            .map_err(|e| AppError::internal("Failed to delete members!", e))?;
        for dir in [&config.tmp_dir, &config.img_dir] {
            photos::empty_dir(dir).map_err(|e| AppError::internal("Failed to delete members!", e))?;
        }
        Ok::<_, AppError>(DeleteSummaryDto {
            deleted_count,
            deleted_photos,
        })
    })
    .await
    .map_err(|e| AppError::internal("Failed to delete members!", e))??;

    Ok(HttpResponse::Ok().json(summary))
}

#[get("/images/{img_name}")]
async fn get_photo(
    pool: web::Data<DbPool>,
    info: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let img_name = info.into_inner();
    let photo = web::block(move || {
        let mut conn = pool.get().map_err(|e| AppError::internal("Failed to fetch photo!", e))?;
        actions::find_photo_by_name(&img_name, &mut conn)
            .map_err(|e| AppError::internal("Failed to fetch photo!", e))
    })
    .await
    .map_err(|e| AppError::internal("Failed to fetch photo!", e))??;

    match photo {
        Some(photo) => {
            let bytes = photos::decode_photo(&photo)
                .map_err(|e| AppError::internal("Failed to fetch photo!", e))?;
            Ok(HttpResponse::Ok().content_type(photo.mime_type).body(bytes))
        }
        None => Err(AppError::NotFound),
    }
}

/// A missing secret never matches.
fn header_matches(secret: Option<&str>, given: Option<&str>) -> bool {
    matches!((secret, given), (Some(secret), Some(given)) if secret == given)
}

/// The delete secret may arrive raw or as a JSON string literal.
fn body_matches(secret: Option<&str>, body: &[u8]) -> bool {
    let (Some(secret), Ok(text)) = (secret, std::str::from_utf8(body)) else {
        return false;
    };
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    text == secret
        || serde_json::from_str::<String>(text)
            .map(|decoded| decoded == secret)
            .unwrap_or(false)
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_member)
        .service(list_members)
        .service(delete_members)
        .service(get_photo);
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logger::init_logger();

    let config = Config::from_env()?;
    std::fs::create_dir_all(&config.tmp_dir)?;
    std::fs::create_dir_all(&config.img_dir)?;

    let pool = actions::build_pool(&config.database_url)?;
    let mut conn = pool.get()?;
    actions::create_tables(&mut conn)?;
    drop(conn);
    tracing::info!("Connected to database at {}.", config.redacted_database_url());

    let bind_to = (config.host.clone(), config.port);
    let config = web::Data::new(config);

    tracing::info!("Listening on port {}.", bind_to.1);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::new("%r %s %D ms - %b"))
            .app_data(web::Data::new(pool.clone()))
            .app_data(config.clone())
            .configure(routes)
    })
    .bind(bind_to)?
    .run()
    .await?;

    Ok(())
}
