//! Photo ingestion: the multipart form is read here, an attached photo is
//! staged in the temp dir, then promoted into a base64 photo document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use actix_multipart::{Field, Multipart};
use actix_web::web;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use diesel::SqliteConnection;
use futures::{StreamExt, TryStreamExt};
use mime_guess::Mime;
use uuid::Uuid;

use crate::actions;
use crate::dtos::MemberForm;
use crate::errors::AppError;
use crate::models;

/// Largest accepted photo (10 MiB).
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Largest accepted text field (1 MiB).
pub const MAX_FIELD_BYTES: usize = 1024 * 1024;

const PHOTO_FIELD: &str = "photo";

/// An uploaded photo sitting in the temp dir. The temp file is removed when
/// this is dropped, so a rejected submission leaves nothing behind.
#[derive(Debug)]
pub struct StagedPhoto {
    pub temp_path: PathBuf,
    pub original_name: String,
    pub mime_type: String,
}

impl StagedPhoto {
    /// `<temp name><original extension>`, e.g. `3f2c...9a.png`.
    pub fn stored_name(&self) -> String {
        let stem = self
            .temp_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match Path::new(&self.original_name).extension() {
            Some(ext) => format!("{}.{}", stem, ext.to_string_lossy()),
            None => stem,
        }
    }
}

impl Drop for StagedPhoto {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// MIME type guessed from the file name, only if it is an `image/*` type.
pub fn image_mime(file_name: &str) -> Option<Mime> {
    mime_guess::from_path(file_name)
        .first()
        .filter(|m| m.type_().as_str() == "image")
}

/// Reads the whole registration form, staging the photo if one is attached.
pub async fn read_registration(
    mut payload: Multipart,
    tmp_dir: &Path,
) -> Result<(MemberForm, Option<StagedPhoto>), AppError> {
    let mut form = MemberForm::default();
    let mut photo: Option<StagedPhoto> = None;

    while let Some(field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == PHOTO_FIELD {
            if photo.is_some() {
                return Err(AppError::bad_request("Only one photo allowed!"));
            }
            photo = stage_photo(field, tmp_dir).await?;
        } else if MemberForm::accepts(&name) {
            let bytes = read_text(field).await?;
            let value = String::from_utf8(bytes)
                .map_err(|_| AppError::bad_request(format!("Invalid {}!", name)))?;
            form.set(&name, value);
        }
        // Unknown fields are dropped unread; the next `try_next` skips their data.
    }

    Ok((form, photo))
}

async fn read_text(mut field: Field) -> Result<Vec<u8>, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::bad_request(format!("Invalid form data: {}", e)))?;
        if bytes.len() + chunk.len() > MAX_FIELD_BYTES {
            return Err(AppError::PayloadTooLarge("Field too large!".into()));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

async fn stage_photo(mut field: Field, tmp_dir: &Path) -> Result<Option<StagedPhoto>, AppError> {
    let original_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or_default()
        .to_string();

    // No file attached: an empty file input, or a plain text part named
    // `photo`. Either way the member is stored without one.
    if original_name.is_empty() {
        drop(field);
        return Ok(None);
    }

    let mime_type =
        image_mime(&original_name).ok_or_else(|| AppError::bad_request("Invalid photo!"))?;

    let temp_path = tmp_dir.join(Uuid::new_v4().simple().to_string());
    let create_path = temp_path.clone();
    let mut file = web::block(move || fs::File::create(create_path))
        .await
        .map_err(|e| AppError::internal("Failed to create member!", e))?
        .map_err(|e| AppError::internal("Failed to create member!", e))?;

    let staged = StagedPhoto {
        temp_path,
        original_name,
        mime_type: mime_type.essence_str().to_string(),
    };

    let mut written = 0usize;
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| AppError::bad_request(format!("Invalid form data: {}", e)))?;
        written += chunk.len();
        if written > MAX_PHOTO_BYTES {
            return Err(AppError::PayloadTooLarge("Photo too large!".into()));
        }
        file = web::block(move || file.write_all(&chunk).map(|_| file))
            .await
            .map_err(|e| AppError::internal("Failed to create member!", e))?
            .map_err(|e| AppError::internal("Failed to create member!", e))?;
    }

    tracing::debug!(
        "staged photo {} ({} bytes) at {}",
        staged.original_name,
        written,
        staged.temp_path.display()
    );
    Ok(Some(staged))
}

/// Moves the staged file into `img_dir`, embeds its bytes in a photo document
/// and deletes the intermediate file. Returns the stored photo name.
pub fn store_photo(
    staged: StagedPhoto,
    img_dir: &Path,
    conn: &mut SqliteConnection,
) -> Result<String, AppError> {
    let name = staged.stored_name();
    let image_path = img_dir.join(&name);

    fs::copy(&staged.temp_path, &image_path)
        .map_err(|e| AppError::internal("Failed to create member!", e))?;
    let mime_type = staged.mime_type.clone();
    drop(staged);

    let bytes = fs::read(&image_path);
    let _ = fs::remove_file(&image_path);
    let bytes = bytes.map_err(|e| AppError::internal("Failed to create member!", e))?;

    let photo = models::Photo {
        name: name.clone(),
        value: STANDARD.encode(bytes),
        mime_type,
    };
    actions::insert_photo(&photo, conn)
        .map_err(|e| AppError::internal("Failed to create member!", e))?;

    Ok(name)
}

/// Decodes a stored photo back to its raw bytes.
pub fn decode_photo(photo: &models::Photo) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(&photo.value)
}

/// Removes everything inside `dir`, creating it if it does not exist.
pub fn empty_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}
