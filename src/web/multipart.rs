// src/web/multipart.rs
use crate::{error::AppError, services::upload_service::UploadedFile};
use axum::extract::Multipart;
use std::collections::HashMap;

/// Text fields and uploaded files of a multipart form, keyed by field name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(upload_error)?;
                    let file_name = Some(file_name).filter(|f| !f.is_empty());
                    form.files.insert(name, UploadedFile { file_name, content_type, bytes });
                }
                None => {
                    let text = field.text().await.map_err(upload_error)?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    /// The named file, unless the input was left empty.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.is_empty())
    }
}

fn upload_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::warn!("Multipart error: {}", e);
    AppError::Upload("The upload could not be read. The file may be too large.".into())
}
