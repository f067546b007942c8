use std::path::Path;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use tracing::{error, info, warn};

use crate::api::{self, ApiClient};
use crate::auth::TokenStore;
use crate::error::{AppError, AuthError, FieldErrors};

/// Categories a seller can list a tool under.
pub const UPLOAD_CATEGORIES: [&str; 9] = [
    "Web Development",
    "Mobile Apps",
    "Desktop Apps",
    "APIs & Backend",
    "Design Tools",
    "DevOps & Deployment",
    "Testing Tools",
    "Code Libraries",
    "Other",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            file_name,
            mime,
            bytes,
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        Ok(Self::new(file_name, bytes))
    }

    fn into_part(self) -> Result<Part, AppError> {
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)
            .map_err(|e| AppError::InternalError(format!("invalid mime type: {}", e)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub tool_name: String,
    pub description: String,
    /// Raw text from the price input.
    pub price: String,
    pub category: String,
    pub file: Option<Attachment>,
    pub image: Option<Attachment>,
}

impl UploadForm {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();

        if self.tool_name.trim().is_empty() {
            errors.add("toolName", "Tool name is required");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "Description is required");
        }
        match self.price.trim().parse::<f64>() {
            Ok(price) if price.is_finite() && price > 0.0 => {}
            _ => errors.add("price", "Valid price is required"),
        }
        if self.category.is_empty() {
            errors.add("category", "Category is required");
        } else if !UPLOAD_CATEGORIES.contains(&self.category.as_str()) {
            errors.add("category", "Unknown category");
        }
        if self.file.is_none() {
            errors.add("file", "Tool file is required");
        }

        errors
    }

    fn into_multipart(self) -> Result<Form, AppError> {
        let mut form = Form::new()
            .text("toolName", self.tool_name)
            .text("description", self.description)
            .text("price", self.price.trim().to_string())
            .text("category", self.category);

        if let Some(file) = self.file {
            form = form.part("file", file.into_part()?);
        }
        if let Some(image) = self.image {
            form = form.part("image", image.into_part()?);
        }
        Ok(form)
    }
}

pub struct UploadService {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
}

impl UploadService {
    pub fn new(api: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self { api, tokens }
    }

    /// Validate the form and submit it as a multipart request.
    ///
    /// Nothing is sent when validation fails or no token is stored.
    pub async fn upload(&self, form: UploadForm) -> Result<(), AppError> {
        form.validate().into_result()?;

        let token = match self.tokens.load().await? {
            Some(token) => token,
            None => {
                warn!("Upload attempted without a stored token");
                return Err(AuthError::Unauthenticated.into());
            }
        };

        let tool_name = form.tool_name.clone();
        info!("Uploading tool: {}", tool_name);
        let multipart = form.into_multipart()?;

        match self.api.post_multipart(api::UPLOAD_PATH, multipart, &token).await {
            Ok(_) => {
                info!("Upload successful for tool: {}", tool_name);
                Ok(())
            }
            Err(e) => {
                error!("Upload failed for tool: {}: {}", tool_name, e);
                Err(e)
            }
        }
    }
}
