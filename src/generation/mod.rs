//! Content generation: request validation, prompt building and the service that
//! ties the entitlement ledger, completion provider and history together.

use crate::database::entities::GenerationRecord;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub mod prompt;
pub mod service;

pub use service::GenerationService;

macro_rules! option_enum {
    ($(#[$meta:meta])* $name:ident, $label:literal { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Comma-separated list of accepted values
            pub fn options() -> String {
                Self::ALL
                    .iter()
                    .map(|value| value.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.as_str() == s)
                    .ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "Invalid {}. Options: {}",
                            $label,
                            Self::options()
                        ))
                    })
            }
        }
    };
}

option_enum!(
    /// Kind of content to produce
    ContentType, "content type" {
        PostSocial => "post_social",
        Email => "email",
        Description => "description",
        Title => "title",
        BlogPost => "blog_post",
    }
);

option_enum!(
    Tone, "tone" {
        Profesional => "profesional",
        Casual => "casual",
        Amigable => "amigable",
        Formal => "formal",
        Creativo => "creativo",
        Persuasivo => "persuasivo",
    }
);

option_enum!(
    Length, "length" {
        Corta => "corta",
        Media => "media",
        Larga => "larga",
    }
);

/// Generation request as received over HTTP
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GenerationRequest {
    /// One of post_social, email, description, title, blog_post
    pub content_type: String,
    pub topic: String,
    /// One of profesional, casual, amigable, formal, creativo, persuasivo
    pub tone: String,
    /// One of corta, media, larga
    pub length: String,
    #[serde(default)]
    pub additional_prompt: Option<String>,
}

/// Request whose options have all been checked
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub content_type: ContentType,
    pub topic: String,
    pub tone: Tone,
    pub length: Length,
    pub additional_prompt: Option<String>,
}

impl GenerationRequest {
    /// Check every field against its closed option set
    pub fn validate(&self) -> Result<ValidatedRequest, AppError> {
        let content_type = self.content_type.parse::<ContentType>()?;
        let tone = self.tone.parse::<Tone>()?;
        let length = self.length.parse::<Length>()?;

        if self.topic.trim().is_empty() {
            return Err(AppError::BadRequest("Topic must not be empty".to_string()));
        }

        // Stored exactly as submitted
        Ok(ValidatedRequest {
            content_type,
            topic: self.topic.clone(),
            tone,
            length,
            additional_prompt: self.additional_prompt.clone(),
        })
    }
}

/// Stored generation as returned to clients
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GenerationResponse {
    pub id: i32,
    pub content_type: String,
    pub topic: String,
    pub tone: String,
    pub length: String,
    pub additional_prompt: Option<String>,
    pub generated_content: String,
    pub tokens_used: Option<i32>,
    /// Provider latency in milliseconds
    pub processing_time: Option<i32>,
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<GenerationRecord> for GenerationResponse {
    fn from(record: GenerationRecord) -> Self {
        Self {
            id: record.id,
            content_type: record.content_type,
            topic: record.topic,
            tone: record.tone,
            length: record.length,
            additional_prompt: record.additional_prompt,
            generated_content: record.generated_content,
            tokens_used: record.tokens_used,
            processing_time: record.processing_time_ms,
            model_used: record.model_used,
            created_at: record.created_at,
        }
    }
}
