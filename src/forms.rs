// Form payloads for the mutation handlers. Validation failures collect
// field-level errors that the rendering layer redisplays with the form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").unwrap());

pub type FieldErrors = BTreeMap<&'static str, String>;

/// Create/edit payload for a post. `group` carries the group slug; empty
/// strings from blank form fields collapse to None.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PostForm {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

/// Validated fields of a PostForm, with the group still as a slug; the
/// handler resolves it to an id against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFields {
    pub text: String,
    pub group_slug: Option<String>,
    pub image: Option<String>,
}

impl PostForm {
    pub fn validate(&self) -> Result<PostFields, FieldErrors> {
        let mut errors = FieldErrors::new();

        let text = self.text.as_deref().unwrap_or("").trim().to_string();
        if text.is_empty() {
            errors.insert("text", "This field is required.".to_string());
        }

        let group_slug = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(slug) if SLUG_RE.is_match(slug) => Some(slug.to_string()),
            Some(_) => {
                errors.insert("group", "Enter a valid group slug.".to_string());
                None
            }
        };

        let image = match self.image.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(reference) => Some(reference.to_string()),
        };

        if errors.is_empty() {
            Ok(PostFields {
                text,
                group_slug,
                image,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentForm {
    pub text: Option<String>,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let text = self.text.as_deref().unwrap_or("").trim().to_string();
        if text.is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert("text", "This field is required.".to_string());
            return Err(errors);
        }
        Ok(text)
    }
}
