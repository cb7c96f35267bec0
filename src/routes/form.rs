use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::{AppError, AppResult};

/// A drained multipart body: text fields by name, file parts by name.
#[derive(Debug, Default)]
pub struct MultipartForm {
    texts: HashMap<String, String>,
    files: HashMap<String, Bytes>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if field.file_name().is_some() {
                let data = field.bytes().await.map_err(bad_body)?;
                // browsers send an empty part when no file was picked
                if !data.is_empty() {
                    form.files.insert(name, data);
                }
            } else {
                let value = field.text().await.map_err(bad_body)?;
                form.texts.insert(name, value);
            }
        }
        Ok(form)
    }

    /// Trimmed text value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, name: &str) -> AppResult<&str> {
        self.text(name)
            .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
    }

    /// `true`/`false` text field; absent is `false`.
    pub fn flag(&self, name: &str) -> AppResult<bool> {
        match self.text(name) {
            None => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(AppError::Validation(format!(
                "{} must be true or false, got {}",
                name, v
            ))),
        }
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> AppResult<Option<T>> {
        self.text(name)
            .map(|v| {
                v.parse()
                    .map_err(|_| AppError::Validation(format!("{} is not a valid number", name)))
            })
            .transpose()
    }

    pub fn parse_required<T: FromStr>(&self, name: &str) -> AppResult<T> {
        self.parse(name)?
            .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
    }

    pub fn take_file(&mut self, name: &str) -> Option<Bytes> {
        self.files.remove(name)
    }
}

fn bad_body(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart body: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(texts: &[(&str, &str)]) -> MultipartForm {
        MultipartForm {
            texts: texts
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }

    #[test]
    fn blank_text_is_absent() {
        let f = form(&[("region", "  "), ("nickName", " bob ")]);
        assert_eq!(f.text("region"), None);
        assert_eq!(f.text("nickName"), Some("bob"));
        assert!(matches!(f.require("region"), Err(AppError::Validation(_))));
    }

    #[test]
    fn flags_and_numbers() {
        let f = form(&[("isCarVisit", "TRUE"), ("taste", "3"), ("service", "x")]);
        assert!(f.flag("isCarVisit").unwrap());
        assert!(!f.flag("isImageChanged").unwrap());
        assert_eq!(f.parse::<i64>("taste").unwrap(), Some(3));
        assert_eq!(f.parse::<i64>("missing").unwrap(), None);
        assert!(f.parse::<i64>("service").is_err());
        assert!(f.parse_required::<i64>("missing").is_err());
    }
}
