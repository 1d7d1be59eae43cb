use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::error::ApiError;
use crate::types::{FormValue, NodeForm, NodeSpec};

/// Body extractor accepting both `application/json` and urlencoded forms.
///
/// A request without a `Content-Type` is treated as an empty form so that
/// the handler's own field validation decides the response.
pub struct FormOrJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for FormOrJson<T>
where
    T: DeserializeOwned + Default + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        match content_type.as_deref() {
            None => Ok(Self(T::default())),
            Some(ct) if ct.starts_with("application/json") => {
                let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
                    debug!("Rejected JSON body: {}", e);
                    ApiError::Validation
                })?;
                Ok(Self(value))
            }
            Some(_) => {
                let Form(value) = Form::<T>::from_request(req, state).await.map_err(|e| {
                    debug!("Rejected form body: {}", e);
                    ApiError::Validation
                })?;
                Ok(Self(value))
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("field `{0}` is missing or invalid")]
pub struct ValidationError(pub &'static str);

fn text(value: &Option<FormValue>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(FormValue::Text(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(ValidationError(field)),
    }
}

/// Zero counts as missing.
fn number(value: &Option<FormValue>, field: &'static str) -> Result<u64, ValidationError> {
    let n = match value {
        Some(FormValue::Integer(n)) => *n,
        Some(FormValue::Text(s)) => s.trim().parse().map_err(|_| ValidationError(field))?,
        _ => return Err(ValidationError(field)),
    };
    if n == 0 {
        return Err(ValidationError(field));
    }
    Ok(n)
}

fn clean_tags<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// A submitted list may be empty; a blank string is missing.
fn tags(value: &Option<FormValue>) -> Result<Vec<String>, ValidationError> {
    match value {
        Some(FormValue::List(list)) => Ok(clean_tags(list.iter().map(String::as_str))),
        Some(FormValue::Text(s)) if !s.is_empty() => Ok(clean_tags(s.split(','))),
        _ => Err(ValidationError("tags")),
    }
}

impl NodeForm {
    /// Check that every required field is present and well formed.
    pub fn validate(&self) -> Result<NodeSpec, ValidationError> {
        let port = number(&self.port, "port")?;

        Ok(NodeSpec {
            name: text(&self.name, "name")?,
            tags: tags(&self.tags)?,
            ram: number(&self.ram, "ram")?,
            disk: number(&self.disk, "disk")?,
            processor: number(&self.processor, "processor")?,
            address: text(&self.address, "address")?,
            port: u16::try_from(port)
                .map_err(|_| ValidationError("port"))?,
        })
    }

    /// The submitted API key, with blank treated as absent.
    pub fn api_key(&self) -> Option<String> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn json_form(value: serde_json::Value) -> NodeForm {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_json_form() {
        let form = json_form(json!({
            "name": "n1",
            "tags": ["x"],
            "ram": 1024,
            "disk": 10,
            "processor": 1,
            "address": "10.0.0.5",
            "port": 8080
        }));

        let spec = form.validate().unwrap();
        assert_eq!(spec.name, "n1");
        assert_eq!(spec.tags, vec!["x"]);
        assert_eq!(spec.ram, 1024);
        assert_eq!(spec.port, 8080);
    }

    #[test]
    fn test_validate_string_values() {
        let form = json_form(json!({
            "name": "n1",
            "tags": "eu, ssd ,",
            "ram": "2048",
            "disk": "20",
            "processor": "4",
            "address": "node.example",
            "port": "443"
        }));

        let spec = form.validate().unwrap();
        assert_eq!(spec.tags, vec!["eu", "ssd"]);
        assert_eq!(spec.ram, 2048);
        assert_eq!(spec.port, 443);
    }

    #[test]
    fn test_each_missing_field_is_reported() {
        let full = json!({
            "name": "n1",
            "tags": ["x"],
            "ram": 1024,
            "disk": 10,
            "processor": 1,
            "address": "10.0.0.5",
            "port": 8080
        });

        for field in ["name", "tags", "ram", "disk", "processor", "address", "port"] {
            let mut value = full.clone();
            value.as_object_mut().unwrap().remove(field);
            let err = json_form(value).validate().unwrap_err();
            assert_eq!(err.0, field);
        }
    }

    #[test]
    fn test_rejects_blank_and_out_of_range_values() {
        let form = json_form(json!({
            "name": "  ",
            "tags": ["x"],
            "ram": 1, "disk": 1, "processor": 1,
            "address": "a", "port": 1
        }));
        assert_eq!(form.validate().unwrap_err().0, "name");

        let form = json_form(json!({
            "name": "n", "tags": ["x"],
            "ram": "lots", "disk": 1, "processor": 1,
            "address": "a", "port": 1
        }));
        assert_eq!(form.validate().unwrap_err().0, "ram");

        let form = json_form(json!({
            "name": "n", "tags": ["x"],
            "ram": 1, "disk": 1, "processor": 1,
            "address": "a", "port": 70000
        }));
        assert_eq!(form.validate().unwrap_err().0, "port");
    }

    #[test]
    fn test_zero_counts_as_missing() {
        for field in ["ram", "disk", "processor", "port"] {
            let mut value = json!({
                "name": "n", "tags": ["x"],
                "ram": 1, "disk": 1, "processor": 1,
                "address": "a", "port": 1
            });
            value[field] = json!(0);
            assert_eq!(json_form(value).validate().unwrap_err().0, field);
        }

        let form = json_form(json!({
            "name": "n", "tags": ["x"],
            "ram": "0", "disk": 1, "processor": 1,
            "address": "a", "port": 1
        }));
        assert_eq!(form.validate().unwrap_err().0, "ram");
    }

    #[test]
    fn test_empty_tag_list_is_accepted() {
        let form = json_form(json!({
            "name": "n", "tags": [],
            "ram": 1, "disk": 1, "processor": 1,
            "address": "a", "port": 1
        }));
        assert!(form.validate().unwrap().tags.is_empty());

        let form = json_form(json!({
            "name": "n", "tags": "",
            "ram": 1, "disk": 1, "processor": 1,
            "address": "a", "port": 1
        }));
        assert_eq!(form.validate().unwrap_err().0, "tags");
    }

    #[test]
    fn test_blank_api_key_is_none() {
        let form = json_form(json!({ "apiKey": "   " }));
        assert_eq!(form.api_key(), None);

        let form = json_form(json!({ "apiKey": "abc" }));
        assert_eq!(form.api_key().as_deref(), Some("abc"));
    }
}
