//! Response shapes of the admin API
//!
//! List endpoints answer either with a bare array or with an envelope
//! `{data, pagination?}`; item endpoints with `{data: T}` or a bare `T`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use sf_common::WirePageMeta;

use crate::{ClientError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum ListResponse<T> {
    BareArray(Vec<T>),
    Enveloped { data: Vec<T>, pagination: Option<WirePageMeta> },
}

impl<T: DeserializeOwned> ListResponse<T> {
    pub fn decode(body: Value) -> Result<Self> {
        match body {
            Value::Array(_) => serde_json::from_value(body)
                .map(ListResponse::BareArray)
                .map_err(|e| ClientError::Decode(e.to_string())),
            Value::Object(mut map) => {
                let data = map
                    .remove("data")
                    .ok_or_else(|| ClientError::Decode("list response has no `data` field".to_string()))?;
                let data = serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))?;

                let pagination = match map.remove("pagination") {
                    None | Some(Value::Null) => None,
                    Some(meta) => Some(
                        serde_json::from_value(meta).map_err(|e| ClientError::Decode(e.to_string()))?,
                    ),
                };

                Ok(ListResponse::Enveloped { data, pagination })
            }
            other => Err(ClientError::Decode(format!("expected array or object, got {}", kind_of(&other)))),
        }
    }
}

/// Single entity, enveloped or bare
#[derive(Debug, Clone, PartialEq)]
pub enum ItemResponse<T> {
    Enveloped(T),
    Bare(T),
}

impl<T: DeserializeOwned> ItemResponse<T> {
    pub fn decode(body: Value) -> Result<Self> {
        if let Some(data) = body.get("data") {
            if let Ok(item) = serde_json::from_value(data.clone()) {
                return Ok(ItemResponse::Enveloped(item));
            }
        }

        serde_json::from_value(body)
            .map(ItemResponse::Bare)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl<T> ItemResponse<T> {
    pub fn into_inner(self) -> T {
        match self {
            ItemResponse::Enveloped(item) | ItemResponse::Bare(item) => item,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Listing {
        id: i64,
        title: String,
    }

    #[test]
    fn test_bare_array() {
        let decoded: ListResponse<Listing> = ListResponse::decode(json!([{"id": 1, "title": "a"}])).unwrap();
        assert_eq!(decoded, ListResponse::BareArray(vec![Listing { id: 1, title: "a".into() }]));

        let empty: ListResponse<Listing> = ListResponse::decode(json!([])).unwrap();
        assert_eq!(empty, ListResponse::BareArray(vec![]));
    }

    #[test]
    fn test_envelope_with_and_without_pagination() {
        let with: ListResponse<Listing> = ListResponse::decode(json!({
            "data": [{"id": 2, "title": "b"}],
            "pagination": {"page": 2, "limit": 1, "total": 3, "totalPages": 3}
        })).unwrap();
        match with {
            ListResponse::Enveloped { data, pagination } => {
                assert_eq!(data.len(), 1);
                assert_eq!(
                    pagination,
                    Some(WirePageMeta { page: Some(2), limit: Some(1), total: Some(3), total_pages: Some(3) })
                );
            }
            other => panic!("unexpected {:?}", other),
        }

        let without: ListResponse<Listing> = ListResponse::decode(json!({"data": []})).unwrap();
        assert_eq!(without, ListResponse::Enveloped { data: vec![], pagination: None });
    }

    #[test]
    fn test_list_shape_errors() {
        assert!(ListResponse::<Listing>::decode(json!({"items": []})).is_err());
        assert!(ListResponse::<Listing>::decode(json!("nope")).is_err());
        assert!(ListResponse::<Listing>::decode(json!([{"id": "x"}])).is_err());
    }

    #[test]
    fn test_item_response() {
        let enveloped: ItemResponse<Listing> = ItemResponse::decode(json!({"data": {"id": 5, "title": "e"}})).unwrap();
        assert!(matches!(enveloped, ItemResponse::Enveloped(_)));
        assert_eq!(enveloped.into_inner().id, 5);

        let bare: ItemResponse<Listing> = ItemResponse::decode(json!({"id": 6, "title": "f"})).unwrap();
        assert_eq!(bare.into_inner(), Listing { id: 6, title: "f".into() });

        assert!(ItemResponse::<Listing>::decode(json!(null)).is_err());
    }
}
