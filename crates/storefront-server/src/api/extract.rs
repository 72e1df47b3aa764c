//! Extractors that reject with the API error envelope instead of axum's
//! plain-text rejections.

use std::{collections::BTreeMap, str::FromStr};

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::ApiError;

/// JSON request body.
pub(super) struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Numeric path segments.
pub(super) struct Ids<T>(pub T);

impl<S, T> FromRequestParts<S> for Ids<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Raw query-string parameters. Known keys are taken out one by one; what
/// is left over is treated as option filters.
#[derive(Debug, Default)]
pub(super) struct Params(BTreeMap<String, String>);

impl From<BTreeMap<String, String>> for Params {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl Params {
    pub(super) fn take<T: FromStr>(&mut self, key: &str) -> Result<Option<T>, ApiError> {
        let Some(raw) = self.0.remove(key) else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<T>()
            .map(Some)
            .map_err(|_| ApiError::validation(format!("invalid value for '{key}': '{raw}'")))
    }

    /// Comma-separated id list, e.g. `ids=1,2,3`.
    pub(super) fn take_ids(&mut self, key: &str) -> Result<Vec<i64>, ApiError> {
        let Some(raw) = self.0.remove(key) else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>().map_err(|_| {
                    ApiError::validation(format!("invalid id in '{key}': '{part}'"))
                })
            })
            .collect()
    }

    pub(super) fn into_rest(self) -> BTreeMap<String, String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::from(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn take_parses_and_removes_known_keys() {
        let mut p = params(&[("page", "2"), ("isDefault", "true"), ("color", "red")]);
        assert_eq!(p.take::<i64>("page").unwrap(), Some(2));
        assert_eq!(p.take::<bool>("isDefault").unwrap(), Some(true));
        assert_eq!(p.take::<i64>("pageSize").unwrap(), None);
        let rest = p.into_rest();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn take_rejects_unparseable_values() {
        let mut p = params(&[("page", "two")]);
        let err = p.take::<i64>("page").unwrap_err();
        assert_eq!(err.status_code, 400);
    }

    #[test]
    fn take_ids_splits_commas() {
        let mut p = params(&[("ids", "1, 2,,3")]);
        assert_eq!(p.take_ids("ids").unwrap(), vec![1, 2, 3]);
        let mut bad = params(&[("ids", "1,x")]);
        assert!(bad.take_ids("ids").is_err());
    }
}
