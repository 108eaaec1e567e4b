// src/cache.rs

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::sync::{Mutex, OnceCell};

use crate::{error::AppError, models::survey::Survey};

pub const SURVEY_CACHE_PREFIX: &str = "survey:";
pub const SURVEY_CACHE_TTL_SECS: u64 = 300;

/// Disposable cache of survey rows, keyed by public path.
///
/// Never authoritative: a rebuildable projection of the surveys table, safe
/// to clear or lose at any time. Entries carry a TTL so staleness self-heals
/// even if an invalidation is missed. "Not found" is a distinct outcome from
/// an error; callers treat errors as a miss.
#[derive(Clone)]
pub struct SurveyCache {
    conn: ConnectionManager,
}

impl SurveyCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn get(&self, path: &str) -> Result<Option<Survey>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(path)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set(&self, path: &str, survey: &Survey) -> Result<(), AppError> {
        let payload = serde_json::to_string(survey)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(Self::key(path), payload, SURVEY_CACHE_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(path)).await?;
        Ok(())
    }

    fn key(path: &str) -> String {
        format!("{SURVEY_CACHE_PREFIX}{path}")
    }
}

/// Collapses concurrent loads for the same key into a single in-flight one.
///
/// All callers racing on one key share the leader's result, errors included;
/// only the leader's closure runs (so cache population happens exactly once
/// per miss episode). Completed flights are retired, a later call for the
/// same key starts a fresh load.
pub struct Singleflight<T> {
    inflight: Mutex<HashMap<String, Arc<OnceCell<Result<T, AppError>>>>>,
}

impl<T: Clone> Singleflight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub async fn run<F, Fut>(&self, key: &str, load: F) -> Result<T, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // Exactly one caller runs `load`; the rest await the stored result.
        let result = cell.get_or_init(|| async { load().await }).await.clone();

        // Retire the flight. The pointer check keeps a finisher from removing
        // a newer generation that raced in after its own flight completed.
        let mut inflight = self.inflight.lock().await;
        let same_flight = inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell));
        if same_flight {
            inflight.remove(key);
        }

        result
    }
}

impl<T: Clone> Default for Singleflight<T> {
    fn default() -> Self {
        Self::new()
    }
}
