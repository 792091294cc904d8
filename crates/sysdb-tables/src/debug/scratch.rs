//! `rethinkdb._debug_scratch`: an in-memory table of arbitrary documents

use async_trait::async_trait;
use dashmap::DashMap;

use sysdb_common::{AdminError, AdminResult, Datum, OperationContext};

use crate::backend::ArtificialTableBackend;
use crate::datum::{as_object, check_primary_key};

#[derive(Default)]
pub struct DebugScratchBackend {
    rows: DashMap<String, Datum>,
}

impl DebugScratchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(pkey: &Datum) -> AdminResult<String> {
        match pkey {
            Datum::Null | Datum::Object(_) => Err(AdminError::invalid(format!(
                "Primary keys must be strings, numbers, booleans or arrays, got {}.",
                pkey
            ))),
            _ => Ok(pkey.to_string()),
        }
    }
}

#[async_trait]
impl ArtificialTableBackend for DebugScratchBackend {
    async fn read_all_rows(&self, ctx: &OperationContext) -> AdminResult<Vec<Datum>> {
        ctx.check_interrupted()?;
        let mut rows: Vec<(String, Datum)> = self
            .rows
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn read_row(&self, ctx: &OperationContext, pkey: &Datum) -> AdminResult<Option<Datum>> {
        ctx.check_interrupted()?;
        let Ok(key) = Self::key(pkey) else {
            return Ok(None);
        };
        Ok(self.rows.get(&key).map(|row| row.value().clone()))
    }

    async fn write_row(
        &self,
        ctx: &OperationContext,
        pkey: &Datum,
        new_value: Option<Datum>,
    ) -> AdminResult<()> {
        ctx.check_interrupted()?;
        let key = Self::key(pkey)?;
        match new_value {
            Some(row) => {
                check_primary_key(as_object(&row)?, pkey)?;
                self.rows.insert(key, row);
            }
            None => {
                self.rows.remove(&key);
            }
        }
        Ok(())
    }
}
