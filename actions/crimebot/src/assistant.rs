use chrono::{Local, NaiveDateTime};
use tracing::info;

use crate::answer::answer;
use crate::config::{Config, TableSource};
use crate::error::Result;
use crate::filter::QueryFilter;
use crate::hub::HubTableLoader;
use crate::model::{HfInferenceModel, TextModel};
use crate::store::{CsvTableLoader, TableCache, TableLoader};
use crate::types::IncidentRecord;

/// A question answered against the current table
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    /// Records the answer was built from
    pub rows: Vec<IncidentRecord>,
}

/// Owns the process-wide table and the text model
pub struct Assistant<L, M> {
    cache: TableCache<L>,
    model: M,
    max_new_tokens: usize,
}

impl<L: TableLoader, M: TextModel> Assistant<L, M> {
    pub fn new(loader: L, model: M, max_new_tokens: usize) -> Self {
        Self {
            cache: TableCache::new(loader),
            model,
            max_new_tokens,
        }
    }

    /// Answer `question` relative to the local clock
    pub fn ask(&mut self, question: &str) -> Result<Reply> {
        self.ask_at(question, Local::now().naive_local())
    }

    /// Answer `question` with relative phrases anchored at `now`
    pub fn ask_at(&mut self, question: &str, now: NaiveDateTime) -> Result<Reply> {
        let table = self.cache.get()?;
        let filter = QueryFilter::parse(question, &table, now);
        let rows = filter.apply(&table);
        info!(
            matched = rows.len(),
            total = table.len(),
            neighborhood = ?filter.neighborhood,
            group = ?filter.group.map(|g| g.name),
            "Filtered incidents"
        );

        let text = answer(question, &rows, &self.model, self.max_new_tokens)?;
        Ok(Reply { text, rows })
    }

    /// Pick up a table written since the last load
    pub fn reload(&mut self) -> Result<usize> {
        Ok(self.cache.reload()?.len())
    }
}

/// The loader the config asks for
pub fn table_loader(config: &Config) -> Box<dyn TableLoader> {
    match config.table_source {
        TableSource::Local => Box::new(CsvTableLoader::new(config.table_path())),
        TableSource::Hub => Box::new(HubTableLoader::from_config(config)),
    }
}

/// Assistant wired to the configured table and the Inference API
pub fn from_config(config: &Config) -> Assistant<Box<dyn TableLoader>, HfInferenceModel> {
    let model = HfInferenceModel::new(
        config.inference_endpoint.clone(),
        config.model.clone(),
        config.hub_token.clone(),
    );
    Assistant::new(table_loader(config), model, config.max_new_tokens)
}
