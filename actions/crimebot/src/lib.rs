//! Question answering over Cincinnati calls-for-service data.
//!
//! The library filters the stored incident table with keyword and date
//! heuristics, summarizes the matches, and hands the summary to a text
//! model. A separate refresh job keeps the stored table and its published
//! copy current.

pub mod answer;
pub mod assistant;
pub mod config;
pub mod error;
pub mod filter;
pub mod hub;
pub mod logging;
pub mod model;
pub mod offense;
pub mod refresh;
pub mod source;
pub mod store;
pub mod summary;
pub mod transform;
pub mod types;

#[cfg(test)]
mod test_server;

pub use answer::{answer, build_prompt, NO_DATA_ANSWER};
pub use assistant::{Assistant, Reply};
pub use config::{Config, ConfigBuilder, FileConfig, TableSource};
pub use error::{Error, Result};
pub use filter::{filter_rows, filter_rows_at, FilterResult, QueryFilter};
pub use hub::{BlobUploader, HubClient};
pub use model::{HfInferenceModel, TextModel};
pub use refresh::{refresh, RefreshReport};
pub use source::{SocrataClient, TabularSource};
pub use store::{TableCache, TableLoader};
pub use summary::summarize;
pub use types::{IncidentRecord, RawRecord, RawTable};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::answer::answer;
    pub use crate::assistant::{Assistant, Reply};
    pub use crate::config::{Config, ConfigBuilder, FileConfig, TableSource};
    pub use crate::error::{Error, Result};
    pub use crate::filter::filter_rows;
    pub use crate::hub::{BlobUploader, HubClient};
    pub use crate::model::TextModel;
    pub use crate::source::{SocrataClient, TabularSource};
    pub use crate::store::TableLoader;
    pub use crate::summary::summarize;
    pub use crate::types::IncidentRecord;
}
