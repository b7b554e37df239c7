//! Bounded streaming search and statistics over large visa disclosure CSV datasets.
//!
//! Dataset files are read forward-only in fixed-size chunks. A
//! [`planner::ScanPlanner`] feeds the chunks to either a
//! [`pagination::PaginationAccumulator`] (search) or a
//! [`aggregate::StatsAggregator`] (statistics) and stops as soon as the
//! consumer is satisfied or a resource bound is reached.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod config_file;
pub mod dataset;
pub mod decompression;
pub mod error_handling;
pub mod matcher;
pub mod pagination;
pub mod planner;
pub mod platform;
pub mod readers;
pub mod record;
pub mod service;
pub mod stats;
pub mod tty;

pub use aggregate::{StatsAggregator, StatsReport};
pub use config::VisascanConfig;
pub use dataset::{DatasetCategory, DatasetIndex};
pub use pagination::{Page, PaginationAccumulator};
pub use planner::{ScanBounds, ScanPlanner, ScanSummary, StopReason};
pub use record::{FieldValue, Record};
pub use service::{SearchRequest, StatsRequest};
