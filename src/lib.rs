//! gator: a multi-user RSS aggregator.
//!
//! Users register feeds and follow them; `agg` polls the feed that is most
//! overdue on every tick and stores new items as posts, which `browse` lists.

pub mod commands;
pub mod config;
pub mod feed;
pub mod scheduler;
pub mod storage;
pub mod util;
