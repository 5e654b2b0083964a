/*!
# Tribes

Score and attendance tracker for a youth group split into tribes.

## Overview

Two tables are kept as CSV files in a data directory:

- **points** (`pontos_tribos.csv`): game points per tribe and date
- **connection** (`conexao_tribos.csv`): how many young people each tribe
  brought to a meeting

Everything sits behind a single shared access code. Once logged in, a user
can record rows, filter a table by tribe and date range, edit or delete rows
of the filtered view, and see per-tribe totals as text bars or a PNG chart.

## Architecture

### Core (always built)
- Record types and CSV parsing with tolerant header names
- A record store that re-reads its file before every mutation and writes
  atomically through a temp file
- Filters, per-tribe summaries and the session gate
- A controller (`App`) that every front end drives

### Front ends
- `tribes` binary: line-oriented console
- `website` binary (`web` feature): JSON HTTP API on axum with chart and
  spreadsheet export

### Persistence
- CSV files as the source of truth
- Gzip-compressed bincode snapshots of both tables for backup and restore

## Modules

- **record**: row types, tribes and field parsing
- **dataset**: in-memory tables and filtered views with positional identity
- **loader**: CSV reading
- **downloader**: CSV and XLSX export
- **saving**: atomic CSV writes and snapshots
- **store**: the two datasets and their files
- **filter**: tribe and date-range filters
- **report**: per-tribe totals
- **login**: access code gate
- **config**: settings from the environment
- **controller**: operations shared by every front end
- **console**: command interpreter for the terminal front end
- **graph**: bar chart rendering (`web` feature)
- **app**: HTTP routes (`web` feature)
*/

#[cfg(feature = "web")]
pub mod app;
pub mod config;
pub mod console;
pub mod controller;
pub mod dataset;
pub mod downloader;
pub mod error;
pub mod filter;
#[cfg(feature = "web")]
pub mod graph;
pub mod loader;
pub mod login;
pub mod record;
pub mod report;
pub mod saving;
pub mod store;

pub use config::Config;
pub use controller::App;
pub use error::{TribesError, TribesResult};
pub use record::{ConnectionRecord, DatasetKind, PointsRecord, Tribe};
