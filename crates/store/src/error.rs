// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database busy after {attempts} retries: {source}")]
    RetriesExhausted {
        attempts: u32,
        source: rusqlite::Error,
    },

    #[error("stored JSON is invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("stored row has invalid {field}: '{value}'")]
    InvalidColumn { field: &'static str, value: String },
}
