/*
 *  Copyright 2025 Vellum Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Engine configuration.
//!
//! All tunables live in one explicit [`EngineConfig`] passed to the runner
//! and scheduler at construction time — there are no process-wide default
//! lookups.
//!
//! # Construction
//!
//! ```rust
//! use std::time::Duration;
//! use vellum::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .cell_timeout(Duration::from_secs(120))
//!     .schedule_batch_size(50)
//!     .build();
//! ```

use std::time::Duration;
use uuid::Uuid;

/// Configuration for the notebook engine.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct EngineConfig {
    default_data_source_id: Option<Uuid>,
    cell_timeout: Duration,
    schedule_batch_size: usize,
}

impl EngineConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Fallback data source for SQL cells in notebooks that have none of
    /// their own.
    pub fn default_data_source_id(&self) -> Option<Uuid> {
        self.default_data_source_id
    }

    /// Maximum wall-clock time one cell may execute before it is recorded
    /// as a timed-out error.
    pub fn cell_timeout(&self) -> Duration {
        self.cell_timeout
    }

    /// Maximum number of due schedules one scheduler pass will fire.
    pub fn schedule_batch_size(&self) -> usize {
        self.schedule_batch_size
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_data_source_id: None,
            cell_timeout: Duration::from_secs(300),
            schedule_batch_size: 200,
        }
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: Option<EngineConfig>,
}

impl EngineConfigBuilder {
    fn config_mut(&mut self) -> &mut EngineConfig {
        self.config.get_or_insert_with(EngineConfig::default)
    }

    /// Sets the default data source for newly created notebooks.
    pub fn default_data_source_id(mut self, id: Uuid) -> Self {
        self.config_mut().default_data_source_id = Some(id);
        self
    }

    /// Sets the per-cell execution timeout.
    pub fn cell_timeout(mut self, timeout: Duration) -> Self {
        self.config_mut().cell_timeout = timeout;
        self
    }

    /// Sets the scheduler batch size.
    pub fn schedule_batch_size(mut self, size: usize) -> Self {
        self.config_mut().schedule_batch_size = size;
        self
    }

    /// Builds the configuration.
    pub fn build(mut self) -> EngineConfig {
        self.config.take().unwrap_or_default()
    }
}
