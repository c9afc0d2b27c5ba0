//! Flow Configuration
//!
//! Pacing and tuning values for the consultation flow. Every delay is
//! presentation pacing only; compressing them does not change behavior.

use std::path::Path;
use std::time::Duration;

use guided_triage_core::{CoreError, CoreResult, RandomSampler};
use serde::{Deserialize, Serialize};

/// Timings and constants for one flow service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Delay before the hospital acknowledgement enters the conversation
    pub hospital_ack_delay_ms: u64,
    /// Delay before an assistant reply lands
    pub reply_delay_ms: u64,
    /// Delay between intake completing and analysis starting
    pub intake_to_analysis_delay_ms: u64,
    /// Delay between analysis starting and the first step running
    pub analysis_start_delay_ms: u64,
    /// Offset between consecutive task starts within a step
    pub task_stagger_ms: u64,
    /// Progress tick interval per task
    pub tick_interval_ms: u64,
    /// Smallest random progress increment (percentage points)
    pub min_increment: u8,
    /// Largest random progress increment (percentage points)
    pub max_increment: u8,
    /// Delay between a step's last task completing and its completion event
    pub settle_delay_ms: u64,
    /// Delay before the next step runs
    pub next_step_delay_ms: u64,
    /// Delay between the last step completing and the result stage
    pub result_delay_ms: u64,
    /// Delay before the first step receives its early confidence estimate
    pub confidence_seed_delay_ms: u64,
    pub confidence_seed: u8,
    /// Added by each user action on the confidence-bearing step
    pub action_bonus: u8,
    /// Starting point when a user action arrives before the seed
    pub confidence_base: u8,
    /// Number of conversational turns that complete intake
    pub intake_turns: usize,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            hospital_ack_delay_ms: 500,
            reply_delay_ms: 1500,
            intake_to_analysis_delay_ms: 1000,
            analysis_start_delay_ms: 300,
            task_stagger_ms: 800,
            tick_interval_ms: 200,
            min_increment: 10,
            max_increment: 40,
            settle_delay_ms: 500,
            next_step_delay_ms: 800,
            result_delay_ms: 1500,
            confidence_seed_delay_ms: 2000,
            confidence_seed: 65,
            action_bonus: 15,
            confidence_base: 50,
            intake_turns: 3,
            event_capacity: 1024,
        }
    }
}

impl FlowConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_interval_ms == 0 {
            return Err("tick_interval_ms must be positive".to_string());
        }
        if self.min_increment == 0 {
            return Err("min_increment must be positive".to_string());
        }
        if self.min_increment > self.max_increment {
            return Err(format!(
                "Invalid increment range: {}..={}",
                self.min_increment, self.max_increment
            ));
        }
        if self.max_increment > 100 {
            return Err("max_increment cannot exceed 100".to_string());
        }
        if self.confidence_seed > 100 || self.confidence_base > 100 {
            return Err("confidence values cannot exceed 100".to_string());
        }
        if self.action_bonus > 100 {
            return Err("action_bonus cannot exceed 100".to_string());
        }
        if self.intake_turns == 0 {
            return Err("intake_turns must be at least 1".to_string());
        }
        if self.event_capacity == 0 {
            return Err("event_capacity must be positive".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FlowConfig = serde_json::from_str(&content)?;
        config.validate().map_err(CoreError::config)?;
        Ok(config)
    }

    /// Load from `path` if it exists and is valid, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Save configuration to a JSON file with pretty formatting
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        self.validate().map_err(CoreError::config)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Copy with every delay multiplied by `factor` (e.g. 0.1 for a fast demo).
    /// The tick interval never drops below one millisecond.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| ((ms as f64) * factor.max(0.0)).round() as u64;
        Self {
            hospital_ack_delay_ms: scale(self.hospital_ack_delay_ms),
            reply_delay_ms: scale(self.reply_delay_ms),
            intake_to_analysis_delay_ms: scale(self.intake_to_analysis_delay_ms),
            analysis_start_delay_ms: scale(self.analysis_start_delay_ms),
            task_stagger_ms: scale(self.task_stagger_ms),
            tick_interval_ms: scale(self.tick_interval_ms).max(1),
            settle_delay_ms: scale(self.settle_delay_ms),
            next_step_delay_ms: scale(self.next_step_delay_ms),
            result_delay_ms: scale(self.result_delay_ms),
            confidence_seed_delay_ms: scale(self.confidence_seed_delay_ms),
            ..self.clone()
        }
    }

    /// Entropy-seeded sampler over the configured increment range
    pub fn sampler(&self) -> CoreResult<RandomSampler> {
        RandomSampler::new(self.min_increment, self.max_increment)
    }

    pub fn hospital_ack_delay(&self) -> Duration {
        Duration::from_millis(self.hospital_ack_delay_ms)
    }

    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn intake_to_analysis_delay(&self) -> Duration {
        Duration::from_millis(self.intake_to_analysis_delay_ms)
    }

    pub fn analysis_start_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_start_delay_ms)
    }

    /// Start offset of the task at `task_index`
    pub fn task_start_offset(&self, task_index: usize) -> Duration {
        Duration::from_millis(self.task_stagger_ms.saturating_mul(task_index as u64))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn next_step_delay(&self) -> Duration {
        Duration::from_millis(self.next_step_delay_ms)
    }

    pub fn result_delay(&self) -> Duration {
        Duration::from_millis(self.result_delay_ms)
    }

    pub fn confidence_seed_delay(&self) -> Duration {
        Duration::from_millis(self.confidence_seed_delay_ms)
    }
}
