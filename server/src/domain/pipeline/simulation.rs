//! Simulated workload source
//!
//! The stages stand in for real data loading, model inference and an HTTP
//! dependency. Every random draw and every wait goes through [`Simulation`]
//! so tests can pin values and skip real sleeps.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Source of simulated values and latency
#[async_trait]
pub trait Simulation: Send + Sync {
    /// Records the acquisition stage will load
    fn total_records(&self) -> u64;

    /// Latency of one acquisition chunk
    fn chunk_latency(&self, chunk: usize) -> Duration;

    /// Batch size fed to inference
    fn batch_size(&self) -> u32;

    /// Synthetic GPU utilisation percentage
    fn gpu_utilization(&self) -> f64;

    /// Variable part of the inference latency
    fn inference_latency(&self) -> Duration;

    /// Accuracy reported by inference, within [0.80, 0.95]
    fn accuracy(&self) -> f64;

    /// Network transit latency of the external call
    fn network_latency(&self) -> Duration;

    /// Whether this external call fails
    fn external_call_fails(&self) -> bool;

    /// Response time reported by a successful external call, in seconds
    fn response_time_secs(&self) -> f64;

    /// Suspend for a simulated latency
    async fn wait(&self, latency: Duration);
}

// =============================================================================
// Random simulation
// =============================================================================

/// Probability that the external call fails
pub const EXTERNAL_FAILURE_RATE: f64 = 0.1;

/// Randomised workload with real (scaled) sleeps
#[derive(Debug, Clone)]
pub struct RandomSimulation {
    time_scale: f64,
}

impl RandomSimulation {
    /// `time_scale` multiplies every wait; 0 disables waiting entirely
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
        }
    }

    /// Latency after scaling, saturating at `Duration::MAX`
    fn scaled(&self, latency: Duration) -> Duration {
        Duration::try_from_secs_f64(latency.as_secs_f64() * self.time_scale)
            .unwrap_or(Duration::MAX)
    }
}

impl Default for RandomSimulation {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl Simulation for RandomSimulation {
    fn total_records(&self) -> u64 {
        rand::thread_rng().gen_range(1000..5000)
    }

    fn chunk_latency(&self, _chunk: usize) -> Duration {
        Duration::from_secs(rand::thread_rng().gen_range(2..=4))
    }

    fn batch_size(&self) -> u32 {
        rand::thread_rng().gen_range(32..=95)
    }

    fn gpu_utilization(&self) -> f64 {
        rand::thread_rng().gen_range(60.0..95.0)
    }

    fn inference_latency(&self) -> Duration {
        Duration::from_secs(rand::thread_rng().gen_range(4..=9))
    }

    fn accuracy(&self) -> f64 {
        rand::thread_rng().gen_range(0.80..=0.95)
    }

    fn network_latency(&self) -> Duration {
        Duration::from_secs(rand::thread_rng().gen_range(1..=2))
    }

    fn external_call_fails(&self) -> bool {
        rand::thread_rng().gen_bool(EXTERNAL_FAILURE_RATE)
    }

    fn response_time_secs(&self) -> f64 {
        rand::thread_rng().gen_range(0.5..2.5)
    }

    async fn wait(&self, latency: Duration) {
        let scaled = self.scaled(latency);
        if !scaled.is_zero() {
            tokio::time::sleep(scaled).await;
        }
    }
}

// =============================================================================
// Fixed simulation
// =============================================================================

#[cfg(test)]
pub use fixed::FixedSimulation;
