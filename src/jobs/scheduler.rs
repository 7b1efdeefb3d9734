use super::{Job, JobsConfig};
use crate::error::AppError;
use crate::metrics;
use chrono::Utc;
use cron::Schedule;
use std::{str::FromStr, sync::Arc};
use tokio::{
    sync::{RwLock, broadcast, watch},
    task::JoinHandle,
    time::{Duration, sleep},
};
use tracing::{error, info, warn};

/// Job scheduler that runs each registered job at its cron fire times
pub struct JobScheduler {
    config: JobsConfig,
    handles: Arc<RwLock<Vec<JoinHandle<()>>>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_coordinator: Option<watch::Receiver<bool>>,
}

impl JobScheduler {
    pub fn new(config: JobsConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            config,
            handles: Arc::new(RwLock::new(Vec::new())),
            shutdown_tx,
            shutdown_coordinator: None,
        }
    }

    /// Create JobScheduler with graceful shutdown integration
    pub fn with_shutdown_coordinator(
        config: JobsConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shutdown_coordinator: Some(shutdown_rx),
            ..Self::new(config)
        }
    }

    /// Start the job scheduler with registered jobs
    pub async fn start(&mut self, jobs: Vec<Arc<dyn Job>>) -> Result<(), AppError> {
        if !self.config.enabled {
            info!("Job scheduler disabled in configuration");
            return Ok(());
        }

        let mut handles = self.handles.write().await;
        for job in jobs {
            let Some(schedule) = self.schedule_for_job(job.name())? else {
                info!("Job '{}' disabled in configuration", job.name());
                continue;
            };
            handles.push(self.spawn_job(job, schedule));
        }

        info!("Job scheduler started with {} jobs", handles.len());
        Ok(())
    }

    /// Number of jobs currently scheduled
    pub async fn running_jobs(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Stop the job scheduler and all running jobs
    pub async fn stop(&mut self) {
        info!("Stopping job scheduler...");

        if let Err(e) = self.shutdown_tx.send(()) {
            // No receivers means no job was ever spawned
            warn!("Failed to send shutdown signal: {}", e);
        }

        let mut handles = self.handles.write().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                error!("Job handle failed during shutdown: {}", e);
            }
        }

        info!("Job scheduler stopped");
    }

    fn spawn_job(&self, job: Arc<dyn Job>, schedule: Schedule) -> JoinHandle<()> {
        let job_name = job.name().to_string();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut coordinator_rx = self.shutdown_coordinator.clone();

        tokio::spawn(async move {
            loop {
                let Some(wait) = duration_until_next(&schedule) else {
                    warn!("Job '{}' has no upcoming fire time", job_name);
                    break;
                };
                info!("Job '{}' next run in {:?}", job_name, wait);

                tokio::select! {
                    _ = sleep(wait) => {
                        info!("Executing job '{}'", job_name);

                        match job.execute().await {
                            Ok(result) if result.success => {
                                metrics::track_job_run(&job_name, true);
                                info!("Job '{}' completed: {}", job_name, result.message);
                            }
                            Ok(result) => {
                                metrics::track_job_run(&job_name, false);
                                warn!("Job '{}' failed: {}", job_name, result.message);
                            }
                            Err(e) => {
                                metrics::track_job_run(&job_name, false);
                                error!("Job '{}' execution error: {}", job_name, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Job '{}' received internal shutdown signal", job_name);
                        break;
                    }
                    _ = async {
                        if let Some(ref mut coord_rx) = coordinator_rx {
                            coord_rx.changed().await.ok();
                        }
                    }, if coordinator_rx.is_some() => {
                        info!("Job '{}' received global shutdown signal", job_name);
                        break;
                    }
                }
            }

            info!("Job '{}' stopped", job_name);
        })
    }

    /// Parsed schedule for a job, `None` when the job is switched off
    fn schedule_for_job(&self, job_name: &str) -> Result<Option<Schedule>, AppError> {
        match job_name {
            "usage_reset" => {
                if !self.config.usage_reset.enabled {
                    return Ok(None);
                }
                parse_schedule(&self.config.usage_reset.schedule).map(Some)
            }
            _ => Err(AppError::Internal(format!("Unknown job: {job_name}"))),
        }
    }
}

/// Parse a 6-field cron expression (sec min hour day month dow)
pub fn parse_schedule(cron: &str) -> Result<Schedule, AppError> {
    Schedule::from_str(cron)
        .map_err(|e| AppError::Internal(format!("Invalid cron expression '{cron}': {e}")))
}

fn duration_until_next(schedule: &Schedule) -> Option<Duration> {
    let next = schedule.upcoming(Utc).next()?;
    (next - Utc::now()).to_std().ok().or(Some(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobResult, UsageResetConfig};
    use async_trait::async_trait;

    struct NamedJob(&'static str);

    #[async_trait]
    impl Job for NamedJob {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self) -> Result<JobResult, AppError> {
            Ok(JobResult::success_with_count(0))
        }
    }

    #[test]
    fn test_valid_cron_expressions() {
        let test_cases = vec![
            "0 0 0 1 * *",     // Monthly on 1st
            "0 0 * * * *",     // Every hour
            "0 30 14 * * MON", // Every Monday at 2:30 PM
            "0 */15 * * * *",  // Every 15 minutes
            "0 0 9-17 * * 1-5",
        ];

        for cron_expr in test_cases {
            let schedule = parse_schedule(cron_expr);
            assert!(schedule.is_ok(), "Failed to parse '{}'", cron_expr);
            assert!(duration_until_next(&schedule.unwrap()).is_some());
        }
    }

    #[test]
    fn test_invalid_cron_expressions() {
        for cron_expr in ["", "invalid", "60 * * * *", "0 0 32 * *", "0 0 * 13 *"] {
            assert!(
                parse_schedule(cron_expr).is_err(),
                "Should fail for invalid cron expression: {cron_expr}"
            );
        }
    }

    #[test]
    fn test_monthly_reset_fires_on_first_of_month() {
        let schedule = parse_schedule("0 0 0 1 * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(chrono::Datelike::day(&next), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_is_rejected() {
        let mut scheduler = JobScheduler::new(JobsConfig::default());
        let result = scheduler.start(vec![Arc::new(NamedJob("unknown_job"))]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_disabled_job_is_not_spawned() {
        let config = JobsConfig {
            enabled: true,
            usage_reset: UsageResetConfig {
                enabled: false,
                ..Default::default()
            },
        };
        let mut scheduler = JobScheduler::new(config);
        scheduler
            .start(vec![Arc::new(NamedJob("usage_reset"))])
            .await
            .unwrap();
        assert_eq!(scheduler.running_jobs().await, 0);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut scheduler = JobScheduler::new(JobsConfig::default());
        scheduler
            .start(vec![Arc::new(NamedJob("usage_reset"))])
            .await
            .unwrap();
        assert_eq!(scheduler.running_jobs().await, 1);

        scheduler.stop().await;
        assert_eq!(scheduler.running_jobs().await, 0);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_is_noop() {
        let config = JobsConfig {
            enabled: false,
            ..Default::default()
        };
        let mut scheduler = JobScheduler::new(config);
        scheduler
            .start(vec![Arc::new(NamedJob("unknown_job"))])
            .await
            .unwrap();
        assert_eq!(scheduler.running_jobs().await, 0);
    }
}
