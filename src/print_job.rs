// src/print_job.rs - submit a job through a document session and babysit it
use crate::config::Config;
use crate::error::SpoolError;
use crate::monitor::{JobController, JobMonitor, JobSnapshot, MonitorOutcome, MonitorReport, PollStep};
use crate::session::{DocumentSession, SessionOptions};
use serde::Serialize;
use spoolguard_shared::{JobId, Spooler, Target};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// What to submit.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub document_name: String,
    pub pages: u32,
    /// Bytes copied into every page. Empty pages are legal.
    pub content: Vec<u8>,
}

impl PrintRequest {
    pub fn from_config(config: &Config, content: Vec<u8>) -> Self {
        Self {
            document_name: config.job.name.clone(),
            pages: config.job.pages,
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub target: Target,
    pub job_id: JobId,
    pub pages_issued: u32,
    pub sentinel_not_found: Option<bool>,
    pub monitor: Option<MonitorReport>,
    /// Monitoring ended without completion while the job was still held.
    pub still_retained: bool,
}

/// Monitor task spawned in concurrent mode. Aborted when dropped, so an
/// early return never leaves it polling or issuing commands.
struct BackgroundMonitor {
    handle: JoinHandle<Result<MonitorReport, SpoolError>>,
}

impl BackgroundMonitor {
    async fn join(mut self) -> Result<MonitorReport, SpoolError> {
        (&mut self.handle).await?
    }
}

impl Drop for BackgroundMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Resolve `selector` against the enumerated targets.
///
/// A numeric selector is an index into `targets`; anything else is matched
/// by name. Without a selector the spooler default is used, then the first
/// target.
pub fn select_target(targets: &[Target], selector: Option<&str>, default: Option<&str>) -> Option<Target> {
    match selector {
        Some(sel) => match sel.parse::<usize>() {
            Ok(index) => targets.get(index).cloned(),
            Err(_) => targets.iter().find(|t| t.name == sel).cloned(),
        },
        None => default
            .and_then(|name| targets.iter().find(|t| t.name == name))
            .or_else(|| targets.first())
            .cloned(),
    }
}

pub struct PrintJobRunner<'a, S: Spooler> {
    spooler: &'a S,
    config: &'a Config,
}

impl<'a, S: Spooler> PrintJobRunner<'a, S> {
    pub fn new(spooler: &'a S, config: &'a Config) -> Self {
        Self { spooler, config }
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            datatype: self.config.job.datatype.clone(),
            verbose: self.config.logging.verbose,
        }
    }

    /// Submit `request` to `target` and, when monitoring is enabled, watch it
    /// until it completes, times out, or `shutdown` is set.
    pub async fn run(
        &self,
        target: &Target,
        request: &PrintRequest,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<JobReport, SpoolError> {
        tracing::info!("============== begin ==============>");
        let mut session = DocumentSession::open(self.spooler, target, self.session_options()).await?;

        let monitoring = self.config.monitor.enabled;
        let mut monitor = if monitoring {
            let queue = self
                .spooler
                .open_queue(target)
                .await
                .map_err(|source| SpoolError::TargetUnavailable {
                    target: target.name.clone(),
                    source,
                })?;
            Some(JobMonitor::new(JobController::new(queue), self.config.monitor.clone()))
        } else {
            None
        };

        let mut sentinel_not_found = None;
        if let Some(monitor) = monitor.as_ref() {
            if self.config.monitor.probe_sentinel {
                sentinel_not_found = Some(monitor.probe_sentinel().await);
            }
        }

        let job_id = session.begin_document(&request.document_name).await?;

        let mut held = false;
        let mut background = None;
        if self.config.monitor.concurrent {
            if let Some(monitor) = monitor.take() {
                if self.config.monitor.retain {
                    monitor.controller().hold(job_id).await?;
                    held = true;
                }
                background = Some(BackgroundMonitor {
                    handle: monitor.spawn(job_id, shutdown.clone()),
                });
            }
        }

        let mut completed = None;
        self.issue_pages(&mut session, request, job_id, monitor.as_mut(), &mut completed)
            .await?;
        session.end_document().await?;
        let pages_issued = session.pages();
        session.close()?;
        tracing::info!("====== end doc ======");

        let report = match (background, monitor) {
            (Some(background), _) => Some(background.join().await?),
            (None, Some(mut monitor)) => match completed {
                Some(report) => Some(report),
                None => {
                    if self.config.monitor.retain {
                        monitor.controller().hold(job_id).await?;
                    held = true;
                    }
                    Some(monitor.run(job_id, shutdown.clone()).await?)
                }
            },
            (None, None) => None,
        };

        let mut still_retained = false;
        if let Some(report) = report.as_ref() {
            tracing::info!("Job {} monitor outcome: {:?} after {} polls", job_id, report.outcome, report.polls);
            still_retained = report.outcome != MonitorOutcome::Completed
                && report.last.as_ref().map_or(held, JobSnapshot::is_retained);
            if still_retained {
                tracing::warn!("Job {} is still retained; release it to let it print", job_id);
            }
        }
        Ok(JobReport {
            target: target.clone(),
            job_id,
            pages_issued,
            sentinel_not_found,
            monitor: report,
            still_retained,
        })
    }

    async fn issue_pages(
        &self,
        session: &mut DocumentSession<S::Port>,
        request: &PrintRequest,
        job_id: JobId,
        mut monitor: Option<&mut JobMonitor>,
        completed: &mut Option<MonitorReport>,
    ) -> Result<(), SpoolError> {
        for page in 0..request.pages {
            session.begin_page().await?;
            if !request.content.is_empty() {
                let mut content = request.content.as_slice();
                match session.copy_from(&mut content).await {
                    Ok(written) => tracing::info!("#{} write done, {} bytes", page, written),
                    Err(e @ SpoolError::Device { .. }) => {
                        tracing::warn!("#{} write failed, reason: {}", page, e)
                    }
                    Err(e) => return Err(e),
                }
            }
            session.end_page().await?;
            tracing::info!("issued page #{}", page);

            if completed.is_some() {
                continue;
            }
            if let Some(monitor) = monitor.as_deref_mut() {
                let step = monitor.step(job_id).await?;
                if step.is_complete() {
                    let last = match step {
                        PollStep::Observed { snapshot, .. } => Some(snapshot),
                        PollStep::Unobserved => None,
                    };
                    *completed = Some(MonitorReport {
                        job_id,
                        outcome: MonitorOutcome::Completed,
                        polls: page as usize + 1,
                        resume_attempts: monitor.resume_attempts(),
                        last,
                    });
                }
            }
        }
        Ok(())
    }
}
