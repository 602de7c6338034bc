// Status decoding and recovery policy, driven through hand-built queues.
use async_trait::async_trait;
use spoolguard::monitor::decide;
use spoolguard::{
    ConditionSet, DeviceError, JobControl, JobController, JobId, JobInfo, JobMonitor, JobQueue,
    MonitorOutcome, PollStep, RecoveryAction, SpoolError, StatusCondition,
};
use spoolguard::config::MonitorConfig;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use StatusCondition::*;

/// Queue replaying canned `get_job` answers and recording commands.
#[derive(Default)]
struct ScriptedQueue {
    answers: Mutex<VecDeque<Result<u32, DeviceError>>>,
    commands: Mutex<Vec<JobControl>>,
    refuse: Option<JobControl>,
}

impl ScriptedQueue {
    fn new(answers: Vec<Result<u32, DeviceError>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            ..Self::default()
        })
    }

    fn commands(&self) -> Vec<JobControl> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for ScriptedQueue {
    async fn get_job(&self, job_id: JobId) -> Result<JobInfo, DeviceError> {
        if job_id.is_none() {
            return Err(DeviceError::NotFound(job_id));
        }
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front().unwrap()
        } else {
            answers.front().cloned().unwrap_or(Ok(0))
        };
        answer.map(|status| JobInfo {
            job_id,
            pages_printed: 0,
            total_pages: 1,
            status,
        })
    }

    async fn set_job_command(&self, _job_id: JobId, command: JobControl) -> Result<(), DeviceError> {
        self.commands.lock().unwrap().push(command);
        if self.refuse == Some(command) {
            return Err(DeviceError::Rejected("refused".into()));
        }
        Ok(())
    }
}

fn monitor(queue: Arc<ScriptedQueue>, config: MonitorConfig) -> JobMonitor {
    JobMonitor::new(JobController::new(queue), config)
}

const JOB: JobId = JobId(12);

#[test]
fn printed_alone_decodes_to_printed_and_completes() {
    let set = ConditionSet::decode(Printed.mask());
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![Printed]);
    assert_eq!(decide(&set), RecoveryAction::Release);
}

#[test]
fn error_and_printing_decode_together_and_resume() {
    let set = ConditionSet::decode(Error.mask() | Printing.mask());
    assert!(set.contains(Error));
    assert!(set.contains(Printing));
    assert_eq!(set.len(), 2);
    assert_eq!(decide(&set), RecoveryAction::Resume);
}

#[test]
fn unrecognised_signal_is_empty_and_inert() {
    let set = ConditionSet::decode(0x0001_0000);
    assert!(set.is_empty());
    assert_eq!(decide(&set), RecoveryAction::None);
}

#[tokio::test]
async fn sentinel_job_is_an_observation_not_a_failure() {
    let queue = ScriptedQueue::new(vec![Ok(Printing.mask())]);
    let mut monitor = monitor(queue.clone(), MonitorConfig::default());
    let err = monitor.poll(JobId::NONE).await.unwrap_err();
    assert!(matches!(err, SpoolError::JobNotFound(JobId::NONE)));
    assert!(!err.is_fatal());
    assert_eq!(monitor.step(JobId::NONE).await.unwrap(), PollStep::Unobserved);
    assert!(queue.commands().is_empty());
}

#[tokio::test]
async fn failed_status_query_does_not_stop_polling() {
    let queue = ScriptedQueue::new(vec![
        Err(DeviceError::Rejected("spooler busy".into())),
        Ok(Complete.mask()),
    ]);
    let mut monitor = monitor(queue.clone(), MonitorConfig::default());
    assert!(matches!(
        monitor.poll(JOB).await,
        Err(SpoolError::StatusQueryFailed { job_id: JOB, .. })
    ));
    let step = monitor.step(JOB).await.unwrap();
    assert!(step.is_complete());
    assert_eq!(queue.commands(), vec![JobControl::Release]);
}

#[tokio::test(start_paused = true)]
async fn flag_set_before_run_cancels_without_polling() {
    let queue = ScriptedQueue::new(vec![Ok(Printing.mask())]);
    let mut monitor = monitor(queue.clone(), MonitorConfig::default());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let report = monitor.run(JOB, rx).await.unwrap();
    assert_eq!(report.outcome, MonitorOutcome::Cancelled);
    assert_eq!(report.polls, 0);
    assert!(report.last.is_none());
}

#[tokio::test(start_paused = true)]
async fn refused_resume_in_run_keeps_polling_to_completion() {
    let queue = Arc::new(ScriptedQueue {
        answers: Mutex::new(vec![Ok(Error.mask()), Ok(Printing.mask()), Ok(Printed.mask())].into()),
        refuse: Some(JobControl::Resume),
        ..ScriptedQueue::default()
    });
    let mut monitor = monitor(queue.clone(), MonitorConfig::default());
    let (_tx, rx) = watch::channel(false);
    let report = monitor.run(JOB, rx).await.unwrap();
    assert_eq!(report.outcome, MonitorOutcome::Completed);
    assert_eq!(report.polls, 3);
    assert_eq!(report.resume_attempts, 1);
    assert_eq!(queue.commands(), vec![JobControl::Resume, JobControl::Release]);
}

#[tokio::test]
async fn refused_release_surfaces_from_run() {
    let queue = Arc::new(ScriptedQueue {
        answers: Mutex::new(vec![Ok(Printed.mask())].into()),
        refuse: Some(JobControl::Release),
        ..ScriptedQueue::default()
    });
    let mut monitor = monitor(queue, MonitorConfig::default());
    let (_tx, rx) = watch::channel(false);
    let err = monitor.run(JOB, rx).await.unwrap_err();
    assert!(matches!(
        err,
        SpoolError::ControlCommandFailed { command: JobControl::Release, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn resume_is_issued_once_per_error_poll() {
    let queue = ScriptedQueue::new(vec![
        Ok(Printing.mask()),
        Ok(Error.mask() | PaperOut.mask()),
        Ok(Error.mask() | PaperOut.mask()),
        Ok(Printing.mask()),
        Ok(Complete.mask()),
    ]);
    let mut monitor = monitor(queue.clone(), MonitorConfig::default());
    let (_tx, rx) = watch::channel(false);
    let report = monitor.run(JOB, rx).await.unwrap();
    assert_eq!(report.outcome, MonitorOutcome::Completed);
    assert_eq!(report.polls, 5);
    assert_eq!(report.resume_attempts, 2);
    assert_eq!(
        queue.commands(),
        vec![JobControl::Resume, JobControl::Resume, JobControl::Release]
    );
}

#[tokio::test(start_paused = true)]
async fn budget_shorter_than_job_times_out() {
    let queue = ScriptedQueue::new(vec![Ok(Spooling.mask())]);
    let config = MonitorConfig {
        poll_interval_ms: 100,
        budget_secs: 1,
        ..MonitorConfig::default()
    };
    let mut monitor = monitor(queue, config);
    let (_tx, rx) = watch::channel(false);
    let started = tokio::time::Instant::now();
    let report = monitor.run(JOB, rx).await.unwrap();
    assert_eq!(report.outcome, MonitorOutcome::TimedOut);
    assert_eq!(report.polls, 10);
    assert!(started.elapsed() >= Duration::from_secs(1));
}
