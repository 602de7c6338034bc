//! In-memory print spooler used by the host binary and by tests.
//!
//! Each submitted job walks through a scripted sequence of status signals,
//! one entry per `get_job` call, repeating the last entry once the script is
//! exhausted. Any device call can be made to fail with [`Fault`], and every
//! control command and handle release is recorded for inspection.

pub mod scenario;

pub use scenario::SimScenario;

use async_trait::async_trait;
use spoolguard_shared::{
    ConditionSet, DeviceError, JobControl, JobId, JobInfo, JobQueue, PrinterPort, Spooler,
    StatusCondition, Target,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Device calls that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Open,
    StartDoc,
    StartPage,
    Write,
    EndPage,
    EndDoc,
    Close,
    Command(JobControl),
}

/// A document as received by the simulated device.
#[derive(Debug, Clone)]
pub struct SimDocument {
    pub job_id: JobId,
    pub name: String,
    pub datatype: String,
    pub target: String,
    pub pages: Vec<Vec<u8>>,
    pub finished: bool,
}

#[derive(Debug)]
struct SimJob {
    script: VecDeque<u32>,
    current: u32,
    total_pages: u32,
    retained: bool,
    polls: usize,
}

impl SimJob {
    fn next_signal(&mut self) -> u32 {
        if let Some(signal) = self.script.pop_front() {
            self.current = signal;
        }
        self.polls += 1;
        let mut signal = self.current;
        if self.retained {
            signal |= StatusCondition::Retained.mask();
        }
        signal
    }
}

#[derive(Debug)]
struct SimState {
    scenario: SimScenario,
    next_job_id: u32,
    jobs: HashMap<JobId, SimJob>,
    documents: Vec<SimDocument>,
    commands: Vec<(JobId, JobControl)>,
    faults: HashSet<Fault>,
    short_write: Option<usize>,
    open_ports: usize,
    closes: usize,
    double_closes: usize,
}

impl SimState {
    fn fail_if(&self, fault: Fault) -> Result<(), DeviceError> {
        if self.faults.contains(&fault) {
            tracing::debug!("simulated fault: {:?}", fault);
            return Err(DeviceError::Rejected(format!("simulated {:?} failure", fault)));
        }
        Ok(())
    }

    fn reachable(&self, target: &Target) -> Result<(), DeviceError> {
        let known = self
            .scenario
            .targets
            .iter()
            .find(|candidate| candidate.name == target.name);
        match known {
            Some(found) if found.online => self.fail_if(Fault::Open),
            _ => Err(DeviceError::Unreachable(target.name.clone())),
        }
    }
}

/// Cloneable handle to one simulated spooler.
#[derive(Debug, Clone)]
pub struct SimSpooler {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimSpooler {
    fn default() -> Self {
        Self::new(SimScenario::default())
    }
}

impl SimSpooler {
    pub fn new(scenario: SimScenario) -> Self {
        let next_job_id = scenario.first_job_id.max(1);
        Self {
            state: Arc::new(Mutex::new(SimState {
                scenario,
                next_job_id,
                jobs: HashMap::new(),
                documents: Vec::new(),
                commands: Vec::new(),
                faults: HashSet::new(),
                short_write: None,
                open_ports: 0,
                closes: 0,
                double_closes: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        lock_state(&self.state)
    }

    pub fn inject(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    /// Accept at most `limit` bytes per write call.
    pub fn limit_writes(&self, limit: usize) {
        self.lock().short_write = Some(limit);
    }

    /// Replace the status script of the next jobs to be submitted.
    pub fn set_script(&self, script: Vec<ConditionSet>) {
        self.lock().scenario.status_script = script
            .into_iter()
            .map(|set| set.iter().collect())
            .collect();
    }

    pub fn commands(&self) -> Vec<(JobId, JobControl)> {
        self.lock().commands.clone()
    }

    pub fn command_count(&self, job_id: JobId, command: JobControl) -> usize {
        self.lock()
            .commands
            .iter()
            .filter(|(id, issued)| *id == job_id && *issued == command)
            .count()
    }

    pub fn documents(&self) -> Vec<SimDocument> {
        self.lock().documents.clone()
    }

    pub fn poll_count(&self, job_id: JobId) -> usize {
        self.lock().jobs.get(&job_id).map_or(0, |job| job.polls)
    }

    pub fn is_retained(&self, job_id: JobId) -> bool {
        self.lock().jobs.get(&job_id).is_some_and(|job| job.retained)
    }

    /// Ports currently open.
    pub fn open_ports(&self) -> usize {
        self.lock().open_ports
    }

    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Close calls made against an already released port.
    pub fn double_closes(&self) -> usize {
        self.lock().double_closes
    }
}

fn lock_state(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Spooler for SimSpooler {
    type Port = SimPort;

    async fn enumerate(&self) -> Result<Vec<Target>, DeviceError> {
        Ok(self.lock().scenario.targets.clone())
    }

    async fn default_target(&self) -> Result<Option<String>, DeviceError> {
        Ok(self.lock().scenario.default_target.clone())
    }

    async fn open(&self, target: &Target) -> Result<SimPort, DeviceError> {
        let mut state = self.lock();
        state.reachable(target)?;
        state.open_ports += 1;
        tracing::debug!("sim: opened port on '{}'", target.name);
        Ok(SimPort {
            state: self.state.clone(),
            target: target.name.clone(),
            document: None,
            closed: false,
        })
    }

    async fn open_queue(&self, target: &Target) -> Result<Arc<dyn JobQueue>, DeviceError> {
        self.lock().reachable(target)?;
        Ok(Arc::new(SimQueue {
            state: self.state.clone(),
        }))
    }
}

/// Exclusive document handle on a simulated target.
#[derive(Debug)]
pub struct SimPort {
    state: Arc<Mutex<SimState>>,
    target: String,
    document: Option<usize>,
    closed: bool,
}

impl SimPort {
    fn check_open(&self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl PrinterPort for SimPort {
    async fn start_doc(&mut self, name: &str, datatype: &str) -> Result<JobId, DeviceError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.fail_if(Fault::StartDoc)?;
        let job_id = JobId(state.next_job_id);
        state.next_job_id += 1;
        let script = state
            .scenario
            .status_script
            .iter()
            .map(|conditions| conditions.iter().copied().collect::<ConditionSet>().to_signal())
            .collect();
        state.jobs.insert(
            job_id,
            SimJob {
                script,
                current: StatusCondition::Spooling.mask(),
                total_pages: 0,
                retained: false,
                polls: 0,
            },
        );
        state.documents.push(SimDocument {
            job_id,
            name: name.to_string(),
            datatype: datatype.to_string(),
            target: self.target.clone(),
            pages: Vec::new(),
            finished: false,
        });
        self.document = Some(state.documents.len() - 1);
        Ok(job_id)
    }

    async fn start_page(&mut self) -> Result<(), DeviceError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.fail_if(Fault::StartPage)?;
        let index = self.document.ok_or_else(|| DeviceError::Rejected("no document".into()))?;
        state.documents[index].pages.push(Vec::new());
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, DeviceError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.fail_if(Fault::Write)?;
        let accepted = state.short_write.map_or(data.len(), |limit| limit.min(data.len()));
        let index = self.document.ok_or_else(|| DeviceError::Rejected("no document".into()))?;
        let page = state.documents[index]
            .pages
            .last_mut()
            .ok_or_else(|| DeviceError::Rejected("no page".into()))?;
        page.extend_from_slice(&data[..accepted]);
        Ok(accepted)
    }

    async fn end_page(&mut self) -> Result<(), DeviceError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.fail_if(Fault::EndPage)?;
        let index = self.document.ok_or_else(|| DeviceError::Rejected("no document".into()))?;
        let job_id = state.documents[index].job_id;
        if let Some(job) = state.jobs.get_mut(&job_id) {
            job.total_pages += 1;
        }
        Ok(())
    }

    async fn end_doc(&mut self) -> Result<(), DeviceError> {
        self.check_open()?;
        let mut state = lock_state(&self.state);
        state.fail_if(Fault::EndDoc)?;
        let index = self.document.take().ok_or_else(|| DeviceError::Rejected("no document".into()))?;
        state.documents[index].finished = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let mut state = lock_state(&self.state);
        if self.closed {
            state.double_closes += 1;
            return Err(DeviceError::Closed);
        }
        state.fail_if(Fault::Close)?;
        self.closed = true;
        state.open_ports -= 1;
        state.closes += 1;
        tracing::debug!("sim: closed port on '{}'", self.target);
        Ok(())
    }
}

/// Shared status/control handle on a simulated target.
#[derive(Debug)]
pub struct SimQueue {
    state: Arc<Mutex<SimState>>,
}

#[async_trait]
impl JobQueue for SimQueue {
    async fn get_job(&self, job_id: JobId) -> Result<JobInfo, DeviceError> {
        let mut state = lock_state(&self.state);
        let job = state.jobs.get_mut(&job_id).ok_or(DeviceError::NotFound(job_id))?;
        let status = job.next_signal();
        let done = StatusCondition::Printed.is_set_in(status)
            || StatusCondition::Complete.is_set_in(status);
        Ok(JobInfo {
            job_id,
            pages_printed: if done { job.total_pages } else { 0 },
            total_pages: job.total_pages,
            status,
        })
    }

    async fn set_job_command(&self, job_id: JobId, command: JobControl) -> Result<(), DeviceError> {
        let mut state = lock_state(&self.state);
        state.commands.push((job_id, command));
        state.fail_if(Fault::Command(command))?;
        let job = state.jobs.get_mut(&job_id).ok_or(DeviceError::NotFound(job_id))?;
        match command {
            JobControl::Retain => job.retained = true,
            JobControl::Release => job.retained = false,
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StatusCondition::*;

    fn target() -> Target {
        SimScenario::default().targets[0].clone()
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let spooler = SimSpooler::default();
        let queue = spooler.open_queue(&target()).await.unwrap();
        assert_eq!(queue.get_job(JobId::NONE).await, Err(DeviceError::NotFound(JobId::NONE)));
    }

    #[tokio::test]
    async fn offline_target_is_unreachable() {
        let spooler = SimSpooler::default();
        let offline = Target::new("nowhere", false, false);
        assert!(matches!(spooler.open(&offline).await, Err(DeviceError::Unreachable(_))));
    }

    #[tokio::test]
    async fn script_advances_per_poll_and_repeats_last() {
        let spooler = SimSpooler::default();
        spooler.set_script(vec![
            ConditionSet::from_iter([Printing]),
            ConditionSet::from_iter([Complete]),
        ]);
        let mut port = spooler.open(&target()).await.unwrap();
        let job = port.start_doc("doc", "RAW").await.unwrap();
        port.start_page().await.unwrap();
        port.end_page().await.unwrap();
        port.end_doc().await.unwrap();
        let queue = spooler.open_queue(&target()).await.unwrap();
        assert_eq!(queue.get_job(job).await.unwrap().status, Printing.mask());
        let info = queue.get_job(job).await.unwrap();
        assert_eq!(info.status, Complete.mask());
        assert_eq!(info.pages_printed, 1);
        assert_eq!(queue.get_job(job).await.unwrap().status, Complete.mask());
        assert_eq!(spooler.poll_count(job), 3);
        port.close().unwrap();
    }

    #[tokio::test]
    async fn retained_bit_tracks_retain_and_release() {
        let spooler = SimSpooler::default();
        let mut port = spooler.open(&target()).await.unwrap();
        let job = port.start_doc("doc", "RAW").await.unwrap();
        let queue = spooler.open_queue(&target()).await.unwrap();
        queue.set_job_command(job, JobControl::Retain).await.unwrap();
        assert!(Retained.is_set_in(queue.get_job(job).await.unwrap().status));
        queue.set_job_command(job, JobControl::Release).await.unwrap();
        assert!(!spooler.is_retained(job));
        port.close().unwrap();
    }

    #[tokio::test]
    async fn second_close_is_counted() {
        let spooler = SimSpooler::default();
        let mut port = spooler.open(&target()).await.unwrap();
        assert_eq!(spooler.open_ports(), 1);
        port.close().unwrap();
        assert_eq!(port.close(), Err(DeviceError::Closed));
        assert_eq!(spooler.open_ports(), 0);
        assert_eq!(spooler.double_closes(), 1);
    }

    #[tokio::test]
    async fn refused_close_keeps_port_open() {
        let spooler = SimSpooler::default();
        spooler.inject(Fault::Close);
        let mut port = spooler.open(&target()).await.unwrap();
        assert!(matches!(port.close(), Err(DeviceError::Rejected(_))));
        assert_eq!(spooler.open_ports(), 1);
        assert_eq!(spooler.close_count(), 0);
    }

    #[tokio::test]
    async fn injected_command_fault_is_still_recorded() {
        let spooler = SimSpooler::default();
        spooler.inject(Fault::Command(JobControl::Resume));
        let mut port = spooler.open(&target()).await.unwrap();
        let job = port.start_doc("doc", "RAW").await.unwrap();
        let queue = spooler.open_queue(&target()).await.unwrap();
        assert!(queue.set_job_command(job, JobControl::Resume).await.is_err());
        assert_eq!(spooler.command_count(job, JobControl::Resume), 1);
        port.close().unwrap();
    }
}
