//! Document session: the ordered lifecycle of one job submission.
//!
//! ```text
//! open -> begin_document -> (begin_page -> write* -> end_page)* -> end_document -> close
//! ```
//!
//! A session submits at most one document. Any call made out of order fails
//! with [`SpoolError::InvalidSessionState`] and leaves the state untouched.
//! The target handle is released by [`DocumentSession::close`] or, failing
//! that, when the session is dropped, so early returns through `?` never
//! leak it.

use crate::error::SpoolError;
use spoolguard_shared::{JobId, PrinterPort, Spooler, Target, RAW_DATATYPE};
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

const COPY_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    DocumentOpen,
    PageOpen,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => f.write_str("closed"),
            SessionState::DocumentOpen => f.write_str("document open"),
            SessionState::PageOpen => f.write_str("page open"),
        }
    }
}

/// Per-session settings taken from the loaded configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub datatype: String,
    pub verbose: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            datatype: RAW_DATATYPE.to_string(),
            verbose: false,
        }
    }
}

pub struct DocumentSession<P: PrinterPort> {
    target: Target,
    port: Option<P>,
    state: SessionState,
    job_id: JobId,
    pages: u32,
    submitted: bool,
    options: SessionOptions,
}

impl<P: PrinterPort> DocumentSession<P> {
    /// Acquire a handle on `target`.
    pub async fn open<S>(spooler: &S, target: &Target, options: SessionOptions) -> Result<Self, SpoolError>
    where
        S: Spooler<Port = P>,
    {
        if options.verbose {
            tracing::debug!("=> OpenPrinter '{}'", target.name);
        }
        let port = spooler
            .open(target)
            .await
            .map_err(|source| SpoolError::TargetUnavailable {
                target: target.name.clone(),
                source,
            })?;
        if options.verbose {
            tracing::debug!("<= OpenPrinter '{}'", target.name);
        }
        Ok(Self {
            target: target.clone(),
            port: Some(port),
            state: SessionState::Closed,
            job_id: JobId::NONE,
            pages: 0,
            submitted: false,
            options,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identifier assigned by the device once the document was accepted.
    pub fn job_id(&self) -> Option<JobId> {
        (!self.job_id.is_none()).then_some(self.job_id)
    }

    /// Pages completed with `end_page`.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_released(&self) -> bool {
        self.port.is_none()
    }

    fn trace(&self, args: fmt::Arguments<'_>) {
        if self.options.verbose {
            tracing::debug!("{}", args);
        }
    }

    fn port_in(&mut self, operation: &'static str, expected: SessionState) -> Result<&mut P, SpoolError> {
        let state = self.state;
        match self.port.as_mut() {
            Some(port) if state == expected => Ok(port),
            _ => Err(SpoolError::InvalidSessionState { operation, state }),
        }
    }

    /// Submit the document and return its job id.
    pub async fn begin_document(&mut self, name: &str) -> Result<JobId, SpoolError> {
        if self.submitted || !self.job_id.is_none() {
            return Err(SpoolError::InvalidSessionState {
                operation: "begin document",
                state: self.state,
            });
        }
        let datatype = self.options.datatype.clone();
        self.trace(format_args!("=> StartDoc '{}' ({})", name, datatype));
        let port = self.port_in("begin document", SessionState::Closed)?;
        let job_id = port
            .start_doc(name, &datatype)
            .await
            .map_err(|source| SpoolError::JobSubmissionFailed {
                document: name.to_string(),
                source,
            })?;
        self.job_id = job_id;
        self.state = SessionState::DocumentOpen;
        self.trace(format_args!("<= StartDoc: job {}", job_id));
        tracing::info!("Job {} accepted by '{}'", job_id, self.target.name);
        Ok(job_id)
    }

    pub async fn begin_page(&mut self) -> Result<(), SpoolError> {
        self.trace(format_args!("=> StartPage"));
        let port = self.port_in("begin page", SessionState::DocumentOpen)?;
        port.start_page().await.map_err(SpoolError::device("start page"))?;
        self.state = SessionState::PageOpen;
        self.trace(format_args!("<= StartPage"));
        Ok(())
    }

    /// Emit page content. Returns the number of bytes the device accepted.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, SpoolError> {
        let port = self.port_in("write", SessionState::PageOpen)?;
        port.write(data).await.map_err(SpoolError::device("write"))
    }

    /// Stream `reader` into the open page.
    ///
    /// Stops at the first chunk the device only partly accepts and reports it
    /// as a device error carrying the byte count written so far.
    pub async fn copy_from<R>(&mut self, reader: &mut R) -> Result<u64, SpoolError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.port_in("write", SessionState::PageOpen)?;
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;
        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                return Ok(total);
            }
            let written = self.write(&buf[..read]).await?;
            total += written as u64;
            if written < read {
                return Err(SpoolError::Device {
                    operation: "write",
                    source: spoolguard_shared::DeviceError::Rejected(format!(
                        "short write after {} bytes",
                        total
                    )),
                });
            }
        }
    }

    pub async fn end_page(&mut self) -> Result<(), SpoolError> {
        self.trace(format_args!("=> EndPage"));
        let port = self.port_in("end page", SessionState::PageOpen)?;
        port.end_page().await.map_err(SpoolError::device("end page"))?;
        self.state = SessionState::DocumentOpen;
        self.pages += 1;
        self.trace(format_args!("<= EndPage"));
        Ok(())
    }

    /// Finish submission. The device owns delivery from here on.
    pub async fn end_document(&mut self) -> Result<(), SpoolError> {
        self.trace(format_args!("=> EndDoc"));
        let port = self.port_in("end document", SessionState::DocumentOpen)?;
        port.end_doc().await.map_err(SpoolError::device("end document"))?;
        self.state = SessionState::Closed;
        self.submitted = true;
        self.trace(format_args!("<= EndDoc: {} page(s)", self.pages));
        Ok(())
    }

    /// Release the target handle. Safe to call any number of times.
    pub fn close(&mut self) -> Result<(), SpoolError> {
        let Some(mut port) = self.port.take() else {
            return Ok(());
        };
        if self.state != SessionState::Closed {
            tracing::warn!(
                "Closing '{}' with job {} still {}",
                self.target.name,
                self.job_id,
                self.state
            );
            self.state = SessionState::Closed;
        }
        self.trace(format_args!("=> ClosePrinter '{}'", self.target.name));
        port.close().map_err(SpoolError::device("close"))
    }
}

impl<P: PrinterPort> Drop for DocumentSession<P> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!("Failed to release '{}': {}", self.target.name, e);
        }
    }
}

impl<P: PrinterPort> fmt::Debug for DocumentSession<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSession")
            .field("target", &self.target.name)
            .field("state", &self.state)
            .field("job_id", &self.job_id)
            .field("pages", &self.pages)
            .field("released", &self.port.is_none())
            .finish()
    }
}
