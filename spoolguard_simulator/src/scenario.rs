//! Declarative description of a simulated spooler, loadable from TOML.
//!
//! ```toml
//! default_target = "Sim Label Printer"
//! status_script = [["Spooling"], ["Printing"], ["Printing", "PaperOut", "Error"], ["Printed"]]
//!
//! [[targets]]
//! name = "Sim Label Printer"
//! local = true
//! online = true
//! ```

use serde::{Deserialize, Serialize};
use spoolguard_shared::{StatusCondition, Target};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimScenario {
    #[serde(default = "default_targets")]
    pub targets: Vec<Target>,
    #[serde(default = "default_target_name")]
    pub default_target: Option<String>,
    /// Conditions reported on successive polls of every new job.
    #[serde(default = "default_status_script")]
    pub status_script: Vec<Vec<StatusCondition>>,
    #[serde(default = "default_first_job_id")]
    pub first_job_id: u32,
}

impl Default for SimScenario {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            default_target: default_target_name(),
            status_script: default_status_script(),
            first_job_id: default_first_job_id(),
        }
    }
}

fn default_targets() -> Vec<Target> {
    vec![
        Target::new("Sim Label Printer", true, true),
        Target::new("Sim Network Printer", false, true),
        Target::new("Sim Offline Printer", false, false),
    ]
}
fn default_target_name() -> Option<String> { Some("Sim Label Printer".to_string()) }
fn default_status_script() -> Vec<Vec<StatusCondition>> {
    vec![
        vec![StatusCondition::Spooling],
        vec![StatusCondition::Printing],
        vec![StatusCondition::Printed, StatusCondition::Complete],
    ]
}
fn default_first_job_id() -> u32 { 1 }
