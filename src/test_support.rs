//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::future::ready;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::backend::{
    Attachment, BackendFuture, ControlPlane, CreatedVolumes, InstanceRecord, JobStatus,
    RemoteError, VolumeQuery, VolumeRecord,
};
use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::types::{InstanceId, JobId, VolumeId};
use crate::volume::VolumeOptions;

const DEVICE_LETTERS: &str = "bcdefghijklmnopqrstuvwxyz";

/// Control-plane operation kinds, used to script failures and count calls.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PlaneAction {
    /// `CreateVolumes`.
    Create,
    /// `DeleteVolumes`.
    Delete,
    /// `AttachVolumes`.
    Attach,
    /// `DetachVolumes`.
    Detach,
    /// `DescribeVolumes`.
    Describe,
    /// `ModifyVolumeAttributes`.
    Modify,
    /// `DescribeInstances`.
    DescribeInstances,
    /// `DescribeJobs`.
    DescribeJob,
}

impl PlaneAction {
    const fn remote_name(self) -> &'static str {
        match self {
            Self::Create => "CreateVolumes",
            Self::Delete => "DeleteVolumes",
            Self::Attach => "AttachVolumes",
            Self::Detach => "DetachVolumes",
            Self::Describe => "DescribeVolumes",
            Self::Modify => "ModifyVolumeAttributes",
            Self::DescribeInstances => "DescribeInstances",
            Self::DescribeJob => "DescribeJobs",
        }
    }

    fn api_error(self, code: i64, message: impl Into<String>) -> RemoteError {
        RemoteError::Api {
            action: self.remote_name().to_owned(),
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct PlaneState {
    volumes: BTreeMap<VolumeId, VolumeRecord>,
    instances: BTreeMap<InstanceId, InstanceRecord>,
    calls: Vec<PlaneAction>,
    failures: HashMap<PlaneAction, VecDeque<RemoteError>>,
    job_statuses: VecDeque<JobStatus>,
    jobs: BTreeSet<JobId>,
    next_id: u32,
    devices_issued: usize,
    withhold_devices: bool,
    lose_next_attach: bool,
}

impl PlaneState {
    fn record(&mut self, action: PlaneAction) -> Result<(), RemoteError> {
        self.calls.push(action);
        match self
            .failures
            .get_mut(&action)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_suffix(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_job(&mut self) -> JobId {
        let job = JobId::new(format!("j-{:08}", self.next_suffix()));
        self.jobs.insert(job.clone());
        job
    }

    fn issue_device(&mut self) -> String {
        if self.withhold_devices {
            return String::new();
        }
        let letter = DEVICE_LETTERS
            .chars()
            .cycle()
            .nth(self.devices_issued)
            .unwrap_or('z');
        self.devices_issued += 1;
        format!("/dev/sd{letter}")
    }
}

/// In-memory control plane with the provider's idempotency quirks.
///
/// Deleting a missing volume, attaching an attached volume, and detaching a
/// detached volume produce the same benign error messages as the real API.
/// Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryControlPlane {
    state: Arc<Mutex<PlaneState>>,
}

impl MemoryControlPlane {
    /// Creates an empty control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut PlaneState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Seeds an available volume and returns its identifier.
    #[must_use]
    pub fn insert_volume(&self, name: &str, size_gb: u32) -> VolumeId {
        self.with_state(|state| {
            let id = VolumeId::new(format!("vol-{:08}", state.next_suffix()));
            state.volumes.insert(
                id.clone(),
                VolumeRecord {
                    id: id.clone(),
                    name: name.to_owned(),
                    size_gb,
                    status: String::from("available"),
                    attachment: None,
                },
            );
            id
        })
    }

    /// Binds a seeded volume to `instance` at `device` without a job.
    pub fn bind(&self, volume: &VolumeId, instance: &InstanceId, device: &str) {
        self.with_state(|state| {
            if let Some(record) = state.volumes.get_mut(volume) {
                record.status = String::from("in-use");
                record.attachment = Some(Attachment {
                    instance_id: instance.clone(),
                    device: device.to_owned(),
                });
            }
        });
    }

    /// Seeds a running instance.
    pub fn insert_instance(&self, instance: &InstanceId, instance_class: Option<i64>) {
        self.with_state(|state| {
            state.instances.insert(
                instance.clone(),
                InstanceRecord {
                    id: instance.clone(),
                    instance_class,
                },
            );
        });
    }

    /// Returns the stored record for `volume`.
    #[must_use]
    pub fn volume(&self, volume: &VolumeId) -> Option<VolumeRecord> {
        self.with_state(|state| state.volumes.get(volume).cloned())
    }

    /// Returns every call issued so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlaneAction> {
        self.with_state(|state| state.calls.clone())
    }

    /// Returns the number of calls issued for `action`.
    #[must_use]
    pub fn call_count(&self, action: PlaneAction) -> usize {
        self.with_state(|state| state.calls.iter().filter(|call| **call == action).count())
    }

    /// Makes the next call for `action` fail with `error`.
    pub fn fail_next(&self, action: PlaneAction, error: RemoteError) {
        self.with_state(|state| {
            state.failures.entry(action).or_default().push_back(error);
        });
    }

    /// Makes the next call for `action` fail with an API error carrying
    /// `message`.
    pub fn reject_next(&self, action: PlaneAction, message: &str) {
        self.fail_next(action, action.api_error(5000, message));
    }

    /// Queues job statuses returned by successive job polls. Once drained,
    /// jobs report success.
    pub fn script_job_statuses(&self, statuses: impl IntoIterator<Item = JobStatus>) {
        self.with_state(|state| state.job_statuses.extend(statuses));
    }

    /// Simulates a concurrent caller winning the next attach: the volume is
    /// bound and the call fails with the provider's already-attached error.
    pub fn lose_next_attach_race(&self) {
        self.with_state(|state| state.lose_next_attach = true);
    }

    /// Makes attach leave the device path empty.
    pub fn withhold_devices(&self) {
        self.with_state(|state| state.withhold_devices = true);
    }
}

impl ControlPlane for MemoryControlPlane {
    fn create_volumes<'a>(
        &'a self,
        options: &'a VolumeOptions,
    ) -> BackendFuture<'a, CreatedVolumes, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Create)?;
            let id = VolumeId::new(format!("vol-{:08}", state.next_suffix()));
            state.volumes.insert(
                id.clone(),
                VolumeRecord {
                    id: id.clone(),
                    name: options.name.clone(),
                    size_gb: options.capacity_gb,
                    status: String::from("available"),
                    attachment: None,
                },
            );
            Ok(CreatedVolumes {
                job_id: state.issue_job(),
                volume_ids: vec![id],
            })
        });
        Box::pin(ready(result))
    }

    fn delete_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
    ) -> BackendFuture<'a, JobId, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Delete)?;
            for volume in volumes {
                if state.volumes.remove(volume).is_none() {
                    return Err(PlaneAction::Delete.api_error(
                        2100,
                        format!("resource [{volume}] has already been deleted"),
                    ));
                }
            }
            Ok(state.issue_job())
        });
        Box::pin(ready(result))
    }

    fn attach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Attach)?;
            for volume in volumes {
                let attachment = match state.volumes.get(volume) {
                    None => {
                        return Err(PlaneAction::Attach
                            .api_error(2100, format!("resource [{volume}] not found")));
                    }
                    Some(record) => record.attachment.clone(),
                };
                if let Some(existing) = attachment {
                    let message = if existing.instance_id == *instance {
                        format!("volume [{volume}] have been already attached to instance [{instance}]")
                    } else {
                        format!("volume [{volume}] is in use by [{}]", existing.instance_id)
                    };
                    return Err(PlaneAction::Attach.api_error(1400, message));
                }
                let device = state.issue_device();
                if let Some(record) = state.volumes.get_mut(volume) {
                    record.status = String::from("in-use");
                    record.attachment = Some(Attachment {
                        instance_id: instance.clone(),
                        device,
                    });
                }
                if state.lose_next_attach {
                    state.lose_next_attach = false;
                    return Err(PlaneAction::Attach.api_error(
                        1400,
                        format!("volume [{volume}] have been already attached to instance [{instance}]"),
                    ));
                }
            }
            Ok(state.issue_job())
        });
        Box::pin(ready(result))
    }

    fn detach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Detach)?;
            for volume in volumes {
                let Some(record) = state.volumes.get_mut(volume) else {
                    return Err(PlaneAction::Detach
                        .api_error(2100, format!("resource [{volume}] not found")));
                };
                if !record.is_attached_to(instance) {
                    return Err(PlaneAction::Detach.api_error(
                        1400,
                        format!("volume [{volume}] has already been detached from [{instance}]"),
                    ));
                }
                record.status = String::from("available");
                record.attachment = None;
            }
            Ok(state.issue_job())
        });
        Box::pin(ready(result))
    }

    fn describe_volumes<'a>(
        &'a self,
        query: VolumeQuery<'a>,
    ) -> BackendFuture<'a, Vec<VolumeRecord>, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Describe)?;
            let records = match query {
                VolumeQuery::Ids(ids) => ids
                    .iter()
                    .filter_map(|id| state.volumes.get(id).cloned())
                    .collect(),
                VolumeQuery::SearchWord(word) => state
                    .volumes
                    .values()
                    .filter(|record| record.name.contains(word) || record.id.contains(word))
                    .cloned()
                    .collect(),
            };
            Ok(records)
        });
        Box::pin(ready(result))
    }

    fn modify_volume_attributes<'a>(
        &'a self,
        volume: &'a VolumeId,
        name: &'a str,
    ) -> BackendFuture<'a, (), RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::Modify)?;
            let Some(record) = state.volumes.get_mut(volume) else {
                return Err(PlaneAction::Modify
                    .api_error(2100, format!("resource [{volume}] not found")));
            };
            name.clone_into(&mut record.name);
            Ok(())
        });
        Box::pin(ready(result))
    }

    fn describe_instances<'a>(
        &'a self,
        instances: &'a [InstanceId],
    ) -> BackendFuture<'a, Vec<InstanceRecord>, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::DescribeInstances)?;
            Ok(instances
                .iter()
                .filter_map(|id| state.instances.get(id).cloned())
                .collect())
        });
        Box::pin(ready(result))
    }

    fn describe_job<'a>(
        &'a self,
        job: &'a JobId,
    ) -> BackendFuture<'a, Option<JobStatus>, RemoteError> {
        let result = self.with_state(|state| {
            state.record(PlaneAction::DescribeJob)?;
            if !state.jobs.contains(job) {
                return Ok(None);
            }
            Ok(Some(
                state
                    .job_statuses
                    .pop_front()
                    .unwrap_or(JobStatus::Successful),
            ))
        });
        Box::pin(ready(result))
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the invoked program names, in order.
    #[must_use]
    pub fn programs(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .map(|invocation| invocation.program.clone())
            .collect()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a specific exit code.
    pub fn push_exit_code(&self, code: i32) {
        self.push_output(Some(code), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| CommandError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    ///
    /// A `None` value removes the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
