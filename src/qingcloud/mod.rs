//! QingCloud IaaS implementation of the [`ControlPlane`].
//!
//! Requests are signed `GET`s against `{protocol}://{host}:{port}{uri}/`;
//! every response carries a `ret_code` where zero means success.

mod signer;
mod types;

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backend::{
    BackendFuture, ControlPlane, CreatedVolumes, InstanceRecord, JobStatus, RemoteError,
    VolumeQuery, VolumeRecord,
};
use crate::config::{ConfigError, QingCloudConfig};
use crate::types::{InstanceId, JobId, VolumeId};
use crate::volume::VolumeOptions;
use types::ApiResponse;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Query parameters for one API call, in insertion order.
#[derive(Debug, Default)]
struct Params(Vec<(String, String)>);

impl Params {
    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.push((key.to_owned(), value.into()));
        self
    }

    /// Appends `key.1`, `key.2`, ... for each value.
    fn list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (index, value) in values.into_iter().enumerate() {
            self.0
                .push((format!("{key}.{}", index + 1), value.as_ref().to_owned()));
        }
        self
    }
}

/// Signed HTTP client for the QingCloud IaaS API.
#[derive(Clone, Debug)]
pub struct QingCloudApi {
    client: reqwest::Client,
    endpoint: String,
    uri: String,
    zone: String,
    access_key_id: String,
    secret_access_key: String,
    retries: u32,
}

impl QingCloudApi {
    /// Builds a client from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required field is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: &QingCloudConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.connection_timeout))
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;
        let uri = config.uri.trim_end_matches('/').to_owned();
        Ok(Self {
            client,
            endpoint: format!(
                "{}://{}:{}{uri}/",
                config.protocol, config.host, config.port
            ),
            uri,
            zone: config.zone.clone(),
            access_key_id: config.access_key_id.clone(),
            secret_access_key: config.secret_access_key.clone(),
            retries: config.connection_retries,
        })
    }

    fn signed_query(
        &self,
        action: &str,
        params: Params,
        now: DateTime<Utc>,
    ) -> Result<String, RemoteError> {
        let mut all: BTreeMap<String, String> = params.0.into_iter().collect();
        all.insert(String::from("action"), action.to_owned());
        all.insert(String::from("zone"), self.zone.clone());
        all.insert(String::from("access_key_id"), self.access_key_id.clone());
        all.insert(String::from("signature_method"), String::from("HmacSHA256"));
        all.insert(String::from("signature_version"), String::from("1"));
        all.insert(String::from("version"), String::from("1"));
        all.insert(
            String::from("time_stamp"),
            now.format(TIMESTAMP_FORMAT).to_string(),
        );

        let canonical = signer::canonical_query(&all);
        let signature = signer::sign(&self.secret_access_key, &self.uri, &canonical).map_err(
            |err| RemoteError::Transport {
                action: action.to_owned(),
                message: format!("cannot sign request: {err}"),
            },
        )?;
        Ok(format!(
            "{canonical}&signature={}",
            signer::percent_encode(&signature)
        ))
    }

    async fn call(&self, action: &str, params: Params) -> Result<ApiResponse, RemoteError> {
        let url = format!(
            "{}?{}",
            self.endpoint,
            self.signed_query(action, params, Utc::now())?
        );
        let mut attempt = 0;
        let body = loop {
            attempt += 1;
            match self.fetch(&url).await {
                Ok(body) => break body,
                Err(err) if attempt <= self.retries => {
                    warn!(action, attempt, error = %err, "request failed, retrying");
                    sleep(RETRY_DELAY).await;
                }
                Err(err) => {
                    return Err(RemoteError::Transport {
                        action: action.to_owned(),
                        message: err.to_string(),
                    });
                }
            }
        };

        let response: ApiResponse =
            serde_json::from_str(&body).map_err(|err| RemoteError::Decode {
                action: action.to_owned(),
                message: err.to_string(),
            })?;
        if response.ret_code != 0 {
            return Err(RemoteError::Api {
                action: action.to_owned(),
                code: response.ret_code,
                message: response.message,
            });
        }
        debug!(action, "request succeeded");
        Ok(response)
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client.get(url).send().await?.text().await
    }

    async fn call_for_job(&self, action: &str, params: Params) -> Result<JobId, RemoteError> {
        let response = self.call(action, params).await?;
        job_id(action, response.job_id)
    }
}

fn job_id(action: &str, raw: Option<String>) -> Result<JobId, RemoteError> {
    raw.filter(|id| !id.is_empty())
        .map(JobId::from)
        .ok_or_else(|| RemoteError::Decode {
            action: action.to_owned(),
            message: String::from("response is missing job_id"),
        })
}

impl ControlPlane for QingCloudApi {
    fn create_volumes<'a>(
        &'a self,
        options: &'a VolumeOptions,
    ) -> BackendFuture<'a, CreatedVolumes, RemoteError> {
        Box::pin(async move {
            let action = "CreateVolumes";
            let params = Params::default()
                .with("size", options.capacity_gb.to_string())
                .with("volume_name", options.name.as_str())
                .with("volume_type", options.volume_type.to_string())
                .with("count", "1");
            let response = self.call(action, params).await?;
            Ok(CreatedVolumes {
                job_id: job_id(action, response.job_id)?,
                volume_ids: response.volumes.into_iter().map(VolumeId::from).collect(),
            })
        })
    }

    fn delete_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
    ) -> BackendFuture<'a, JobId, RemoteError> {
        Box::pin(async move {
            self.call_for_job("DeleteVolumes", Params::default().list("volumes", volumes))
                .await
        })
    }

    fn attach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError> {
        Box::pin(async move {
            let params = Params::default()
                .list("volumes", volumes)
                .with("instance", instance.as_str());
            self.call_for_job("AttachVolumes", params).await
        })
    }

    fn detach_volumes<'a>(
        &'a self,
        volumes: &'a [VolumeId],
        instance: &'a InstanceId,
    ) -> BackendFuture<'a, JobId, RemoteError> {
        Box::pin(async move {
            let params = Params::default()
                .list("volumes", volumes)
                .with("instance", instance.as_str());
            self.call_for_job("DetachVolumes", params).await
        })
    }

    fn describe_volumes<'a>(
        &'a self,
        query: VolumeQuery<'a>,
    ) -> BackendFuture<'a, Vec<VolumeRecord>, RemoteError> {
        Box::pin(async move {
            let params = match query {
                VolumeQuery::Ids(ids) => Params::default().list("volumes", ids),
                VolumeQuery::SearchWord(word) => Params::default().with("search_word", word),
            };
            let response = self.call("DescribeVolumes", params).await?;
            Ok(response.volume_set.into_iter().map(Into::into).collect())
        })
    }

    fn modify_volume_attributes<'a>(
        &'a self,
        volume: &'a VolumeId,
        name: &'a str,
    ) -> BackendFuture<'a, (), RemoteError> {
        Box::pin(async move {
            let params = Params::default()
                .with("volume", volume.as_str())
                .with("volume_name", name);
            self.call("ModifyVolumeAttributes", params).await?;
            Ok(())
        })
    }

    fn describe_instances<'a>(
        &'a self,
        instances: &'a [InstanceId],
    ) -> BackendFuture<'a, Vec<InstanceRecord>, RemoteError> {
        Box::pin(async move {
            let params = Params::default()
                .list("instances", instances)
                .list("status", ["running"])
                .with("verbose", "1")
                .with("is_cluster_node", "1");
            let response = self.call("DescribeInstances", params).await?;
            Ok(response.instance_set.into_iter().map(Into::into).collect())
        })
    }

    fn describe_job<'a>(
        &'a self,
        job: &'a JobId,
    ) -> BackendFuture<'a, Option<JobStatus>, RemoteError> {
        Box::pin(async move {
            let params = Params::default().list("jobs", [job.as_str()]);
            let response = self.call("DescribeJobs", params).await?;
            Ok(response
                .job_set
                .iter()
                .find(|remote| remote.job_id == job.as_str())
                .map(JobStatus::from))
        })
    }
}
