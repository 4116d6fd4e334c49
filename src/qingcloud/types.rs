//! Wire shapes returned by the IaaS API.

use serde::Deserialize;

use crate::backend::{Attachment, InstanceRecord, JobStatus, VolumeRecord};
use crate::types::{InstanceId, VolumeId};

/// Union of the response fields used by the actions this crate calls.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ApiResponse {
    pub(crate) ret_code: i64,
    pub(crate) message: String,
    pub(crate) job_id: Option<String>,
    pub(crate) volumes: Vec<String>,
    pub(crate) volume_set: Vec<RemoteVolume>,
    pub(crate) instance_set: Vec<RemoteInstance>,
    pub(crate) job_set: Vec<RemoteJob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RemoteVolume {
    pub(crate) volume_id: String,
    pub(crate) volume_name: String,
    pub(crate) size: u32,
    pub(crate) status: String,
    pub(crate) instance: Option<RemoteAttachment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RemoteAttachment {
    pub(crate) instance_id: String,
    pub(crate) device: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RemoteInstance {
    pub(crate) instance_id: String,
    pub(crate) instance_class: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RemoteJob {
    pub(crate) job_id: String,
    pub(crate) status: String,
}

impl From<RemoteVolume> for VolumeRecord {
    fn from(value: RemoteVolume) -> Self {
        let attachment = value
            .instance
            .filter(|instance| !instance.instance_id.is_empty())
            .map(|instance| Attachment {
                instance_id: InstanceId::from(instance.instance_id),
                device: instance.device,
            });
        Self {
            id: VolumeId::from(value.volume_id),
            name: value.volume_name,
            size_gb: value.size,
            status: value.status,
            attachment,
        }
    }
}

impl From<RemoteInstance> for InstanceRecord {
    fn from(value: RemoteInstance) -> Self {
        Self {
            id: InstanceId::from(value.instance_id),
            instance_class: value.instance_class,
        }
    }
}

impl From<&RemoteJob> for JobStatus {
    fn from(value: &RemoteJob) -> Self {
        Self::from_remote(&value.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn decodes_describe_volumes_payload() {
        let payload = r#"{
            "action": "DescribeVolumesResponse",
            "total_count": 2,
            "ret_code": 0,
            "volume_set": [
                {
                    "volume_id": "vol-aaa",
                    "volume_name": "pv-1",
                    "size": 20,
                    "status": "in-use",
                    "volume_type": 0,
                    "instance": {"instance_id": "i-1", "instance_name": "node", "device": "/dev/sdc"}
                },
                {
                    "volume_id": "vol-bbb",
                    "volume_name": "pv-2",
                    "size": 100,
                    "status": "available",
                    "instance": {"instance_id": "", "device": ""}
                }
            ]
        }"#;

        let response: ApiResponse = serde_json::from_str(payload).expect("decode");
        let records: Vec<VolumeRecord> = response.volume_set.into_iter().map(Into::into).collect();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records.first().and_then(|record| record.attachment.clone()),
            Some(Attachment {
                instance_id: InstanceId::from("i-1"),
                device: String::from("/dev/sdc"),
            })
        );
        assert_eq!(records.get(1).map(|record| record.attachment.is_none()), Some(true));
    }

    #[rstest]
    fn decodes_error_payload() {
        let payload = r#"{"ret_code": 2100, "message": "resource [vol-1] has already been deleted"}"#;
        let response: ApiResponse = serde_json::from_str(payload).expect("decode");

        assert_eq!(response.ret_code, 2100);
        assert!(response.message.contains("already been deleted"));
    }

    #[rstest]
    fn decodes_instances_and_jobs() {
        let payload = r#"{
            "ret_code": 0,
            "instance_set": [{"instance_id": "i-1", "instance_class": 1}, {"instance_id": "i-2", "instance_class": null}],
            "job_set": [{"job_id": "j-1", "status": "done with failure"}]
        }"#;
        let response: ApiResponse = serde_json::from_str(payload).expect("decode");

        let classes: Vec<Option<i64>> = response
            .instance_set
            .into_iter()
            .map(|instance| InstanceRecord::from(instance).instance_class)
            .collect();
        assert_eq!(classes, vec![Some(1), None]);
        assert!(matches!(
            response.job_set.first().map(JobStatus::from),
            Some(JobStatus::Failed { .. })
        ));
    }
}
