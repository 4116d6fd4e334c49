//! Unit tests for configuration parsing and validation.

use rstest::rstest;

use super::*;

const CLIENT_FILE: &str = "\
qy_access_key_id: 'QYACCESSKEYIDEXAMPLE'
qy_secret_access_key: 'SECRETACCESSKEY'
zone: 'pek3a'
host: 'api.internal'
port: 7777
protocol: 'http'
uri: '/iaas/'
connection_retries: 1
";

#[rstest]
fn parses_sdk_client_file() {
    let config = QingCloudConfig::from_client_yaml(CLIENT_FILE).expect("valid yaml");

    assert_eq!(config.access_key_id, "QYACCESSKEYIDEXAMPLE");
    assert_eq!(config.secret_access_key, "SECRETACCESSKEY");
    assert_eq!(config.zone, "pek3a");
    assert_eq!(config.host, "api.internal");
    assert_eq!(config.port, 7777);
    assert_eq!(config.protocol, "http");
    assert_eq!(config.connection_retries, 1);
    assert_eq!(config.connection_timeout, 30);
    assert_eq!(config.instance_id_file, "/etc/qingcloud/instance-id");
    assert!(config.validate().is_ok());
}

#[rstest]
fn empty_client_file_uses_defaults() {
    let config = QingCloudConfig::from_client_yaml("").expect("empty is valid");
    assert_eq!(config, QingCloudConfig::default());
}

#[rstest]
fn malformed_client_file_is_a_parse_error() {
    let err = QingCloudConfig::from_client_yaml("port: [not a port").expect_err("bad yaml");
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[rstest]
#[case("access_key_id", "QINGCLOUD_ACCESS_KEY_ID")]
#[case("secret_access_key", "QINGCLOUD_SECRET_ACCESS_KEY")]
#[case("zone", "QINGCLOUD_ZONE")]
fn validation_names_the_missing_field(#[case] field: &str, #[case] env_var: &str) {
    let mut config = QingCloudConfig::from_client_yaml(CLIENT_FILE).expect("valid yaml");
    match field {
        "access_key_id" => config.access_key_id = String::from("  "),
        "secret_access_key" => config.secret_access_key = String::new(),
        _ => config.zone = String::new(),
    }

    let err = config.validate().expect_err("field is blank");

    assert!(
        matches!(err, ConfigError::MissingField(ref message) if message.contains(env_var)),
        "unexpected error: {err}"
    );
}

#[rstest]
fn validation_rejects_unknown_protocols() {
    let mut config = QingCloudConfig::from_client_yaml(CLIENT_FILE).expect("valid yaml");
    config.protocol = String::from("ftp");

    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}
