//! CG-010: Permission model. Resource kinds, access levels, grants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Level of access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// AWS services a lambda can be granted access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AwsResource {
    S3,
    Ssm,
    DynamoDb,
    DynamoDbIndex,
    SqsQueue,
    Cognito,
    SecretManager,
    CloudWatchLogs,
}

impl AwsResource {
    /// IAM action prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Ssm => "ssm",
            Self::DynamoDb | Self::DynamoDbIndex => "dynamodb",
            Self::SqsQueue => "sqs",
            Self::Cognito => "cognito-idp",
            Self::SecretManager => "secretsmanager",
            Self::CloudWatchLogs => "logs",
        }
    }

    /// ARN prefix patterns are appended to (after a `:`).
    pub fn glob(self, region: &str, account: &str) -> String {
        match self {
            Self::S3 => "arn:aws:s3::".to_string(),
            other => format!("arn:aws:{}:{}:{}", other.prefix(), region, account),
        }
    }

    pub fn read_actions(self) -> &'static [&'static str] {
        match self {
            Self::S3 => &["Get*", "Describe*", "List*", "AbortMultipartUpload"],
            Self::Ssm => &[
                "GetParameter",
                "GetParameters",
                "GetParameterHistory",
                "GetParametersByPath",
                "DescribeParameters",
            ],
            Self::DynamoDb => &[
                "BatchGetItem",
                "GetItem",
                "TransactGetItems",
                "Query",
                "Scan",
                "Describe*",
                "List*",
            ],
            Self::DynamoDbIndex => &["Query", "Scan"],
            Self::SqsQueue => &["Get*", "List*", "ReceiveMessage"],
            Self::Cognito => &["AdminGetUser", "GetUser", "ListUsers"],
            Self::SecretManager => &[
                "BatchGetSecretValue",
                "DescribeSecret",
                "GetRandomPassword",
                "GetResourcePolicy",
                "GetSecretValue",
                "ListSecretVersionIds",
                "ListSecrets",
            ],
            Self::CloudWatchLogs => &[
                "GetLogEvents",
                "GetLogRecord",
                "GetLogGroupFields",
                "GetQueryResults",
                "DescribeLogGroups",
                "DescribeLogStreams",
                "DescribeMetricFilters",
            ],
        }
    }

    pub fn write_actions(self) -> &'static [&'static str] {
        match self {
            Self::S3 => &[
                "Create*",
                "Delete*",
                "ObjectOwnerOverrideToBucketOwner",
                "Put*",
                "Replicate*",
                "Update*",
            ],
            Self::Ssm => &["DeleteParameter", "DeleteParameters", "PutParameter"],
            Self::DynamoDb => &[
                "BatchWriteItem",
                "PutItem",
                "TransactWriteItems",
                "Create*",
                "Delete*",
                "Restore*",
                "Update*",
                "TagResource",
                "UntagResource",
            ],
            Self::DynamoDbIndex => &[],
            Self::SqsQueue => &["DeleteMessage", "PurgeQueue", "SendMessage"],
            Self::Cognito => &[
                "AdminUpdateUserAttributes",
                "ChangePassword",
                "ConfirmForgotPassword",
                "DeleteUser",
                "SignUp",
                "UpdateUserAttributes",
            ],
            Self::SecretManager => &[
                "CancelRotateSecret",
                "CreateSecret",
                "DeleteSecret",
                "PutSecretValue",
                "RestoreSecret",
                "RotateSecret",
                "UpdateSecret",
                "UpdateSecretVersionStage",
            ],
            Self::CloudWatchLogs => &[
                "CreateLogGroup",
                "DeleteLogGroup",
                "CreateLogStream",
                "DeleteLogStream",
                "PutLogEvents",
                "DeleteMetricFilter",
                "PutMetricFilter",
            ],
        }
    }

    /// Prefixed IAM actions for a level, sorted.
    pub fn actions(self, level: PermissionLevel) -> BTreeSet<String> {
        let read = self.read_actions().iter();
        let write = self.write_actions().iter();
        let selected: Vec<&&str> = match level {
            PermissionLevel::Read => read.collect(),
            PermissionLevel::Write => write.collect(),
            PermissionLevel::ReadWrite => read.chain(write).collect(),
        };
        selected
            .into_iter()
            .map(|a| format!("{}:{}", self.prefix(), a))
            .collect()
    }
}

/// Azure resources a function can be granted access to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AzureResource {
    Resource,
    StorageAccount,
    Insights,
}

impl AzureResource {
    /// Built-in role assigned for a level.
    pub fn role(self, level: PermissionLevel) -> &'static str {
        match (self, level) {
            (Self::Insights, PermissionLevel::Read) => "Monitoring Reader",
            (Self::Insights, _) => "Monitoring Metrics Publisher",
            (_, PermissionLevel::Read) => "Reader",
            (_, _) => "Contributor",
        }
    }

    /// Role assignment scope for a pattern within a subscription.
    pub fn scope(self, pattern: &str, subscription: &str) -> String {
        match self {
            Self::Resource => pattern.to_string(),
            Self::StorageAccount => {
                let (group, name) = pattern.split_once('/').unwrap_or(("", pattern));
                format!(
                    "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}",
                    subscription, group, name
                )
            }
            Self::Insights => format!("/subscriptions/{}", subscription),
        }
    }
}

/// Resource kind a grant applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Aws(AwsResource),
    Azure(AzureResource),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws(r) => write!(f, "aws:{:?}", r),
            Self::Azure(r) => write!(f, "azure:{:?}", r),
        }
    }
}

/// One access grant. Structural equality is the merge key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub kind: ResourceKind,
    pub level: PermissionLevel,
    pub patterns: BTreeSet<String>,
}

impl Permission {
    pub fn new<I, S>(kind: ResourceKind, level: PermissionLevel, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            level,
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn aws(resource: AwsResource, level: PermissionLevel, pattern: impl Into<String>) -> Self {
        Self::new(ResourceKind::Aws(resource), level, [pattern.into()])
    }

    pub fn azure(resource: AzureResource, level: PermissionLevel, pattern: impl Into<String>) -> Self {
        Self::new(ResourceKind::Azure(resource), level, [pattern.into()])
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self.patterns.iter().map(String::as_str).collect();
        write!(f, "{} {} [{}]", self.kind, self.level, patterns.join(", "))
    }
}
