use farm_parameters::ParameterStoreError;
use thiserror::Error;

/// Errors from the AWS-backed collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Autoscaling API error.
    #[error(transparent)]
    AutoScaling(#[from] aws_sdk_autoscaling::Error),

    /// EC2 API error.
    #[error(transparent)]
    Ec2(#[from] aws_sdk_ec2::Error),

    /// The instance status lookup returned nothing for the instance.
    #[error("instance {0} not found")]
    InstanceNotFound(String),

    /// A parameter exists but has no value.
    #[error("parameter {0} has no value")]
    MissingValue(String),

    /// SNS API error.
    #[error(transparent)]
    Sns(#[from] aws_sdk_sns::Error),

    /// Systems Manager API error.
    #[error(transparent)]
    Ssm(#[from] aws_sdk_ssm::Error),
}

impl ParameterStoreError for Error {}
