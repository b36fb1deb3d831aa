use crate::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::operation::delete_parameter::DeleteParameterError;
use aws_sdk_ssm::operation::get_parameter::GetParameterError;
use aws_sdk_ssm::operation::put_parameter::PutParameterError;
use aws_sdk_ssm::types::ParameterType;
use farm_parameters::{ParameterStore, ParameterStore1};
use tracing::debug;

/// Parameter store backed by Systems Manager parameters under a path prefix.
#[derive(Clone, Debug)]
pub struct SsmParameterStore {
    client: aws_sdk_ssm::Client,
    prefix: String,
}

impl SsmParameterStore {
    /// Creates a store rooted at `prefix` (e.g. `/farm`).
    pub fn new(config: &SdkConfig, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();

        Self {
            client: aws_sdk_ssm::Client::new(config),
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn get_key(&self, name: &str) -> String {
        format!("{}/{}", self.prefix, name)
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    type Error = Error;

    async fn get(&self, name: &str) -> Result<Option<String>, Self::Error> {
        let key = self.get_key(name);

        let resp = self.client.get_parameter().name(&key).send().await;

        match resp {
            Ok(resp) => resp
                .parameter
                .and_then(|p| p.value)
                .map(Some)
                .ok_or(Error::MissingValue(key)),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(GetParameterError::is_parameter_not_found)
                {
                    Ok(None)
                } else {
                    Err(Error::Ssm(e.into()))
                }
            }
        }
    }

    async fn create(&self, name: &str, value: String) -> Result<bool, Self::Error> {
        let key = self.get_key(name);

        let resp = self
            .client
            .put_parameter()
            .name(&key)
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(false)
            .send()
            .await;

        match resp {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(PutParameterError::is_parameter_already_exists)
                {
                    debug!(%key, "parameter already exists");
                    Ok(false)
                } else {
                    Err(Error::Ssm(e.into()))
                }
            }
        }
    }

    async fn put(&self, name: &str, value: String) -> Result<(), Self::Error> {
        self.client
            .put_parameter()
            .name(self.get_key(name))
            .value(value)
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| Error::Ssm(e.into()))?;

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Self::Error> {
        let resp = self
            .client
            .delete_parameter()
            .name(self.get_key(name))
            .send()
            .await;

        match resp {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(DeleteParameterError::is_parameter_not_found)
                {
                    Ok(false)
                } else {
                    Err(Error::Ssm(e.into()))
                }
            }
        }
    }
}

#[async_trait]
impl ParameterStore1 for SsmParameterStore {
    type Error = Error;
    type Scoped = Self;

    fn scope<S>(&self, scope: S) -> Self::Scoped
    where
        S: AsRef<str> + Send,
    {
        Self {
            client: self.client.clone(),
            prefix: self.get_key(scope.as_ref()),
        }
    }
}
