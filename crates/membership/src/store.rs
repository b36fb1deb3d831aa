use crate::error::{Error, Result};
use crate::model::Member;

use farm_parameters::ParameterStore;
use tracing::debug;

/// The whole membership collection, stored as one JSON record.
#[derive(Clone, Debug)]
pub struct MembershipStore<P>
where
    P: ParameterStore,
{
    store: P,
    name: String,
}

impl<P> MembershipStore<P>
where
    P: ParameterStore,
{
    /// Creates a store over the record `name`.
    pub fn new(store: P, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    /// Reads every member, removed ones included. A missing record is an empty farm.
    ///
    /// # Errors
    ///
    /// Store failures, or [`Error::Decode`] for a record that does not parse.
    pub async fn read_all(&self) -> Result<Vec<Member>> {
        match self.store.get(&self.name).await.map_err(Error::store)? {
            Some(raw) => serde_json::from_str(&raw).map_err(Error::Decode),
            None => {
                debug!(record = %self.name, "membership not recorded yet");
                Ok(Vec::new())
            }
        }
    }

    /// Overwrites the whole collection. Callers merge into a fresh `read_all` first.
    ///
    /// # Errors
    ///
    /// Store or encoding failures.
    pub async fn write_all(&self, members: &[Member]) -> Result<()> {
        let raw = serde_json::to_string(members).map_err(Error::Encode)?;
        self.store.put(&self.name, raw).await.map_err(Error::store)
    }
}
