/*!
Host directory - in-memory catalog of monitorable hosts

Records live for the lifetime of the process; nothing is persisted. Each
record is immutable once stored and the identity is a unique key. The
directory also owns the topic scheme, so clients learn a host's topic from
here instead of rebuilding it themselves.
*/

use hoststat_core::{HostId, HostRecord, HostView, TopicScheme, ValidationError};
use thiserror::Error;
use tracing::info;

use crate::state::{new_state, Shared};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("host {0} is already registered")]
    Duplicate(HostId),
}

#[derive(Clone)]
pub struct Directory {
    hosts: Shared<Vec<HostRecord>>,
    topics: TopicScheme,
}

impl Directory {
    pub fn new(topics: TopicScheme) -> Self {
        Self {
            hosts: new_state(Vec::new()),
            topics,
        }
    }

    /// Directory pre-populated with `seed`, registered in order.
    pub fn with_hosts(
        topics: TopicScheme,
        seed: impl IntoIterator<Item = HostRecord>,
    ) -> Result<Self, DirectoryError> {
        let directory = Self::new(topics);
        for record in seed {
            directory.register(record)?;
        }
        Ok(directory)
    }

    /// Validates and appends `candidate`. The uniqueness check and the append
    /// happen under one write lock, so concurrent registrations of the same id
    /// cannot both succeed and readers never see a half-applied write.
    pub fn register(&self, candidate: HostRecord) -> Result<HostRecord, DirectoryError> {
        candidate.validate()?;

        let mut hosts = self.hosts.write();
        if hosts.iter().any(|h| h.id == candidate.id) {
            return Err(DirectoryError::Duplicate(candidate.id));
        }
        hosts.push(candidate.clone());
        drop(hosts);

        info!(id = candidate.id, name = %candidate.name, ip = %candidate.ip, "host registered");
        Ok(candidate)
    }

    /// All records in registration order.
    pub fn list(&self) -> Vec<HostRecord> {
        self.hosts.read().clone()
    }

    pub fn get(&self, id: HostId) -> Option<HostRecord> {
        self.hosts.read().iter().find(|h| h.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn view_of(&self, record: HostRecord) -> HostView {
        let topic = self.topics.topic_for(record.id);
        HostView { record, topic }
    }

    pub fn views(&self) -> Vec<HostView> {
        self.list().into_iter().map(|r| self.view_of(r)).collect()
    }

    pub fn view(&self, id: HostId) -> Option<HostView> {
        self.get(id).map(|r| self.view_of(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::new(TopicScheme::default())
    }

    #[test]
    fn test_register_then_list_scenario() {
        let dir = directory();
        let record = HostRecord::new(1, "Server 1", "10.11.11.11", "");

        let stored = dir.register(record.clone()).unwrap();
        assert_eq!(stored, record);
        assert_eq!(dir.list(), vec![record]);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let dir = directory();
        for id in [3, 1, 2] {
            dir.register(HostRecord::new(id, format!("Server {id}"), "10.0.0.1", "desc"))
                .unwrap();
        }
        let ids: Vec<_> = dir.list().iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_rejects_empty_required_fields() {
        let dir = directory();
        let err = dir.register(HostRecord::new(1, "", "10.0.0.1", "")).unwrap_err();
        assert_eq!(err, DirectoryError::Invalid(ValidationError::EmptyField("name")));

        let err = dir.register(HostRecord::new(1, "a", " ", "")).unwrap_err();
        assert_eq!(err, DirectoryError::Invalid(ValidationError::EmptyField("ip")));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_rejects_duplicate_identity() {
        let dir = directory();
        dir.register(HostRecord::new(7, "first", "10.0.0.7", "")).unwrap();

        let err = dir.register(HostRecord::new(7, "second", "10.0.0.8", "")).unwrap_err();
        assert_eq!(err, DirectoryError::Duplicate(7));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(7).unwrap().name, "first");
    }

    #[test]
    fn test_views_carry_topic() {
        let dir = Directory::new(TopicScheme::new("lab").unwrap());
        dir.register(HostRecord::new(4, "db", "10.0.0.4", "")).unwrap();

        let view = dir.view(4).unwrap();
        assert_eq!(view.topic, "lab.4");
        assert_eq!(dir.views(), vec![view]);
        assert!(dir.view(5).is_none());
        assert_eq!(dir.topics().namespace(), "lab");
    }

    #[test]
    fn test_seeded_directory() {
        let dir = Directory::with_hosts(
            TopicScheme::default(),
            vec![
                HostRecord::new(1, "Server 1", "10.11.11.11", "This is server 1"),
                HostRecord::new(2, "Server 2", "10.12.12.12", "This is server 2"),
            ],
        )
        .unwrap();
        assert_eq!(dir.len(), 2);

        let dup = Directory::with_hosts(
            TopicScheme::default(),
            vec![
                HostRecord::new(1, "a", "10.0.0.1", ""),
                HostRecord::new(1, "b", "10.0.0.2", ""),
            ],
        );
        assert!(matches!(dup, Err(DirectoryError::Duplicate(1))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_are_all_kept() {
        let dir = directory();
        let n = 200;

        let mut tasks = Vec::new();
        for id in 0..n {
            let dir = dir.clone();
            tasks.push(tokio::spawn(async move {
                dir.register(HostRecord::new(id, format!("host-{id}"), "10.0.0.1", ""))
            }));
        }
        // Readers run alongside the writers and only ever see whole records.
        let mut readers = Vec::new();
        for _ in 0..20 {
            let dir = dir.clone();
            readers.push(tokio::spawn(async move {
                dir.list().iter().all(|h| h.name.starts_with("host-"))
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        for reader in readers {
            assert!(reader.await.unwrap());
        }

        let mut ids: Vec<_> = dir.list().iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), n as usize);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), n as usize);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicates_admit_exactly_one() {
        let dir = directory();
        let mut tasks = Vec::new();
        for i in 0..32 {
            let dir = dir.clone();
            tasks.push(tokio::spawn(async move {
                dir.register(HostRecord::new(1, format!("racer-{i}"), "10.0.0.1", ""))
            }));
        }
        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(dir.len(), 1);
    }
}
