//! Secret storage.

use super::CapabilityError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Secret capability consumed by the engine. Keys live in namespaces;
/// the engine uses the project name as the default namespace.
#[async_trait]
pub trait SecretCapability: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<String, CapabilityError>;
    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), CapabilityError>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CapabilityError>;
    async fn exists(&self, namespace: &str, key: &str) -> bool;
    /// Keys in the namespace matching `pattern` as a substring; an empty
    /// pattern lists everything.
    async fn list(&self, namespace: &str, pattern: &str) -> Vec<String>;
}

/// Process-local concurrent store. Values never outlive the run.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    entries: DashMap<(String, String), String>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretCapability for MemorySecrets {
    async fn get(&self, namespace: &str, key: &str) -> Result<String, CapabilityError> {
        self.entries
            .get(&(namespace.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| CapabilityError::Secret(format!("secret `{key}` not found")))
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), CapabilityError> {
        self.entries
            .insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CapabilityError> {
        self.entries
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, namespace: &str, key: &str) -> bool {
        self.entries
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    async fn list(&self, namespace: &str, pattern: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace && entry.key().1.contains(pattern))
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_secret_lifecycle() {
        let secrets = MemorySecrets::new();
        secrets.set("proj", "deploy_key", "s3cr3t").await.unwrap();
        assert!(secrets.exists("proj", "deploy_key").await);
        assert_eq!(secrets.get("proj", "deploy_key").await.unwrap(), "s3cr3t");

        // Namespaces are isolated.
        assert!(!secrets.exists("other", "deploy_key").await);

        secrets.delete("proj", "deploy_key").await.unwrap();
        assert!(!secrets.exists("proj", "deploy_key").await);
        let err = secrets.get("proj", "deploy_key").await.unwrap_err();
        assert_eq!(err.classification(), "secret");
    }

    #[tokio::test]
    async fn test_list_with_pattern() {
        let secrets = MemorySecrets::new();
        secrets.set("p", "aws_key", "1").await.unwrap();
        secrets.set("p", "aws_secret", "2").await.unwrap();
        secrets.set("p", "gh_token", "3").await.unwrap();
        assert_eq!(secrets.list("p", "aws").await, vec!["aws_key", "aws_secret"]);
        assert_eq!(secrets.list("p", "").await.len(), 3);
    }
}
