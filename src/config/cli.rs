use crate::core::{Account, AccountStore, CardSummary, RemoteCustomerId};
use crate::utils::error::{BindingError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Accounts kept in a single JSON file keyed by account id.
#[derive(Debug, Clone)]
pub struct LocalAccountStore {
    path: PathBuf,
}

impl LocalAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Account>> {
        match tokio::fs::read(&self.path).await {
            Ok(data) if data.is_empty() => Ok(BTreeMap::new()),
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            // 檔案不存在就當作空的
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, accounts: &BTreeMap<String, Account>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec_pretty(accounts)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }

    pub async fn load_account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.read_all().await?.remove(account_id))
    }

    /// Inserts or replaces the local profile; a stored customer id is never dropped.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.read_all().await?;
        let mut updated = account.clone();

        if let Some(existing) = accounts.get(&account.id) {
            match (&existing.remote_customer_id, &account.remote_customer_id) {
                (Some(stored), Some(given)) if stored != given => {
                    return Err(BindingError::InvalidAccountState {
                        account_id: account.id.clone(),
                        message: format!("already linked to {}", stored),
                    })
                }
                (Some(stored), None) => updated.remote_customer_id = Some(stored.clone()),
                _ => {}
            }
        }

        accounts.insert(updated.id.clone(), updated);
        self.write_all(&accounts).await
    }
}

impl AccountStore for LocalAccountStore {
    async fn read_customer_id(&self, account_id: &str) -> Result<Option<RemoteCustomerId>> {
        Ok(self
            .load_account(account_id)
            .await?
            .and_then(|a| a.remote_customer_id))
    }

    async fn write_customer_id(
        &self,
        account_id: &str,
        customer_id: &RemoteCustomerId,
    ) -> Result<()> {
        let mut accounts = self.read_all().await?;
        let account = accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id));

        if let Some(existing) = &account.remote_customer_id {
            if existing == customer_id {
                return Ok(());
            }
            return Err(BindingError::InvalidAccountState {
                account_id: account_id.to_string(),
                message: format!("already linked to {}", existing),
            });
        }

        account.remote_customer_id = Some(customer_id.clone());
        self.write_all(&accounts).await
    }

    async fn write_card_summary(
        &self,
        account_id: &str,
        summary: Option<&CardSummary>,
    ) -> Result<()> {
        let mut accounts = self.read_all().await?;
        accounts
            .entry(account_id.to_string())
            .or_insert_with(|| Account::new(account_id))
            .card = summary.cloned();
        self.write_all(&accounts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAccountStore::new(temp_dir.path().join("accounts.json"));

        assert_eq!(store.read_customer_id("user-1").await.unwrap(), None);
        assert!(store.load_account("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_customer_id_survives_profile_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAccountStore::new(temp_dir.path().join("nested/accounts.json"));

        store
            .write_customer_id("user-1", &RemoteCustomerId::new("cus_1"))
            .await
            .unwrap();
        store
            .save_account(&Account::new("user-1").with_email("taylor@example.com"))
            .await
            .unwrap();

        let account = store.load_account("user-1").await.unwrap().unwrap();
        assert_eq!(account.email.as_deref(), Some("taylor@example.com"));
        assert_eq!(account.remote_customer_id, Some(RemoteCustomerId::new("cus_1")));
    }

    #[tokio::test]
    async fn test_refuses_to_relink() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAccountStore::new(temp_dir.path().join("accounts.json"));
        store
            .write_customer_id("user-1", &RemoteCustomerId::new("cus_1"))
            .await
            .unwrap();

        let result = store
            .write_customer_id("user-1", &RemoteCustomerId::new("cus_2"))
            .await;

        assert!(matches!(result, Err(BindingError::InvalidAccountState { .. })));
    }

    #[tokio::test]
    async fn test_card_summary_creates_missing_account() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalAccountStore::new(temp_dir.path().join("accounts.json"));
        let summary = CardSummary {
            brand: "visa".to_string(),
            last_four: "4242".to_string(),
        };

        store
            .write_card_summary("newcomer", Some(&summary))
            .await
            .unwrap();
        let created = store.load_account("newcomer").await.unwrap().unwrap();
        assert_eq!(created.card, Some(summary.clone()));
        assert_eq!(created.remote_customer_id, None);

        store.save_account(&Account::new("user-1")).await.unwrap();
        store
            .write_card_summary("user-1", Some(&summary))
            .await
            .unwrap();

        let account = store.load_account("user-1").await.unwrap().unwrap();
        assert_eq!(account.card, Some(summary));
    }
}
