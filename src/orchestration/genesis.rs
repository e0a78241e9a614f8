//! One-time seeding of pre-funded genesis accounts from a CSV file.

use crate::db::{Repository, StoreError};
use crate::domain::Address;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid genesis row: {0}")]
    Csv(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A genesis allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: u64,
}

/// Parse `address,balance` rows. Addresses must carry the network's prefix.
pub fn parse_genesis_csv(bytes: &[u8], hrp: &str) -> Result<Vec<GenesisAccount>, GenesisError> {
    #[derive(Debug, serde::Deserialize)]
    struct Row {
        address: String,
        balance: u64,
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut accounts = Vec::new();
    for record in reader.deserialize::<Row>() {
        let row = record.map_err(|e| GenesisError::Csv(e.to_string()))?;
        let address = Address::parse(&row.address, hrp)
            .map_err(|e| GenesisError::Csv(format!("{}: {}", row.address, e)))?;
        accounts.push(GenesisAccount {
            address,
            balance: row.balance,
        });
    }

    Ok(accounts)
}

/// Credit every allocation in `path` that has not been seeded before.
///
/// Returns the number of accounts credited by this call.
pub async fn seed_from_file(repo: &Repository, path: &str, hrp: &str) -> Result<usize, GenesisError> {
    let bytes = tokio::fs::read(path).await?;
    let accounts = parse_genesis_csv(&bytes, hrp)?;

    let mut credited = 0usize;
    for account in &accounts {
        if repo
            .seed_genesis_account(account.address.as_str(), account.balance)
            .await?
        {
            credited += 1;
        }
    }

    info!(
        path = %path,
        total = accounts.len(),
        credited,
        "Genesis accounts seeded"
    );
    Ok(credited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repo::test_support::setup_test_db;
    use crate::domain::primitives::ADDRESS_LENGTH;

    fn address(tail: u8) -> Address {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = tail;
        Address::from_bytes(&bytes, "sm").unwrap()
    }

    #[test]
    fn test_parse_rejects_foreign_prefix() {
        let good = format!("address,balance\n{}, 100\n", address(1));
        let parsed = parse_genesis_csv(good.as_bytes(), "sm").unwrap();
        assert_eq!(parsed[0].balance, 100);

        let err = parse_genesis_csv(good.as_bytes(), "stest").unwrap_err();
        assert!(matches!(err, GenesisError::Csv(_)));
    }

    #[tokio::test]
    async fn test_seed_from_file_once() {
        let (repo, temp) = setup_test_db().await;
        let path = temp.path().join("genesis.csv");
        let a = address(1);
        let b = address(2);
        std::fs::write(&path, format!("address,balance\n{},100\n{},250\n", a, b)).unwrap();
        let path = path.to_string_lossy().to_string();

        assert_eq!(seed_from_file(&repo, &path, "sm").await.unwrap(), 2);
        assert_eq!(seed_from_file(&repo, &path, "sm").await.unwrap(), 0);
        assert_eq!(
            repo.get_account(b.as_str()).await.unwrap().unwrap().balance,
            250
        );
    }
}
