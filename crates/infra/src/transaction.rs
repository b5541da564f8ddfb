//! Atomic execution of a workflow against an `InventoryStore`.

use tracing::warn;

use crate::config::EngineConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::store::{InventoryStore, UnitOfWork};

/// Run `work` inside one unit of work and commit it.
///
/// Any error returned by `work` drops the unit of work, discarding every
/// buffered write. Write conflicts (from `work` or from `commit`) rerun
/// `work` from scratch on a fresh unit of work, up to
/// `config.conflict_retries` times.
pub fn run_in_transaction<S, T, F>(
    store: &S,
    config: &EngineConfig,
    mut work: F,
) -> ServiceResult<T>
where
    S: InventoryStore,
    F: FnMut(&mut S::Tx) -> ServiceResult<T>,
{
    let mut attempt = 0u32;
    loop {
        let mut uow = store.begin()?;
        let outcome = match work(&mut uow) {
            Ok(value) => uow.commit().map(|()| value).map_err(ServiceError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Err(e) if e.is_retryable() && attempt < config.conflict_retries => {
                attempt += 1;
                warn!(
                    attempt,
                    max = config.conflict_retries,
                    error = %e,
                    "write conflict; retrying"
                );
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, ScrapLink};
    use stockledger_core::{DomainError, RawItemId, ScrapItemId};

    fn link(scrap: u64) -> ScrapLink {
        ScrapLink {
            raw_item: RawItemId::from_seq(1),
            scrap_item: ScrapItemId::from_seq(scrap),
        }
    }

    #[test]
    fn errors_roll_back_buffered_writes() {
        let store = InMemoryStore::new();
        let result: ServiceResult<()> = run_in_transaction(&store, &EngineConfig::default(), |uow| {
            uow.insert(&link(1))?;
            Err(DomainError::validation("nope").into())
        });
        assert!(result.is_err());
        assert!(store.scan::<ScrapLink>().unwrap().is_empty());
    }

    #[test]
    fn conflicts_are_retried_until_the_limit() {
        let store = InMemoryStore::new();
        let config = EngineConfig {
            conflict_retries: 2,
            ..EngineConfig::default()
        };
        let mut calls = 0;
        let result: ServiceResult<()> = run_in_transaction(&store, &config, |_| {
            calls += 1;
            Err(DomainError::conflict("busy").into())
        });
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls, 3);
    }

    #[test]
    fn a_conflict_followed_by_success_commits_once() {
        let store = InMemoryStore::new();
        let mut calls = 0;
        run_in_transaction(&store, &EngineConfig::default(), |uow| {
            calls += 1;
            if calls == 1 {
                return Err(DomainError::conflict("busy").into());
            }
            uow.insert(&link(calls))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(store.scan::<ScrapLink>().unwrap().len(), 1);
    }
}
