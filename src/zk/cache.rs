//! Process-wide proving backend handles.

use super::traits::{ZkOperator, ZkOperatorFactory};
use super::types::ZkEngine;
use crate::error::ProtocolResult;
use crate::transcript::CipherSuite;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lazily constructed operators keyed by `(suite, engine)`.
///
/// Construction happens on first use; [`ZkOperatorCache::release`] evicts an
/// operator and frees its resources. A later `get` builds a fresh one.
pub struct ZkOperatorCache {
    factory: Arc<dyn ZkOperatorFactory>,
    operators: Mutex<HashMap<(CipherSuite, ZkEngine), Arc<dyn ZkOperator>>>,
}

impl ZkOperatorCache {
    pub fn new(factory: Arc<dyn ZkOperatorFactory>) -> Self {
        Self {
            factory,
            operators: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(
        &self,
        suite: CipherSuite,
        engine: ZkEngine,
    ) -> ProtocolResult<Arc<dyn ZkOperator>> {
        let mut operators = self.operators.lock().await;
        if let Some(operator) = operators.get(&(suite, engine)) {
            return Ok(Arc::clone(operator));
        }

        debug!(%suite, %engine, "constructing proving backend");
        let operator = self.factory.create(suite, engine).await?;
        operators.insert((suite, engine), Arc::clone(&operator));
        Ok(operator)
    }

    pub async fn release(&self, suite: CipherSuite, engine: ZkEngine) {
        let evicted = self.operators.lock().await.remove(&(suite, engine));
        if let Some(operator) = evicted {
            debug!(%suite, %engine, "releasing proving backend");
            operator.release().await;
        }
    }

    /// Number of live operators.
    pub async fn len(&self) -> usize {
        self.operators.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zk::TransparentZkFactory;

    #[tokio::test]
    async fn test_get_reuses_and_release_evicts() {
        let factory = Arc::new(TransparentZkFactory::default());
        let cache = ZkOperatorCache::new(factory.clone());

        let a = cache.get(CipherSuite::Aes128Gcm, ZkEngine::Gnark).await.unwrap();
        let b = cache.get(CipherSuite::Aes128Gcm, ZkEngine::Gnark).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.created(), 1);

        cache
            .get(CipherSuite::Aes128Gcm, ZkEngine::Snarkjs)
            .await
            .unwrap();
        assert_eq!(cache.len().await, 2);

        cache.release(CipherSuite::Aes128Gcm, ZkEngine::Gnark).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(factory.released(), 1);

        let c = cache.get(CipherSuite::Aes128Gcm, ZkEngine::Gnark).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(factory.created(), 3);
    }
}
