use std::sync::Arc;

use futures::future::BoxFuture;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::cache::CollectionCache;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::market::{MarketDataSource, PoolInfo, PoolStats};

/// 池子过滤条件，所有条件同时满足才保留。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolFilter {
    pub programs: Option<Vec<Pubkey>>,
    pub tokens: Option<Vec<Pubkey>>,
    pub min_tvl: Option<f64>,
    pub min_volume_24h: Option<f64>,
}

impl PoolFilter {
    pub fn matches(&self, pool: &PoolInfo) -> bool {
        if let Some(programs) = &self.programs {
            if !programs.contains(&pool.program_id) {
                return false;
            }
        }
        if let Some(tokens) = &self.tokens {
            if !pool.contains_all(tokens) {
                return false;
            }
        }
        if let Some(min_tvl) = self.min_tvl {
            if pool.stats.tvl < min_tvl {
                return false;
            }
        }
        if let Some(min_volume) = self.min_volume_24h {
            if pool.stats.volume_24h < min_volume {
                return false;
            }
        }
        true
    }
}

fn pool_id(pool: &PoolInfo) -> Pubkey {
    pool.id
}

/// 池子目录：整份列表一次刷新，共享同一个 TTL。
pub struct PoolDirectory {
    source: Arc<dyn MarketDataSource>,
    cache: CollectionCache<Pubkey, PoolInfo>,
}

impl PoolDirectory {
    pub fn new(source: Arc<dyn MarketDataSource>, config: &CacheConfig) -> Self {
        Self {
            source,
            cache: CollectionCache::new("pools", config.pool_ttl(), pool_id),
        }
    }

    fn refresh(&self) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<PoolInfo>>> {
        let source = Arc::clone(&self.source);
        move || {
            Box::pin(async move {
                let pools = source.list_pools().await?;
                debug!(
                    target: "protocols::pools",
                    pools = pools.len(),
                    "池子列表已刷新"
                );
                Ok(pools)
            })
        }
    }

    pub async fn get_pool(&self, id: &Pubkey) -> Result<Arc<PoolInfo>> {
        self.cache
            .get(id, self.refresh())
            .await?
            .ok_or_else(|| Error::NotFound(format!("池子 {id}")))
    }

    pub async fn get_pools(&self, filter: &PoolFilter) -> Result<Vec<Arc<PoolInfo>>> {
        self.cache
            .get_all(|pool| filter.matches(pool), self.refresh())
            .await
    }

    pub async fn get_pools_by_tokens(
        &self,
        token_a: &Pubkey,
        token_b: &Pubkey,
    ) -> Result<Vec<Arc<PoolInfo>>> {
        let filter = PoolFilter {
            tokens: Some(vec![*token_a, *token_b]),
            ..PoolFilter::default()
        };
        self.get_pools(&filter).await
    }

    pub async fn get_pool_stats(&self, id: &Pubkey) -> Result<PoolStats> {
        Ok(self.get_pool(id).await?.stats)
    }

    /// 整份快照共享一个 TTL，因此指定 id 也会让整份列表在下次访问时重新拉取。
    pub fn invalidate(&self, id: Option<&Pubkey>) {
        debug!(
            target: "protocols::pools",
            pool = ?id,
            "池子缓存失效"
        );
        self.cache.invalidate();
    }
}
