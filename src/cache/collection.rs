use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::error::Result;

use super::FreshnessCache;

/// 一次整体刷新得到的快照，保留上游返回的顺序。
#[derive(Debug)]
pub struct Snapshot<K, V> {
    order: Vec<K>,
    items: HashMap<K, Arc<V>>,
}

impl<K, V> Snapshot<K, V>
where
    K: Eq + Hash + Clone,
{
    /// 重复 key 以最后一次出现的值为准，位置沿用第一次出现的位置。
    pub fn from_items(values: Vec<V>, key_of: fn(&V) -> K) -> Self {
        let mut order = Vec::with_capacity(values.len());
        let mut items = HashMap::with_capacity(values.len());
        for value in values {
            let key = key_of(&value);
            if items.insert(key.clone(), Arc::new(value)).is_none() {
                order.push(key);
            }
        }
        Self { order, items }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.items.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<V>> + '_ {
        self.order.iter().filter_map(|key| self.items.get(key))
    }
}

/// 整体刷新模式：一次 `refresh()` 返回全部条目，整个集合共享一个 TTL 与一个在途刷新。
pub struct CollectionCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    inner: FreshnessCache<(), Snapshot<K, V>>,
    key_of: fn(&V) -> K,
}

impl<K, V> CollectionCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration, key_of: fn(&V) -> K) -> Self {
        Self {
            inner: FreshnessCache::new(name, ttl),
            key_of,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl()
    }

    pub async fn snapshot<F, Fut>(&self, refresh: F) -> Result<Arc<Snapshot<K, V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<V>>> + Send + 'static,
    {
        let key_of = self.key_of;
        self.inner
            .get_with(&(), move |_| {
                refresh().map(move |result| result.map(|values| Snapshot::from_items(values, key_of)))
            })
            .await
    }

    pub async fn get<F, Fut>(&self, key: &K, refresh: F) -> Result<Option<Arc<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<V>>> + Send + 'static,
    {
        Ok(self.snapshot(refresh).await?.get(key))
    }

    /// 过滤在新鲜度判断之后执行，不影响是否刷新。
    pub async fn get_all<F, Fut, P>(&self, filter: P, refresh: F) -> Result<Vec<Arc<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<V>>> + Send + 'static,
        P: Fn(&V) -> bool,
    {
        let snapshot = self.snapshot(refresh).await?;
        Ok(snapshot
            .iter()
            .filter(|value| filter(value))
            .cloned()
            .collect())
    }

    /// 整体模式下任何失效都会让整份快照在下次访问时重新拉取。
    pub fn invalidate(&self) {
        self.inner.invalidate(None);
    }

    pub fn is_fresh(&self) -> bool {
        self.inner.get_fresh(&()).is_some()
    }
}
