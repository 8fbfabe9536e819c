//! 带 TTL 的新鲜度缓存。
//!
//! - 过期值绝不返回：刷新失败时报错而不是回退到旧值（fail-closed）。
//! - 同一作用域同时只有一个刷新在途，并发读者共享同一个 future（single-flight）。
//! - 刷新失败不会延长旧值的 TTL。
//! - `invalidate` 之后的读取必定发起新刷新；失效前已在途的刷新仍把结果交给它的等待者，但不再写回缓存。

mod collection;

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::error::Result;
use crate::monitoring::events;

pub use collection::{CollectionCache, Snapshot};

type Flight<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

/// 在途刷新。`live` 被 `invalidate` 置为 false 后，结果不再写回 `entries`。
struct InFlight<V> {
    future: Flight<V>,
    live: Arc<AtomicBool>,
}

impl<V> Clone for InFlight<V> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            live: Arc::clone(&self.live),
        }
    }
}

#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub fetched_at: Instant,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            fetched_at: self.fetched_at,
        }
    }
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= ttl
    }
}

/// 不触发刷新的只读视图，`stale` 标记是否已超过 TTL。
#[derive(Debug, Clone)]
pub struct Peek<V> {
    pub value: Arc<V>,
    pub fetched_at: Instant,
    pub stale: bool,
}

/// 按 key 刷新的缓存，每个 key 独立 single-flight。
pub struct FreshnessCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    name: &'static str,
    ttl: Duration,
    entries: Arc<DashMap<K, CacheEntry<V>>>,
    flights: DashMap<K, InFlight<V>>,
}

impl<K, V> FreshnessCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Arc::new(DashMap::new()),
            flights: DashMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 只返回未过期的值。
    pub fn get_fresh(&self, key: &K) -> Option<Arc<V>> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(self.ttl, now))
            .map(|entry| Arc::clone(&entry.value))
    }

    pub fn peek(&self, key: &K) -> Option<Peek<V>> {
        let now = Instant::now();
        self.entries.get(key).map(|entry| Peek {
            value: Arc::clone(&entry.value),
            fetched_at: entry.fetched_at,
            stale: !entry.is_fresh(self.ttl, now),
        })
    }

    /// 命中新鲜值直接返回；否则加入（或发起）该 key 的唯一刷新。
    pub async fn get_with<F, Fut>(&self, key: &K, fetch: F) -> Result<Arc<V>>
    where
        F: FnOnce(K) -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(hit) = self.get_fresh(key) {
            events::cache_lookup(self.name, true);
            return Ok(hit);
        }
        events::cache_lookup(self.name, false);

        let flight = match self.flights.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().future.clone(),
            Entry::Vacant(slot) => {
                // 上一个刷新可能刚刚完成并移除了 flight。
                if let Some(hit) = self.get_fresh(key) {
                    return Ok(hit);
                }
                let live = Arc::new(AtomicBool::new(true));
                let flight =
                    self.start_flight(key.clone(), fetch(key.clone()), Arc::clone(&live));
                slot.insert(InFlight {
                    future: flight.clone(),
                    live,
                });
                flight
            }
        };

        let result = flight.clone().await;
        self.flights
            .remove_if(key, |_, current| current.future.ptr_eq(&flight));
        result
    }

    fn start_flight<Fut>(&self, key: K, fetch: Fut, live: Arc<AtomicBool>) -> Flight<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let entries = Arc::clone(&self.entries);
        let name = self.name;
        async move {
            let started = Instant::now();
            match fetch.await {
                Ok(value) => {
                    let value = Arc::new(value);
                    {
                        // 持有分片锁再检查 live，invalidate 的 remove/clear 只能排在写入之后。
                        let slot = entries.entry(key);
                        if live.load(Ordering::SeqCst) {
                            slot.insert(CacheEntry {
                                value: Arc::clone(&value),
                                fetched_at: Instant::now(),
                            });
                        }
                    }
                    events::cache_refresh(name, None, started.elapsed());
                    Ok(value)
                }
                Err(err) => {
                    events::cache_refresh(name, Some(&err), started.elapsed());
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// 直接写入一份刚获取的数据。
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        self.entries.insert(
            key,
            CacheEntry {
                value: Arc::clone(&value),
                fetched_at: Instant::now(),
            },
        );
        value
    }

    /// 指定 key 时只失效该条目，否则清空整个缓存。在途刷新一并作废。
    pub fn invalidate(&self, key: Option<&K>) {
        match key {
            Some(key) => {
                if let Some((_, flight)) = self.flights.remove(key) {
                    flight.live.store(false, Ordering::SeqCst);
                }
                self.entries.remove(key);
            }
            None => {
                self.flights.retain(|_, flight| {
                    flight.live.store(false, Ordering::SeqCst);
                    false
                });
                self.entries.clear();
            }
        }
    }
}
