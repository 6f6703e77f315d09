//! Grammar pool
//!
//! A [`GrammarPool`] caches compiled grammars so that documents using the
//! same DTD root or schema target namespace do not recompile them. It is
//! the one object shared between concurrent validation sessions: the
//! key-to-grammar map sits behind a lock, while the grammars themselves are
//! immutable and handed out as `Arc<Grammar>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::validators::{Grammar, GrammarDescription, GrammarKind};

/// Partition key of a description: kind plus root name or target namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    kind: GrammarKind,
    key: Option<String>,
}

impl PoolKey {
    fn of(description: &GrammarDescription) -> Self {
        Self {
            kind: description.kind(),
            key: description.key().map(String::from),
        }
    }
}

/// Thread-safe cache of compiled grammars
#[derive(Debug, Default)]
pub struct GrammarPool {
    grammars: RwLock<HashMap<PoolKey, Arc<Grammar>>>,
    locked: AtomicBool,
}

impl GrammarPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<PoolKey, Arc<Grammar>>>> {
        self.grammars
            .read()
            .map_err(|_| Error::Internal("grammar pool lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<PoolKey, Arc<Grammar>>>> {
        self.grammars
            .write()
            .map_err(|_| Error::Internal("grammar pool lock poisoned".to_string()))
    }

    /// Store a grammar, replacing any grammar with the same key.
    ///
    /// Ignored while the pool is locked.
    pub fn put_grammar(&self, grammar: Arc<Grammar>) -> Result<()> {
        if self.is_locked() {
            tracing::debug!(grammar = %grammar.description(), "pool locked, put ignored");
            return Ok(());
        }
        let key = PoolKey::of(grammar.description());
        tracing::debug!(grammar = %grammar.description(), "put grammar");
        self.write()?.insert(key, grammar);
        Ok(())
    }

    /// Look up the grammar for a description
    pub fn get_grammar(&self, description: &GrammarDescription) -> Result<Option<Arc<Grammar>>> {
        let grammars = self.read()?;
        let found = grammars
            .get(&PoolKey::of(description))
            .filter(|grammar| grammar.description() == description)
            .cloned();
        tracing::debug!(grammar = %description, hit = found.is_some(), "get grammar");
        Ok(found)
    }

    /// Remove and return the grammar for a description
    pub fn remove_grammar(&self, description: &GrammarDescription) -> Result<Option<Arc<Grammar>>> {
        let mut grammars = self.write()?;
        let key = PoolKey::of(description);
        let matches = grammars
            .get(&key)
            .map_or(false, |grammar| grammar.description() == description);
        let removed = if matches { grammars.remove(&key) } else { None };
        tracing::debug!(grammar = %description, removed = removed.is_some(), "remove grammar");
        Ok(removed)
    }

    /// Check if a grammar is cached for a description
    pub fn contains_grammar(&self, description: &GrammarDescription) -> Result<bool> {
        Ok(self
            .read()?
            .get(&PoolKey::of(description))
            .map_or(false, |grammar| grammar.description() == description))
    }

    /// All cached grammars of one kind
    pub fn retrieve_initial_grammar_set(&self, kind: GrammarKind) -> Result<Vec<Arc<Grammar>>> {
        Ok(self
            .read()?
            .iter()
            .filter(|(key, _)| key.kind == kind)
            .map(|(_, grammar)| Arc::clone(grammar))
            .collect())
    }

    /// Cache grammars of one kind; a grammar already cached for a key wins.
    ///
    /// Grammars of another kind are skipped. Ignored while the pool is locked.
    pub fn cache_grammars(&self, kind: GrammarKind, grammars: &[Arc<Grammar>]) -> Result<()> {
        if self.is_locked() {
            tracing::debug!(%kind, "pool locked, cache ignored");
            return Ok(());
        }
        let mut cached = self.write()?;
        for grammar in grammars.iter().filter(|g| g.kind() == kind) {
            cached
                .entry(PoolKey::of(grammar.description()))
                .or_insert_with(|| Arc::clone(grammar));
        }
        tracing::debug!(%kind, count = grammars.len(), "cache grammars");
        Ok(())
    }

    /// Return the cached grammar for a description, compiling and caching it
    /// when absent.
    ///
    /// `compile` runs without holding the pool lock; when two callers race,
    /// the first grammar cached wins and both get it back.
    pub fn get_or_compile<F>(&self, description: &GrammarDescription, compile: F) -> Result<Arc<Grammar>>
    where
        F: FnOnce() -> Result<Grammar>,
    {
        if let Some(grammar) = self.get_grammar(description)? {
            return Ok(grammar);
        }
        let compiled = Arc::new(compile()?);
        if compiled.description() != description {
            return Err(Error::Internal(format!(
                "compiled grammar {} does not match requested {}",
                compiled.description(),
                description
            )));
        }
        if self.is_locked() {
            return Ok(compiled);
        }
        let mut grammars = self.write()?;
        let grammar = grammars
            .entry(PoolKey::of(description))
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(grammar))
    }

    /// Number of cached grammars
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Remove all grammars
    pub fn clear(&self) -> Result<()> {
        self.write()?.clear();
        tracing::debug!("grammar pool cleared");
        Ok(())
    }

    /// Make the pool read-only
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Make the pool writable again
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Check if the pool is read-only
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::validators::GrammarBuilder;

    fn schema(ns: Option<&str>) -> Arc<Grammar> {
        Arc::new(GrammarBuilder::schema(ns).compile(&Limits::default()).unwrap())
    }

    fn dtd(root: &str) -> Arc<Grammar> {
        Arc::new(GrammarBuilder::dtd(root).compile(&Limits::default()).unwrap())
    }

    #[test]
    fn test_put_get() {
        let pool = GrammarPool::new();
        let grammar = schema(Some("urn:a"));
        pool.put_grammar(Arc::clone(&grammar)).unwrap();
        pool.put_grammar(schema(Some("urn:b"))).unwrap();
        pool.put_grammar(dtd("urn:a")).unwrap();

        let found = pool.get_grammar(grammar.description()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &grammar));
        assert_eq!(pool.len().unwrap(), 3);
        assert!(pool
            .get_grammar(&GrammarDescription::schema(Some("urn:c")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_no_namespace_slot() {
        let pool = GrammarPool::new();
        let first = schema(None);
        let second = schema(None);
        pool.put_grammar(first).unwrap();
        pool.put_grammar(Arc::clone(&second)).unwrap();

        assert_eq!(pool.len().unwrap(), 1);
        let found = pool.get_grammar(&GrammarDescription::schema(None)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &second));
        assert!(!pool.contains_grammar(&GrammarDescription::schema(Some(""))).unwrap());
    }

    #[test]
    fn test_remove_and_kinds() {
        let pool = GrammarPool::new();
        pool.put_grammar(schema(Some("urn:a"))).unwrap();
        pool.put_grammar(dtd("root")).unwrap();

        assert_eq!(pool.retrieve_initial_grammar_set(GrammarKind::Dtd).unwrap().len(), 1);
        assert_eq!(pool.retrieve_initial_grammar_set(GrammarKind::Schema).unwrap().len(), 1);

        let removed = pool.remove_grammar(&GrammarDescription::dtd("root")).unwrap();
        assert!(removed.is_some());
        assert!(!pool.contains_grammar(&GrammarDescription::dtd("root")).unwrap());
        assert!(pool.remove_grammar(&GrammarDescription::dtd("root")).unwrap().is_none());
    }

    #[test]
    fn test_cache_first_wins() {
        let pool = GrammarPool::new();
        let first = schema(Some("urn:a"));
        pool.cache_grammars(GrammarKind::Schema, &[Arc::clone(&first), dtd("x")])
            .unwrap();
        pool.cache_grammars(GrammarKind::Schema, &[schema(Some("urn:a"))])
            .unwrap();

        assert_eq!(pool.len().unwrap(), 1);
        let found = pool.get_grammar(first.description()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_locked_pool() {
        let pool = GrammarPool::new();
        pool.lock();
        assert!(pool.is_locked());
        pool.put_grammar(schema(Some("urn:a"))).unwrap();
        pool.cache_grammars(GrammarKind::Schema, &[schema(Some("urn:b"))])
            .unwrap();
        assert!(pool.is_empty().unwrap());

        pool.unlock();
        pool.put_grammar(schema(Some("urn:a"))).unwrap();
        assert_eq!(pool.len().unwrap(), 1);
        pool.clear().unwrap();
        assert!(pool.is_empty().unwrap());
    }

    #[test]
    fn test_get_or_compile() {
        let pool = GrammarPool::new();
        let description = GrammarDescription::schema(Some("urn:a"));
        let mut compiled = 0;
        for _ in 0..3 {
            pool.get_or_compile(&description, || {
                compiled += 1;
                GrammarBuilder::schema(Some("urn:a")).compile(&Limits::default())
            })
            .unwrap();
        }
        assert_eq!(compiled, 1);

        let wrong = pool.get_or_compile(&GrammarDescription::dtd("r"), || {
            GrammarBuilder::dtd("other").compile(&Limits::default())
        });
        assert!(matches!(wrong, Err(Error::Internal(_))));
    }
}
