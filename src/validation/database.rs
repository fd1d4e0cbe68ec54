use crate::models::Restaurant;
use crate::utils::VerifyError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Read-only restaurant lookups needed while scoring a receipt.
#[async_trait]
pub trait RestaurantStore: Send + Sync {
    /// Best-effort lookup by tax number; the first match wins.
    async fn find_by_oib(&self, oib: &str) -> Result<Option<Restaurant>, VerifyError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Restaurant>, VerifyError>;
}

/// Restaurant table held in memory, loaded from JSON or built in code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRestaurantStore {
    restaurants: Vec<Restaurant>,
}

impl InMemoryRestaurantStore {
    pub fn new(restaurants: Vec<Restaurant>) -> Self {
        InMemoryRestaurantStore { restaurants }
    }

    /// Load a JSON array of restaurants.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, VerifyError> {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            VerifyError::DatabaseError(format!(
                "Failed to read restaurants from {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let restaurants: Vec<Restaurant> = serde_json::from_str(&raw)?;
        Ok(Self::new(restaurants))
    }

    pub fn len(&self) -> usize {
        self.restaurants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.restaurants.is_empty()
    }
}

#[async_trait]
impl RestaurantStore for InMemoryRestaurantStore {
    async fn find_by_oib(&self, oib: &str) -> Result<Option<Restaurant>, VerifyError> {
        Ok(self
            .restaurants
            .iter()
            .find(|r| r.oib.as_deref() == Some(oib))
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Restaurant>, VerifyError> {
        Ok(self.restaurants.iter().find(|r| r.id == id).cloned())
    }
}

/// Memoizes lookups for the lifetime of a single verification.
///
/// Errors are not cached, so a transient failure is retried by the next caller.
pub struct CachedRestaurantStore<'a, S: RestaurantStore + ?Sized> {
    inner: &'a S,
    by_id: Mutex<HashMap<String, Option<Restaurant>>>,
    by_oib: Mutex<HashMap<String, Option<Restaurant>>>,
}

impl<'a, S: RestaurantStore + ?Sized> CachedRestaurantStore<'a, S> {
    pub fn new(inner: &'a S) -> Self {
        CachedRestaurantStore {
            inner,
            by_id: Mutex::new(HashMap::new()),
            by_oib: Mutex::new(HashMap::new()),
        }
    }

    fn cached(
        cache: &Mutex<HashMap<String, Option<Restaurant>>>,
        key: &str,
    ) -> Option<Option<Restaurant>> {
        let guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.get(key).cloned()
    }

    fn remember(
        cache: &Mutex<HashMap<String, Option<Restaurant>>>,
        key: &str,
        value: &Option<Restaurant>,
    ) {
        let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), value.clone());
    }
}

#[async_trait]
impl<'a, S: RestaurantStore + ?Sized> RestaurantStore for CachedRestaurantStore<'a, S> {
    async fn find_by_oib(&self, oib: &str) -> Result<Option<Restaurant>, VerifyError> {
        if let Some(hit) = Self::cached(&self.by_oib, oib) {
            return Ok(hit);
        }
        let found = self.inner.find_by_oib(oib).await?;
        Self::remember(&self.by_oib, oib, &found);
        if let Some(restaurant) = &found {
            Self::remember(&self.by_id, &restaurant.id, &found);
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Restaurant>, VerifyError> {
        if let Some(hit) = Self::cached(&self.by_id, id) {
            return Ok(hit);
        }
        let found = self.inner.find_by_id(id).await?;
        Self::remember(&self.by_id, id, &found);
        Ok(found)
    }
}
