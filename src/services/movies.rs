//! In-memory movie catalog.
//!
//! Lookups go through the cache; writes invalidate it and are announced on
//! the push channel as `movies:created` / `movies:deleted`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::cache::CacheClient;
use crate::channel::Broadcaster;

pub const EVENT_CREATED: &str = "movies:created";
pub const EVENT_DELETED: &str = "movies:deleted";

const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Action,
    Comedy,
    Drama,
    Horror,
    Scifi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<Genre>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Fields a client supplies when adding a movie.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMovie {
    pub title: String,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub genre: Option<Genre>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum MovieError {
    #[error("movie '{title}' already exists")]
    Duplicate { title: String },
    #[error("cached movie record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Optional filters for listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovieQuery {
    pub genre: Option<Genre>,
    pub limit: Option<usize>,
}

/// Case-insensitive title plus year; unique across the catalog.
type TitleKey = (String, Option<i64>);

#[derive(Debug)]
pub struct MovieService {
    catalog: DashMap<String, Movie>,
    /// Claimed title/year pairs, mapped to the owning movie id.
    titles: DashMap<TitleKey, String>,
    cache: CacheClient,
    broadcaster: Broadcaster,
}

impl MovieService {
    pub fn new(cache: CacheClient, broadcaster: Broadcaster) -> Self {
        Self {
            catalog: DashMap::new(),
            titles: DashMap::new(),
            cache,
            broadcaster,
        }
    }

    /// Movies sorted by title, then year.
    pub fn list(&self, query: MovieQuery) -> Vec<Movie> {
        let mut movies: Vec<Movie> = self
            .catalog
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|movie| query.genre.is_none() || movie.genre == query.genre)
            .collect();
        movies.sort_by(|a, b| a.title.cmp(&b.title).then(a.year.cmp(&b.year)));
        if let Some(limit) = query.limit {
            movies.truncate(limit);
        }
        movies
    }

    pub async fn get(&self, id: &str) -> Result<Option<Movie>, MovieError> {
        let key = cache_key(id);
        if let Some(cached) = self.cache.get(&key).await {
            tracing::trace!(movie_id = %id, "Movie served from cache");
            return Ok(Some(serde_json::from_value(cached)?));
        }

        let Some(movie) = self.catalog.get(id).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        self.cache
            .set(key, serde_json::to_value(&movie)?, Some(CACHE_TTL))
            .await;
        Ok(Some(movie))
    }

    /// Add a movie; a title/year pair may only exist once.
    pub async fn create(&self, new: NewMovie) -> Result<Movie, MovieError> {
        let id = Uuid::new_v4().simple().to_string();
        // the entry claim is the uniqueness check
        match self.titles.entry(title_key(&new.title, new.year)) {
            Entry::Occupied(_) => return Err(MovieError::Duplicate { title: new.title }),
            Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        let movie = Movie {
            id,
            title: new.title,
            year: new.year,
            genre: new.genre,
            rating: new.rating,
            created_at: Utc::now(),
        };
        self.catalog.insert(movie.id.clone(), movie.clone());

        tracing::info!(movie_id = %movie.id, title = %movie.title, "Movie created");
        self.broadcaster
            .publish(EVENT_CREATED, vec![serde_json::to_value(&movie)?]);
        Ok(movie)
    }

    /// Remove a movie; returns false if it did not exist.
    pub async fn delete(&self, id: &str) -> bool {
        let removed = match self.catalog.remove(id) {
            Some((_, movie)) => {
                self.titles
                    .remove_if(&title_key(&movie.title, movie.year), |_, owner| owner == id);
                true
            }
            None => false,
        };
        self.cache.delete(&cache_key(id)).await;
        if removed {
            tracing::info!(movie_id = %id, "Movie deleted");
            self.broadcaster.publish(EVENT_DELETED, vec![json!(id)]);
        }
        removed
    }

    pub fn count(&self) -> usize {
        self.catalog.len()
    }
}

fn cache_key(id: &str) -> String {
    format!("movie:{id}")
}

fn title_key(title: &str, year: Option<i64>) -> TitleKey {
    (title.to_ascii_lowercase(), year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelEvent, ConnectionRegistry};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn service() -> (MovieService, mpsc::UnboundedReceiver<String>, CacheClient) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (sink, rx) = mpsc::unbounded_channel();
        registry.apply(ChannelEvent::Opened { id: "watcher".into(), sink });
        let cache = CacheClient::in_memory();
        let service = MovieService::new(cache.clone(), Broadcaster::new(registry));
        (service, rx, cache)
    }

    fn new_movie(title: &str, year: i64, genre: Genre) -> NewMovie {
        NewMovie {
            title: title.into(),
            year: Some(year),
            genre: Some(genre),
            rating: None,
        }
    }

    #[tokio::test]
    async fn create_announces_and_rejects_duplicates() {
        let (service, mut rx, _) = service();
        let movie = service.create(new_movie("Heat", 1995, Genre::Action)).await.unwrap();

        let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["event"], EVENT_CREATED);
        assert_eq!(frame["args"][0]["id"], movie.id.as_str());

        let err = service
            .create(new_movie("heat", 1995, Genre::Drama))
            .await
            .unwrap_err();
        assert!(matches!(err, MovieError::Duplicate { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(service.count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicates_admit_one() {
        let (service, _rx, _) = service();
        let service = Arc::new(service);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                let title = if i % 2 == 0 { "Heat" } else { "HEAT" };
                tokio::spawn(async move { service.create(new_movie(title, 1995, Genre::Action)).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(service.count(), 1);
    }

    #[tokio::test]
    async fn deleted_title_can_be_reused() {
        let (service, _rx, _) = service();
        let first = service.create(new_movie("Heat", 1995, Genre::Action)).await.unwrap();
        assert!(service.delete(&first.id).await);

        let second = service.create(new_movie("Heat", 1995, Genre::Action)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(service.create(new_movie("Heat", 1986, Genre::Drama)).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_and_limits() {
        let (service, _rx, _) = service();
        service.create(new_movie("Alien", 1979, Genre::Scifi)).await.unwrap();
        service.create(new_movie("Heat", 1995, Genre::Action)).await.unwrap();
        service.create(new_movie("Arrival", 2016, Genre::Scifi)).await.unwrap();

        let scifi = service.list(MovieQuery {
            genre: Some(Genre::Scifi),
            limit: None,
        });
        let titles: Vec<_> = scifi.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, ["Alien", "Arrival"]);

        let first = service.list(MovieQuery {
            genre: None,
            limit: Some(1),
        });
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "Alien");
    }

    #[tokio::test]
    async fn get_populates_cache_and_delete_invalidates() {
        let (service, mut rx, cache) = service();
        let movie = service.create(new_movie("Heat", 1995, Genre::Action)).await.unwrap();
        let _ = rx.try_recv();

        assert_eq!(service.get(&movie.id).await.unwrap(), Some(movie.clone()));
        assert!(cache.get(&cache_key(&movie.id)).await.is_some());

        assert!(service.delete(&movie.id).await);
        assert!(cache.get(&cache_key(&movie.id)).await.is_none());
        assert_eq!(service.get(&movie.id).await.unwrap(), None);

        let frame: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame, json!({"event": EVENT_DELETED, "args": [movie.id]}));

        assert!(!service.delete(&movie.id).await);
        assert!(rx.try_recv().is_err());
    }
}
