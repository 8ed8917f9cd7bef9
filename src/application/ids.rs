//! Episode identifier allocation.
//!
//! Ids come from the store's monotonically increasing sequence. The allocator reserves them
//! in blocks and hands them out locally; ids left in the block when the process exits are
//! simply never used.

use std::{collections::VecDeque, sync::Arc, sync::Mutex};

use tracing::debug;

use crate::application::repos::{EpisodesRepo, RepoError};
use crate::cache::lock::mutex_lock;

pub const DEFAULT_BLOCK_SIZE: u32 = 100;

const SOURCE: &str = "application::ids";

pub struct EpisodeIdAllocator {
    episodes: Arc<dyn EpisodesRepo>,
    block_size: u32,
    reserved: Mutex<VecDeque<i64>>,
}

impl EpisodeIdAllocator {
    pub fn new(episodes: Arc<dyn EpisodesRepo>, block_size: u32) -> Self {
        Self {
            episodes,
            block_size: block_size.max(1),
            reserved: Mutex::new(VecDeque::new()),
        }
    }

    /// Hand out the next unused id, reserving a fresh block from the store when the local
    /// block is exhausted.
    pub async fn next_id(&self) -> Result<i64, RepoError> {
        if let Some(id) = self.take_reserved() {
            return Ok(id);
        }

        let mut block = self
            .episodes
            .reserve_episode_ids(self.block_size)
            .await?
            .into_iter();
        let id = block.next().ok_or_else(|| {
            RepoError::from_persistence("episode id sequence returned an empty block")
        })?;
        debug!(
            target = SOURCE,
            first = id,
            size = self.block_size,
            "reserved episode id block"
        );

        // Concurrent refills each keep their own first id; the remainders all stay usable.
        mutex_lock(&self.reserved, SOURCE, "refill").extend(block);
        Ok(id)
    }

    fn take_reserved(&self) -> Option<i64> {
        mutex_lock(&self.reserved, SOURCE, "take").pop_front()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::application::repos::CreateEpisodeParams;
    use crate::domain::entities::EpisodeRecord;

    #[derive(Default)]
    struct SequenceRepo {
        next: AtomicI64,
        reservations: AtomicUsize,
        empty: bool,
    }

    #[async_trait]
    impl EpisodesRepo for SequenceRepo {
        async fn list_episodes(&self) -> Result<Vec<EpisodeRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn insert_episode(
            &self,
            _params: CreateEpisodeParams,
        ) -> Result<EpisodeRecord, RepoError> {
            unreachable!("not used in these tests")
        }

        async fn reserve_episode_ids(&self, count: u32) -> Result<Vec<i64>, RepoError> {
            self.reservations.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(Vec::new());
            }
            let start = self.next.fetch_add(i64::from(count), Ordering::SeqCst) + 1;
            Ok((start..start + i64::from(count)).collect())
        }
    }

    #[tokio::test]
    async fn hands_out_block_before_reserving_again() {
        let repo = Arc::new(SequenceRepo::default());
        let allocator = EpisodeIdAllocator::new(repo.clone(), 3);

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(allocator.next_id().await.expect("id"));
        }

        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(repo.reservations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn separate_allocators_never_share_ids() {
        let repo = Arc::new(SequenceRepo::default());
        let first = EpisodeIdAllocator::new(repo.clone(), 10);
        let second = EpisodeIdAllocator::new(repo, 10);

        let a = first.next_id().await.expect("id");
        let b = second.next_id().await.expect("id");
        let c = first.next_id().await.expect("id");

        assert_eq!((a, b, c), (1, 11, 2));
    }

    #[tokio::test]
    async fn empty_reservation_is_an_error() {
        let repo = Arc::new(SequenceRepo {
            empty: true,
            ..Default::default()
        });
        let allocator = EpisodeIdAllocator::new(repo, 5);

        assert!(matches!(
            allocator.next_id().await,
            Err(RepoError::Persistence(_))
        ));
    }
}
