//! In-process change notification for member rows.
//!
//! # Responsibility
//! - Fan out row change events to subscribers filtered by tree owner.
//! - Wrap any member row store so successful writes publish events.
//!
//! # Invariants
//! - Events are published only after the underlying write succeeded.
//! - A successful write is reported as successful even when the follow-up
//!   read for its event fails; the event is dropped and logged.
//! - A subscriber sees every event for its owner, including its own writes.
//! - Dropped subscriptions are pruned on the next publish.

use crate::model::member::{MemberId, Position, UserId};
use crate::repo::member_repo::{MemberRepository, MemberRow, MemberUpdate};
use crate::repo::RepoResult;
use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub owner_id: UserId,
    pub member_id: MemberId,
    pub kind: ChangeKind,
}

type Subscribers = Vec<(UserId, Sender<ChangeEvent>)>;

/// Shared publish/subscribe channel. Clones publish to the same subscribers.
#[derive(Debug, Clone, Default)]
pub struct ChangeFeed {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to changes of rows owned by `owner_id`.
    pub fn subscribe(&self, owner_id: UserId) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.lock().push((owner_id, sender));
        Subscription { owner_id, receiver }
    }

    pub fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self.lock();
        subscribers.retain(|(owner_id, sender)| {
            if *owner_id != event.owner_id {
                return true;
            }
            sender.send(event).is_ok()
        });
        debug!(
            "event=change_publish module=sync status=ok kind={} member_id={} subscribers={}",
            event.kind.as_str(),
            event.member_id,
            subscribers.len()
        );
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Subscribers> {
        // A panicking subscriber cannot leave the list half-written.
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Receiving end of one owner's change stream.
#[derive(Debug)]
pub struct Subscription {
    owner_id: UserId,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns every event received since the last drain, without blocking.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Member row store that publishes a [`ChangeEvent`] after each write.
pub struct NotifyingMemberRepository<R> {
    inner: R,
    feed: ChangeFeed,
}

impl<R: MemberRepository> NotifyingMemberRepository<R> {
    pub fn new(inner: R, feed: ChangeFeed) -> Self {
        Self { inner, feed }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn publish_for(&self, id: MemberId, kind: ChangeKind) {
        match self.inner.get_member(id) {
            Ok(Some(row)) => self.feed.publish(ChangeEvent {
                owner_id: row.owner_id,
                member_id: id,
                kind,
            }),
            Ok(None) => {}
            Err(err) => warn!(
                "event=change_publish module=sync status=error kind={} member_id={id} error={err}",
                kind.as_str()
            ),
        }
    }
}

impl<R: MemberRepository> MemberRepository for NotifyingMemberRepository<R> {
    fn select_by_owner(&self, owner_id: UserId) -> RepoResult<Vec<MemberRow>> {
        self.inner.select_by_owner(owner_id)
    }

    fn get_member(&self, id: MemberId) -> RepoResult<Option<MemberRow>> {
        self.inner.get_member(id)
    }

    fn insert(&self, row: &MemberRow) -> RepoResult<()> {
        self.inner.insert(row)?;
        self.feed.publish(ChangeEvent {
            owner_id: row.owner_id,
            member_id: row.id,
            kind: ChangeKind::Insert,
        });
        Ok(())
    }

    fn update(&self, id: MemberId, update: &MemberUpdate) -> RepoResult<()> {
        self.inner.update(id, update)?;
        self.publish_for(id, ChangeKind::Update);
        Ok(())
    }

    fn update_position(&self, id: MemberId, position: Position) -> RepoResult<()> {
        self.inner.update_position(id, position)?;
        self.publish_for(id, ChangeKind::Update);
        Ok(())
    }

    fn delete(&self, id: MemberId) -> RepoResult<()> {
        let owner_id = self.inner.get_member(id)?.map(|row| row.owner_id);
        self.inner.delete(id)?;
        if let Some(owner_id) = owner_id {
            self.feed.publish(ChangeEvent {
                owner_id,
                member_id: id,
                kind: ChangeKind::Delete,
            });
        }
        Ok(())
    }
}
