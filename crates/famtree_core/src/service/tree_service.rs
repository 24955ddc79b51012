//! Family tree use-case service.
//!
//! # Responsibility
//! - Own one loaded tree and apply user mutations to it optimistically.
//! - Issue the matching durable writes after each local change.
//! - Coalesce position writes per member and reconcile reloads.
//!
//! # Invariants
//! - Local state is never rolled back on a failed write; the failure is
//!   logged and counted, and the next reload restores durable state.
//! - A reload keeps positions that still have a pending debounced write.
//! - Member names and avatar URLs are never logged.

use crate::codec::decode::{decode_rows, DecodeIssue};
use crate::codec::encode::encode_member;
use crate::graph::store::{FamilyGraph, Removal};
use crate::model::member::{MemberDraft, MemberId, MemberPatch, Position, UserId};
use crate::repo::member_repo::{MemberRepository, MemberUpdate};
use crate::repo::{RepoError, RepoResult};
use crate::sync::change_feed::Subscription;
use crate::sync::debounce::PositionDebouncer;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

const DEFAULT_POSITION_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Tunables for [`TreeService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeServiceConfig {
    /// Quiet window after the last position update before it is written.
    pub position_quiet_period: Duration,
}

impl Default for TreeServiceConfig {
    fn default() -> Self {
        Self {
            position_quiet_period: DEFAULT_POSITION_QUIET_PERIOD,
        }
    }
}

/// Errors from loading or reloading a tree.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for TreeServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Result of one reload reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReloadOutcome {
    /// Whether the in-memory graph differs from before the reload.
    pub changed: bool,
    pub member_count: usize,
    /// Positions kept from pending local writes instead of the stored value.
    pub kept_positions: usize,
    pub issues: Vec<DecodeIssue>,
}

/// Loaded tree plus the row store it persists to.
pub struct TreeService<R: MemberRepository> {
    repo: R,
    graph: FamilyGraph,
    debouncer: PositionDebouncer,
    issues: Vec<DecodeIssue>,
    failed_writes: usize,
}

impl<R: MemberRepository> TreeService<R> {
    /// Starts an empty tree for `owner_id` without reading the store.
    pub fn new(repo: R, owner_id: UserId, config: TreeServiceConfig) -> Self {
        Self {
            repo,
            graph: FamilyGraph::new(owner_id),
            debouncer: PositionDebouncer::new(config.position_quiet_period),
            issues: Vec::new(),
            failed_writes: 0,
        }
    }

    /// Loads every row of `owner_id` and decodes it into a graph.
    pub fn load(
        repo: R,
        owner_id: UserId,
        config: TreeServiceConfig,
    ) -> Result<Self, TreeServiceError> {
        let started_at = Instant::now();
        info!("event=tree_load module=service status=start owner_id={owner_id}");

        let mut service = Self::new(repo, owner_id, config);
        let rows = service.repo.select_by_owner(owner_id).map_err(|err| {
            error!(
                "event=tree_load module=service status=error owner_id={owner_id} error={err}"
            );
            err
        })?;
        let decoded = decode_rows(owner_id, &rows);
        log_decode_issues(&decoded.issues);
        service.graph = decoded.graph;
        service.issues = decoded.issues;

        info!(
            "event=tree_load module=service status=ok owner_id={owner_id} member_count={} issue_count={} duration_ms={}",
            service.graph.len(),
            service.issues.len(),
            started_at.elapsed().as_millis()
        );
        Ok(service)
    }

    pub fn graph(&self) -> &FamilyGraph {
        &self.graph
    }

    pub fn owner_id(&self) -> UserId {
        self.graph.owner_id()
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Issues found by the last load or reload.
    pub fn decode_issues(&self) -> &[DecodeIssue] {
        &self.issues
    }

    /// Number of durable writes that failed since the service was created.
    pub fn failed_writes(&self) -> usize {
        self.failed_writes
    }

    pub fn pending_positions(&self) -> usize {
        self.debouncer.pending_count()
    }

    /// Earliest instant at which [`Self::flush_due_positions`] has work.
    pub fn next_flush_due(&self) -> Option<Instant> {
        self.debouncer.next_due()
    }

    pub fn add_initial_couple(
        &mut self,
        root: MemberDraft,
        spouse: MemberDraft,
    ) -> (MemberId, MemberId) {
        let (root_id, spouse_id) = self.graph.add_initial_couple(root, spouse);
        self.persist_insert(root_id);
        self.persist_insert(spouse_id);
        (root_id, spouse_id)
    }

    pub fn add_parents(
        &mut self,
        child_id: MemberId,
        father: MemberDraft,
        mother: MemberDraft,
    ) -> Option<(MemberId, MemberId)> {
        let Some((father_id, mother_id)) = self.graph.add_parents(child_id, father, mother) else {
            log_skipped("add_parents", child_id);
            return None;
        };
        self.persist_insert(father_id);
        self.persist_insert(mother_id);
        Some((father_id, mother_id))
    }

    pub fn add_spouse(&mut self, member_id: MemberId, spouse: MemberDraft) -> Option<MemberId> {
        let Some(spouse_id) = self.graph.add_spouse(member_id, spouse) else {
            log_skipped("add_spouse", member_id);
            return None;
        };
        self.persist_insert(spouse_id);
        Some(spouse_id)
    }

    pub fn add_child(&mut self, parent_id: MemberId, child: MemberDraft) -> Option<MemberId> {
        let Some(child_id) = self.graph.add_child(parent_id, child) else {
            log_skipped("add_child", parent_id);
            return None;
        };
        self.persist_insert(child_id);
        Some(child_id)
    }

    pub fn update_member(&mut self, id: MemberId, patch: &MemberPatch) -> bool {
        if patch.is_empty() {
            return self.graph.contains(id);
        }
        if !self.graph.update_member(id, patch) {
            log_skipped("update_member", id);
            return false;
        }
        let update = MemberUpdate {
            member_name: patch.name.clone(),
            avatar_url: patch.avatar_url.clone(),
            ..MemberUpdate::default()
        };
        let result = self.repo.update(id, &update);
        self.record_write("update", id, result);
        true
    }

    /// Removes one member, deletes its row and persists re-anchored relatives.
    pub fn remove_member(&mut self, id: MemberId) -> Option<Removal> {
        let Some(removal) = self.graph.remove_member(id) else {
            log_skipped("remove_member", id);
            return None;
        };
        self.debouncer.cancel(id);

        let result = self.repo.delete(id);
        self.record_write("delete", id, result);
        for (member_id, relation) in &removal.reanchored {
            let result = self
                .repo
                .update(*member_id, &MemberUpdate::relation(*relation));
            self.record_write("reanchor", *member_id, result);
        }
        Some(removal)
    }

    /// Moves a member now and schedules its durable write.
    pub fn update_position(&mut self, id: MemberId, position: Position) -> bool {
        self.update_position_at(id, position, Instant::now())
    }

    /// Same as [`Self::update_position`] with an explicit clock reading.
    ///
    /// Writes of other members whose quiet window has elapsed by `now` are
    /// flushed on the way.
    pub fn update_position_at(&mut self, id: MemberId, position: Position, now: Instant) -> bool {
        if !self.graph.update_position(id, position) {
            log_skipped("update_position", id);
            return false;
        }
        self.debouncer.schedule(id, position, now);
        self.flush_due_positions(now);
        true
    }

    /// Writes every position whose quiet window has elapsed. Returns the
    /// number of writes issued.
    pub fn flush_due_positions(&mut self, now: Instant) -> usize {
        let due = self.debouncer.take_due(now);
        self.write_positions(due)
    }

    /// Writes every pending position immediately.
    pub fn flush_all_positions(&mut self) -> usize {
        let pending = self.debouncer.drain_all();
        self.write_positions(pending)
    }

    /// Re-reads the owner's rows and reconciles them with local state.
    pub fn reload(&mut self) -> Result<ReloadOutcome, TreeServiceError> {
        let started_at = Instant::now();
        let owner_id = self.owner_id();
        let rows = self.repo.select_by_owner(owner_id).map_err(|err| {
            error!(
                "event=tree_reload module=service status=error owner_id={owner_id} error={err}"
            );
            err
        })?;
        let decoded = decode_rows(owner_id, &rows);
        log_decode_issues(&decoded.issues);

        let mut graph = decoded.graph;
        let mut kept_positions = 0;
        let pending: Vec<MemberId> = self
            .graph
            .members()
            .map(|member| member.id)
            .filter(|id| self.debouncer.is_pending(*id))
            .collect();
        for id in pending {
            if let Some(position) = self.debouncer.pending_position(id) {
                if graph.update_position(id, position) {
                    kept_positions += 1;
                }
            }
        }

        let changed = graph != self.graph;
        if changed {
            self.graph = graph;
        }
        self.issues = decoded.issues;

        info!(
            "event=tree_reload module=service status=ok owner_id={owner_id} changed={changed} member_count={} kept_positions={kept_positions} issue_count={} duration_ms={}",
            self.graph.len(),
            self.issues.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ReloadOutcome {
            changed,
            member_count: self.graph.len(),
            kept_positions,
            issues: self.issues.clone(),
        })
    }

    /// Reloads once if the subscription received any change since last call.
    pub fn sync_changes(
        &mut self,
        subscription: &Subscription,
    ) -> Result<Option<ReloadOutcome>, TreeServiceError> {
        let events = subscription.drain();
        if events.is_empty() {
            return Ok(None);
        }
        self.reload().map(Some)
    }

    fn write_positions(&mut self, writes: Vec<(MemberId, Position)>) -> usize {
        let count = writes.len();
        for (id, position) in writes {
            let result = self.repo.update_position(id, position);
            self.record_write("position", id, result);
        }
        if count > 0 {
            info!(
                "event=position_flush module=service status=ok count={count} pending={}",
                self.debouncer.pending_count()
            );
        }
        count
    }

    fn persist_insert(&mut self, id: MemberId) {
        let Some(member) = self.graph.get(id) else {
            return;
        };
        let result = self.repo.insert(&encode_member(member));
        self.record_write("insert", id, result);
    }

    fn record_write(&mut self, op: &str, id: MemberId, result: RepoResult<()>) {
        match result {
            Ok(()) => info!(
                "event=member_write module=service status=ok op={op} member_id={id}"
            ),
            Err(err) => {
                self.failed_writes += 1;
                error!(
                    "event=member_write module=service status=error op={op} member_id={id} error={err}"
                );
            }
        }
    }
}

fn log_skipped(op: &str, id: MemberId) {
    warn!("event=tree_mutation module=service status=skipped op={op} member_id={id}");
}

fn log_decode_issues(issues: &[DecodeIssue]) {
    for issue in issues {
        warn!("event=decode_issue module=codec status=error issue={issue}");
    }
}
