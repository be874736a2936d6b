//! Server-Sent Events feed of project changes and job progress
//!
//! Each client only receives events for projects it belongs to. Membership
//! answers are cached per connection and re-checked once they are older
//! than [`MEMBERSHIP_RECHECK`], so joining or leaving a project takes
//! effect without a reconnect. Streams end when the service shuts down.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use mrs_common::db::projects;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::convert::Infallible;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Age after which a cached membership answer is looked up again
pub const MEMBERSHIP_RECHECK: Duration = Duration::from_secs(60);

/// Per-connection cache of "is this user a member of project X"
pub struct MembershipCache {
    user_id: String,
    max_age: Duration,
    entries: HashMap<String, (bool, Instant)>,
}

impl MembershipCache {
    pub fn new(user_id: impl Into<String>, max_age: Duration) -> Self {
        Self {
            user_id: user_id.into(),
            max_age,
            entries: HashMap::new(),
        }
    }

    /// Seed with the projects known on connect
    pub fn with_members(mut self, project_ids: impl IntoIterator<Item = String>) -> Self {
        let now = Instant::now();
        for id in project_ids {
            self.entries.insert(id, (true, now));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether events for `project_id` may be delivered
    ///
    /// A failed lookup keeps the previous answer (or denies when there is
    /// none) and is retried on the next event.
    pub async fn permits(&mut self, db: &SqlitePool, project_id: &str) -> bool {
        let cached = self.entries.get(project_id).copied();
        if let Some((member, checked_at)) = cached {
            if checked_at.elapsed() < self.max_age {
                return member;
            }
        }

        match projects::get_membership(db, project_id, &self.user_id).await {
            Ok(membership) => {
                let member = membership.is_some();
                self.entries
                    .insert(project_id.to_string(), (member, Instant::now()));
                member
            }
            Err(e) => {
                warn!("SSE: Membership lookup failed: {}", e);
                cached.map(|(member, _)| member).unwrap_or(false)
            }
        }
    }
}

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let user_id = auth.user.id;
    let member_ids = projects::member_project_ids(&state.db, &user_id).await?;
    let mut memberships = MembershipCache::new(user_id.clone(), MEMBERSHIP_RECHECK).with_members(member_ids);

    info!(user_id = %user_id, projects = memberships.len(), "SSE client connected");
    let mut rx = state.event_bus.subscribe();
    let db = state.db.clone();
    let shutdown = state.shutdown.clone();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("SSE: Service shutting down");
                    break;
                }

                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    let event = match received {
                        Ok(event) => event,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(user_id = %user_id, skipped, "SSE client lagging, events dropped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    let project_id = event.project_id();
                    if !memberships.permits(&db, project_id).await {
                        continue;
                    }

                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Forwarding {} for project {}", event_type, project_id);
                            yield Ok(Event::default().event(event_type).data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
        info!(user_id = %user_id, "SSE stream closed");
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    ))
}
