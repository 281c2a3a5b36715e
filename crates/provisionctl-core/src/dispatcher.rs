//! Reconciliation of one declarative resource intent
//!
//! A lifecycle event (create, read, update, delete) for a managed resource
//! always follows the same steps:
//!
//! 1. read the intent from the [`StateSink`]
//! 2. resolve its [`Location`], falling back to [`LocationDefaults`]
//! 3. build the wire model from the intent ([`Converter::init_model`])
//! 4. run the caller's operation, which talks to the control plane and
//!    typically waits through [`OperationWaiter`](crate::OperationWaiter) or
//!    [`StateMachineWaiter`](crate::StateMachineWaiter)
//! 5. interpret the outcome: not found means the resource is gone
//! 6. commit the observed state, keeping write-only fields from the intent
//!
//! Resources that can only be updated with get-then-put declare a
//! [`Converter::mutex_key`]; the dispatcher then holds the matching
//! [`KeyedMutex`] lock from before step 4 until after step 6.

use std::fmt;
use std::future::Future;
use tracing::{debug, info};

use crate::config::Settings;
use crate::context::WaitContext;
use crate::error::{CoreError, Result};
use crate::keyed::{KeyedGuard, KeyedMutex};
use crate::model::{Location, Region};

/// Provider-level location used when a resource omits part of its own
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationDefaults {
    pub organization_id: Option<String>,
    pub project_id: Option<String>,
    pub region: Option<Region>,
}

impl LocationDefaults {
    /// Combine explicit values with the defaults; explicit values win
    pub fn resolve(
        &self,
        organization_id: Option<&str>,
        project_id: Option<&str>,
        region: Option<&Region>,
    ) -> Result<Location> {
        let organization_id = organization_id
            .or(self.organization_id.as_deref())
            .ok_or_else(|| missing("organization ID"))?;
        let project_id = project_id
            .or(self.project_id.as_deref())
            .ok_or_else(|| missing("project ID"))?;
        let region = region
            .or(self.region.as_ref())
            .ok_or_else(|| missing("provider region"))?;

        Ok(Location::new(organization_id, project_id, region.clone()))
    }
}

fn missing(what: &str) -> CoreError {
    CoreError::Validation(format!(
        "no {} set on the resource and no default configured",
        what
    ))
}

/// Bridge between a resource's declarative intent and its wire model
///
/// Implemented by the intent type itself.
pub trait Converter: Clone + Send {
    type Model: Send;

    /// Identifier used in logs and errors
    fn identity(&self) -> String;

    fn organization_id(&self) -> Option<&str> {
        None
    }

    fn project_id(&self) -> Option<&str> {
        None
    }

    fn region(&self) -> Option<&Region> {
        None
    }

    /// Build the request model. Must not perform I/O.
    fn init_model(&self, location: &Location) -> Self::Model;

    /// Overwrite this intent with what the backend reported
    fn from_model(&mut self, model: Self::Model, location: &Location);

    /// Copy fields the backend never returns (secrets, create-only inputs)
    fn retain_write_only(&mut self, _prior: &Self) {}

    /// Serialize operations on the same backend object
    fn mutex_key(&self, _location: &Location) -> Option<String> {
        None
    }
}

/// Where intents come from and observed state goes
pub trait StateSink {
    type Intent: Converter;

    fn get_intent(&self) -> Result<Self::Intent>;
    fn set_state(&mut self, state: Self::Intent) -> Result<()>;
    fn remove_state(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileAction::Create => "create",
            ReconcileAction::Read => "read",
            ReconcileAction::Update => "update",
            ReconcileAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled<C> {
    /// The observed state was written to the sink
    Committed(C),
    /// The resource no longer exists and was dropped from the sink
    Removed,
}

type ModelOf<S> = <<S as StateSink>::Intent as Converter>::Model;

/// Entry point for resource lifecycle events
#[derive(Debug, Clone, Default)]
pub struct ReconciliationDispatcher {
    defaults: LocationDefaults,
    locks: KeyedMutex,
}

impl ReconciliationDispatcher {
    pub fn new(defaults: LocationDefaults) -> Self {
        Self {
            defaults,
            locks: KeyedMutex::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.defaults.clone())
    }

    pub fn defaults(&self) -> &LocationDefaults {
        &self.defaults
    }

    /// Registry shared by every dispatch through this dispatcher
    pub fn locks(&self) -> &KeyedMutex {
        &self.locks
    }

    /// Resolve where an intent lives
    pub fn resolve_location<C: Converter>(&self, intent: &C) -> Result<Location> {
        self.defaults
            .resolve(intent.organization_id(), intent.project_id(), intent.region())
    }

    /// Run one lifecycle event against the sink
    ///
    /// `operation` receives the model built from the intent and the resolved
    /// location, and returns the model the backend now reports, or `None`
    /// when the resource is gone. Its errors are returned unchanged and leave
    /// the sink untouched, except for not-found errors which remove the
    /// resource.
    pub async fn apply<S, F, Fut>(
        &self,
        ctx: &WaitContext,
        sink: &mut S,
        action: ReconcileAction,
        operation: F,
    ) -> Result<Reconciled<S::Intent>>
    where
        S: StateSink,
        F: FnOnce(ModelOf<S>, Location) -> Fut,
        Fut: Future<Output = Result<Option<ModelOf<S>>>>,
    {
        let intent = sink.get_intent()?;
        let identity = intent.identity();
        let location = self.resolve_location(&intent)?;
        let model = intent.init_model(&location);

        let _guard = self.acquire(ctx, &intent, &location).await?;
        debug!("Dispatching {} for {} at {}", action, identity, location);

        let outcome = ctx
            .run(operation(model, location.clone()))
            .await
            .map_err(|reason| reason.into_error(&identity, ctx.elapsed()))?;

        let observed = match outcome {
            Ok(observed) => observed,
            Err(err) if err.is_not_found() => {
                info!("{} no longer exists, removing it from state", identity);
                None
            }
            Err(err) => return Err(err),
        };

        match observed {
            Some(model) if action != ReconcileAction::Delete => {
                let mut state = intent.clone();
                state.from_model(model, &location);
                state.retain_write_only(&intent);
                sink.set_state(state.clone())?;
                debug!("Committed {} for {}", action, identity);
                Ok(Reconciled::Committed(state))
            }
            _ => {
                sink.remove_state();
                debug!("Removed {} after {}", identity, action);
                Ok(Reconciled::Removed)
            }
        }
    }

    async fn acquire<C: Converter>(
        &self,
        ctx: &WaitContext,
        intent: &C,
        location: &Location,
    ) -> Result<Option<KeyedGuard>> {
        let Some(key) = intent.mutex_key(location) else {
            return Ok(None);
        };
        let guard = ctx
            .run(self.locks.lock(key))
            .await
            .map_err(|reason| reason.into_error(intent.identity(), ctx.elapsed()))?;
        Ok(Some(guard))
    }
}
