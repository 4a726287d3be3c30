//! Maps each integration to its trigger and dispatches
//! schedule ticks and inbound messages to it.
//!
//! Registration only validates and records. Nothing runs until the
//! orchestrator [`arm`](TriggerRegistry::arm)s an integration against a live
//! [`Publisher`]; arming again replaces the previous timer and handler, so
//! a reconnect never leaves two timers behind.
//!
//! Invocations of one integration are serialised through a per-integration
//! lock. A schedule tick that finds the lock held is skipped; messages and
//! the startup run wait for it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedMutexGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::Instrument;

use hamqtt_domain::connection::InboundMessage;
use hamqtt_domain::error::{DuplicateTriggerError, HamqttError};
use hamqtt_domain::schedule::CronSchedule;
use hamqtt_domain::time::{self, Timestamp};
use hamqtt_domain::topic;
use hamqtt_domain::trigger::Trigger;

use crate::clock::{Clock, SystemClock};
use crate::ports::{InvocationCause, InvocationContext, Integration, Scheduled, Subscribed};
use crate::publisher::Publisher;

/// One registered integration with its declared capabilities.
pub(crate) struct Registration {
    name: String,
    integration: Arc<dyn Integration>,
    scheduled: Option<Arc<dyn Scheduled>>,
    subscribed: Option<Arc<dyn Subscribed>>,
    trigger: Trigger,
    guard: Arc<tokio::sync::Mutex<()>>,
}

impl Registration {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn integration(&self) -> &Arc<dyn Integration> {
        &self.integration
    }
}

#[derive(Default)]
struct ArmedTasks {
    timer: Option<JoinHandle<()>>,
    handler: Option<JoinHandle<()>>,
}

impl ArmedTasks {
    fn abort(self) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        if let Some(handler) = self.handler {
            handler.abort();
        }
    }
}

/// Registry of integrations and the tasks that fire them.
pub struct TriggerRegistry {
    registrations: Mutex<Vec<Arc<Registration>>>,
    armed: Mutex<HashMap<String, ArmedTasks>>,
    clock: Arc<dyn Clock>,
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerRegistry {
    /// An empty registry reading time from the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// An empty registry reading time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
            armed: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Register an integration that runs on a cron schedule.
    ///
    /// # Errors
    ///
    /// Returns [`HamqttError::ScheduleParse`] for a malformed expression and
    /// [`HamqttError::DuplicateTrigger`] when the name is already taken.
    pub fn register_scheduled<T: Scheduled>(&self, integration: Arc<T>) -> Result<(), HamqttError> {
        let schedule = CronSchedule::parse(integration.cron_expression())?;
        self.insert(Registration {
            name: integration.name().to_string(),
            trigger: Trigger::Scheduled(schedule),
            scheduled: Some(integration.clone()),
            subscribed: None,
            integration,
            guard: Arc::default(),
        })
    }

    /// Register an integration that handles messages on a topic filter.
    ///
    /// # Errors
    ///
    /// Returns [`HamqttError::InvalidTopic`] for a malformed filter and
    /// [`HamqttError::DuplicateTrigger`] when the name or the filter is
    /// already claimed.
    pub fn register_subscribed<T: Subscribed>(
        &self,
        integration: Arc<T>,
    ) -> Result<(), HamqttError> {
        let filter = validated_filter(integration.topic())?;
        self.insert(Registration {
            name: integration.name().to_string(),
            trigger: Trigger::Subscribed(filter),
            scheduled: None,
            subscribed: Some(integration.clone()),
            integration,
            guard: Arc::default(),
        })
    }

    /// Register an integration with both a schedule and a subscription.
    ///
    /// # Errors
    ///
    /// Any error of [`register_scheduled`](Self::register_scheduled) or
    /// [`register_subscribed`](Self::register_subscribed).
    pub fn register_both<T: Scheduled + Subscribed>(
        &self,
        integration: Arc<T>,
    ) -> Result<(), HamqttError> {
        let schedule = CronSchedule::parse(integration.cron_expression())?;
        let topic = validated_filter(Subscribed::topic(integration.as_ref()))?;
        self.insert(Registration {
            name: integration.name().to_string(),
            trigger: Trigger::Both { schedule, topic },
            scheduled: Some(integration.clone()),
            subscribed: Some(integration.clone()),
            integration,
            guard: Arc::default(),
        })
    }

    fn insert(&self, registration: Registration) -> Result<(), HamqttError> {
        let mut registrations = self.lock_registrations();
        for existing in registrations.iter() {
            if existing.name == registration.name {
                return Err(DuplicateTriggerError::Name(registration.name).into());
            }
            if let (Some(claimed), Some(wanted)) =
                (existing.trigger.topic(), registration.trigger.topic())
                && claimed == wanted
            {
                return Err(DuplicateTriggerError::Topic {
                    topic: wanted.to_string(),
                    owner: existing.name.clone(),
                }
                .into());
            }
        }
        tracing::info!(
            integration = %registration.name,
            trigger = %registration.trigger,
            "integration registered"
        );
        registrations.push(Arc::new(registration));
        Ok(())
    }

    /// Remove an integration, cancel its tasks, free its topic and drop its
    /// subscription on the connection.
    ///
    /// # Errors
    ///
    /// Returns [`HamqttError::UnknownIntegration`] if `name` is not
    /// registered and [`HamqttError::Connection`] if the unsubscribe fails.
    /// The registration is removed either way.
    pub async fn unregister(&self, name: &str, publisher: &Publisher) -> Result<(), HamqttError> {
        let removed = {
            let mut registrations = self.lock_registrations();
            let position = registrations
                .iter()
                .position(|registration| registration.name == name);
            position.map(|index| registrations.remove(index))
        };
        let Some(removed) = removed else {
            return Err(HamqttError::UnknownIntegration(name.to_string()));
        };
        self.disarm(name);
        if let Some(filter) = removed.trigger.topic() {
            publisher.connection().unsubscribe(filter).await?;
        }
        tracing::info!(integration = %name, "integration unregistered");
        Ok(())
    }

    /// Start the timer and message handler of `name`, replacing any that are
    /// already running.
    ///
    /// # Errors
    ///
    /// Returns [`HamqttError::UnknownIntegration`] if `name` is not
    /// registered and [`HamqttError::Connection`] if the subscription fails.
    #[tracing::instrument(skip(self, publisher))]
    pub async fn arm(&self, name: &str, publisher: &Publisher) -> Result<(), HamqttError> {
        let registration = self
            .find(name)
            .ok_or_else(|| HamqttError::UnknownIntegration(name.to_string()))?;
        self.disarm(name);

        let mut tasks = ArmedTasks::default();
        if let (Some(filter), Some(subscribed)) = (
            registration.trigger.topic(),
            registration.subscribed.clone(),
        ) {
            let receiver = publisher.connection().subscribe(filter).await?;
            tasks.handler = Some(tokio::spawn(run_handler(
                registration.clone(),
                subscribed,
                publisher.clone(),
                self.clock.clone(),
                receiver,
            )));
        }
        if let (Some(schedule), Some(scheduled)) = (
            registration.trigger.schedule(),
            registration.scheduled.clone(),
        ) {
            tasks.timer = Some(tokio::spawn(run_timer(
                registration.clone(),
                scheduled,
                schedule.clone(),
                publisher.clone(),
                self.clock.clone(),
            )));
        }

        if let Some(previous) = self.lock_armed().insert(name.to_string(), tasks) {
            previous.abort();
        }
        tracing::debug!(trigger = %registration.trigger, "armed");
        Ok(())
    }

    /// Cancel the timer and handler of `name`. In-flight invocations finish
    /// on their own.
    pub fn disarm(&self, name: &str) {
        if let Some(tasks) = self.lock_armed().remove(name) {
            tasks.abort();
            tracing::debug!(integration = %name, "disarmed");
        }
    }

    /// Cancel every timer and handler.
    pub fn disarm_all(&self) {
        let armed: Vec<ArmedTasks> = self.lock_armed().drain().map(|(_, tasks)| tasks).collect();
        for tasks in armed {
            tasks.abort();
        }
    }

    /// Run `name` once now if it is scheduled with `run_on_startup`.
    ///
    /// The run waits for any invocation already in progress. Returns the
    /// handle of the supervising task, or `None` when there is nothing to run.
    ///
    /// # Errors
    ///
    /// Returns [`HamqttError::UnknownIntegration`] if `name` is not registered.
    pub fn invoke_startup(
        &self,
        name: &str,
        publisher: &Publisher,
    ) -> Result<Option<JoinHandle<()>>, HamqttError> {
        let registration = self
            .find(name)
            .ok_or_else(|| HamqttError::UnknownIntegration(name.to_string()))?;
        let Some(scheduled) = registration.scheduled.clone() else {
            return Ok(None);
        };
        if !scheduled.run_on_startup() {
            return Ok(None);
        }

        let publisher = publisher.clone();
        let fired_at = self.clock.now();
        Ok(Some(tokio::spawn(async move {
            let permit = registration.guard.clone().lock_owned().await;
            let invocation = spawn_invocation(
                &registration,
                publisher,
                InvocationCause::Startup,
                fired_at,
                permit,
                move |ctx| async move { scheduled.run(&ctx).await },
            );
            // The supervisor never panics.
            let _ = invocation.await;
        })))
    }

    #[must_use]
    pub fn is_armed(&self, name: &str) -> bool {
        self.lock_armed().contains_key(name)
    }

    /// The trigger `name` was registered with.
    #[must_use]
    pub fn trigger(&self, name: &str) -> Option<Trigger> {
        self.find(name).map(|registration| registration.trigger.clone())
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.lock_registrations()
            .iter()
            .map(|registration| registration.name.clone())
            .collect()
    }

    pub(crate) fn entries(&self) -> Vec<Arc<Registration>> {
        self.lock_registrations().clone()
    }

    fn find(&self, name: &str) -> Option<Arc<Registration>> {
        self.lock_registrations()
            .iter()
            .find(|registration| registration.name == name)
            .cloned()
    }

    fn lock_registrations(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Registration>>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_armed(&self) -> std::sync::MutexGuard<'_, HashMap<String, ArmedTasks>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TriggerRegistry {
    fn drop(&mut self) {
        self.disarm_all();
    }
}

fn validated_filter(filter: &str) -> Result<String, HamqttError> {
    if topic::is_valid_filter(filter) {
        Ok(filter.to_string())
    } else {
        Err(HamqttError::InvalidTopic(filter.to_string()))
    }
}

async fn run_timer(
    registration: Arc<Registration>,
    scheduled: Arc<dyn Scheduled>,
    schedule: CronSchedule,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
) {
    let mut last_fire: Option<Timestamp> = None;
    loop {
        let now = clock.now();
        // Never fire the same tick twice, even if the wall clock lags.
        let after = last_fire.map_or(now, |last| last.max(now));
        let Some(next) = schedule.next_after(after) else {
            tracing::warn!(
                integration = %registration.name,
                schedule = %schedule,
                "schedule has no upcoming fire time, timer stopped"
            );
            return;
        };
        tokio::time::sleep(time::until(clock.now(), next)).await;
        last_fire = Some(next);

        let Ok(permit) = registration.guard.clone().try_lock_owned() else {
            tracing::warn!(
                integration = %registration.name,
                fired_at = %next,
                "previous invocation still running, tick skipped"
            );
            continue;
        };
        let scheduled = scheduled.clone();
        spawn_invocation(
            &registration,
            publisher.clone(),
            InvocationCause::Schedule,
            next,
            permit,
            move |ctx| async move { scheduled.run(&ctx).await },
        );
    }
}

async fn run_handler(
    registration: Arc<Registration>,
    subscribed: Arc<dyn Subscribed>,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
    mut receiver: mpsc::UnboundedReceiver<InboundMessage>,
) {
    while let Some(message) = receiver.recv().await {
        let permit = registration.guard.clone().lock_owned().await;
        let subscribed = subscribed.clone();
        spawn_invocation(
            &registration,
            publisher.clone(),
            InvocationCause::Message,
            clock.now(),
            permit,
            move |ctx| async move { subscribed.handle(&ctx, message).await },
        );
    }
    tracing::debug!(integration = %registration.name, "subscription closed");
}

/// Run `work` on its own task while holding `permit`, and log how it ended.
fn spawn_invocation<F, Fut>(
    registration: &Registration,
    publisher: Publisher,
    cause: InvocationCause,
    fired_at: Timestamp,
    permit: OwnedMutexGuard<()>,
    work: F,
) -> JoinHandle<()>
where
    F: FnOnce(InvocationContext) -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let ctx = InvocationContext::new(publisher, cause, fired_at);
    let span = tracing::info_span!(
        "invocation",
        integration = %registration.name,
        %cause,
        invocation_id = %ctx.invocation_id(),
    );
    let task = tokio::spawn(
        async move {
            let _permit = permit;
            work(ctx).await
        }
        .instrument(span.clone()),
    );

    tokio::spawn(
        async move {
            match task.await {
                Ok(Ok(())) => tracing::debug!("invocation finished"),
                Ok(Err(err)) => {
                    let error = format!("{err:#}");
                    tracing::error!(%error, "invocation failed");
                }
                Err(err) if err.is_panic() => tracing::error!("invocation panicked"),
                Err(_) => tracing::debug!("invocation cancelled"),
            }
        }
        .instrument(span),
    )
}
