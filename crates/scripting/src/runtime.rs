//! Trigger runtime
//!
//! Owns everything a running trigger touches: the closed registry, the
//! global variables, the tick scheduler, the event bridge and the host.
//! Events enter through [`Runtime::fire`]; each matching trigger is walked
//! on the calling thread until it finishes, stops or suspends on a delay.
//! A suspended walk resumes from a scheduler task on a later tick.

use crate::context::TriggerContext;
use crate::dispatch::EventBridge;
use crate::error::Result;
use crate::event::Event;
use crate::registry::Registry;
use crate::scheduler::TickScheduler;
use crate::syntax::TriggerEvent;
use crate::trigger::walk::{walk, WalkOutcome};
use crate::trigger::{ItemId, Trigger};
use crate::variables::Variables;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use trellis_core::{IdGenerator, Ticks, TriggerId};

/// Host services available to effects
pub trait Host: Send + Sync {
    /// Send a message to everyone connected
    fn broadcast(&self, message: &str);
}

/// Host that writes broadcasts to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHost;

impl Host for LogHost {
    fn broadcast(&self, message: &str) {
        tracing::info!(target: "broadcast", "{}", message);
    }
}

/// Runtime options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Length of one host tick
    pub tick: Duration,
    /// How long an asynchronous event waits for the main thread
    pub sync_timeout: Duration,
    /// Warn about lists joined only by commas
    pub warn_missing_and: bool,
    /// Script file extension without the dot
    pub script_extension: String,
    /// Script files starting with this prefix are not loaded
    pub disabled_prefix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            sync_timeout: Duration::from_secs(5),
            warn_missing_and: true,
            script_extension: "sk".to_string(),
            disabled_prefix: "-".to_string(),
        }
    }
}

pub struct Runtime {
    registry: Arc<Registry>,
    options: EngineOptions,
    host: Arc<dyn Host>,
    variables: Variables,
    scheduler: TickScheduler,
    bridge: EventBridge,
    trigger_ids: IdGenerator<TriggerId>,
    failures: AtomicUsize,
}

impl Runtime {
    pub fn new(registry: Arc<Registry>, options: EngineOptions, host: Arc<dyn Host>) -> Arc<Self> {
        tracing::debug!("Creating runtime over {:?}", registry);
        Arc::new(Self {
            registry,
            options,
            host,
            variables: Variables::new(),
            scheduler: TickScheduler::new(),
            bridge: EventBridge::new(),
            trigger_ids: IdGenerator::starting_at(1),
            failures: AtomicUsize::new(0),
        })
    }

    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[inline]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    #[inline]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    #[inline]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    #[inline]
    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    /// Allocate the ID of a new trigger; IDs increase in load order
    pub fn next_trigger_id(&self) -> Option<TriggerId> {
        self.trigger_ids.next_id()
    }

    /// Number of trigger executions aborted by an error so far
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Advance the host by one tick
    pub fn tick(&self) {
        self.scheduler.tick();
    }

    /// Drop pending delayed continuations and handed-off work
    pub fn shutdown(&self) {
        tracing::debug!("Dropping {} pending task(s)", self.scheduler.pending());
        self.scheduler.clear();
    }

    // ========== Events ==========

    /// Deliver an event to every trigger listening for its class
    ///
    /// # Returns
    /// The number of triggers that accepted the event. Fails only if an
    /// asynchronous event could not be handed to the main thread in time.
    pub fn fire(self: &Arc<Self>, event: Event) -> Result<usize> {
        let event = Arc::new(event);
        if event.is_asynchronous() && event.class().requires_main_thread && !self.scheduler.is_main_thread() {
            tracing::debug!("Handing asynchronous '{}' event to the main thread", event.class().name);
            let runtime = Arc::clone(self);
            return self
                .scheduler
                .run_on_main(move || runtime.dispatch(event), self.options.sync_timeout);
        }
        Ok(self.dispatch(event))
    }

    fn dispatch(self: &Arc<Self>, event: Arc<Event>) -> usize {
        let triggers = self.bridge.triggers_for(event.class());
        let mut accepted = 0;
        for trigger in triggers {
            if !trigger.is_active() {
                continue;
            }
            let TriggerEvent::Checked(check) = trigger.event() else {
                continue;
            };
            if !check.check(&event) {
                continue;
            }
            accepted += 1;
            self.execute(&trigger, Arc::clone(&event));
        }
        tracing::trace!("'{}' event ran {} trigger(s)", event.class().name, accepted);
        accepted
    }

    /// Walk a trigger for one event from its first item
    pub fn execute(self: &Arc<Self>, trigger: &Arc<Trigger>, event: Arc<Event>) {
        let ctx = TriggerContext::new(Arc::clone(self), event, trigger.id());
        self.run(trigger, ctx, trigger.entry());
    }

    /// Walk from `start`; errors and panics end this execution only
    fn run(self: &Arc<Self>, trigger: &Arc<Trigger>, mut ctx: TriggerContext, start: Option<ItemId>) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| walk(trigger.graph(), start, &mut ctx)));
        match outcome {
            Ok(Ok(WalkOutcome::Finished | WalkOutcome::Stopped)) => {}
            Ok(Ok(WalkOutcome::Suspended { resume, ticks })) => self.suspend(trigger, ctx, resume, ticks),
            Ok(Err(err)) => self.report_failure(trigger, &ctx, &err.to_string()),
            Err(payload) => self.report_failure(trigger, &ctx, &panic_message(payload.as_ref())),
        }
    }

    /// Continue a suspended walk after `ticks`
    fn suspend(self: &Arc<Self>, trigger: &Arc<Trigger>, mut ctx: TriggerContext, resume: Option<ItemId>, ticks: Ticks) {
        if resume.is_none() {
            return;
        }
        ctx.mark_delayed();
        // The context keeps the runtime alive until the task runs or the
        // scheduler is cleared
        let weak_trigger = Arc::downgrade(trigger);
        self.scheduler.schedule_once(ticks, move || {
            let Some(trigger) = weak_trigger.upgrade() else {
                return;
            };
            let runtime = Arc::clone(ctx.runtime());
            if !trigger.is_active() {
                tracing::debug!("Dropping delayed continuation of unloaded trigger {}", trigger.id());
                return;
            }
            runtime.run(&trigger, ctx, resume);
        });
    }

    fn report_failure(&self, trigger: &Trigger, ctx: &TriggerContext, message: &str) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let (location, item) = match ctx.current_item() {
            Some(id) => (
                trigger.item_location(id),
                trigger.graph().get(id).map(|node| node.describe(true)).unwrap_or_default(),
            ),
            None => (trigger.location(), trigger.describe()),
        };
        let thread = std::thread::current();
        tracing::error!(
            target: "script",
            trigger = %trigger.describe(),
            thread = thread.name().unwrap_or("<unnamed>"),
            "Error while running '{}' ({}): {}",
            item,
            location,
            message
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic with a non-text payload".to_string())
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("variables", &self.variables.len())
            .field("triggers", &self.bridge.len())
            .field("pending_tasks", &self.scheduler.pending())
            .finish()
    }
}
