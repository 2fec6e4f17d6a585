//! The application handler.
//!
//! [`ApplicationHandler::new`] locks an [`Application`] and initializes it:
//!
//! 1. validates the configuration and emits `InitializationStart`,
//! 2. runs features and allowed auto-discoverables,
//! 3. builds the resource model (processors, merge, validation),
//! 4. binds handlers introduced by processors into the container,
//! 5. starts the background scheduler and hands it to the container,
//! 6. classifies components and assembles the pipeline,
//! 7. notifies lifecycle listeners and emits `InitializationAppFinished`.
//!
//! Any failure leaves nothing running and the application never becomes
//! ready.

use crate::application::Application;
use crate::error::{InitError, LifecycleResult};
use crate::event::{ApplicationEvent, ApplicationEventListener};
use crate::lifecycle::LifecycleAggregator;
use crate::runtime::ServerRuntime;
use crate::timeout::BackgroundScheduler;
use crate::writer::{FutureResponseWriter, ResponseFuture, ResponseWriter};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use trellis_config::TrellisConfig;
use trellis_core::di::Container;
use trellis_core::{ContainerRequest, OutputStream, TrellisError};
use trellis_middleware::{assemble, ProcessingProviders};
use trellis_model::{ModelValidator, ResourceModel, ResourceModelBuilder};

/// An initialized application serving requests.
pub struct ApplicationHandler {
    runtime: Arc<ServerRuntime>,
    container: Arc<Container>,
    scheduler: Arc<BackgroundScheduler>,
    config: Arc<TrellisConfig>,
    model: ResourceModel,
    lifecycle: LifecycleAggregator,
    event_listeners: Vec<Arc<dyn ApplicationEventListener>>,
    shut_down: AtomicBool,
}

impl ApplicationHandler {
    /// Initializes `application`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a failing feature, fatal model
    /// validation issues (unless ignored), or a failing startup listener.
    pub fn new(mut application: Application) -> Result<Self, InitError> {
        application.config.validate()?;
        let event_listeners = std::mem::take(&mut application.event_listeners);
        emit(&event_listeners, &ApplicationEvent::InitializationStart);

        application.configure_features()?;
        let Application {
            config,
            resources,
            components,
            application_tags,
            processors,
            lifecycle_listeners,
            mut container,
            ..
        } = application;

        let bag = resources.build();
        let injectable = container.injectable_types();
        let model = ResourceModelBuilder::new(&config)
            .processors(processors)
            .validator(
                ModelValidator::new().with_injectable(move |type_id| injectable.contains(&type_id)),
            )
            .build(&bag)?;

        for handler in model.enhancing_handlers(&bag) {
            tracing::debug!(handler = handler.type_name(), "binding enhancing handler");
            handler.bind(&mut container);
        }

        let scheduler = Arc::new(BackgroundScheduler::start().map_err(InitError::Scheduler)?);
        container.manage(Arc::clone(&scheduler) as Arc<dyn trellis_core::di::Managed>);

        let providers = ProcessingProviders::from_components(&components, application_tags);
        let container = Arc::new(container);
        let pipeline = assemble(&model, &providers, Arc::clone(&container));
        let routes = pipeline.runtime_model().len();
        let runtime = Arc::new(ServerRuntime::new(
            pipeline,
            config.server.default_suspend_timeout(),
        ));

        let mut lifecycle = LifecycleAggregator::new();
        for listener in lifecycle_listeners {
            lifecycle.add(listener);
        }
        if let Err(error) = lifecycle.on_startup(&container) {
            if let Err(teardown) = container.pre_destroy() {
                tracing::warn!(error = %teardown, "teardown after failed startup");
            }
            container.shutdown();
            return Err(error.into());
        }

        emit(
            &event_listeners,
            &ApplicationEvent::InitializationAppFinished(&model),
        );
        tracing::info!(
            application = %config.server.application_name,
            resources = model.root_resources().len(),
            routes,
            components = components.len(),
            "application initialized"
        );

        Ok(Self {
            runtime,
            container,
            scheduler,
            config: Arc::new(config),
            model,
            lifecycle,
            event_listeners,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Applies `request` and returns its eventual response.
    ///
    /// The entity stream is discarded; the response in the future still
    /// carries its entity. Must be called within a tokio runtime, otherwise
    /// the future resolves to an internal error.
    #[must_use]
    pub fn apply(&self, request: ContainerRequest) -> ResponseFuture {
        let (writer, future) = FutureResponseWriter::new(Arc::clone(&self.scheduler));
        self.spawn(request, writer);
        future
    }

    /// Like [`apply`](Self::apply), writing the entity into the sink
    /// produced by `sink`.
    #[must_use]
    pub fn apply_with_output<F>(&self, request: ContainerRequest, sink: F) -> ResponseFuture
    where
        F: Fn() -> OutputStream + Send + Sync + 'static,
    {
        let (writer, future) = FutureResponseWriter::with_output(Arc::clone(&self.scheduler), sink);
        self.spawn(request, writer);
        future
    }

    /// Processes `request` on the caller's task, writing through `writer`.
    pub async fn handle(&self, request: ContainerRequest, writer: Arc<dyn ResponseWriter>) {
        self.runtime.process(request, writer).await;
    }

    fn spawn(&self, request: ContainerRequest, writer: FutureResponseWriter) {
        let writer: Arc<dyn ResponseWriter> = Arc::new(writer);
        match Handle::try_current() {
            Ok(handle) => {
                let runtime = Arc::clone(&self.runtime);
                handle.spawn(async move { runtime.process(request, writer).await });
            }
            Err(error) => writer.failure(TrellisError::internal_with_source(
                "apply requires a tokio runtime",
                error,
            )),
        }
    }

    /// The locked configuration.
    #[must_use]
    pub fn configuration(&self) -> &TrellisConfig {
        &self.config
    }

    /// The container.
    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// The frozen resource model.
    #[must_use]
    pub const fn resource_model(&self) -> &ResourceModel {
        &self.model
    }

    /// The dispatcher.
    #[must_use]
    pub fn runtime(&self) -> &ServerRuntime {
        &self.runtime
    }

    /// Notifies lifecycle listeners of a reload.
    ///
    /// # Errors
    ///
    /// The first listener failure.
    pub fn reload(&self) -> LifecycleResult {
        self.lifecycle.on_reload(&self.container)
    }

    /// Shuts the application down: listeners, pre-destroy hooks, then the
    /// container and its scheduler. Idempotent.
    ///
    /// # Errors
    ///
    /// The first failure among listeners and pre-destroy hooks; every step
    /// still runs.
    pub fn shutdown(&self) -> LifecycleResult {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.lifecycle.on_shutdown(&self.container);
        emit(&self.event_listeners, &ApplicationEvent::DestroyFinished);
        tracing::info!(application = %self.config.server.application_name, "application shut down");
        result
    }
}

fn emit(listeners: &[Arc<dyn ApplicationEventListener>], event: &ApplicationEvent<'_>) {
    tracing::debug!(event = event.name(), "application event");
    for listener in listeners {
        listener.on_event(event);
    }
}

impl fmt::Debug for ApplicationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationHandler")
            .field("application", &self.config.server.application_name)
            .field("runtime", &self.runtime)
            .field("lifecycle", &self.lifecycle)
            .field("shut_down", &self.shut_down.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
