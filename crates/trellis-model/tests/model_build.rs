//! End-to-end resource model construction.

use http::Method;
use std::sync::Arc;
use trellis_config::TrellisConfig;
use trellis_core::di::Container;
use trellis_core::{BindingTag, ContainerResponse};
use trellis_model::{
    endpoint_fn, Handler, ModelError, ModelProcessor, ModelValidator, Outcome, Parameter,
    Resource, ResourceBag, ResourceMethod, ResourceModel, ResourceModelBuilder, ResourceType,
};

#[derive(Default)]
struct UsersResource {
    prefix: &'static str,
}

impl ResourceType for UsersResource {
    fn describe() -> Result<Resource, ModelError> {
        Ok(Resource::builder("/users")
            .method(
                ResourceMethod::builder(Method::GET)
                    .endpoint(endpoint_fn(|inv| async move {
                        let this = inv.handler::<UsersResource>()?;
                        Ok(Outcome::from(ContainerResponse::ok(format!("{}users", this.prefix))))
                    }))
                    .build(),
            )
            .child(
                Resource::builder("{id}")
                    .method(
                        ResourceMethod::builder(Method::DELETE)
                            .endpoint(endpoint_fn(|_| async {
                                Ok(Outcome::from(ContainerResponse::default()))
                            }))
                            .parameter(Parameter::path("id"))
                            .name_binding("Admin")
                            .build(),
                    )
                    .build(),
            )
            .build())
    }
}

#[derive(Default)]
struct MetricsResource;

/// Adds a resource backed by a handler class the application never
/// registered.
struct AddMetrics;

impl ModelProcessor for AddMetrics {
    fn rank(&self) -> i32 {
        100
    }

    fn process_resource_model(&self, model: ResourceModel, _config: &TrellisConfig) -> ResourceModel {
        let mut resources = model.into_resources();
        resources.push(
            Resource::builder("/metrics")
                .handler(Handler::class::<MetricsResource>())
                .method(
                    ResourceMethod::builder(Method::GET)
                        .endpoint(endpoint_fn(|_| async {
                            Ok(Outcome::from(ContainerResponse::ok("# metrics")))
                        }))
                        .build(),
                )
                .build(),
        );
        ResourceModel::new(resources)
    }
}

#[test]
fn test_builds_model_from_classes_and_processors() {
    let mut bag = ResourceBag::builder();
    bag.register_class::<UsersResource>();
    let bag = bag.build();

    let config = TrellisConfig::default();
    let model = ResourceModelBuilder::new(&config)
        .processor(Arc::new(AddMetrics))
        .build(&bag)
        .unwrap();

    let endpoints = model.runtime_endpoints();
    assert_eq!(endpoints.len(), 3);
    let delete = endpoints
        .iter()
        .find(|e| e.method == Method::DELETE)
        .unwrap();
    assert_eq!(delete.path, "/users/{id}");
    assert!(delete.name_bindings.contains(&BindingTag::new("Admin")));
    assert_eq!(delete.handler, Some(Handler::class::<UsersResource>()));

    let enhancing = model.enhancing_handlers(&bag);
    assert_eq!(enhancing, vec![Handler::class::<MetricsResource>()]);

    let mut container = Container::new();
    for handler in &enhancing {
        handler.bind(&mut container);
    }
    assert!(container.has_factory(std::any::TypeId::of::<MetricsResource>()));
}

#[tokio::test]
async fn test_class_endpoint_runs_on_resolved_handler() {
    let mut bag = ResourceBag::builder();
    bag.register_class::<UsersResource>();
    let bag = bag.build();
    let config = TrellisConfig::default();
    let model = ResourceModelBuilder::new(&config).build(&bag).unwrap();

    let mut container = Container::new();
    container.register_factory(|| UsersResource { prefix: "all " });

    let get = &model.runtime_endpoints()[0];
    let handler = get.handler.as_ref().unwrap().resolve(&container);
    let request = trellis_core::ContainerRequest::new(Method::GET, "/users".parse().unwrap());
    let invocation =
        trellis_model::Invocation::new(request, trellis_router::Params::new()).with_handler(handler);

    match get.endpoint.as_ref().unwrap().invoke(invocation).await.unwrap() {
        Outcome::Response(response) => {
            assert_eq!(response.entity().unwrap().as_ref(), b"all users");
        }
        Outcome::Suspend(_) => panic!("expected a response"),
    }
}

#[test]
fn test_bean_validation_uses_container() {
    struct Clock;

    let mut bag = ResourceBag::builder();
    bag.register_programmatic(
        Resource::builder("/time")
            .method(
                ResourceMethod::builder(Method::GET)
                    .endpoint(endpoint_fn(|_| async {
                        Ok(Outcome::from(ContainerResponse::default()))
                    }))
                    .parameter(Parameter::bean::<Clock>())
                    .build(),
            )
            .build(),
    );
    let bag = bag.build();
    let config = TrellisConfig::default();

    let container = Arc::new(Container::new());
    let c = container.clone();
    let result = ResourceModelBuilder::new(&config)
        .validator(ModelValidator::new().with_injectable(move |id| c.is_injectable(id)))
        .build(&bag);
    assert!(matches!(result, Err(ModelError::Validation(_))));
}

#[derive(Default)]
struct InvoiceReads;

impl ResourceType for InvoiceReads {
    fn describe() -> Result<Resource, ModelError> {
        Ok(Resource::builder("/invoices")
            .name_binding("Audit")
            .method(
                ResourceMethod::builder(Method::GET)
                    .endpoint(endpoint_fn(|_| async {
                        Ok(Outcome::from(ContainerResponse::ok("list")))
                    }))
                    .build(),
            )
            .build())
    }
}

#[derive(Default)]
struct InvoiceWrites;

impl ResourceType for InvoiceWrites {
    fn describe() -> Result<Resource, ModelError> {
        Ok(Resource::builder("/invoices/")
            .method(
                ResourceMethod::builder(Method::POST)
                    .endpoint(endpoint_fn(|_| async {
                        Ok(Outcome::from(ContainerResponse::ok("created")))
                    }))
                    .build(),
            )
            .build())
    }
}

#[test]
fn test_merged_classes_keep_their_own_handler_and_bindings() {
    let mut bag = ResourceBag::builder();
    bag.register_class::<InvoiceReads>()
        .register_class::<InvoiceWrites>();
    let bag = bag.build();
    assert_eq!(bag.resources().len(), 1);

    let config = TrellisConfig::default();
    let model = ResourceModelBuilder::new(&config).build(&bag).unwrap();
    let endpoints = model.runtime_endpoints();
    let get = endpoints.iter().find(|e| e.method == Method::GET).unwrap();
    let post = endpoints.iter().find(|e| e.method == Method::POST).unwrap();

    assert_eq!(get.handler, Some(Handler::class::<InvoiceReads>()));
    assert_eq!(post.handler, Some(Handler::class::<InvoiceWrites>()));
    assert!(get.name_bindings.contains(&BindingTag::new("Audit")));
    assert!(post.name_bindings.is_empty());
    assert!(model.enhancing_handlers(&bag).is_empty());
}
