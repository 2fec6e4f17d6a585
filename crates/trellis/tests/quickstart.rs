//! A small application assembled through the facade.

use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode, Uri};
use std::sync::Arc;
use std::time::Duration;
use trellis::prelude::*;

struct TokenAuth;

impl Feature for TokenAuth {
    fn name(&self) -> &str {
        "token-auth"
    }

    fn configure(&self, context: &mut Configurable<'_>) -> anyhow::Result<()> {
        context.register_component(
            ComponentModel::builder("require-token")
                .contract(Contract::RequestFilter)
                .priority(Priority::new(100))
                .pre_matching()
                .build(),
            Provider::new().request_filter(request_filter_fn(|ctx| {
                if ctx.request().header("x-token").is_some() {
                    Ok(FilterAction::Continue)
                } else {
                    Err(TrellisError::authentication("missing token"))
                }
            })),
        );
        context.register_component(
            ComponentModel::builder("stamp")
                .contract(Contract::ResponseFilter)
                .build(),
            Provider::new().response_filter(response_filter_fn(|ctx, response| {
                let id = HeaderValue::from_str(&ctx.request_id().to_string())
                    .map_err(|e| TrellisError::internal(e.to_string()))?;
                response
                    .headers_mut()
                    .insert(HeaderName::from_static("x-request-id"), id);
                Ok(())
            })),
        );
        Ok(())
    }
}

fn application() -> Application {
    Application::new().feature(Arc::new(TokenAuth)).resource(
        Resource::builder("/jobs/{id}")
            .method(
                ResourceMethod::builder(Method::GET)
                    .parameter(Parameter::path("id"))
                    .endpoint(endpoint_fn(|invocation| async move {
                        let id = invocation.path_param("id").unwrap_or_default().to_string();
                        Ok(Outcome::from(
                            Suspend::new(move |response| {
                                tokio::spawn(async move {
                                    tokio::time::sleep(Duration::from_millis(5)).await;
                                    response.resume(ContainerResponse::ok(format!("job {id}")));
                                });
                            })
                            .timeout(Duration::from_secs(2)),
                        ))
                    }))
                    .build(),
            )
            .build(),
    )
}

fn request(token: bool) -> ContainerRequest {
    let request = ContainerRequest::new(Method::GET, Uri::from_static("/jobs/7"));
    if token {
        request.with_header(
            HeaderName::from_static("x-token"),
            HeaderValue::from_static("secret"),
        )
    } else {
        request
    }
}

#[tokio::test]
async fn test_suspended_job_is_filtered_on_the_way_out() {
    let handler = ApplicationHandler::new(application()).unwrap();

    let response = handler.apply(request(true)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.entity().unwrap().as_ref(), b"job 7");
    assert!(response.headers().contains_key("x-request-id"));
    handler.shutdown().unwrap();
}

#[tokio::test]
async fn test_missing_token_is_rejected_before_routing() {
    let handler = ApplicationHandler::new(application()).unwrap();

    let response = handler.apply(request(false)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
    handler.shutdown().unwrap();
}
