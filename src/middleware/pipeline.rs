//! Ordered request interceptors.
//!
//! A [`Pipeline`] is a plain list of [`Interceptor`]s wrapped around a route
//! or scope. Each stage's `before` runs in order and either lets the request
//! continue or answers it directly. Once a response exists (from the handler
//! or from a short-circuiting stage), `after` runs in reverse order for every
//! stage that let the request through.

use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::HeaderMap, StatusCode},
    Error, HttpRequest, HttpResponse,
};
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use tracing::debug;

/// Result of an interceptor's `before` hook.
pub enum Flow {
    Continue,
    Respond(HttpResponse),
}

#[async_trait(?Send)]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before(&self, req: &ServiceRequest) -> Flow;

    async fn after(&self, _req: &HttpRequest, _status: StatusCode, _headers: &mut HeaderMap) {}
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: impl Interceptor + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl<S, B> Transform<S, ServiceRequest> for Pipeline
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = PipelineMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PipelineMiddleware {
            service: Rc::new(service),
            stages: Rc::new(self.stages.clone()),
        }))
    }
}

pub struct PipelineMiddleware<S> {
    service: Rc<S>,
    stages: Rc<Vec<Arc<dyn Interceptor>>>,
}

impl<S, B> Service<ServiceRequest> for PipelineMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let stages = Rc::clone(&self.stages);

        Box::pin(async move {
            let mut entered = 0;
            let mut short_circuit = None;

            for stage in stages.iter() {
                match stage.before(&req).await {
                    Flow::Continue => entered += 1,
                    Flow::Respond(response) => {
                        debug!("Interceptor '{}' answered {} {}", stage.name(), req.method(), req.path());
                        short_circuit = Some(response);
                        break;
                    }
                }
            }

            // The router needs sole ownership of the request while routing,
            // so no handle to it may be held across the inner call.
            let mut res = match short_circuit {
                Some(response) => req.into_response(response).map_into_right_body(),
                None => service.call(req).await?.map_into_left_body(),
            };

            let http_req = res.request().clone();
            let status = res.status();
            for stage in stages[..entered].iter().rev() {
                stage.after(&http_req, status, res.headers_mut()).await;
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};
    use actix_web::{test, web, App, HttpMessage};
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        block: bool,
    }

    #[async_trait(?Send)]
    impl Interceptor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn before(&self, req: &ServiceRequest) -> Flow {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            if self.block {
                return Flow::Respond(HttpResponse::Forbidden().finish());
            }
            req.extensions_mut().insert(self.name.to_string());
            Flow::Continue
        }

        async fn after(&self, _req: &HttpRequest, status: StatusCode, headers: &mut HeaderMap) {
            self.log.lock().unwrap().push(format!("after:{}:{}", self.name, status.as_u16()));
            headers.insert(
                HeaderName::from_static("x-seen-by"),
                HeaderValue::from_static(self.name),
            );
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, block: bool) -> Recorder {
        Recorder {
            name,
            log: log.clone(),
            block,
        }
    }

    async fn handler(req: HttpRequest) -> HttpResponse {
        let seen = req.extensions().get::<String>().cloned().unwrap_or_default();
        HttpResponse::Ok().body(seen)
    }

    #[actix_web::test]
    async fn test_stages_run_in_order_and_unwind() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .with(recorder("first", &log, false))
            .with(recorder("second", &log, false));
        assert_eq!(pipeline.stage_names(), vec!["first", "second"]);

        let app = test::init_service(
            App::new().service(web::resource("/").wrap(pipeline).to(handler)),
        )
        .await;
        let resp = test::TestRequest::get().uri("/").send_request(&app).await;

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("x-seen-by").unwrap(), "first");
        assert_eq!(test::read_body(resp).await, "second");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:first", "before:second", "after:second:200", "after:first:200"]
        );
    }

    #[actix_web::test]
    async fn test_wraps_scope_with_nested_routes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new().with(recorder("scope", &log, false));

        let app = test::init_service(
            App::new().service(
                web::scope("/api")
                    .wrap(pipeline)
                    .service(web::scope("/inner").route("/leaf", web::get().to(handler))),
            ),
        )
        .await;

        let resp = test::TestRequest::get().uri("/api/inner/leaf").send_request(&app).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("x-seen-by").unwrap(), "scope");
        assert_eq!(test::read_body(resp).await, "scope");

        let resp = test::TestRequest::get().uri("/api/missing").send_request(&app).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(resp.headers().get("x-seen-by").unwrap(), "scope");

        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:scope", "after:scope:200", "before:scope", "after:scope:404"]
        );
    }

    #[actix_web::test]
    async fn test_short_circuit_skips_handler_and_later_stages() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new()
            .with(recorder("outer", &log, false))
            .with(recorder("gate", &log, true))
            .with(recorder("inner", &log, false));

        let app = test::init_service(
            App::new().service(web::resource("/").wrap(pipeline).to(handler)),
        )
        .await;
        let resp = test::TestRequest::get().uri("/").send_request(&app).await;

        assert_eq!(resp.status(), 403);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:outer", "before:gate", "after:outer:403"]
        );
    }
}
