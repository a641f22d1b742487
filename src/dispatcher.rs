use std::collections::HashMap;
use anyhow::{bail, Result};
use tracing::{debug, warn};
use crate::http_object::{HttpRequest, HttpResponse};
use crate::http_status::HttpStatus;
use crate::http_type::Method;

/// A handler may install an upgrade handler on the request.
pub type Handler = fn(&mut HttpRequest, HttpResponse) -> Result<HttpResponse>;

#[derive(Default)]
pub struct Dispatcher {
    router: Router
}

impl Dispatcher {
    pub fn new() -> Dispatcher {
        Dispatcher { router : Router::new() }
    }

    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        self.router.add(method, path, handler)
    }

    /// Runs the handler for the request. Unknown routes get 404 and handler
    /// errors get 500 with an empty body.
    pub fn dispatch(&self, req: &mut HttpRequest) -> HttpResponse {
        let Some(handler) = self.router.find(req.method, req.path.as_str()) else {
            debug!("no route for {} {}.", req.method, req.path);
            return HttpResponse::with_status_code(HttpStatus::NotFound);
        };

        match handler(req, HttpResponse::new()) {
            Ok(res) => res,
            Err(e) => {
                warn!("handler for {} {} failed: {:#}", req.method, req.path, e);
                HttpResponse::with_status_code(HttpStatus::InternalServerError)
            },
        }
    }
}


#[derive(Default)]
struct Router {
    // key : method, then path
    routes: HashMap<Method, HashMap<String, Handler>>,
}

impl Router {

    pub fn new() -> Router {
        Router::default()
    }

    pub fn find(&self, method: Method, path: &str) -> Option<&Handler> {
        self.routes.get(&method)?.get(path)
    }

    pub fn add(&mut self, method: Method, path: &str, handler: Handler) -> Result<()> {
        if !path.starts_with('/') {
            bail!("Invalid path: {}. path should starts with '/'", path);
        }

        let routes = self.routes.entry(method).or_default();
        if routes.contains_key(path) {
            bail!("{} {} is already registered.", method, path)
        }
        routes.insert(path.to_string(), handler);
        Ok(())
    }
}
