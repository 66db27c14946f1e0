//! The htmx front end: handler group, HTML views and static assets.

pub mod handlers;
pub mod static_files;
pub mod views;

use std::future::Future;
use std::sync::Arc;

pub use handlers::{Group, SESSION_COOKIE};
pub use static_files::StaticFiles;
pub use views::Views;

use crate::app::App;
use crate::context::Context;
use crate::dog::Dogs;
use crate::error::{Error, HandlerResult};
use crate::mux::{RouteAdder, WebAppConfig};

/// The roster's route table.
pub struct Routes {
    group: Arc<Group>,
}

impl Routes {
    pub fn new(dogs: Arc<Dogs>) -> Result<Self, Error> {
        Ok(Self {
            group: Arc::new(Group::new(dogs, Views::new()?)),
        })
    }
}

impl RouteAdder for Routes {
    fn add(&self, app: &App, _cfg: &WebAppConfig) {
        let g = &self.group;
        app.get("/", bind(g, Group::index), &[]);
        app.get("/rows", bind(g, Group::dog_rows), &[]);
        app.get("/form", bind(g, Group::form), &[]);
        app.post("/dog", bind(g, Group::create_dog), &[]);
        app.put("/dog/{id}", bind(g, Group::update_dog), &[]);
        app.delete("/dog/{id}", bind(g, Group::delete_dog), &[]);
        app.put("/select/{id}", bind(g, Group::select_dog), &[]);
        app.put("/deselect", bind(g, Group::deselect_dog), &[]);
    }
}

// Turns a `Group` method into a handler closure owning a handle to the group.
fn bind<M, F>(group: &Arc<Group>, method: M) -> impl Fn(Context) -> F + Send + Sync + 'static
where
    M: Fn(Arc<Group>, Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    let group = Arc::clone(group);
    move |ctx| method(Arc::clone(&group), ctx)
}
