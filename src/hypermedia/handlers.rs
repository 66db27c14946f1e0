//! The dog roster handler group.

use std::sync::Arc;

use uuid::Uuid;

use crate::context::Context;
use crate::dog::{Dog, Dogs, Selections};
use crate::error::{Error, HandlerResult};
use crate::http::{Response, StatusCode};
use crate::render::{render_delete, render_html, respond_json};

use super::views::Views;

/// Cookie naming the browser session a selection belongs to.
pub const SESSION_COOKIE: &str = "kennel_session";

/// Event htmx listens for to reload the form.
const SELECTION_CHANGE: &str = "selection-change";

struct Session {
    id: String,
    issued: bool,
}

impl Session {
    fn from_context(ctx: &Context) -> Self {
        match ctx.request().headers().cookie(SESSION_COOKIE) {
            Some(id) if !id.is_empty() => Self {
                id: id.to_owned(),
                issued: false,
            },
            _ => Self {
                id: Uuid::new_v4().to_string(),
                issued: true,
            },
        }
    }

    fn stamp(&self, response: Response) -> Response {
        if !self.issued {
            return response;
        }
        response.header(
            "Set-Cookie",
            format!("{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id),
        )
    }
}

pub struct Group {
    dogs: Arc<Dogs>,
    selections: Selections,
    views: Views,
}

impl Group {
    /// Builds the group over `dogs`, adding the two resident dogs.
    pub fn new(dogs: Arc<Dogs>, views: Views) -> Self {
        dogs.add("Comet", "Whippet");
        dogs.add("Oscar", "German Shorthaired Pointer");
        Self {
            dogs,
            selections: Selections::new(),
            views,
        }
    }

    fn sorted_dogs(&self) -> Vec<Dog> {
        let mut dogs = self.dogs.get_all();
        dogs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        dogs
    }

    pub async fn index(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let session = Session::from_context(&ctx);
        let page = self.views.index()?;
        render_html(&ctx, page, StatusCode::Ok).map(|r| session.stamp(r))
    }

    pub async fn dog_rows(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let rows = self.views.rows(&self.sorted_dogs())?;
        render_html(&ctx, rows, StatusCode::Ok)
    }

    pub async fn form(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let session = Session::from_context(&ctx);
        let selected = self
            .selections
            .selected(&session.id)
            .and_then(|id| self.dogs.get(&id));

        let form = self.views.form(selected.as_ref())?;
        render_html(&ctx, form, StatusCode::Ok).map(|r| session.stamp(r))
    }

    pub async fn create_dog(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let name = ctx.form_value("name").unwrap_or_default();
        let breed = ctx.form_value("breed").unwrap_or_default();

        let dog = self.dogs.add(name, breed);
        let row = self.views.row(&dog)?;
        render_html(&ctx, row, StatusCode::Ok)
    }

    pub async fn select_dog(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let session = Session::from_context(&ctx);
        let id = ctx.param("id").unwrap_or_default();
        self.selections.select(&session.id, id);

        respond_json::<()>(&ctx, None, StatusCode::NoContent)
            .map(|r| session.stamp(r.header("HX-Trigger", SELECTION_CHANGE)))
    }

    pub async fn deselect_dog(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let session = Session::from_context(&ctx);
        self.selections.clear(&session.id);

        respond_json::<()>(&ctx, None, StatusCode::NoContent)
            .map(|r| session.stamp(r.header("HX-Trigger", SELECTION_CHANGE)))
    }

    pub async fn update_dog(self: Arc<Self>, ctx: Context) -> HandlerResult {
        let session = Session::from_context(&ctx);
        let id = ctx.param("id").unwrap_or_default();
        let name = ctx.form_value("name").unwrap_or_default();
        let breed = ctx.form_value("breed").unwrap_or_default();

        self.selections.clear(&session.id);
        if !self.dogs.update(id, name, breed) {
            return Err(Error::not_found(format!("dog {id} not found")));
        }

        let rows = self.views.rows(&self.sorted_dogs())?;
        render_html(&ctx, rows, StatusCode::Ok)
            .map(|r| session.stamp(r.header("HX-Trigger", SELECTION_CHANGE)))
    }

    pub async fn delete_dog(self: Arc<Self>, ctx: Context) -> HandlerResult {
        if let Some(id) = ctx.param("id") {
            self.dogs.delete(id);
        }
        render_delete(&ctx, StatusCode::Ok)
    }
}
