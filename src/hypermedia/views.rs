//! HTML fragments for the dog roster, rendered with minijinja.
//!
//! Templates are compiled into the binary. Their `.html` names switch on
//! minijinja's HTML auto-escaping, so dog names and breeds are always
//! escaped.

use minijinja::{Environment, context};

use crate::dog::Dog;
use crate::error::Error;

const TEMPLATES: &[(&str, &str)] = &[
    ("index.html", include_str!("../../templates/index.html")),
    ("rows.html", include_str!("../../templates/rows.html")),
    ("row.html", include_str!("../../templates/row.html")),
    ("form.html", include_str!("../../templates/form.html")),
];

pub struct Views {
    env: Environment<'static>,
}

impl Views {
    pub fn new() -> Result<Self, Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        Ok(Self { env })
    }

    /// The page shell; rows and form are fetched by htmx on load.
    pub fn index(&self) -> Result<String, Error> {
        self.render("index.html", context! { title => "Kennel" })
    }

    pub fn rows(&self, dogs: &[Dog]) -> Result<String, Error> {
        self.render("rows.html", context! { dogs => dogs })
    }

    pub fn row(&self, dog: &Dog) -> Result<String, Error> {
        self.render("row.html", context! { dog => dog })
    }

    /// The add form, or the edit form when `selected` is set.
    pub fn form(&self, selected: Option<&Dog>) -> Result<String, Error> {
        self.render("form.html", context! { dog => selected })
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, Error> {
        Ok(self.env.get_template(name)?.render(ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog(name: &str, breed: &str) -> Dog {
        Dog {
            id: "d1".into(),
            name: name.into(),
            breed: breed.into(),
        }
    }

    #[test]
    fn row_carries_delete_and_select_actions() {
        let views = Views::new().unwrap();
        let html = views.row(&dog("Comet", "Whippet")).unwrap();
        assert!(html.contains("<td>Comet</td>"));
        assert!(html.contains("<td>Whippet</td>"));
        assert!(html.contains(r#"hx-delete="/dog/d1""#));
        assert!(html.contains(r#"hx-swap="delete""#));
        assert!(html.contains(r#"hx-put="/select/d1""#));
    }

    #[test]
    fn names_are_escaped() {
        let views = Views::new().unwrap();
        let html = views.row(&dog("<script>", "Mutt & Co")).unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Mutt &amp; Co"));
    }

    #[test]
    fn rows_render_in_the_given_order() {
        let views = Views::new().unwrap();
        let html = views
            .rows(&[dog("Comet", "Whippet"), dog("Oscar", "German Shorthaired Pointer")])
            .unwrap();
        let comet = html.find("Comet").unwrap();
        let oscar = html.find("Oscar").unwrap();
        assert!(comet < oscar);
        assert_eq!(html.matches("<tr").count(), 2);
    }

    #[test]
    fn form_switches_between_add_and_edit() {
        let views = Views::new().unwrap();
        let add = views.form(None).unwrap();
        assert!(add.contains(r#"hx-post="/dog""#));
        assert!(!add.contains("/deselect"));

        let edit = views.form(Some(&dog("Oscar", "Pointer"))).unwrap();
        assert!(edit.contains(r#"hx-put="/dog/d1""#));
        assert!(edit.contains(r#"value="Oscar""#));
        assert!(edit.contains("/deselect"));
    }

    #[test]
    fn index_loads_rows_and_form() {
        let html = Views::new().unwrap().index().unwrap();
        assert!(html.contains(r#"hx-get="/rows""#));
        assert!(html.contains(r#"hx-get="/form""#));
        assert!(html.contains("selection-change"));
    }
}
