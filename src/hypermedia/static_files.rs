//! Files under the static directory, served at `/static/*`.

use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::context::Context;
use crate::error::HandlerResult;
use crate::http::{Response, StatusCode};

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a URL path below the mount point onto the root directory.
    /// Anything that could step outside it (`..`, absolute paths, drive
    /// prefixes) yields `None`.
    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        let mut pushed = false;
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => {
                    path.push(s);
                    pushed = true;
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        pushed.then_some(path)
    }

    fn content_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "html" => "text/html; charset=utf-8",
            "css" => "text/css",
            "js" => "application/javascript",
            "json" => "application/json",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "ico" => "image/x-icon",
            "txt" => "text/plain; charset=utf-8",
            _ => "application/octet-stream",
        }
    }

    /// Handler for the `/static/*` route; reads the `wildcard` parameter.
    pub async fn serve(&self, ctx: Context) -> HandlerResult {
        let rest = ctx.param("wildcard").unwrap_or_default();
        let Some(path) = self.map_path(rest) else {
            return Ok(not_found());
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(not_found()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(not_found()),
            Err(e) => return Ok(read_failed(&path, &e)),
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Response::new(StatusCode::Ok)
                .header("Content-Type", Self::content_type(&path))
                .body_bytes(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(not_found()),
            Err(e) => Ok(read_failed(&path, &e)),
        }
    }
}

fn not_found() -> Response {
    Response::new(StatusCode::NotFound).body("404 page not found")
}

fn read_failed(path: &Path, err: &io::Error) -> Response {
    warn!(path = %path.display(), error = %err, "static file read failed");
    Response::new(StatusCode::InternalServerError).body("500 internal server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Parameters;
    use crate::test_support::request;

    fn ctx(rest: &str) -> Context {
        let mut params = Parameters::new();
        params.insert("wildcard", rest);
        Context::new(request("GET", &format!("/static{rest}"))).with_params(params)
    }

    #[test]
    fn map_path_rejects_traversal() {
        let files = StaticFiles::new("static");
        assert!(files.map_path("/../Cargo.toml").is_none());
        assert!(files.map_path("/css/../../Cargo.toml").is_none());
        assert!(files.map_path("").is_none());
        assert_eq!(
            files.map_path("/css/./site.css"),
            Some(PathBuf::from("static/css/site.css"))
        );
    }

    #[tokio::test]
    async fn serves_files_with_content_type() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("styles.css"), "body { margin: 0 }").unwrap();
        let files = StaticFiles::new(dir.path());

        let response = files.serve(ctx("/styles.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.headers().get("content-type"), Some("text/css"));
        assert_eq!(response.text(), "body { margin: 0 }");
    }

    #[tokio::test]
    async fn missing_files_and_directories_are_404() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("img")).unwrap();
        let files = StaticFiles::new(dir.path());

        let response = files.serve(ctx("/missing.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NotFound);
        let response = files.serve(ctx("/img")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn traversal_never_reaches_the_parent() {
        let parent = tempfile::tempdir().unwrap();
        std::fs::write(parent.path().join("secret.txt"), "hidden").unwrap();
        let root = parent.path().join("public");
        std::fs::create_dir(&root).unwrap();
        let files = StaticFiles::new(&root);

        let response = files.serve(ctx("/../secret.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert!(!response.text().contains("hidden"));
    }
}
