//! In-process stand-in for the learning platform, served with axum.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tokio::net::TcpListener;

pub async fn serve(app: Router) -> String {
    serve_with(|_| app).await
}

/// Binds first so the router can embed its own address in the pages it serves.
pub async fn serve_with(build: impl FnOnce(String) -> Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

#[derive(Debug, Clone)]
pub struct MockModule {
    org: String,
    fragments: Vec<Vec<u8>>,
    delay: Duration,
    broken: bool,
}

impl MockModule {
    pub fn new(org: impl Into<String>, fragments: Vec<Vec<u8>>) -> Self {
        Self {
            org: org.into(),
            fragments,
            delay: Duration::ZERO,
            broken: false,
        }
    }

    /// Delays the module view page.
    pub fn delay_ms(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }

    /// Serves a module page without player data.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

struct Inner {
    base: String,
    modules: Vec<MockModule>,
    fragment_hits: AtomicUsize,
    required_cookie: Mutex<Option<String>>,
}

/// A course whose module `i` has sco id `i` and package id `100 + i`.
#[derive(Clone)]
pub struct MockCourse {
    inner: Arc<Inner>,
}

impl MockCourse {
    pub async fn start(modules: Vec<MockModule>) -> Self {
        let mut course = None;
        serve_with(|base| {
            let c = MockCourse {
                inner: Arc::new(Inner {
                    base,
                    modules,
                    fragment_hits: AtomicUsize::new(0),
                    required_cookie: Mutex::new(None),
                }),
            };
            course = Some(c.clone());
            router(c)
        })
        .await;
        course.unwrap()
    }

    pub fn base(&self) -> &str {
        &self.inner.base
    }

    pub fn fragment_hits(&self) -> usize {
        self.inner.fragment_hits.load(Ordering::SeqCst)
    }

    /// Redirects to the login page unless the session cookie equals `value`.
    pub fn require_cookie(self, value: &str) -> Self {
        *self.inner.required_cookie.lock().unwrap() = Some(value.to_string());
        self
    }

    fn module(&self, id: &str) -> Option<(usize, &MockModule)> {
        let index: usize = id.parse().ok()?;
        self.inner.modules.get(index).map(|m| (index, m))
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let required = self.inner.required_cookie.lock().unwrap().clone();
        match required {
            None => true,
            Some(value) => headers
                .get("cookie")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.ends_with(&format!("={}", value))),
        }
    }

    fn asset_dir(&self, index: usize) -> String {
        format!("{}/pluginfile.php/{}/mod_scorm/content/1", self.inner.base, index)
    }
}

fn router(course: MockCourse) -> Router {
    Router::new()
        .route("/course/view.php", get(course_page))
        .route("/mod/scorm/view.php", get(module_page))
        .route("/mod/scorm/loadSCO.php", get(loader_page))
        .route("/login/index.php", get(|| async { "please log in" }))
        .route(
            "/pluginfile.php/{sco}/mod_scorm/content/1/html5/data/js/data.js",
            get(data_js),
        )
        .route(
            "/pluginfile.php/{sco}/mod_scorm/content/1/story_content/{file}",
            get(fragment),
        )
        .with_state(course)
}

type Params = Query<HashMap<String, String>>;

async fn course_page(State(course): State<MockCourse>, headers: HeaderMap) -> Response {
    if !course.authorized(&headers) {
        return Redirect::temporary("/login/index.php").into_response();
    }
    let links: String = (0..course.inner.modules.len())
        .map(|i| {
            format!(
                "<li><a href=\"{}/mod/scorm/view.php?id={}\">Module {}</a></li>\n",
                course.inner.base, i, i
            )
        })
        .collect();
    format!("<html><body><ul>\n{}</ul></body></html>", links).into_response()
}

async fn module_page(State(course): State<MockCourse>, Query(params): Params) -> Response {
    let Some((index, module)) = params.get("id").and_then(|id| course.module(id)) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    tokio::time::sleep(module.delay).await;
    if module.broken {
        return "<html>This activity is unavailable</html>".into_response();
    }
    format!(
        "<script>var scormplayerdata = {{\"launch\":0,\"currentorg\":\"{}\",\"sco\":\"{}\",\"scorm\":\"{}\"}};</script>",
        module.org,
        index,
        100 + index
    )
    .into_response()
}

async fn loader_page(State(course): State<MockCourse>, Query(params): Params) -> Response {
    let Some((index, _)) = params.get("scoid").and_then(|id| course.module(id)) else {
        return "<html>Nothing to load</html>".into_response();
    };
    format!(
        "<html><script>location = \"{}/index.html\";</script></html>",
        course.asset_dir(index)
    )
    .into_response()
}

async fn data_js(State(course): State<MockCourse>, Path(sco): Path<String>) -> Response {
    let Some((_, module)) = course.module(&sco) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let entries: Vec<String> = (0..module.fragments.len())
        .map(|j| format!("{{\"audio\":\"story_content/f{}.mp3\"}}", j))
        .collect();
    format!("window.globalProvideData('data', '{{\"slides\":[{}]}}');", entries.join(","))
        .into_response()
}

async fn fragment(
    State(course): State<MockCourse>,
    Path((sco, file)): Path<(String, String)>,
) -> Response {
    let audio = course.module(&sco).and_then(|(_, module)| {
        let j: usize = file.strip_prefix('f')?.strip_suffix(".mp3")?.parse().ok()?;
        module.fragments.get(j).cloned()
    });
    match audio {
        Some(bytes) => {
            course.inner.fragment_hits.fetch_add(1, Ordering::SeqCst);
            bytes.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
