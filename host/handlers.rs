use crate::*;

/// Form posted to `/add`
#[derive(Debug, Default, Deserialize)]
pub struct AddForm {
    #[serde(default)]
    pub title: Option<String>,
}

impl AddForm {
    /// Body fields win over query fields, like `Request.FormValue`
    pub fn or(self, fallback: Self) -> Self {
        Self {
            title: self.title.or(fallback.title),
        }
    }
}

/// Form posted to `/done`, used when the path carries no id
#[derive(Debug, Default, Deserialize)]
pub struct DoneForm {
    #[serde(default)]
    pub id: Option<String>,
}

impl DoneForm {
    pub fn or(self, fallback: Self) -> Self {
        Self {
            id: self.id.or(fallback.id),
        }
    }
}

/// One method per route, [`TodoRoutes::routes`] binds them to their paths
#[async_trait]
pub trait TodoRoutes: Clone + Send + Sync + 'static {
    /// `GET /`
    async fn index(&self) -> Result<Html<String>>;
    /// `POST /add`
    async fn add(&self, form: AddForm) -> Result<Response>;
    /// `POST /done/:id` and `POST /done`
    async fn done(&self, path_id: Option<String>, form: DoneForm) -> Result<Response>;
    /// `GET /debug/stats`
    async fn stats(&self) -> Result<Response>;
    /// `GET /debug/metrics`
    async fn metrics(&self) -> Response;

    fn routes(self) -> Router {
        Router::new()
            .route("/", get(|State(h): State<Self>| async move { h.index().await }))
            .route("/add", post(add_handler::<Self>))
            .route("/done/:id", post(done_handler::<Self>))
            .route("/done", post(done_handler::<Self>))
            .route("/debug/stats", get(|State(h): State<Self>| async move { h.stats().await }))
            .route(
                "/debug/metrics",
                get(|State(h): State<Self>| async move { h.metrics().await }),
            )
            .with_state(self)
    }
}

async fn add_handler<H: TodoRoutes>(
    State(h): State<H>,
    query: Option<Query<AddForm>>,
    form: Option<Form<AddForm>>,
) -> Result<Response> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let form = form.map(|Form(f)| f).unwrap_or_default();
    h.add(form.or(query)).await
}

async fn done_handler<H: TodoRoutes>(
    State(h): State<H>,
    path: Option<Path<String>>,
    query: Option<Query<DoneForm>>,
    form: Option<Form<DoneForm>>,
) -> Result<Response> {
    let path_id = path.map(|Path(id)| id);
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let form = form.map(|Form(f)| f).unwrap_or_default();
    h.done(path_id, form.or(query)).await
}

/// 302 to `location`, the status browsers follow with a GET after a form post
pub fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Request handlers over an injected [`TodoRepository`]
#[derive(Clone)]
pub struct Handlers {
    store: Arc<dyn TodoRepository>,
    templates: Arc<Templates>,
    counters: Counters,
    stats: Stats,
}

impl Handlers {
    pub fn new(store: Arc<dyn TodoRepository>, templates: Templates) -> Self {
        Self {
            store,
            templates: Arc::new(templates),
            counters: Counters::new(),
            stats: Stats::new(),
        }
    }

    /// Statistics fed by [`Stats::layer`] and served by [`TodoRoutes::stats`]
    pub fn request_stats(&self) -> &Stats {
        &self.stats
    }
}

#[async_trait]
impl TodoRoutes for Handlers {
    async fn index(&self) -> Result<Html<String>> {
        self.counters.inc("n_index");

        let todo_list = match self.store.list() {
            Ok(todos) => todos,
            Err(StoreError::NotFound) => vec![],
            Err(e) => return Err(Error::Fetch(e)),
        };

        let page = self
            .templates
            .exec(INDEX_TEMPLATE, &TemplateContext { todo_list })?;
        Ok(Html(page))
    }

    async fn add(&self, form: AddForm) -> Result<Response> {
        self.counters.inc("n_add");

        let mut todo = Todo::new(form.title.unwrap_or_default());
        self.store.save(&mut todo).map_err(Error::Save)?;
        debug!("Added todo {}", todo.id);

        Ok(found("/"))
    }

    async fn done(&self, path_id: Option<String>, form: DoneForm) -> Result<Response> {
        self.counters.inc("n_done");

        let id = path_id
            .filter(|id| !id.is_empty())
            .or(form.id.filter(|id| !id.is_empty()))
            .ok_or(Error::MissingId)?;
        let id = id
            .parse::<u64>()
            .map_err(|source| Error::InvalidId { id, source })?;

        let mut todo = self
            .store
            .one(id)
            .map_err(|source| Error::Lookup { id, source })?;
        todo.toggle_done();
        self.store
            .save(&mut todo)
            .map_err(|source| Error::Update { id, source })?;
        debug!("Todo {id} is now done: {}", todo.done);

        Ok(found("/"))
    }

    async fn stats(&self) -> Result<Response> {
        let body = serde_json::to_vec(&self.stats.data())?;
        Ok((
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response())
    }

    async fn metrics(&self) -> Response {
        (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            self.counters.render(),
        )
            .into_response()
    }
}
