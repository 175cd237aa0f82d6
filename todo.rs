use crate::*;

/// The single persisted entity
///
/// `id` stays `0` until the store assigns one on the first [`TodoRepository::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub done: bool,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Any title is accepted, including an empty one
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            done: false,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    pub fn toggle_done(&mut self) {
        self.done = !self.done;
        self.touch();
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    // wall clock may step backwards, updated_at must not
    fn touch(&mut self) {
        self.updated_at = Utc::now().max(self.updated_at);
    }
}
