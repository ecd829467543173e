use uuid::Uuid;

/// Per-user UI session. Holds only the logged-in name; the profile itself is
/// re-read from the store whenever it is needed.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    current_user: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            current_user: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub(crate) fn set_user(&mut self, name: &str) {
        self.current_user = Some(name.to_string());
    }

    pub(crate) fn clear_user(&mut self) -> Option<String> {
        self.current_user.take()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_get_distinct_ids() {
        let a = Session::new();
        let b = Session::new();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_logged_in());
    }

    #[test]
    fn test_set_and_clear_user() {
        let mut session = Session::new();
        session.set_user("Joseph");
        assert_eq!(session.current_user(), Some("Joseph"));

        assert_eq!(session.clear_user(), Some("Joseph".to_string()));
        assert_eq!(session.current_user(), None);
    }
}
