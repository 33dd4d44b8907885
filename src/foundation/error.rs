pub type ViewbakeResult<T> = Result<T, ViewbakeError>;

#[derive(thiserror::Error, Debug)]
pub enum ViewbakeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("serialization error: {0}")]
    Serde(String),

    /// A fatal error pinned to one view of one split.
    #[error("split '{split}', view {view}: {source}")]
    View {
        split: String,
        view: usize,
        #[source]
        source: Box<ViewbakeError>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ViewbakeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub fn at_view(self, split: impl Into<String>, view: usize) -> Self {
        Self::View {
            split: split.into(),
            view,
            source: Box::new(self),
        }
    }

    /// Split and view index of a view-scoped error.
    pub fn location(&self) -> Option<(&str, usize)> {
        match self {
            Self::View { split, view, .. } => Some((split.as_str(), *view)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ViewbakeError::config("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            ViewbakeError::geometry("x")
                .to_string()
                .contains("geometry error:")
        );
        assert!(
            ViewbakeError::render("x")
                .to_string()
                .contains("render error:")
        );
        assert!(
            ViewbakeError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn view_errors_name_split_and_index() {
        let err = ViewbakeError::geometry("singular pose").at_view("val", 7);
        assert_eq!(err.location(), Some(("val", 7)));
        let msg = err.to_string();
        assert!(msg.contains("split 'val'"));
        assert!(msg.contains("view 7"));
        assert!(msg.contains("singular pose"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ViewbakeError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
        assert!(err.location().is_none());
    }
}
