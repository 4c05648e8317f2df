use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the graft library.
///
/// `RegistryLoad` and `WriteIo` are fatal for the command (or for the batch's
/// config commit); `ComponentNotFound` and `WriteConflict` are per-item and are
/// collected and reported after the batch.
#[derive(Debug, Error)]
pub enum GraftError {
    #[error("failed to load registry from {location}: {reason}")]
    RegistryLoad { location: String, reason: String },

    #[error("component `{name}` not found in registry")]
    ComponentNotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("refusing to overwrite {}: {reason}", .path.display())]
    WriteConflict { path: PathBuf, reason: String },

    #[error("failed to write {}: {source}", .path.display())]
    WriteIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project config at {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GraftError>;

impl GraftError {
    pub fn registry_load(location: impl Into<String>, reason: impl ToString) -> Self {
        GraftError::RegistryLoad {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// An actionable next step to print below the error message.
    pub fn hint(&self) -> Option<String> {
        match self {
            GraftError::RegistryLoad { .. } => Some(
                "check the registry source (`--registry <path|url>` or GRAFT_REGISTRY) and that it serves a valid registry.json".to_string(),
            ),
            GraftError::ComponentNotFound { suggestions, .. } if !suggestions.is_empty() => {
                Some(format!("did you mean: {}?", suggestions.join(", ")))
            }
            GraftError::ComponentNotFound { .. } => {
                Some("run `graft list` to see available components".to_string())
            }
            GraftError::WriteConflict { path, .. } => Some(format!(
                "review {} and re-run with `--force` to replace it",
                path.display()
            )),
            GraftError::WriteIo { path, .. } => Some(format!(
                "fix permissions or free space for {} and re-run; the project config was left unchanged",
                path.display()
            )),
            GraftError::Config { .. } => {
                Some("fix or delete graft.json and run `graft init`".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error should abort the whole command.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            GraftError::ComponentNotFound { .. } | GraftError::WriteConflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_hint_lists_suggestions() {
        let err = GraftError::ComponentNotFound {
            name: "buton".to_string(),
            suggestions: vec!["button".to_string(), "button-group".to_string()],
        };
        assert_eq!(err.hint().unwrap(), "did you mean: button, button-group?");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_write_io_is_fatal() {
        let err = GraftError::WriteIo {
            path: PathBuf::from("src/components/ui/input.tsx"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_fatal());
        assert!(err.hint().unwrap().contains("input.tsx"));
    }
}
